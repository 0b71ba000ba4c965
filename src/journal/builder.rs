use crate::backend::ByteFile;
use crate::codec;
use crate::error::JournalError;
use crate::journal::format::{
    BLOCK_COUNT_OFFSET, BLOCK_HEADER_LEN, FLAG_JOURNALING, HEADER_LEN, JOURNAL_VERSION,
};
use std::io::SeekFrom;

/// Assembles journal blocks as the session writes and seeks.
///
/// Owns the journal file plus the session counters. `end_pos` bounds the
/// meaningful bytes; the physical file may be longer (stale tail from a
/// previous larger session). While no structural operation is in progress
/// the file cursor sits at `end_pos`.
#[derive(Debug)]
pub struct JournalBuilder {
    file: ByteFile,
    end_pos: i64,
    completed_blocks: i64,
    block_start_pos: i64,
    block_len: i64,
}

impl JournalBuilder {
    pub fn new(file: ByteFile) -> Self {
        Self {
            file,
            end_pos: 0,
            completed_blocks: 0,
            block_start_pos: 0,
            block_len: 0,
        }
    }

    /// A session is writing once the header exists or a block is open.
    pub fn is_writing(&self) -> bool {
        self.end_pos != 0 || self.block_len != 0
    }

    pub fn end_pos(&self) -> i64 {
        self.end_pos
    }

    pub fn completed_blocks(&self) -> i64 {
        self.completed_blocks
    }

    /// Writes the 13-byte header (`'J'`, version, zero block count) if this
    /// session has not yet touched the journal. Idempotent.
    pub fn ensure_header(&mut self) -> Result<(), JournalError> {
        if self.end_pos != 0 {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(0))?;
        codec::put_u8(&mut self.file, FLAG_JOURNALING)?;
        codec::put_i32(&mut self.file, JOURNAL_VERSION)?;
        codec::put_i64(&mut self.file, 0)?;
        self.end_pos = HEADER_LEN;
        Ok(())
    }

    /// Opens a block bound to `target_pos` unless one is already open.
    /// Leaves the cursor positioned for content appends.
    pub fn open_block(&mut self, target_pos: i64) -> Result<(), JournalError> {
        if self.block_len != 0 {
            return Ok(());
        }
        self.block_start_pos = self.end_pos;
        // Length placeholder, back-patched at close.
        codec::put_i64(&mut self.file, 0)?;
        codec::put_i64(&mut self.file, target_pos)?;
        self.block_len = BLOCK_HEADER_LEN;
        self.end_pos += BLOCK_HEADER_LEN;
        Ok(())
    }

    /// Back-patches the open block's length, bumps the on-disk block count,
    /// and returns the cursor to `end_pos`. No-op without an open block.
    pub fn close_block(&mut self) -> Result<(), JournalError> {
        if self.block_len == 0 {
            return Ok(());
        }
        self.file.seek(SeekFrom::Start(self.block_start_pos as u64))?;
        codec::put_i64(&mut self.file, self.block_len)?;

        self.completed_blocks += 1;
        self.file.seek(SeekFrom::Start(BLOCK_COUNT_OFFSET as u64))?;
        codec::put_i64(&mut self.file, self.completed_blocks)?;

        // Not SEEK_END: the physical file can outlive end_pos.
        self.file.seek(SeekFrom::Start(self.end_pos as u64))?;
        self.block_len = 0;
        Ok(())
    }

    pub fn put_u8(&mut self, byte: u8) -> Result<i64, JournalError> {
        codec::put_u8(&mut self.file, byte)?;
        self.advance(1);
        Ok(1)
    }

    pub fn put_bytes(&mut self, buf: &[u8]) -> Result<i64, JournalError> {
        codec::put_bytes(&mut self.file, buf)?;
        let count = buf.len() as i64;
        self.advance(count);
        Ok(count)
    }

    pub fn put_cstr_bytes(&mut self, s: &[u8]) -> Result<i64, JournalError> {
        let count = codec::put_cstr_bytes(&mut self.file, s)?;
        self.advance(count);
        Ok(count)
    }

    pub fn put_i32(&mut self, value: i32) -> Result<i64, JournalError> {
        codec::put_i32(&mut self.file, value)?;
        self.advance(4);
        Ok(4)
    }

    pub fn put_i64(&mut self, value: i64) -> Result<i64, JournalError> {
        codec::put_i64(&mut self.file, value)?;
        self.advance(8);
        Ok(8)
    }

    /// Forgets the session. On-disk bytes are left stale; they are ignored
    /// because the flag was never flipped to ready.
    pub fn reset(&mut self) {
        self.end_pos = 0;
        self.completed_blocks = 0;
        self.block_start_pos = 0;
        self.block_len = 0;
    }

    pub(crate) fn file_mut(&mut self) -> &mut ByteFile {
        &mut self.file
    }

    fn advance(&mut self, count: i64) {
        self.block_len += count;
        self.end_pos += count;
    }
}
