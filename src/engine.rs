use crate::backend::{ByteFile, SharePolicy};
use crate::codec;
use crate::error::JournalError;
use crate::journal::builder::JournalBuilder;
use crate::journal::format::FLAG_READY;
use crate::journal::replay::{replay, ReplayOutcome};
use log::{debug, info};
use std::io::SeekFrom;
use std::path::Path;

/// A journaled file session: a main file plus its companion journal.
///
/// Writes are buffered into journal blocks and only reach the main file
/// through [`JournalFile::flush`], or through recovery on the next open if
/// the process died after a completed flush. Reads bypass the journal and
/// see the main file as of the last commit.
#[derive(Debug)]
pub struct JournalFile {
    main: ByteFile,
    journal: JournalBuilder,
    pos: i64,
    max_pos: i64,
    last_persisted_pos: i64,
    last_persisted_max_pos: i64,
}

impl JournalFile {
    /// Opens `main_path` (trying `mode_a`, then `mode_b`) and its journal
    /// with exclusive sharing, recovering any committed journal first.
    pub fn open(
        main_path: impl AsRef<Path>,
        journal_path: impl AsRef<Path>,
        mode_a: &str,
        mode_b: &str,
    ) -> Result<JournalFile, JournalError> {
        Self::open_with_sharing(
            main_path,
            journal_path,
            mode_a,
            mode_b,
            SharePolicy::Exclusive,
        )
    }

    pub fn open_with_sharing(
        main_path: impl AsRef<Path>,
        journal_path: impl AsRef<Path>,
        mode_a: &str,
        mode_b: &str,
        share: SharePolicy,
    ) -> Result<JournalFile, JournalError> {
        let main_path = main_path.as_ref();
        let journal_path = journal_path.as_ref();

        let mut main = open_file(main_path, mode_a, mode_b, share)?;
        // If the journal fails to open, dropping `main` releases it first.
        let mut journal = open_file(journal_path, "rb+", "wb+", share)?;

        if let ReplayOutcome::Applied { blocks } = replay(&mut journal, &mut main)? {
            info!(
                "event=journal_recovered blocks={} main={}",
                blocks,
                main_path.display()
            );
            // Recovery changed the main file underneath the handle; reopen
            // so reads observe the committed image.
            drop(main);
            main = open_file(main_path, mode_a, mode_b, share)?;
        }

        let pos = main.stream_position()? as i64;
        let max_pos = main.seek(SeekFrom::End(0))? as i64;
        main.seek(SeekFrom::Start(pos as u64))?;

        Ok(JournalFile {
            main,
            journal: JournalBuilder::new(journal),
            pos,
            max_pos,
            last_persisted_pos: pos,
            last_persisted_max_pos: max_pos,
        })
    }

    /// Caller-visible position in the main file's logical stream.
    pub fn tell(&self) -> i64 {
        self.pos
    }

    /// Logical file length: the highest position ever reached.
    pub fn len(&self) -> i64 {
        self.max_pos
    }

    pub fn is_empty(&self) -> bool {
        self.max_pos == 0
    }

    /// Whether a journaling session is in progress (reads are cut off).
    pub fn is_writing(&self) -> bool {
        self.journal.is_writing()
    }

    /// Moves the logical position and returns it.
    ///
    /// Outside a write session the seek is forwarded verbatim to the main
    /// file. Inside one the current block closes, the target is validated
    /// against `[0, len()]`, and a new block opens there. `Current` is
    /// computed from the logical length, not from `tell()`.
    pub fn seek(&mut self, target: SeekFrom) -> Result<i64, JournalError> {
        if !self.is_writing() {
            self.pos = self.main.seek(target)? as i64;
            return Ok(self.pos);
        }

        self.journal.ensure_header()?;
        self.journal.close_block()?;

        let new_pos = match target {
            SeekFrom::Start(offset) => {
                let target = i64::try_from(offset).unwrap_or(i64::MAX);
                self.bounded(target)?
            }
            SeekFrom::Current(offset) => self.bounded(self.max_pos + offset)?,
            SeekFrom::End(offset) => {
                if offset > 0 {
                    return Err(JournalError::InvalidSeek {
                        target: self.max_pos + offset,
                        max_pos: self.max_pos,
                    });
                }
                self.bounded(self.max_pos + offset)?
            }
        };

        self.pos = new_pos;
        self.journal.open_block(self.pos)?;
        Ok(self.pos)
    }

    pub fn put_byte(&mut self, byte: u8) -> Result<(), JournalError> {
        self.begin_write()?;
        let count = self.journal.put_u8(byte)?;
        self.advance(count);
        Ok(())
    }

    /// Writes `s` up to (not including) its first NUL byte. Returns the
    /// count written.
    pub fn put_str(&mut self, s: &str) -> Result<i64, JournalError> {
        self.begin_write()?;
        let count = self.journal.put_cstr_bytes(s.as_bytes())?;
        self.advance(count);
        Ok(count)
    }

    pub fn put_bytes(&mut self, buf: &[u8]) -> Result<(), JournalError> {
        self.begin_write()?;
        let count = self.journal.put_bytes(buf)?;
        self.advance(count);
        Ok(())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<(), JournalError> {
        self.begin_write()?;
        let count = self.journal.put_i32(value)?;
        self.advance(count);
        Ok(())
    }

    pub fn put_i64(&mut self, value: i64) -> Result<(), JournalError> {
        self.begin_write()?;
        let count = self.journal.put_i64(value)?;
        self.advance(count);
        Ok(())
    }

    /// Reads one byte from the main file; `Ok(None)` at end of file or
    /// while a write session is open.
    pub fn get_byte(&mut self) -> Result<Option<u8>, JournalError> {
        if self.is_writing() {
            return Ok(None);
        }
        let byte = codec::get_u8(&mut self.main)?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    /// Reads at most `buf.len()` bytes; `Ok(None)` while a write session is
    /// open, otherwise the count actually read.
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> Result<Option<usize>, JournalError> {
        if self.is_writing() {
            return Ok(None);
        }
        let count = codec::get_bytes(&mut self.main, buf)?;
        self.pos += count as i64;
        Ok(Some(count))
    }

    pub fn get_i32(&mut self) -> Result<i32, JournalError> {
        if self.is_writing() {
            return Err(JournalError::ReadDuringWrite);
        }
        let value = codec::get_i32(&mut self.main)?;
        self.pos += 4;
        Ok(value)
    }

    pub fn get_i64(&mut self) -> Result<i64, JournalError> {
        if self.is_writing() {
            return Err(JournalError::ReadDuringWrite);
        }
        let value = codec::get_i64(&mut self.main)?;
        self.pos += 8;
        Ok(value)
    }

    /// Commits the session: marks the journal ready, syncs it, replays it
    /// into the main file, and resets to the idle state. No-op when the
    /// session never wrote.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if self.journal.end_pos() == 0 {
            debug!("event=journal_flush_noop main={}", self.main.path().display());
            return Ok(());
        }

        self.journal.close_block()?;
        let blocks = self.journal.completed_blocks();

        let journal = self.journal.file_mut();
        journal.seek(SeekFrom::Start(0))?;
        codec::put_u8(journal, FLAG_READY)?;
        // Crash-visibility barrier: once this sync returns, the journal is
        // durable and any future open will replay it.
        journal.sync()?;

        replay(self.journal.file_mut(), &mut self.main)?;
        info!(
            "event=journal_commit blocks={} pos={} len={} main={}",
            blocks,
            self.pos,
            self.max_pos,
            self.main.path().display()
        );

        self.last_persisted_pos = self.pos;
        self.last_persisted_max_pos = self.max_pos;
        self.journal.reset();
        self.main.seek(SeekFrom::Start(self.pos as u64))?;
        Ok(())
    }

    /// Aborts the session: unflushed writes are forgotten and the position
    /// snaps back to the last committed state. The journal's on-disk bytes
    /// are left stale; they were never marked ready.
    pub fn clear(&mut self) {
        self.journal.reset();
        self.pos = self.last_persisted_pos;
        self.max_pos = self.last_persisted_max_pos;
        debug!(
            "event=journal_session_cleared pos={} len={} main={}",
            self.pos,
            self.max_pos,
            self.main.path().display()
        );
    }

    /// Releases both files. Uncommitted writes are discarded, exactly as a
    /// crash before flush would.
    pub fn close(self) {}

    fn begin_write(&mut self) -> Result<(), JournalError> {
        self.journal.ensure_header()?;
        self.journal.open_block(self.pos)?;
        Ok(())
    }

    fn advance(&mut self, count: i64) {
        self.pos += count;
        if self.pos > self.max_pos {
            self.max_pos = self.pos;
        }
    }

    fn bounded(&self, target: i64) -> Result<i64, JournalError> {
        if target < 0 || target > self.max_pos {
            return Err(JournalError::InvalidSeek {
                target,
                max_pos: self.max_pos,
            });
        }
        Ok(target)
    }
}

fn open_file(
    path: &Path,
    mode_a: &str,
    mode_b: &str,
    share: SharePolicy,
) -> Result<ByteFile, JournalError> {
    ByteFile::open_with_fallback(path, mode_a, mode_b, share).map_err(|source| {
        JournalError::Open {
            path: path.to_owned(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_pair(dir: &tempfile::TempDir) -> JournalFile {
        JournalFile::open(
            dir.path().join("main.bin"),
            dir.path().join("journal.bin"),
            "rb+",
            "wb+",
        )
        .unwrap()
    }

    #[test]
    fn fresh_file_opens_idle_at_zero() {
        let dir = tempdir().unwrap();
        let file = open_pair(&dir);
        assert_eq!(file.tell(), 0);
        assert_eq!(file.len(), 0);
        assert!(file.is_empty());
        assert!(!file.is_writing());
    }

    #[test]
    fn writing_session_bounds_seeks_to_logical_length() {
        let dir = tempdir().unwrap();
        let mut file = open_pair(&dir);
        file.put_bytes(b"0123456789").unwrap();

        let err = file.seek(SeekFrom::Start(11)).unwrap_err();
        assert!(matches!(
            err,
            JournalError::InvalidSeek {
                target: 11,
                max_pos: 10
            }
        ));
        let err = file.seek(SeekFrom::End(1)).unwrap_err();
        assert!(matches!(err, JournalError::InvalidSeek { .. }));
        let err = file.seek(SeekFrom::Current(-11)).unwrap_err();
        assert!(matches!(err, JournalError::InvalidSeek { target: -1, .. }));

        assert_eq!(file.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(file.seek(SeekFrom::End(-10)).unwrap(), 0);
    }

    #[test]
    fn current_seeks_are_relative_to_logical_length() {
        let dir = tempdir().unwrap();
        let mut file = open_pair(&dir);
        file.put_bytes(b"abcdef").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        // Still relative to len(), not to the rewound position.
        assert_eq!(file.seek(SeekFrom::Current(-2)).unwrap(), 4);
    }

    #[test]
    fn reads_cut_off_during_write_session() {
        let dir = tempdir().unwrap();
        let mut file = open_pair(&dir);
        file.put_byte(b'x').unwrap();

        assert_eq!(file.get_byte().unwrap(), None);
        let mut buf = [0u8; 4];
        assert_eq!(file.get_bytes(&mut buf).unwrap(), None);
        assert!(matches!(
            file.get_i32().unwrap_err(),
            JournalError::ReadDuringWrite
        ));
        assert!(matches!(
            file.get_i64().unwrap_err(),
            JournalError::ReadDuringWrite
        ));
    }

    #[test]
    fn flush_without_writes_is_a_noop() {
        let dir = tempdir().unwrap();
        let mut file = open_pair(&dir);
        file.flush().unwrap();
        assert_eq!(std::fs::read(dir.path().join("main.bin")).unwrap(), b"");
        assert_eq!(std::fs::read(dir.path().join("journal.bin")).unwrap(), b"");
    }

    #[test]
    fn put_str_reports_bytes_written() {
        let dir = tempdir().unwrap();
        let mut file = open_pair(&dir);
        assert_eq!(file.put_str("ello").unwrap(), 4);
        assert_eq!(file.put_str("ab\0cd").unwrap(), 2);
        assert_eq!(file.tell(), 6);
    }
}
