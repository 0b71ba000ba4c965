use crate::backend::ByteFile;
use crate::codec;
use crate::error::JournalError;
use crate::journal::format::{BLOCK_HEADER_LEN, FLAG_CLEARED, FLAG_READY, JOURNAL_VERSION};
use log::{debug, info};
use std::io::SeekFrom;

const COPY_BUF_LEN: usize = 8 * 1024;

/// What a replay pass did with the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Blocks were copied into the main file; the caller must assume the
    /// main file changed underneath its handle.
    Applied { blocks: i64 },
    /// The journal was ready but held no blocks; flag flipped to cleared.
    Clean,
    /// Flag was not ready (or the journal is empty); nothing replayed.
    Skipped,
}

/// Drains a ready journal into the main file.
///
/// Only a `'R'` flag is replayed; `'J'`, `'C'`, an unknown byte, or an
/// empty journal are all skipped. On replay the main file is synced before
/// the flag flips to `'C'`, so a crash in between re-replays cleanly.
pub fn replay(journal: &mut ByteFile, main: &mut ByteFile) -> Result<ReplayOutcome, JournalError> {
    journal.seek(SeekFrom::Start(0))?;
    let Some(flag) = codec::get_u8(journal)? else {
        return Ok(ReplayOutcome::Skipped);
    };
    if flag != FLAG_READY {
        debug!(
            "event=journal_replay_skipped flag={:?} journal={}",
            char::from(flag),
            journal.path().display()
        );
        return Ok(ReplayOutcome::Skipped);
    }

    let version = codec::get_i32(journal)?;
    if version != JOURNAL_VERSION {
        return Err(JournalError::Version { found: version });
    }

    let blocks = codec::get_i64(journal)?;
    let mut remaining = blocks;
    while remaining > 0 {
        remaining -= 1;
        let block_len = codec::get_i64(journal)?;
        let content_len = block_len - BLOCK_HEADER_LEN;
        let target_pos = codec::get_i64(journal)?;
        if content_len == 0 {
            continue;
        }
        main.seek(SeekFrom::Start(target_pos as u64))?;
        copy_content(journal, main, content_len)?;
    }

    if blocks > 0 {
        main.sync()?;
    }

    journal.seek(SeekFrom::Start(0))?;
    codec::put_u8(journal, FLAG_CLEARED)?;

    if blocks > 0 {
        info!(
            "event=journal_replayed blocks={} main={}",
            blocks,
            main.path().display()
        );
        Ok(ReplayOutcome::Applied { blocks })
    } else {
        Ok(ReplayOutcome::Clean)
    }
}

fn copy_content(
    journal: &mut ByteFile,
    main: &mut ByteFile,
    content_len: i64,
) -> Result<(), JournalError> {
    let mut buf = [0u8; COPY_BUF_LEN];
    let mut remaining = content_len;
    while remaining > 0 {
        let want = remaining.min(COPY_BUF_LEN as i64) as usize;
        let got = codec::get_bytes(journal, &mut buf[..want])?;
        if got == 0 {
            return Err(JournalError::CorruptJournal { missing: remaining });
        }
        codec::put_bytes(main, &buf[..got])?;
        remaining -= got as i64;
    }
    Ok(())
}
