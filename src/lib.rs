//! Journaled file I/O: crash-safe, transactionally updatable byte files.
//!
//! A [`JournalFile`] pairs a main file with a companion journal. Writes are
//! buffered into journal blocks; [`JournalFile::flush`] commits them with a
//! sync-ordered protocol that the next open replays if the process dies
//! mid-drain.
#![deny(unreachable_pub)]
#![deny(unused_must_use)]

pub mod backend;
pub mod codec;
pub mod engine;
pub mod error;
pub mod journal;

pub use backend::{ByteFile, SharePolicy};
pub use codec::CodecError;
pub use engine::JournalFile;
pub use error::JournalError;
pub use journal::{JournalBuilder, JournalFlag, ReplayOutcome, JOURNAL_VERSION};
