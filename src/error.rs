use crate::codec::CodecError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure taxonomy for every public journal operation.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("backend I/O failure: {0}")]
    Backend(#[from] io::Error),
    #[error("truncated integer: expected {expected} bytes, read {actual}")]
    TruncatedInteger { expected: usize, actual: usize },
    #[error("journal block content ended early: {missing} bytes missing")]
    CorruptJournal { missing: i64 },
    #[error("unsupported journal version {found}")]
    Version { found: i32 },
    #[error("seek target {target} outside [0, {max_pos}]")]
    InvalidSeek { target: i64, max_pos: i64 },
    #[error("cannot read fixed-width integers while a journal session is writing")]
    ReadDuringWrite,
}

impl From<CodecError> for JournalError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(source) => JournalError::Backend(source),
            CodecError::TruncatedInteger { expected, actual } => {
                JournalError::TruncatedInteger { expected, actual }
            }
        }
    }
}
