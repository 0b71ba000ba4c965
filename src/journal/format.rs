//! On-disk geometry of the journal file.
//!
//! ```text
//! offset  size  field
//!  0      1     flag ('J' journaling, 'R' ready, 'C' cleared)
//!  1      4     version (big-endian i32)
//!  5      8     completed block count (big-endian i64)
//! 13      ..    blocks
//! ```
//!
//! Each block carries an 8-byte total length (16 + content length, zero
//! until the block closes), an 8-byte main-file target offset, then the
//! content bytes.

pub const FLAG_JOURNALING: u8 = b'J';
pub const FLAG_READY: u8 = b'R';
pub const FLAG_CLEARED: u8 = b'C';

pub const JOURNAL_VERSION: i32 = 1;

pub const FLAG_BYTES: i64 = 1;
pub const VERSION_BYTES: i64 = 4;
pub const BLOCK_COUNT_BYTES: i64 = 8;
pub const HEADER_LEN: i64 = FLAG_BYTES + VERSION_BYTES + BLOCK_COUNT_BYTES;
pub const BLOCK_COUNT_OFFSET: i64 = FLAG_BYTES + VERSION_BYTES;
pub const BLOCK_HEADER_LEN: i64 = 16;

/// State recorded in the journal's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalFlag {
    /// A session is (or was) appending blocks; not safe to replay.
    Journaling,
    /// Fully committed; must be replayed into the main file.
    Ready,
    /// Replayed and drained; nothing to do.
    Cleared,
}

impl JournalFlag {
    pub fn from_byte(byte: u8) -> Option<JournalFlag> {
        match byte {
            FLAG_JOURNALING => Some(JournalFlag::Journaling),
            FLAG_READY => Some(JournalFlag::Ready),
            FLAG_CLEARED => Some(JournalFlag::Cleared),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            JournalFlag::Journaling => FLAG_JOURNALING,
            JournalFlag::Ready => FLAG_READY,
            JournalFlag::Cleared => FLAG_CLEARED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bytes_round_trip() {
        for flag in [
            JournalFlag::Journaling,
            JournalFlag::Ready,
            JournalFlag::Cleared,
        ] {
            assert_eq!(JournalFlag::from_byte(flag.as_byte()), Some(flag));
        }
        assert_eq!(JournalFlag::from_byte(b'X'), None);
    }

    #[test]
    fn header_geometry_is_fixed() {
        assert_eq!(HEADER_LEN, 13);
        assert_eq!(BLOCK_COUNT_OFFSET, 5);
    }
}
