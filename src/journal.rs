//! Journal file format, block assembly, and the replay routine.

pub mod builder;
pub mod format;
pub mod replay;

pub use builder::JournalBuilder;
pub use format::{JournalFlag, JOURNAL_VERSION};
pub use replay::{replay, ReplayOutcome};
