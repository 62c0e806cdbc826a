//! Follow a growing log file from a background thread and dispatch each complete record to
//! the handler registered for its discriminator.
//!
//! The byte offset of the last processed line is persisted next to the process so a
//! restarted tailer resumes where the previous one stopped.
mod cursor;
mod stats;
mod tailer;

pub use cursor::{CursorError, CursorFile, TailerCursor};
pub use stats::{StatsSnapshot, TailerStats};
pub use tailer::{LogTailer, TailerOptions};
