//! Structured log records emitted by the debugger server, and the parser that folds them
//! into [`state::DebugState`].
mod format;
mod parser;
mod paths;
mod pending_requests;
mod record;

pub use format::format_duration;
pub use parser::EventParser;
pub use paths::normalise_path;
pub use record::{EventKind, FieldExt, LogRecord, RecordError};
