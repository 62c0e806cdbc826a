//! Bounded, marked views of source files for the code panel
mod cache;
mod decode;
mod window;

pub use cache::FileCache;
pub use decode::{SourceEncoding, decode};
pub use window::{
    BREAKPOINT_MARKER, CURRENT_LINE_MARKER, CodeWindow, DEFAULT_EDGE_MARGIN, DEFAULT_WINDOW_SIZE,
    DisplayLine, WindowView,
};
