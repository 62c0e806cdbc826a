mod error;

pub use error::ErrorPanel;
