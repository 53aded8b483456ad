pub mod correlate;
pub mod format;
