//! SPC snapshot model and file parser.
pub mod parser;
pub mod snapshot;

pub use snapshot::{DSP_LEN, RAM_LEN, Snapshot};
