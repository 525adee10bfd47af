//! CSP violation report model, parsing and formatting.
//!
//! - `model` - `RawReport`, `ParsedReport` and the report field table
//! - `convert` - per-field type conversion from JSON values
//! - `parser` - tolerant payload normalization
//! - `format` - deterministic pretty printing of payloads

pub mod convert;
pub mod format;
pub mod model;
pub mod parser;

pub use format::*;
pub use model::*;
pub use parser::*;
