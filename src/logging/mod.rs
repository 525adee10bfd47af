//! Structured logging with request context.
//!
//! Every dispatch-related log line carries the request id and a short digest
//! of the raw payload so a single report can be followed across sinks.

pub mod structured;

pub use structured::*;
