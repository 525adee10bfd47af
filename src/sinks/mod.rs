//! Dispatch targets for reports.
//!
//! The traits here are the seams to the surrounding application: mail
//! transport and log shipping are provided by the embedder. The bundled
//! implementations write through the `log` facade or keep messages in
//! memory.

pub mod log_sink;
pub mod mail;

pub use log_sink::*;
pub use mail::*;
