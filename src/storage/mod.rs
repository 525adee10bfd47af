//! Storage module.
//!
//! The persistence sink's trait and an in-memory implementation, plus
//! filters and date helpers for querying and cleaning stored reports.

pub mod dates;
pub mod models;
pub mod store;

pub use dates::*;
pub use models::*;
pub use store::*;
