//! Dispatch pipeline.
//!
//! Takes an inbound report request through:
//! - Browser extension filtering
//! - Administrator email
//! - Log stream
//! - Persistence
//! - Custom handlers

pub mod context;
pub mod dispatch;
pub mod handlers;
pub mod ignore;

pub use context::*;
pub use dispatch::*;
pub use handlers::*;
pub use ignore::*;
