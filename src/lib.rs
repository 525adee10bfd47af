//! cspreports-core - Content Security Policy violation report handling
//!
//! Browsers POST a JSON document to a policy's `report-uri` whenever a page
//! violates its Content Security Policy. This crate takes such a submission
//! from the HTTP layer, normalizes it against the CSP 1.0/2.0/3.0 report
//! fields and hands it to the configured sinks. The implementation
//! prioritizes:
//!
//! 1. **Tolerance** - Browser payloads are untrusted; parsing and formatting
//!    never fail, invalid reports are kept and flagged
//! 2. **Logging** - Every dispatch step logged with request context
//! 3. **Live configuration** - Options are re-read on every access
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `report` - Report model, tolerant parser and formatter
//! - `config` - Named options, defaults and settings stores
//! - `pipeline` - Request context, ignore check, handlers and dispatcher
//! - `sinks` - Mail and log sink traits with bundled implementations
//! - `storage` - Persistence trait, in-memory store and filters
//! - `logging` - Structured logging with request context
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use cspreports_core::{Config, Dispatcher, MapSettings, Outbox, ReportRequest};
//!
//! let outbox = Arc::new(Outbox::new());
//! let settings = MapSettings::new().with("CSP_REPORTS_LOG", false);
//! let dispatcher = Dispatcher::builder(Config::new(settings))
//!     .mailer(outbox.clone())
//!     .build();
//!
//! let request = ReportRequest::new(r#"{"csp-report": {"document-uri": "https://example.com/"}}"#)
//!     .with_user_agent("Mozilla/5.0");
//! let summary = dispatcher.process(&request).unwrap();
//!
//! assert_eq!(outbox.len(), 1);
//! assert!(!summary.stored.unwrap().report.is_valid);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod sinks;
pub mod storage;

pub use config::{Config, ConfigOption, FigmentSettings, MapSettings, SettingsStore};
pub use error::{Error, Result};
pub use pipeline::{
    should_ignore_report, DispatchSummary, Dispatcher, DispatcherBuilder, HandlerRegistry,
    ReportHandler, ReportRequest, Sink, SinkFailure,
};
pub use report::{format_report, parse, Disposition, ParsedReport, RawReport, ReportField};
pub use sinks::{LogCrateSink, LogMailer, LogSink, MailSink, Outbox};
pub use storage::{MemoryStore, ReportFilter, ReportStore, StoredReport};

/// Initialize the process-wide logger.
///
/// Safe to call repeatedly; only the first call installs `env_logger`.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
