//! Log stream sink.

use std::sync::Arc;

use log::Level;

use crate::error::{Error, Result};

/// Receives formatted reports for the log stream.
pub trait LogSink: Send + Sync {
    /// Write `message` at `level` under the logger named `logger`.
    fn write(&self, logger: &str, level: Level, message: &str) -> anyhow::Result<()>;
}

impl<L: LogSink + ?Sized> LogSink for Arc<L> {
    fn write(&self, logger: &str, level: Level, message: &str) -> anyhow::Result<()> {
        (**self).write(logger, level, message)
    }
}

/// Writes through the `log` facade, using the logger name as the target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCrateSink;

impl LogSink for LogCrateSink {
    fn write(&self, logger: &str, level: Level, message: &str) -> anyhow::Result<()> {
        log::log!(target: logger, level, "{}", message);
        Ok(())
    }
}

/// Interpret a configured level name.
///
/// Accepts the conventional names, case-insensitively. `critical`, `fatal`
/// and `exception` have no `log` counterpart and map to `Error`.
pub fn parse_level(name: &str) -> Result<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "debug" => Ok(Level::Debug),
        "info" => Ok(Level::Info),
        "warning" | "warn" => Ok(Level::Warn),
        "error" | "critical" | "fatal" | "exception" => Ok(Level::Error),
        _ => Err(Error::InvalidLogLevel(name.to_string())),
    }
}
