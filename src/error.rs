//! Crate-wide error type.

use thiserror::Error;

use crate::pipeline::dispatch::Sink;

/// Result type alias for report processing.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while dispatching or storing a report.
///
/// Parsing and formatting never fail; everything here comes from the strict
/// paths (ignore check, body decoding) or from a collaborator.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Report body is not valid {encoding}: {reason}")]
    BodyDecode { encoding: String, reason: String },

    #[error("Unsupported request encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Report payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Report payload is not a JSON object")]
    NotAnObject,

    #[error("Required report field is missing: {0}")]
    MissingField(&'static str),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid handler path {0:?}: expected a dotted name such as \"module.handler\"")]
    InvalidHandlerPath(String),

    #[error("No handler registered under {0:?}")]
    UnknownHandler(String),

    #[error("Invalid date input {0:?}")]
    InvalidDate(String),

    #[error("Failed to load settings: {0}")]
    Settings(#[from] figment::Error),

    #[error("Settings document must be a JSON object")]
    SettingsNotAnObject,

    #[error("{sink} sink failed: {source}")]
    Sink {
        sink: Sink,
        #[source]
        source: anyhow::Error,
    },

    #[error("Handler {name:?} failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Wrap a collaborator failure for the given sink.
    pub fn sink(sink: Sink, source: impl Into<anyhow::Error>) -> Self {
        Error::Sink {
            sink,
            source: source.into(),
        }
    }
}
