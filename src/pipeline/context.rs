//! Inbound report request.
//!
//! The HTTP layer captures the body, the user agent and the declared charset
//! and hands them over as a `ReportRequest`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::logging::structured::LogContext;
use crate::report::model::RawReport;

/// Charset assumed when the request does not declare one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// A report submission as received from a browser.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub request_id: String,
    pub received_at: DateTime<Utc>,
    pub body: RawReport,
    pub user_agent: Option<String>,
    pub encoding: Option<String>,
}

impl ReportRequest {
    pub fn new(body: impl Into<RawReport>) -> Self {
        let request_id = format!("req-{}", &Uuid::new_v4().simple().to_string()[..8]);
        Self {
            request_id,
            received_at: Utc::now(),
            body: body.into(),
            user_agent: None,
            encoding: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }

    pub fn with_encoding(mut self, encoding: &str) -> Self {
        self.encoding = Some(encoding.to_string());
        self
    }

    /// The user agent header, empty when the browser sent none.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or("")
    }

    /// The body decoded with the declared charset.
    pub fn decoded_body(&self) -> Result<String> {
        decode_body(
            self.body.as_bytes(),
            self.encoding.as_deref().unwrap_or(DEFAULT_CHARSET),
        )
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.request_id).with_payload(self.body.as_bytes())
    }
}

/// Decode `bytes` with the named charset.
///
/// Only the charsets browsers use for report submissions are supported.
pub fn decode_body(bytes: &[u8], encoding: &str) -> Result<String> {
    let label = encoding.trim().to_ascii_lowercase();
    match label.as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes.to_vec()).map_err(|e| Error::BodyDecode {
            encoding: label.clone(),
            reason: e.to_string(),
        }),
        "iso-8859-1" | "latin-1" | "latin1" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        "us-ascii" | "ascii" => match bytes.iter().position(|b| !b.is_ascii()) {
            Some(pos) => Err(Error::BodyDecode {
                encoding: label.clone(),
                reason: format!("non-ASCII byte at offset {}", pos),
            }),
            None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        },
        _ => Err(Error::UnsupportedEncoding(encoding.to_string())),
    }
}
