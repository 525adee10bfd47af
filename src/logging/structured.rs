//! Structured logging utilities.
//!
//! Provides context-aware logging with request_id and payload digest
//! included in every log message.

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of hex characters of the payload digest kept in log lines.
const DIGEST_LEN: usize = 12;

/// Logging context for one inbound report.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub request_id: String,
    pub digest: Option<String>,
}

impl LogContext {
    pub fn new(request_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            digest: None,
        }
    }

    /// Attach the digest of the raw payload.
    pub fn with_payload(&self, body: &[u8]) -> Self {
        Self {
            request_id: self.request_id.clone(),
            digest: Some(payload_digest(body)),
        }
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.digest {
            Some(digest) => write!(f, "[request={}] [digest={}]", self.request_id, digest),
            None => write!(f, "[request={}]", self.request_id),
        }
    }
}

/// Short SHA-256 digest of a payload, hex encoded.
pub fn payload_digest(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// Log an info message with context.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::info!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a warning message with context.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::warn!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log an error message with context.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::error!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

/// Log a debug message with context.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $event:expr $(, $key:ident = $value:expr)* $(,)?) => {
        log::debug!(
            "{} {} {}",
            $ctx,
            $event,
            format_args!(concat!($(stringify!($key), "={:?} "),*), $($value),*)
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("req-123");
        assert_eq!(format!("{}", ctx), "[request=req-123]");

        let with_payload = ctx.with_payload(b"{}");
        let rendered = format!("{}", with_payload);
        assert!(rendered.starts_with("[request=req-123] [digest="));
        assert_eq!(with_payload.digest.as_deref().map(str::len), Some(DIGEST_LEN));
    }

    #[test]
    fn test_payload_digest_is_stable() {
        assert_eq!(payload_digest(b"abc"), payload_digest(b"abc"));
        assert_ne!(payload_digest(b"abc"), payload_digest(b"abd"));
        // SHA-256("abc") = ba7816bf8f01cfea...
        assert_eq!(payload_digest(b"abc"), "ba7816bf8f01");
    }

    #[test]
    fn test_macros_accept_any_number_of_fields() {
        let ctx = LogContext::new("req-1");
        crate::log_info!(ctx, "NO_FIELDS");
        crate::log_debug!(ctx, "ONE_FIELD", count = 1);
        crate::log_warn!(ctx, "TWO_FIELDS", count = 2, name = "x");
        crate::log_error!(ctx, "TRAILING_COMMA", count = 3,);
    }
}
