//! Browser extension filtering.
//!
//! Extensions injecting content into a page trigger violations that the site
//! owner can do nothing about. When enabled, reports whose `source-file` is
//! an extension origin are dropped before any sink runs.
//!
//! Unlike the parser this check is strict: a payload that is not UTF-8 JSON
//! object text is an error returned to the caller.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::config::options::Config;
use crate::error::{Error, Result};
use crate::pipeline::context::{decode_body, ReportRequest};
use crate::report::parser::REPORT_KEY;

lazy_static! {
    /// URI schemes browsers use for extension resources.
    static ref EXTENSION_ORIGIN: Regex =
        Regex::new(r"^(?:moz|chrome|safari|safari-web|ms-browser)-extension://").unwrap();
}

const SOURCE_FILE_KEY: &str = "source-file";

/// Whether `uri` points into a browser extension.
pub fn is_browser_extension_uri(uri: &str) -> bool {
    EXTENSION_ORIGIN.is_match(uri)
}

/// Decide whether the request should be dropped without running any sink.
pub fn should_ignore_report(request: &ReportRequest, config: &Config) -> Result<bool> {
    if !config.ignore_browser_extensions() {
        return Ok(false);
    }

    let text = decode_body(request.body.as_bytes(), "utf-8")?;
    let payload: Value = serde_json::from_str(&text)?;
    if !payload.is_object() {
        return Err(Error::NotAnObject);
    }

    let ignored = source_files(&payload).any(is_browser_extension_uri);
    Ok(ignored)
}

/// String `source-file` values at the top level of the payload and inside
/// `csp-report`.
fn source_files(payload: &Value) -> impl Iterator<Item = &str> {
    [
        payload.get(SOURCE_FILE_KEY),
        payload.get(REPORT_KEY).and_then(|r| r.get(SOURCE_FILE_KEY)),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::MapSettings;

    fn ignoring() -> Config {
        Config::new(MapSettings::new().with("CSP_REPORTS_IGNORE_BROWSER_EXTENSIONS", true))
    }

    #[test]
    fn test_extension_schemes() {
        assert!(is_browser_extension_uri("moz-extension://abc/content.js"));
        assert!(is_browser_extension_uri("chrome-extension://abc"));
        assert!(is_browser_extension_uri("safari-web-extension://abc"));
        assert!(!is_browser_extension_uri("https://example.com/moz-extension://"));
        assert!(!is_browser_extension_uri("http://example.com/app.js"));
        assert!(!is_browser_extension_uri(""));
    }

    #[test]
    fn test_disabled_never_ignores_or_decodes() {
        let request = ReportRequest::new("not json");
        assert!(!should_ignore_report(&request, &Config::defaults()).unwrap());
    }

    #[test]
    fn test_top_level_source_file() {
        let request = ReportRequest::new(r#"{"source-file": "moz-extension://abc"}"#);
        assert!(should_ignore_report(&request, &ignoring()).unwrap());
    }

    #[test]
    fn test_nested_source_file() {
        let request = ReportRequest::new(
            r#"{"csp-report": {"source-file": "chrome-extension://abc/inject.js"}}"#,
        );
        assert!(should_ignore_report(&request, &ignoring()).unwrap());

        let request =
            ReportRequest::new(r#"{"csp-report": {"source-file": "https://example.com/a.js"}}"#);
        assert!(!should_ignore_report(&request, &ignoring()).unwrap());
    }

    #[test]
    fn test_missing_or_non_string_source_file() {
        let request = ReportRequest::new(r#"{"csp-report": {}}"#);
        assert!(!should_ignore_report(&request, &ignoring()).unwrap());

        let request = ReportRequest::new(r#"{"source-file": 5}"#);
        assert!(!should_ignore_report(&request, &ignoring()).unwrap());
    }

    #[test]
    fn test_either_location_can_match() {
        let request = ReportRequest::new(
            r#"{"source-file": 5, "csp-report": {"source-file": "moz-extension://abc/x.js"}}"#,
        );
        assert!(should_ignore_report(&request, &ignoring()).unwrap());

        let request = ReportRequest::new(
            r#"{"source-file": "https://example.com/a.js",
                "csp-report": {"source-file": "safari-web-extension://abc"}}"#,
        );
        assert!(should_ignore_report(&request, &ignoring()).unwrap());
    }

    #[test]
    fn test_malformed_payload_is_an_error() {
        let request = ReportRequest::new("not json");
        assert!(matches!(
            should_ignore_report(&request, &ignoring()),
            Err(Error::InvalidJson(_))
        ));

        let request = ReportRequest::new("[1]");
        assert!(matches!(
            should_ignore_report(&request, &ignoring()),
            Err(Error::NotAnObject)
        ));

        let request = ReportRequest::new(vec![0xff, 0xfe]);
        assert!(matches!(
            should_ignore_report(&request, &ignoring()),
            Err(Error::BodyDecode { .. })
        ));
    }
}
