//! Report formatting.
//!
//! Payloads come straight from browsers, so formatting must accept anything:
//! well-formed JSON is re-rendered with sorted keys and four-space indents,
//! everything else is dumped verbatim behind a fixed header.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};

/// Header placed before payloads that are not valid JSON.
pub const INVALID_JSON_SENTINEL: &str = "Invalid JSON. Raw dump is below.";

const INDENT: &[u8] = b"    ";

/// Render a payload for humans.
pub fn format_report(raw: impl AsRef<[u8]>) -> String {
    let text = String::from_utf8_lossy(raw.as_ref());
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => pretty_json(&value),
        Err(_) => format!("{}\n\n{}", INVALID_JSON_SENTINEL, text),
    }
}

/// Render a JSON value with sorted keys and four-space indentation.
pub fn pretty_json(value: &Value) -> String {
    let sorted = sort_keys(value);
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    match sorted.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| sorted.to_string()),
        Err(_) => sorted.to_string(),
    }
}

/// Copy of `value` with every object's keys in lexicographic order.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Minimal HTML escaping for text placed inside element content or
/// attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sorts_and_indents() {
        let formatted = format_report(r#"{"z": 1, "a": {"y": [1, 2], "b": null}}"#);
        assert_eq!(
            formatted,
            "{\n    \"a\": {\n        \"b\": null,\n        \"y\": [\n            1,\n            2\n        ]\n    },\n    \"z\": 1\n}"
        );
    }

    #[test]
    fn test_format_empty_containers() {
        assert_eq!(format_report("{}"), "{}");
        assert_eq!(format_report(r#"{"a": []}"#), "{\n    \"a\": []\n}");
    }

    #[test]
    fn test_format_invalid_json_keeps_raw_text() {
        let raw = "{\"csp-report\": ";
        let formatted = format_report(raw);
        assert_eq!(
            formatted,
            "Invalid JSON. Raw dump is below.\n\n{\"csp-report\": "
        );
    }

    #[test]
    fn test_format_accepts_bytes() {
        assert_eq!(format_report(b"[1]".as_slice()), "[\n    1\n]");
        let formatted = format_report(vec![0xff, b'x']);
        assert!(formatted.starts_with(INVALID_JSON_SENTINEL));
        assert!(formatted.ends_with("\u{fffd}x"));
    }

    #[test]
    fn test_format_is_idempotent() {
        let once = format_report(r#"{"b": [true, {"d": 1.5, "c": "x"}], "a": "é"}"#);
        assert_eq!(format_report(&once), once);
    }

    #[test]
    fn test_format_float_digits_are_stable() {
        let once = format_report(r#"[{"": -9.93960030028481e+40}]"#);
        assert_eq!(format_report(&once), once);
        let once = format_report("[-9.93960030028481e+40]");
        assert_eq!(format_report(&once), once);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }
}
