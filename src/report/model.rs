//! Report records.
//!
//! `RawReport` is the payload exactly as the browser sent it. `ParsedReport`
//! is the normalized record derived from it once and handed to storage.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::report::format::{escape_html, format_report, pretty_json};

/// The payload of a report request, kept byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawReport(Vec<u8>);

impl RawReport {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Payload as text. Invalid UTF-8 sequences are replaced, never rejected.
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for RawReport {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for RawReport {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<&[u8]> for RawReport {
    fn from(b: &[u8]) -> Self {
        Self(b.to_vec())
    }
}

impl From<Vec<u8>> for RawReport {
    fn from(b: Vec<u8>) -> Self {
        Self(b)
    }
}

impl Serialize for RawReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for RawReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(RawReport::from)
    }
}

/// Disposition of the violated policy (CSP 3.0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Enforce,
    Report,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Enforce => "enforce",
            Disposition::Report => "report",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "enforce" => Some(Disposition::Enforce),
            "report" => Some(Disposition::Report),
            _ => None,
        }
    }
}

/// Fields of the `csp-report` object understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportField {
    // CSP 1.0
    DocumentUri,
    Referrer,
    BlockedUri,
    ViolatedDirective,
    OriginalPolicy,
    // CSP 2.0 / 3.0
    Disposition,
    EffectiveDirective,
    SourceFile,
    StatusCode,
    LineNumber,
    ColumnNumber,
}

impl ReportField {
    pub const REQUIRED: [ReportField; 5] = [
        ReportField::DocumentUri,
        ReportField::Referrer,
        ReportField::BlockedUri,
        ReportField::ViolatedDirective,
        ReportField::OriginalPolicy,
    ];

    pub const OPTIONAL: [ReportField; 6] = [
        ReportField::Disposition,
        ReportField::EffectiveDirective,
        ReportField::SourceFile,
        ReportField::StatusCode,
        ReportField::LineNumber,
        ReportField::ColumnNumber,
    ];

    /// Required fields first, then optional ones.
    pub fn all() -> impl Iterator<Item = ReportField> {
        Self::REQUIRED.into_iter().chain(Self::OPTIONAL)
    }

    /// Key inside the `csp-report` object.
    pub fn json_key(&self) -> &'static str {
        match self {
            ReportField::DocumentUri => "document-uri",
            ReportField::Referrer => "referrer",
            ReportField::BlockedUri => "blocked-uri",
            ReportField::ViolatedDirective => "violated-directive",
            ReportField::OriginalPolicy => "original-policy",
            ReportField::Disposition => "disposition",
            ReportField::EffectiveDirective => "effective-directive",
            ReportField::SourceFile => "source-file",
            ReportField::StatusCode => "status-code",
            ReportField::LineNumber => "line-number",
            ReportField::ColumnNumber => "column-number",
        }
    }

    /// Identifier-safe name, also used as the storage column.
    pub fn name(&self) -> &'static str {
        match self {
            ReportField::DocumentUri => "document_uri",
            ReportField::Referrer => "referrer",
            ReportField::BlockedUri => "blocked_uri",
            ReportField::ViolatedDirective => "violated_directive",
            ReportField::OriginalPolicy => "original_policy",
            ReportField::Disposition => "disposition",
            ReportField::EffectiveDirective => "effective_directive",
            ReportField::SourceFile => "source_file",
            ReportField::StatusCode => "status_code",
            ReportField::LineNumber => "line_number",
            ReportField::ColumnNumber => "column_number",
        }
    }

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }
}

/// A CSP violation report normalized from its raw payload.
///
/// Every report field is `None` when the payload is not a CSP report, and
/// individually `None` when the value could not be converted. `created` and
/// `modified` are only set once a store has accepted the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedReport {
    #[serde(rename = "json")]
    pub raw: RawReport,
    pub is_valid: bool,
    pub user_agent: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,

    // CSP 1.0
    pub document_uri: Option<String>,
    pub referrer: Option<String>,
    pub blocked_uri: Option<String>,
    pub violated_directive: Option<String>,
    pub original_policy: Option<String>,

    // CSP 2.0
    pub effective_directive: Option<String>,
    pub status_code: Option<u16>,
    pub source_file: Option<String>,
    pub line_number: Option<u64>,
    pub column_number: Option<u64>,

    // CSP 3.0
    pub disposition: Option<Disposition>,
}

impl ParsedReport {
    /// An empty, invalid record holding only the raw payload.
    pub fn unparsed(raw: RawReport) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    /// Whether the given field holds a value.
    pub fn has_field(&self, field: ReportField) -> bool {
        self.field_value(field).is_some()
    }

    /// The value of a field as JSON, `None` when the field is null.
    pub fn field_value(&self, field: ReportField) -> Option<Value> {
        match field {
            ReportField::DocumentUri => self.document_uri.clone().map(Value::from),
            ReportField::Referrer => self.referrer.clone().map(Value::from),
            ReportField::BlockedUri => self.blocked_uri.clone().map(Value::from),
            ReportField::ViolatedDirective => self.violated_directive.clone().map(Value::from),
            ReportField::OriginalPolicy => self.original_policy.clone().map(Value::from),
            ReportField::Disposition => self.disposition.map(|d| Value::from(d.as_str())),
            ReportField::EffectiveDirective => self.effective_directive.clone().map(Value::from),
            ReportField::SourceFile => self.source_file.clone().map(Value::from),
            ReportField::StatusCode => self.status_code.map(Value::from),
            ReportField::LineNumber => self.line_number.map(Value::from),
            ReportField::ColumnNumber => self.column_number.map(Value::from),
        }
    }

    /// Required fields that are null, in declaration order.
    pub fn missing_required_fields(&self) -> Vec<ReportField> {
        ReportField::REQUIRED
            .into_iter()
            .filter(|f| !self.has_field(*f))
            .collect()
    }

    /// Check that every required field is set.
    pub fn validate(&self) -> Result<()> {
        match self.missing_required_fields().first() {
            Some(field) => Err(Error::MissingField(field.name())),
            None => Ok(()),
        }
    }

    /// The raw payload decoded as JSON.
    pub fn data(&self) -> Result<Value> {
        Ok(serde_json::from_slice(self.raw.as_bytes())?)
    }

    /// Human-readable rendering of the report body.
    pub fn nice_report(&self) -> String {
        if self.raw.is_empty() {
            return "[no CSP report data]".to_string();
        }
        let data = match self.data() {
            Ok(data) => data,
            Err(_) => return format!("Invalid CSP report: '{}'", self.raw.to_text()),
        };
        match data.get("csp-report") {
            Some(report) => pretty_json(report),
            None => format!("Invalid CSP report: {}", pretty_json(&data)),
        }
    }

    /// The formatted payload, HTML escaped inside a `<pre>` block.
    pub fn json_as_html(&self) -> String {
        let formatted = format_report(self.raw.as_bytes());
        format!("<pre>\n{}</pre>", escape_html(&formatted))
    }
}

impl fmt::Display for ParsedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.nice_report())
    }
}
