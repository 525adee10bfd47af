//! Report normalization.
//!
//! Turns a raw payload into a `ParsedReport`. Browser payloads are untrusted
//! and frequently incomplete, so parsing never fails: malformed input yields
//! an invalid record that still carries the raw bytes and every field that
//! could be converted.

use serde_json::{Map, Value};

use crate::logging::structured::LogContext;
use crate::report::convert::{to_disposition, to_text, to_unsigned, ConversionError};
use crate::report::model::{ParsedReport, RawReport, ReportField};

/// Key of the report object inside the payload.
pub const REPORT_KEY: &str = "csp-report";

/// Parse a raw payload.
pub fn parse(raw: impl Into<RawReport>) -> ParsedReport {
    parse_with_context(raw, &LogContext::new("unknown"))
}

/// Parse a raw payload, logging rejected fields against `ctx`.
pub fn parse_with_context(raw: impl Into<RawReport>, ctx: &LogContext) -> ParsedReport {
    let mut report = ParsedReport::unparsed(raw.into());

    let decoded: Value = match serde_json::from_slice(report.raw.as_bytes()) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("{} REPORT_NOT_JSON error={}", ctx, e);
            return report;
        }
    };

    let fields = match decoded.get(REPORT_KEY).and_then(Value::as_object) {
        Some(obj) => obj,
        None => {
            log::debug!("{} REPORT_KEY_MISSING key={}", ctx, REPORT_KEY);
            return report;
        }
    };

    for field in ReportField::all() {
        if let Err(e) = apply_field(&mut report, field, fields) {
            log::debug!(
                "{} FIELD_REJECTED field={} required={} reason={}",
                ctx,
                field.json_key(),
                field.is_required(),
                e
            );
        }
    }

    let missing = report.missing_required_fields();
    report.is_valid = missing.is_empty();
    if !report.is_valid {
        log::debug!(
            "{} REPORT_INCOMPLETE missing={:?}",
            ctx,
            missing.iter().map(|f| f.json_key()).collect::<Vec<_>>()
        );
    }

    report
}

/// Convert one key of the report object into its field.
///
/// On error the field keeps its `None` value.
fn apply_field(
    report: &mut ParsedReport,
    field: ReportField,
    fields: &Map<String, Value>,
) -> Result<(), ConversionError> {
    let value = fields.get(field.json_key());
    match field {
        ReportField::DocumentUri => report.document_uri = to_text(value)?,
        ReportField::Referrer => report.referrer = to_text(value)?,
        ReportField::BlockedUri => report.blocked_uri = to_text(value)?,
        ReportField::ViolatedDirective => report.violated_directive = to_text(value)?,
        ReportField::OriginalPolicy => report.original_policy = to_text(value)?,
        ReportField::Disposition => report.disposition = to_disposition(value)?,
        ReportField::EffectiveDirective => report.effective_directive = to_text(value)?,
        ReportField::SourceFile => report.source_file = to_text(value)?,
        ReportField::StatusCode => report.status_code = to_unsigned(value)?,
        ReportField::LineNumber => report.line_number = to_unsigned(value)?,
        ReportField::ColumnNumber => report.column_number = to_unsigned(value)?,
    }
    Ok(())
}

impl ParsedReport {
    /// Build a report from a raw message. Same as [`parse`].
    pub fn from_message(raw: impl Into<RawReport>) -> Self {
        parse(raw)
    }
}
