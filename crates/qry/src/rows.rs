//! 📄 Row parsing — delimited scan results in, typed records out.
//!
//! Scan bodies arrive header-less with a fixed column order per query shape.
//! Every shape gets its own parser; every parser is a forgiving one. A
//! malformed line becomes a [`ScanDiagnostic`] (byte offset, field, story)
//! and the parser keeps walking — one mangled row never aborts the scan,
//! let alone its siblings. Newline hunting is memchr's job; it is very good
//! at its job.

use memchr::memchr_iter;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// 🩺 One malformed-row report: where it was, which field flinched, and what
/// the parser has to say for itself. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    /// Byte offset of the offending line within the scan body.
    pub position: u64,
    pub field: String,
    pub description: String,
}

/// 📋 One full log row, the point-lookup shape. Positionally mapped:
/// timestamp, instance, node, level, component, event id, detail.
/// `detail` is the tail of the line, embedded commas and all.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub timestamp: OffsetDateTime,
    pub instance: String,
    pub node: String,
    pub level: String,
    pub component: String,
    pub event_id: String,
    pub detail: String,
}

/// 🧮 What one parser run yields: the rows that made it, and the ones that
/// didn't (with their paperwork).
pub(crate) struct Parsed<T> {
    pub records: Vec<T>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

/// 🔍 Walk `body` line by line, yielding `(byte_offset, line)` with line
/// endings trimmed and empty lines skipped.
fn lines_with_offsets(body: &str) -> Vec<(u64, &str)> {
    let bytes = body.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0usize;
    for newline in memchr_iter(b'\n', bytes) {
        lines.push((start as u64, body[start..newline].trim_end_matches('\r')));
        start = newline + 1;
    }
    if start < bytes.len() {
        lines.push((start as u64, body[start..].trim_end_matches('\r')));
    }
    lines.retain(|(_, line)| !line.is_empty());
    lines
}

fn diagnostic(position: u64, field: &str, description: impl Into<String>) -> ScanDiagnostic {
    ScanDiagnostic { position, field: field.to_string(), description: description.into() }
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|err| format!("'{}' is not an RFC 3339 timestamp: {err}", raw.trim()))
}

/// 🔢 Aggregate-count shape: one integer per line.
pub(crate) fn parse_counts(body: &str) -> Parsed<i64> {
    let mut parsed = Parsed { records: Vec::new(), diagnostics: Vec::new() };
    for (position, line) in lines_with_offsets(body) {
        match line.trim().parse::<i64>() {
            Ok(count) => parsed.records.push(count),
            Err(err) => parsed
                .diagnostics
                .push(diagnostic(position, "Count", format!("'{line}' did not count: {err}"))),
        }
    }
    parsed
}

/// ⏰ Range shape: `min,max` timestamps, one pair per line.
pub(crate) fn parse_spans(body: &str) -> Parsed<(OffsetDateTime, OffsetDateTime)> {
    let mut parsed = Parsed { records: Vec::new(), diagnostics: Vec::new() };
    for (position, line) in lines_with_offsets(body) {
        let Some((raw_min, raw_max)) = line.split_once(',') else {
            parsed.diagnostics.push(diagnostic(
                position,
                "MinTimestamp",
                format!("expected 'min,max', got '{line}'"),
            ));
            continue;
        };
        match (parse_timestamp(raw_min), parse_timestamp(raw_max)) {
            (Ok(min), Ok(max)) => parsed.records.push((min, max)),
            (Err(err), _) => parsed.diagnostics.push(diagnostic(position, "MinTimestamp", err)),
            (_, Err(err)) => parsed.diagnostics.push(diagnostic(position, "MaxTimestamp", err)),
        }
    }
    parsed
}

/// 🗝️ Group-by-max shape: `key,max_timestamp` per line.
pub(crate) fn parse_keyed_maxes(body: &str) -> Parsed<(String, OffsetDateTime)> {
    let mut parsed = Parsed { records: Vec::new(), diagnostics: Vec::new() };
    for (position, line) in lines_with_offsets(body) {
        let Some((key, raw_max)) = line.split_once(',') else {
            parsed.diagnostics.push(diagnostic(
                position,
                "Component",
                format!("expected 'key,timestamp', got '{line}'"),
            ));
            continue;
        };
        match parse_timestamp(raw_max) {
            Ok(max) => parsed.records.push((key.trim().to_string(), max)),
            Err(err) => parsed.diagnostics.push(diagnostic(position, "Timestamp", err)),
        }
    }
    parsed
}

/// 🏷️ Distinct-value shape: one bare value per line. Nothing to mangle, so
/// nothing to diagnose.
pub(crate) fn parse_values(body: &str) -> Parsed<String> {
    Parsed {
        records: lines_with_offsets(body)
            .into_iter()
            .map(|(_, line)| line.trim().to_string())
            .collect(),
        diagnostics: Vec::new(),
    }
}

/// 📋 Full-row shape: seven positional fields, detail swallows the tail.
pub(crate) fn parse_log_rows(body: &str) -> Parsed<LogRow> {
    let mut parsed = Parsed { records: Vec::new(), diagnostics: Vec::new() };
    for (position, line) in lines_with_offsets(body) {
        let fields: Vec<&str> = line.splitn(7, ',').collect();
        if fields.len() != 7 {
            parsed.diagnostics.push(diagnostic(
                position,
                "Detail",
                format!("expected 7 fields, got {}", fields.len()),
            ));
            continue;
        }
        match parse_timestamp(fields[0]) {
            Ok(timestamp) => parsed.records.push(LogRow {
                timestamp,
                instance: fields[1].trim().to_string(),
                node: fields[2].trim().to_string(),
                level: fields[3].trim().to_string(),
                component: fields[4].trim().to_string(),
                event_id: fields[5].trim().to_string(),
                detail: fields[6].to_string(),
            }),
            Err(err) => parsed.diagnostics.push(diagnostic(position, "Timestamp", err)),
        }
    }
    parsed
}
