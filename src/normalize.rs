//! Conversation normalization and date-of-origin inference.
//!
//! Every export, whatever its source, is reduced to one canonical UTF-8
//! string before extraction. Structured transcripts (the ChatGPT JSON
//! export) become `ROLE: text` paragraphs; copy/pasted text is only
//! trimmed. Normalization never fails: input that does not parse as the
//! expected structure degrades to plain-text handling.

use chrono::{DateTime, Local, NaiveDate};
use serde_json::Value;
use std::path::Path;

use crate::models::SourceLabel;

/// Per-source conversion strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Copy/paste text: trim, CRLF → LF.
    PlainText,
    /// JSON transcript with a node mapping; plain text when it is not JSON.
    Transcript,
    /// Trim only.
    Passthrough,
}

impl Normalizer {
    pub fn for_source(source: &SourceLabel) -> Self {
        match source {
            SourceLabel::Claude => Normalizer::PlainText,
            SourceLabel::ChatGpt => Normalizer::Transcript,
            SourceLabel::Gemini | SourceLabel::Unknown | SourceLabel::Other(_) => {
                Normalizer::Passthrough
            }
        }
    }

    pub fn normalize(&self, raw: &str) -> String {
        match self {
            Normalizer::PlainText => raw.trim().replace("\r\n", "\n"),
            Normalizer::Transcript => normalize_transcript(raw),
            Normalizer::Passthrough => raw.trim().to_string(),
        }
    }
}

/// Normalizes `raw` with the strategy registered for `source`.
pub fn normalize_conversation(raw: &str, source: &SourceLabel) -> String {
    Normalizer::for_source(source).normalize(raw)
}

fn normalize_transcript(raw: &str) -> String {
    let doc: Value = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(_) => return raw.trim().to_string(),
    };

    let messages = transcript_messages(&doc);
    if messages.is_empty() {
        // Nothing recognisable: hand the model the export as-is.
        return raw.to_string();
    }
    messages.join("\n\n")
}

/// `ROLE: text` lines for every node of `doc["mapping"]` that carries a
/// message with at least one string fragment, in mapping order.
fn transcript_messages(doc: &Value) -> Vec<String> {
    let Some(mapping) = doc.get("mapping").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    for node in mapping.values() {
        let Some(message) = node.get("message").filter(|m| is_present(m)) else {
            continue;
        };

        let role = message
            .get("author")
            .and_then(|a| a.get("role"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let Some(parts) = message
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(Value::as_array)
        else {
            continue;
        };

        let text: Vec<&str> = parts.iter().filter_map(Value::as_str).collect();
        if text.is_empty() {
            continue;
        }
        messages.push(format!("{}: {}", role.to_uppercase(), text.join(" ")));
    }
    messages
}

/// Null, `false`, and empty containers/strings do not count as a message.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

/// Date of origin for a conversation file, as `YYYY-MM-DD`.
///
/// Tried in order: a `YYYY-MM-DD-…` filename prefix that is a real calendar
/// date, the file's modification time, today.
pub fn infer_source_date(path: &Path) -> String {
    date_from_filename(path)
        .or_else(|| modified_date(path))
        .unwrap_or_else(|| Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string()
}

/// Parses the first three hyphen-separated segments of the file stem.
pub fn date_from_filename(path: &Path) -> Option<NaiveDate> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);

    let well_formed = [(year, 4), (month, 2), (day, 2)]
        .iter()
        .all(|(s, len)| s.len() == *len && s.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return None;
    }

    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn modified_date(path: &Path) -> Option<NaiveDate> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Local>::from(modified).date_naive())
}
