//! Core data models used throughout the pipeline.
//!
//! These types describe where a conversation came from ([`SourceLabel`]),
//! what the extraction service returned ([`ExtractionBatch`]), and the
//! individual knowledge items inside a batch ([`ExtractedItem`]).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Origin tag of a conversation export.
///
/// Labels are matched case-sensitively against the canonical lowercase
/// names; anything else is carried verbatim as [`SourceLabel::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceLabel {
    Claude,
    ChatGpt,
    Gemini,
    /// A file whose origin could not be determined.
    Unknown,
    Other(String),
}

impl SourceLabel {
    pub fn as_str(&self) -> &str {
        match self {
            SourceLabel::Claude => "claude",
            SourceLabel::ChatGpt => "chatgpt",
            SourceLabel::Gemini => "gemini",
            SourceLabel::Unknown => "unknown",
            SourceLabel::Other(s) => s,
        }
    }
}

impl From<String> for SourceLabel {
    fn from(s: String) -> Self {
        match s.as_str() {
            "claude" => SourceLabel::Claude,
            "chatgpt" => SourceLabel::ChatGpt,
            "gemini" => SourceLabel::Gemini,
            "unknown" => SourceLabel::Unknown,
            _ => SourceLabel::Other(s),
        }
    }
}

impl From<&str> for SourceLabel {
    fn from(s: &str) -> Self {
        SourceLabel::from(s.to_string())
    }
}

impl From<SourceLabel> for String {
    fn from(label: SourceLabel) -> Self {
        label.as_str().to_string()
    }
}

impl fmt::Display for SourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of knowledge item. The four built-in kinds are what the prompt asks
/// for; the service may invent others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    Theme,
    Decision,
    Action,
    Insight,
    Other(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Theme => "theme",
            ItemType::Decision => "decision",
            ItemType::Action => "action",
            ItemType::Insight => "insight",
            ItemType::Other(s) => s,
        }
    }

    /// Plural, title-cased heading used in batch summaries (`theme` → `Themes`).
    pub fn heading(&self) -> String {
        let mut out = String::with_capacity(self.as_str().len() + 1);
        let mut at_word_start = true;
        for c in self.as_str().chars() {
            if c.is_alphabetic() {
                if at_word_start {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
                at_word_start = false;
            } else {
                out.push(c);
                at_word_start = true;
            }
        }
        out.push('s');
        out
    }
}

impl From<String> for ItemType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "theme" => ItemType::Theme,
            "decision" => ItemType::Decision,
            "action" => ItemType::Action,
            "insight" => ItemType::Insight,
            _ => ItemType::Other(s),
        }
    }
}

impl From<ItemType> for String {
    fn from(t: ItemType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered confidence scale. [`Confidence::Medium`] is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Case-insensitive parse; `None` for anything outside the scale.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Confidence::Low),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// One knowledge item returned by the extraction service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractedItem {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub title: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key_quote: Option<String>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub related_themes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub confidence: Option<String>,
}

/// Any non-string value (including `null`) reads as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// String entries of an array; a lone string is a one-entry list and
/// anything else is empty.
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

impl ExtractedItem {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Confidence label, falling back to the middle of the scale.
    pub fn confidence(&self) -> Confidence {
        self.confidence
            .as_deref()
            .and_then(Confidence::parse)
            .unwrap_or_default()
    }
}

/// Parsed response of one extraction call.
///
/// The service's output shape may evolve, so the batch keeps the whole JSON
/// object and exposes typed accessors over it; unknown members survive
/// untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionBatch {
    raw: Map<String, Value>,
}

impl ExtractionBatch {
    pub fn from_map(raw: Map<String, Value>) -> Self {
        Self { raw }
    }

    /// Raw item values, in the order the service listed them.
    pub fn items(&self) -> &[Value] {
        match self.raw.get("items") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn conversation_summary(&self) -> Option<&str> {
        self.raw.get("conversation_summary").and_then(Value::as_str)
    }

    /// String entries of `primary_themes`; anything else is ignored.
    pub fn primary_themes(&self) -> Vec<&str> {
        match self.raw.get("primary_themes") {
            Some(Value::Array(themes)) => themes.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Terminal error descriptor, when the service reported one.
    pub fn error(&self) -> Option<String> {
        match self.raw.get("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_label_round_trip_is_case_sensitive() {
        assert_eq!(SourceLabel::from("chatgpt"), SourceLabel::ChatGpt);
        assert_eq!(
            SourceLabel::from("ChatGPT"),
            SourceLabel::Other("ChatGPT".to_string())
        );
        assert_eq!(SourceLabel::Gemini.to_string(), "gemini");
    }

    #[test]
    fn test_item_type_heading() {
        assert_eq!(ItemType::Theme.heading(), "Themes");
        assert_eq!(ItemType::Insight.heading(), "Insights");
        assert_eq!(
            ItemType::from("open question".to_string()).heading(),
            "Open Questions"
        );
    }

    #[test]
    fn test_confidence_defaults_to_medium() {
        let item = ExtractedItem::from_value(&json!({
            "type": "theme", "title": "T", "content": "C"
        }))
        .unwrap();
        assert_eq!(item.confidence(), Confidence::Medium);
        assert!(item.related_themes.is_empty());
        assert!(item.key_quote.is_none());
    }

    #[test]
    fn test_confidence_parse_is_lenient_about_case() {
        assert_eq!(Confidence::parse("HIGH"), Some(Confidence::High));
        assert_eq!(Confidence::parse("very high"), None);
        assert!(Confidence::Low < Confidence::Medium);
    }

    #[test]
    fn test_optional_fields_tolerate_null_and_wrong_types() {
        let item = ExtractedItem::from_value(&json!({
            "type": "theme", "title": "T", "content": "C",
            "related_themes": null, "key_quote": null, "confidence": null
        }))
        .unwrap();
        assert!(item.related_themes.is_empty());
        assert!(item.key_quote.is_none());
        assert_eq!(item.confidence(), Confidence::Medium);

        let item = ExtractedItem::from_value(&json!({
            "type": "theme", "title": "T", "content": "C",
            "related_themes": ["[[A]]", 3, null, ["[[B]]"], "[[C]]"],
            "key_quote": {"text": "q"}, "confidence": 0.9
        }))
        .unwrap();
        assert_eq!(item.related_themes, vec!["[[A]]", "[[C]]"]);
        assert!(item.key_quote.is_none());
        assert!(item.confidence.is_none());

        let item = ExtractedItem::from_value(&json!({
            "type": "theme", "title": "T", "content": "C",
            "related_themes": "[[Solo]]"
        }))
        .unwrap();
        assert_eq!(item.related_themes, vec!["[[Solo]]"]);
    }

    #[test]
    fn test_item_missing_title_fails() {
        assert!(ExtractedItem::from_value(&json!({"type": "theme", "content": "C"})).is_err());
    }

    #[test]
    fn test_batch_preserves_extra_fields() {
        let value = json!({
            "items": [],
            "conversation_summary": "s",
            "extra_field": "extra_value",
            "metadata": {"key": "value"}
        });
        let batch = ExtractionBatch::from_map(value.as_object().unwrap().clone());
        assert_eq!(batch.get("extra_field"), Some(&json!("extra_value")));
        assert_eq!(batch.get("metadata"), Some(&json!({"key": "value"})));
        assert!(batch.error().is_none());
    }

    #[test]
    fn test_batch_accessors_tolerate_missing_members() {
        let batch = ExtractionBatch::default();
        assert!(batch.items().is_empty());
        assert!(batch.conversation_summary().is_none());
        assert!(batch.primary_themes().is_empty());
    }
}
