//! YAML frontmatter blocks for generated notes.
//!
//! Fields are collected in insertion order and serialized with
//! `serde_yaml`, so model-written titles that look like numbers, booleans
//! or YAML syntax are quoted and read back as the same strings.

use serde_json::{Map, Value};

/// Ordered `key: value` pairs rendered between `---` fences.
#[derive(Debug, Clone, Default)]
pub struct Frontmatter {
    fields: Map<String, Value>,
}

impl Frontmatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn str(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    pub fn int(mut self, key: &str, value: i64) -> Self {
        self.fields.insert(key.to_string(), Value::from(value));
        self
    }

    pub fn list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.fields.insert(key.to_string(), Value::Array(values));
        self
    }

    /// Renders the block, starting with `---\n` and ending with `---`.
    pub fn render(&self) -> Result<String, serde_yaml::Error> {
        if self.fields.is_empty() {
            return Ok("---\n---".to_string());
        }
        let yaml = serde_yaml::to_string(&self.fields)?;
        Ok(format!("---\n{}---", yaml))
    }
}
