//! Scalar leaves and field sanitization

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A leaf value of unknown JSON type.
///
/// Decoding never fails: strings, numbers, booleans, nulls and lists of
/// scalars are all accepted and rendered to a tabular string on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scalar(Value);

impl Scalar {
    pub fn new(v: impl Into<Value>) -> Self {
        Self(v.into())
    }

    /// Sanitized tabular rendition; `""` for missing values.
    pub fn render(&self) -> String {
        render_value(&self.0)
    }

    /// Sanitized text, `None` when the result would be empty.
    pub fn text(&self) -> Option<String> {
        Some(self.render()).filter(|s| !s.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.render().is_empty()
    }

    /// Truthiness for flag fields (`true`, non-zero numbers, `"true"`, `"1"`).
    pub fn is_truthy(&self) -> bool {
        match &self.0 {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            _ => false,
        }
    }

    /// Epoch milliseconds as ISO-8601 UTC with milliseconds; non-numeric
    /// values pass through sanitized.
    pub fn render_epoch_millis(&self) -> String {
        match &self.0 {
            Value::Number(n) => {
                let millis = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.round() as i64));
                millis
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3f+00:00").to_string())
                    .unwrap_or_else(|| n.to_string())
            }
            other => render_value(other),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Value::deserialize(d).map(Scalar)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar(Value::String(s.to_string()))
    }
}

/// Clean a string for a single CSV field: `NULL` and blank become empty,
/// CR/LF are removed, surrounding whitespace trimmed. Never truncates.
pub fn sanitize(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed == "NULL" {
        return String::new();
    }
    if trimmed.contains(['\r', '\n']) {
        trimmed.replace(['\r', '\n'], "").trim().to_string()
    } else {
        trimmed.to_string()
    }
}

fn render_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => sanitize(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => sanitize(&v.to_string()),
    }
}
