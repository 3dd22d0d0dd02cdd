//! Message segment model and OneBot v11 payload mapping.
//!
//! OneBot delivers a message as an ordered array of `{type, data}` objects.
//! Only the kinds the bridge reasons about get their own variant; every
//! other shape is kept verbatim in [`MessageSegment::Unknown`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One atomic unit of a chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageSegment {
    Text { text: String },
    /// `target` is a numeric account id or the sentinel `"all"`.
    Mention { target: String },
    Face { id: Option<String> },
    Image { url: Option<String> },
    /// Payload shape not modelled above, or a known kind missing its
    /// primary field.
    Unknown { raw: Value },
}

impl MessageSegment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn mention(target: impl ToString) -> Self {
        Self::Mention {
            target: target.to_string(),
        }
    }

    pub fn mention_all() -> Self {
        Self::mention("all")
    }

    pub fn face(id: impl ToString) -> Self {
        Self::Face {
            id: Some(id.to_string()),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::Image {
            url: Some(url.into()),
        }
    }

    pub fn unknown(raw: Value) -> Self {
        Self::Unknown { raw }
    }

    /// Map a single OneBot v11 segment object.
    pub fn from_onebot(value: &Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        let data = value.get("data");
        let field = |name: &str| data.and_then(|d| d.get(name)).and_then(scalar_to_string);

        match kind {
            "text" => match field("text") {
                Some(text) => Self::Text { text },
                None => Self::unknown(value.clone()),
            },
            "at" => match field("qq") {
                Some(target) => Self::Mention { target },
                None => Self::unknown(value.clone()),
            },
            "face" => Self::Face { id: field("id") },
            "image" => Self::Image { url: field("url") },
            _ => Self::unknown(value.clone()),
        }
    }

    /// Map a OneBot `message` field, which is either a segment array or a
    /// plain string.
    pub fn list_from_onebot(message: &Value) -> Vec<Self> {
        match message {
            Value::Array(items) => items.iter().map(Self::from_onebot).collect(),
            Value::String(text) => vec![Self::text(text.clone())],
            Value::Null => Vec::new(),
            other => vec![Self::unknown(other.clone())],
        }
    }
}

/// String form of a JSON scalar. Objects, arrays and null yield `None`.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
