//! Canonical text rendering of a segment list.
//!
//! Contributions are concatenated in order with no separator. Rendering
//! never fails: a segment that lacks what its kind needs contributes an
//! empty string or the best text that can be dug out of its payload.

use serde_json::Value;
use tracing::debug;

use super::segment::{MessageSegment, scalar_to_string};

/// Render a segment list as one canonical string.
pub fn normalize(segments: &[MessageSegment]) -> String {
    segments.iter().map(contribution).collect()
}

/// Same as [`normalize`], treating an absent list as empty.
pub fn normalize_opt(segments: Option<&[MessageSegment]>) -> String {
    segments.map(normalize).unwrap_or_default()
}

fn contribution(segment: &MessageSegment) -> String {
    match segment {
        MessageSegment::Text { text } => text.clone(),
        MessageSegment::Mention { target } if target == "all" => "[AT:all]".to_string(),
        MessageSegment::Mention { target } => format!("[AT:{target}]"),
        MessageSegment::Face { id: Some(id) } => format!("[FACE:{id}]"),
        MessageSegment::Image { url: Some(url) } => format!("[IMG:{url}]"),
        MessageSegment::Face { id: None } => {
            debug!("face segment without id");
            String::new()
        }
        MessageSegment::Image { url: None } => {
            debug!("image segment without url");
            String::new()
        }
        MessageSegment::Unknown { raw } => fallback_text(raw),
    }
}

/// Best-effort text for an unmodelled payload: a `content` field, then a
/// `data` field, then the payload's own string form.
fn fallback_text(raw: &Value) -> String {
    let data = raw.get("data");

    let content = raw
        .get("content")
        .or_else(|| data.and_then(|d| d.get("content")))
        .and_then(scalar_to_string);
    if let Some(text) = content {
        return text;
    }

    let data_text = data
        .and_then(|d| d.get("data"))
        .and_then(scalar_to_string)
        .or_else(|| data.and_then(scalar_to_string));
    if let Some(text) = data_text {
        return text;
    }

    debug!(payload = %raw, "segment has no recognizable text field");
    match raw {
        Value::Null => String::new(),
        other => scalar_to_string(other).unwrap_or_else(|| other.to_string()),
    }
}
