//! Tolerant decoding of model output into roadmap steps.
//!
//! Models wrap JSON in code fences, add prose around it, and drift from
//! the requested shape. Everything here degrades to an empty roadmap
//! instead of failing.

use serde_json::{Map, Value};
use studyhive_schema::{ConceptDetail, Description, DescriptionItem, ResourceLink, RoadmapStep};

use crate::error::RoadmapParseError;

/// Decode raw model text into roadmap steps. Returns an empty roadmap on
/// any malformed input.
pub fn parse_roadmap(raw: &str) -> Vec<RoadmapStep> {
    match try_parse_roadmap(raw) {
        Ok(steps) => steps,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unparseable roadmap output");
            Vec::new()
        }
    }
}

pub fn try_parse_roadmap(raw: &str) -> Result<Vec<RoadmapStep>, RoadmapParseError> {
    let value = extract_array(raw)?;
    let Value::Array(steps) = value else {
        return Err(RoadmapParseError::NotAnArray);
    };
    Ok(steps.iter().map(normalize_step).collect())
}

/// Remove a surrounding markdown code fence, including its language tag.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match after_open.find('\n') {
        Some(idx) => &after_open[idx + 1..],
        None => after_open,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn extract_array(raw: &str) -> Result<Value, RoadmapParseError> {
    let body = strip_code_fence(raw);
    match serde_json::from_str::<Value>(body) {
        Ok(value @ Value::Array(_)) => return Ok(value),
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "roadmap body is not plain JSON, scanning for array"),
    }

    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(RoadmapParseError::NoArray);
    };
    if end < start {
        return Err(RoadmapParseError::NoArray);
    }
    let value: Value = serde_json::from_str(&raw[start..=end])?;
    if !value.is_array() {
        return Err(RoadmapParseError::NotAnArray);
    }
    Ok(value)
}

/// Every array element becomes a step. Non-objects become an untitled
/// step with no descriptions.
fn normalize_step(value: &Value) -> RoadmapStep {
    let Value::Object(obj) = value else {
        tracing::debug!("roadmap step is not an object, keeping it empty");
        return RoadmapStep::default();
    };

    let descriptions = match obj.get("descriptions") {
        Some(Value::String(text)) => Description::Text(text.clone()),
        Some(Value::Array(items)) => {
            Description::Items(items.iter().filter_map(normalize_item).collect())
        }
        Some(item @ Value::Object(_)) => {
            Description::Items(normalize_item(item).into_iter().collect())
        }
        _ => Description::Items(Vec::new()),
    };

    RoadmapStep {
        title: text_field(obj, "title"),
        descriptions,
    }
}

fn normalize_item(value: &Value) -> Option<DescriptionItem> {
    let Value::Object(obj) = value else {
        return None;
    };

    if obj.contains_key("concept") || !obj.contains_key("resource") {
        return Some(DescriptionItem::Concept(ConceptDetail {
            concept: text_field(obj, "concept"),
            description: text_field(obj, "description"),
            link: text_field(obj, "link"),
            prerequisite: text_field(obj, "prerequisite"),
            estimated_time: text_field(obj, "estimatedTime"),
        }));
    }

    Some(DescriptionItem::Resource(ResourceLink {
        resource: text_field(obj, "resource"),
        link: text_field(obj, "link"),
    }))
}

fn text_field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}
