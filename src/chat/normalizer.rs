//! Reshapes the assistant's raw answer into content plus panel metadata.

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::assistant::models::{Citation, Usage};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    pub content: Option<String>,
    pub model: Option<String>,
    pub usage: Option<Usage>,
    pub citations: Vec<Citation>,
    pub scores: Option<Value>,
    pub highlights: Vec<Value>,
}

pub type ScoreExtractor = fn(&Value) -> Option<Value>;

/// Score sources in precedence order.
pub const SCORE_EXTRACTORS: &[(&str, ScoreExtractor)] = &[
    ("scores", top_level_scores),
    ("relevance_scores", relevance_scores),
    ("confidence", confidence_score),
    ("citations", citation_scores),
];

pub fn normalize(data: &Value) -> NormalizedResponse {
    NormalizedResponse {
        content: data
            .pointer("/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
        model: data.get("model").and_then(Value::as_str).map(str::to_string),
        usage: data
            .get("usage")
            .filter(|u| !u.is_null())
            .and_then(|u| serde_json::from_value(u.clone()).ok()),
        citations: citations(data),
        scores: resolve_scores(data),
        highlights: highlights(data),
    }
}

pub fn citations(data: &Value) -> Vec<Citation> {
    raw_citations(data)
        .iter()
        .filter_map(|c| match serde_json::from_value::<Citation>(c.clone()) {
            Ok(citation) => Some(citation),
            Err(e) => {
                debug!("Skipping malformed citation: {}", e);
                None
            }
        })
        .collect()
}

pub fn resolve_scores(data: &Value) -> Option<Value> {
    SCORE_EXTRACTORS
        .iter()
        .find_map(|(_, extract)| extract(data))
}

fn present(value: Option<&Value>) -> Option<Value> {
    value.filter(|v| !v.is_null()).cloned()
}

fn top_level_scores(data: &Value) -> Option<Value> {
    present(data.get("scores"))
}

fn relevance_scores(data: &Value) -> Option<Value> {
    present(data.get("relevance_scores"))
}

fn confidence_score(data: &Value) -> Option<Value> {
    present(data.get("confidence")).map(|c| json!({ "confidence": c }))
}

fn citation_scores(data: &Value) -> Option<Value> {
    let mut scores = Map::new();
    for (i, citation) in raw_citations(data).iter().enumerate() {
        if let Some(score) = present(citation.get("score")) {
            scores.insert(format!("citation_{}_score", i), score);
        }
        if let Some(confidence) = present(citation.get("confidence")) {
            scores.insert(format!("citation_{}_confidence", i), confidence);
        }
        for (j, reference) in raw_references(citation).iter().enumerate() {
            if let Some(score) = present(reference.get("score")) {
                scores.insert(format!("citation_{}_ref_{}_score", i, j), score);
            }
        }
    }
    (!scores.is_empty()).then(|| Value::Object(scores))
}

pub fn highlights(data: &Value) -> Vec<Value> {
    raw_citations(data)
        .iter()
        .flat_map(raw_references)
        .filter_map(|reference| reference.get("highlight"))
        .filter(|h| !is_blank_highlight(h))
        .cloned()
        .collect()
}

fn is_blank_highlight(highlight: &Value) -> bool {
    match highlight {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Object(map) => {
            map.is_empty()
                || map
                    .get("content")
                    .map(|c| c.as_str().map(|s| s.trim().is_empty()).unwrap_or(c.is_null()))
                    .unwrap_or(false)
        }
        _ => false,
    }
}

fn raw_citations(data: &Value) -> &[Value] {
    data.get("citations")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn raw_references(citation: &Value) -> &[Value] {
    citation
        .get("references")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
