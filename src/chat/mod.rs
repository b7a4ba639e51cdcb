pub mod composer;
pub mod enrichment;
pub mod normalizer;
pub mod relay;
pub mod session;

pub use relay::{ChatRelay, ChunkStream, StreamChunk};
pub use session::{ChatSession, ChatState, SessionError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assistant::models::{ContextOptions, FilterOptions};
use crate::config::{AssistantConfig, ChatConfig};

/// Per-exchange settings chosen by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub include_message_history: bool,
    pub include_highlights: bool,
    pub auto_categorize: bool,
    #[serde(rename = "filterOptions")]
    pub filter: FilterOptions,
    #[serde(rename = "contextOptions")]
    pub context: ContextOptions,
    pub evaluate: bool,
    pub ground_truth_answer: Option<String>,
    /// Append a citations block to the answer text. Honored only when citations are enabled.
    pub citations_in_content: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            include_message_history: true,
            include_highlights: false,
            auto_categorize: true,
            filter: FilterOptions::default(),
            context: ContextOptions::default(),
            evaluate: false,
            ground_truth_answer: None,
            citations_in_content: false,
        }
    }
}

impl ChatOptions {
    pub fn from_config(chat: &ChatConfig, assistant: &AssistantConfig) -> Self {
        Self {
            model: assistant.default_model.clone(),
            temperature: chat.temperature,
            include_message_history: chat.include_message_history,
            include_highlights: chat.include_highlights,
            context: ContextOptions {
                snippet_size: chat.snippet_size,
                top_k: chat.top_k,
            },
            ..Default::default()
        }
    }

    /// Applies only the fields a client sent. Nested option objects merge key by key.
    pub fn overlay(&self, changes: &Value) -> Result<Self, serde_json::Error> {
        let mut merged = serde_json::to_value(self)?;
        merge(&mut merged, changes);
        serde_json::from_value(merged)
    }
}

fn merge(base: &mut Value, changes: &Value) {
    match (base, changes) {
        (Value::Object(base), Value::Object(changes)) => {
            for (key, value) in changes {
                if let Some(slot) = base.get_mut(key) {
                    if slot.is_object() && value.is_object() {
                        merge(slot, value);
                        continue;
                    }
                }
                base.insert(key.clone(), value.clone());
            }
        }
        (base, changes) => *base = changes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_keeps_unsent_fields() {
        let base = ChatOptions {
            model: "claude-3-5-haiku-20241022".to_string(),
            context: ContextOptions {
                snippet_size: Some(512),
                top_k: None,
            },
            ..Default::default()
        };

        let merged = base
            .overlay(&json!({"temperature": 0.2, "contextOptions": {"top_k": 3}}))
            .unwrap();
        assert_eq!(merged.model, "claude-3-5-haiku-20241022");
        assert_eq!(merged.temperature, 0.2);
        assert_eq!(merged.context.snippet_size, Some(512));
        assert_eq!(merged.context.top_k, Some(3));
        assert!(merged.include_message_history);
    }

    #[test]
    fn overlay_rejects_wrong_types() {
        assert!(ChatOptions::default().overlay(&json!({"temperature": "hot"})).is_err());
        assert_eq!(
            ChatOptions::default().overlay(&json!({})).unwrap(),
            ChatOptions::default()
        );
    }
}
