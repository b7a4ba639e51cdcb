use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct WsClientMessage {
    pub r#type: String, // Expected: "message"
    #[serde(default)]
    pub content: String,
    /// Partial chat settings kept for the rest of the connection.
    #[serde(default)]
    pub options: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WsServerMessage {
    pub r#type: String, // "chunk", "metadata", "references", "done", "error"
    pub content: String,
}

impl WsServerMessage {
    pub fn new(kind: &str, content: impl Into<String>) -> Self {
        Self {
            r#type: kind.to_string(),
            content: content.into(),
        }
    }
}
