pub mod client;
pub mod files;
pub mod models;

pub use client::AssistantClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use models::{ChatPayload, ContextResponse, EvaluationRequest, EvaluationResponse};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("{0}")]
    MissingPrerequisite(String),
    #[error("{status} - {body}")]
    Http { status: u16, body: String },
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Decode(String),
    #[error("Unexpected response format: {0}")]
    UnexpectedFormat(String),
}

impl AssistantError {
    pub fn is_missing_prerequisite(&self) -> bool {
        matches!(self, AssistantError::MissingPrerequisite(_))
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AssistantError::Decode(e.to_string())
        } else {
            AssistantError::Network(e.to_string())
        }
    }
}

/// The calls a chat exchange makes against the hosted assistant.
#[async_trait]
pub trait AssistantChat: Send + Sync {
    /// Raw JSON answer of the non-streaming chat endpoint.
    async fn chat(&self, payload: &ChatPayload) -> Result<Value, AssistantError>;

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, AssistantError>;

    async fn context(&self, query: &str, top_k: u32) -> Result<ContextResponse, AssistantError>;
}
