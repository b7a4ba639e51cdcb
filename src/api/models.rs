use actix_web::{http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assistant::{
    models::{AssistantFile, FileMetadata, Message, ModelInfo, Role},
    AssistantError,
};
use crate::chat::ChatOptions;
use crate::config::FeatureFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Uniform `{status, message, ...payload}` body of every local route.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub status: EnvelopeStatus,
    pub message: String,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn success(message: impl Into<String>, payload: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: message.into(),
            payload,
        }
    }

    pub fn error(message: impl Into<String>, payload: T) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            message: message.into(),
            payload,
        }
    }

    pub fn respond(self, status: StatusCode) -> HttpResponse {
        HttpResponse::build(status).json(self)
    }
}

pub fn success<T: Serialize>(message: impl Into<String>, payload: T) -> HttpResponse {
    ApiEnvelope::success(message, payload).respond(StatusCode::OK)
}

pub fn bad_request<T: Serialize>(message: impl Into<String>, payload: T) -> HttpResponse {
    ApiEnvelope::error(message, payload).respond(StatusCode::BAD_REQUEST)
}

/// Missing prerequisites answer 400 with their own text; everything else is a 500.
pub fn failure<T: Serialize>(action: &str, err: &AssistantError, payload: T) -> HttpResponse {
    if err.is_missing_prerequisite() {
        return bad_request(err.to_string(), payload);
    }
    ApiEnvelope::error(format!("Failed to {}: {}", action, err), payload)
        .respond(StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Debug, Default, Serialize)]
pub struct NoPayload {}

#[derive(Debug, Default, Serialize)]
pub struct FilesPayload {
    pub files: Vec<AssistantFile>,
}

#[derive(Debug, Default, Serialize)]
pub struct ConfigPayload {
    pub config: Option<Value>,
}

#[derive(Debug, Default, Serialize)]
pub struct ModelsPayload {
    pub models: Vec<ModelInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl ModelsPayload {
    pub fn listed(models: Vec<ModelInfo>) -> Self {
        let total = Some(models.len());
        Self { models, total }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct UploadPayload {
    #[serde(rename = "fileId", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Serialize)]
pub struct FilePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct FeaturesPayload {
    pub features: FeatureFlags,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    #[serde(rename = "fileId", default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileMetadataRequest {
    #[serde(rename = "fileId", default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub metadata: FileMetadata,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
    /// Partial `ChatOptions`; unsent fields fall back to the configured defaults.
    #[serde(default)]
    pub options: Option<Value>,
}

impl ChatRequest {
    pub fn into_parts(self, defaults: &ChatOptions) -> Result<(Vec<Message>, ChatOptions), serde_json::Error> {
        let options = match &self.options {
            Some(changes) => defaults.overlay(changes)?,
            None => defaults.clone(),
        };
        let messages = self
            .messages
            .into_iter()
            .map(|m| Message::new(m.role, m.content))
            .collect();
        Ok((messages, options))
    }
}
