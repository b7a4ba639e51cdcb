//! File management, assistant configuration and model listing.

use chrono::{SecondsFormat, Utc};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::assistant::{
    models::{AssistantFile, FileMetadata, ModelInfo},
    AssistantClient, AssistantError,
};

const FILE_PAGE_LIMIT: u64 = 100;

/// Result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: Option<String>,
    pub metadata: Option<Value>,
}

/// How the model list was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelListing {
    Upstream(Vec<ModelInfo>),
    /// Upstream answered with something other than a `models` array.
    Unavailable,
    /// Both model endpoints failed; hardcoded sample data.
    Sample(Vec<ModelInfo>),
}

impl AssistantClient {
    pub async fn list_files(&self) -> Result<Vec<AssistantFile>, AssistantError> {
        self.require_credentials()?;

        let data = self.fetch_file_page(FILE_PAGE_LIMIT).await?;
        let files = data
            .get("files")
            .and_then(Value::as_array)
            .ok_or_else(|| AssistantError::UnexpectedFormat("files is not an array".to_string()))?;
        info!("Assistant returned {} files", files.len());

        let mut all_files = files.clone();
        if let Some(total) = needs_full_refetch(&data) {
            info!(
                "Found {} files, but total is {}. Attempting to fetch more...",
                all_files.len(),
                total
            );
            match self.fetch_file_page(total).await {
                Ok(more) => {
                    if let Some(files) = more.get("files").and_then(Value::as_array) {
                        all_files = files.clone();
                        info!("Successfully fetched {} files", all_files.len());
                    }
                }
                Err(e) => warn!("Refetching the full file list failed: {}", e),
            }
        }

        Ok(all_files.iter().map(AssistantFile::from_upstream).collect())
    }

    async fn fetch_file_page(&self, limit: u64) -> Result<Value, AssistantError> {
        let url = self.data_url(&format!(
            "/assistant/files/{}?limit={}&offset=0",
            self.encoded_name(),
            limit
        ));
        Self::send_json(self.api_key(self.client.get(url))).await
    }

    pub async fn upload_file(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        metadata: FileMetadata,
    ) -> Result<UploadedFile, AssistantError> {
        self.require_credentials()?;
        info!("Uploading file {} ({} bytes)", file_name, bytes.len());

        let size = bytes.len() as u64;
        let mut form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        if !metadata.is_empty() {
            let enriched = enrich_upload_metadata(metadata, size);
            form = form.text("metadata", Value::Object(enriched).to_string());
        }

        let url = self.data_url("/assistant/files");
        let result: Value = Self::send_json(self.with_assistant(self.client.post(url)).multipart(form)).await?;

        Ok(UploadedFile {
            id: result.get("id").and_then(Value::as_str).map(str::to_string),
            metadata: result.get("metadata").cloned(),
        })
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<(), AssistantError> {
        self.require_credentials()?;
        info!("Deleting file {}", file_id);
        let url = self.data_url(&format!("/assistant/files/{}", urlencoding::encode(file_id)));
        Self::send(self.with_assistant(self.client.delete(url))).await?;
        Ok(())
    }

    pub async fn update_file_metadata(
        &self,
        file_id: &str,
        metadata: FileMetadata,
    ) -> Result<Value, AssistantError> {
        self.require_credentials()?;
        debug!("Updating metadata for file {}", file_id);
        let url = self.data_url(&format!("/assistant/files/{}", urlencoding::encode(file_id)));
        let body = json!({ "metadata": stamp_last_updated(metadata) });
        Self::send_json(self.with_assistant(self.client.patch(url)).json(&body)).await
    }

    pub async fn assistant_config(&self) -> Result<Value, AssistantError> {
        self.require_credentials()?;
        let url = self.control_url(&format!("/assistant/assistants/{}", self.encoded_name()));
        Self::send_json(self.api_key(self.client.get(url))).await
    }

    pub async fn list_models(&self) -> Result<ModelListing, AssistantError> {
        self.require_api_key()?;

        let mut response = self
            .api_key(self.client.get(self.control_url("/assistant/models")))
            .send()
            .await?;

        if !response.status().is_success() {
            info!("First models endpoint failed, trying alternative...");
            response = self
                .api_key(self.client.get(self.control_url("/models")))
                .send()
                .await?;
        }

        if !response.status().is_success() {
            warn!(
                "Models API returned status {}, returning sample data",
                response.status()
            );
            return Ok(ModelListing::Sample(sample_models()));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Decode(e.to_string()))?;

        match data.get("models").and_then(Value::as_array) {
            Some(models) => Ok(ModelListing::Upstream(filter_chat_models(models))),
            None => {
                warn!("Models API returned unexpected format");
                Ok(ModelListing::Unavailable)
            }
        }
    }
}

/// Returns the upstream total when the first page came back short.
pub fn needs_full_refetch(data: &Value) -> Option<u64> {
    let total = data.get("total").and_then(Value::as_u64).filter(|t| *t > 0)?;
    let returned = data.get("files").and_then(Value::as_array)?.len() as u64;
    (returned < total).then_some(total)
}

pub fn enrich_upload_metadata(mut metadata: FileMetadata, size_bytes: u64) -> FileMetadata {
    let now = timestamp();
    metadata.insert(
        "file_size_mb".to_string(),
        json!(size_bytes as f64 / (1024.0 * 1024.0)),
    );
    metadata.insert("created_date".to_string(), json!(now));
    metadata.insert("last_updated".to_string(), json!(now));
    metadata
}

pub fn stamp_last_updated(mut metadata: FileMetadata) -> FileMetadata {
    metadata.insert("last_updated".to_string(), json!(timestamp()));
    metadata
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Keeps entries typed chat/completion or named like a chat model.
pub fn filter_chat_models(models: &[Value]) -> Vec<ModelInfo> {
    models
        .iter()
        .filter(|model| {
            let kind = model.get("type").and_then(Value::as_str);
            let is_chat_type = matches!(kind, Some("chat") | Some("completion"));
            let name = model
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();
            let has_chat_name = ["chat", "gpt", "claude"].iter().any(|k| name.contains(k));
            is_chat_type || has_chat_name
        })
        .map(|model| {
            let text = |key: &str| model.get(key).and_then(Value::as_str).map(str::to_string);
            let name = text("name").unwrap_or_default();
            ModelInfo {
                id: text("id").unwrap_or_else(|| name.clone()),
                name,
                kind: text("type").unwrap_or_else(|| "unknown".to_string()),
                provider: text("provider").unwrap_or_else(|| "unknown".to_string()),
                description: text("description").unwrap_or_default(),
                capabilities: model
                    .get("capabilities")
                    .and_then(Value::as_array)
                    .map(|caps| {
                        caps.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        })
        .collect()
}

pub fn sample_models() -> Vec<ModelInfo> {
    let model = |id: &str, provider: &str, description: &str, caps: &[&str]| ModelInfo {
        id: id.to_string(),
        name: id.to_string(),
        kind: "chat".to_string(),
        provider: provider.to_string(),
        description: description.to_string(),
        capabilities: caps.iter().map(|c| c.to_string()).collect(),
    };
    vec![
        model(
            "gpt-4o",
            "openai",
            "GPT-4o is OpenAI's most advanced model",
            &["chat", "completion", "vision"],
        ),
        model(
            "gpt-4o-mini",
            "openai",
            "GPT-4o-mini is a faster and more efficient model",
            &["chat", "completion"],
        ),
        model(
            "claude-3-5-sonnet-20241022",
            "anthropic",
            "Claude 3.5 Sonnet is Anthropic's most capable model",
            &["chat", "completion", "analysis"],
        ),
        model(
            "claude-3-5-haiku-20241022",
            "anthropic",
            "Claude 3.5 Haiku is fast and efficient",
            &["chat", "completion"],
        ),
    ]
}
