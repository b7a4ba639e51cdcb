use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assistant::{
    models::{ChatPayload, ContextRequest, ContextResponse, EvaluationRequest, EvaluationResponse},
    AssistantChat, AssistantError,
};
use crate::config::AssistantConfig;

pub const MISSING_CREDENTIALS: &str = "PINECONE_API_KEY and PINECONE_ASSISTANT_NAME are required.";
pub const MISSING_API_KEY: &str = "PINECONE_API_KEY is required.";

/// HTTP client for the hosted assistant. One instance is shared by every handler.
pub struct AssistantClient {
    pub(crate) client: Client,
    pub(crate) settings: AssistantConfig,
}

impl AssistantClient {
    pub fn new(settings: AssistantConfig) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &AssistantConfig {
        &self.settings
    }

    pub fn assistant_name(&self) -> &str {
        &self.settings.name
    }

    /// Fails before any network traffic when the key or assistant name is absent.
    pub fn require_credentials(&self) -> Result<(), AssistantError> {
        if self.settings.api_key.trim().is_empty() || self.settings.name.trim().is_empty() {
            return Err(AssistantError::MissingPrerequisite(MISSING_CREDENTIALS.to_string()));
        }
        Ok(())
    }

    pub fn require_api_key(&self) -> Result<(), AssistantError> {
        if self.settings.api_key.trim().is_empty() {
            return Err(AssistantError::MissingPrerequisite(MISSING_API_KEY.to_string()));
        }
        Ok(())
    }

    pub(crate) fn data_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.data_host.trim_end_matches('/'), path)
    }

    pub(crate) fn control_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.control_host.trim_end_matches('/'), path)
    }

    pub(crate) fn encoded_name(&self) -> String {
        urlencoding::encode(&self.settings.name).into_owned()
    }

    fn bearer(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
    }

    /// Management endpoints authenticate with `Api-Key` instead of a bearer token.
    pub(crate) fn api_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Api-Key", &self.settings.api_key)
    }

    pub(crate) fn with_assistant(&self, builder: RequestBuilder) -> RequestBuilder {
        self.api_key(builder)
            .header("X-Pinecone-Assistant-Name", &self.settings.name)
    }

    pub(crate) async fn send(builder: RequestBuilder) -> Result<Response, AssistantError> {
        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Http { status, body });
        }
        Ok(response)
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, AssistantError> {
        let response = Self::send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| AssistantError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssistantChat for AssistantClient {
    async fn chat(&self, payload: &ChatPayload) -> Result<Value, AssistantError> {
        self.require_credentials()?;

        let url = self.data_url(&format!("/assistant/chat/{}", self.encoded_name()));
        info!("Calling assistant chat at {}", url);
        debug!("Chat payload: {}", serde_json::to_string(payload).unwrap_or_default());

        let mut builder = self.bearer(self.client.post(&url)).json(payload);
        if let Some(version) = &self.settings.api_version {
            builder = builder.header("X-Pinecone-API-Version", version);
        }

        Self::send_json::<Value>(builder)
            .await
            .inspect_err(|e| warn!("Assistant chat failed: {}", e))
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, AssistantError> {
        self.require_api_key()?;
        let url = self.control_url("/assistant/evaluate");
        debug!("Evaluating answer at {}", url);
        Self::send_json(self.bearer(self.client.post(url)).json(request)).await
    }

    async fn context(&self, query: &str, top_k: u32) -> Result<ContextResponse, AssistantError> {
        self.require_credentials()?;
        let url = self.data_url(&format!("/assistant/context/{}", self.encoded_name()));
        let body = ContextRequest {
            query: query.to_string(),
            include_values: true,
            top_k,
        };
        debug!("Fetching context snippets at {}", url);
        Self::send_json(self.bearer(self.client.post(url)).json(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_key: &str, name: &str) -> AssistantClient {
        AssistantClient::new(AssistantConfig {
            api_key: api_key.to_string(),
            name: name.to_string(),
            data_host: "https://data.example/".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn credentials_require_both_key_and_name() {
        assert!(client("key", "docs").require_credentials().is_ok());
        assert!(client("", "docs").require_credentials().is_err());
        assert!(client("key", " ").require_credentials().is_err());
        assert!(client("key", "").require_api_key().is_ok());
    }

    #[test]
    fn urls_join_without_double_slash() {
        let c = client("key", "my docs");
        assert_eq!(
            c.data_url(&format!("/assistant/chat/{}", c.encoded_name())),
            "https://data.example/assistant/chat/my%20docs"
        );
    }

    /// Serves one canned HTTP response on a local port and returns its base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            // read headers, then the declared body
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(0);
            while request.len() < header_end + length {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn payload() -> ChatPayload {
        ChatPayload {
            model: "gpt-4o".to_string(),
            messages: vec![],
            stream: false,
            temperature: 0.5,
            include_highlights: false,
            context_options: None,
            filter: None,
        }
    }

    fn local_client(host: String) -> AssistantClient {
        AssistantClient::new(AssistantConfig {
            api_key: "key".to_string(),
            name: "docs".to_string(),
            data_host: host,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn chat_error_status_carries_body() {
        let host = serve_once("404 Not Found", "not found").await;
        let err = local_client(host).chat(&payload()).await.unwrap_err();
        assert!(matches!(err, AssistantError::Http { status: 404, .. }));
        assert_eq!(err.to_string(), "404 - not found");
    }

    #[tokio::test]
    async fn chat_returns_raw_answer() {
        let host = serve_once("200 OK", r#"{"message":{"content":"hi"},"model":"m"}"#).await;
        let data = local_client(host).chat(&payload()).await.unwrap();
        assert_eq!(data["message"]["content"], "hi");
    }

    #[tokio::test]
    async fn chat_without_credentials_never_hits_the_network() {
        let err = client("", "").chat(&payload()).await.unwrap_err();
        assert!(err.is_missing_prerequisite());
        assert_eq!(err.to_string(), MISSING_CREDENTIALS);
    }
}
