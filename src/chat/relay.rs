use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::assistant::{
    models::{Message, ResponseMetadata},
    AssistantChat,
};
use crate::chat::{
    composer::{self, latest_user_message},
    enrichment::{self, EnrichmentInput},
    normalizer::{self, NormalizedResponse},
    ChatOptions,
};
use crate::config::FeatureFlags;

/// The single envelope emitted for a successful exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub choices: Vec<StreamChoice>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    pub delta: StreamDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub content: String,
}

impl StreamChunk {
    pub fn new(content: String, metadata: ResponseMetadata) -> Self {
        Self {
            choices: vec![StreamChoice {
                delta: StreamDelta { content },
            }],
            metadata,
        }
    }

    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.delta.content.as_str())
            .unwrap_or_default()
    }
}

/// Receiving end of an exchange. Yields exactly one chunk, then `None`.
pub struct ChunkStream {
    rx: mpsc::Receiver<String>,
}

impl ChunkStream {
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Turns one non-streaming upstream answer into a one-chunk sequence.
///
/// Upstream and transport failures are delivered as an `Error: ...` chunk
/// rather than returned, so callers always read content.
pub struct ChatRelay {
    api: Arc<dyn AssistantChat>,
    features: FeatureFlags,
}

impl ChatRelay {
    pub fn new(api: Arc<dyn AssistantChat>, features: FeatureFlags) -> Self {
        Self { api, features }
    }

    pub async fn exchange(&self, messages: &[Message], options: &ChatOptions) -> String {
        let payload = composer::compose(messages, options);
        info!(
            "Relaying chat exchange with {} message(s) to model {}",
            payload.messages.len(),
            payload.model
        );

        let data = match self.api.chat(&payload).await {
            Ok(data) => data,
            Err(e) => {
                error!("Error in chat exchange: {}", e);
                return format!("Error: {}", e);
            }
        };

        let normalized = normalizer::normalize(&data);
        let mut content = normalized.content.clone().unwrap_or_default();
        let question = latest_user_message(messages).map(|m| m.content.as_str());

        let extra = enrichment::enrich(
            self.api.as_ref(),
            &EnrichmentInput {
                question,
                answer: Some(content.as_str()),
                ground_truth: options.ground_truth_answer.as_deref(),
                evaluate: options.evaluate,
            },
        )
        .await;

        if options.citations_in_content && self.features.show_citations {
            append_citations(&mut content, &normalized);
        }

        let metadata = ResponseMetadata {
            model: normalized.model,
            usage: normalized.usage,
            citations: normalized.citations,
            scores: normalized.scores,
            context_data: extra.context_data,
            evaluation_data: extra.evaluation_data,
            highlights: (!normalized.highlights.is_empty()).then_some(normalized.highlights),
            request_params: Some(composer::request_params(&payload, options)),
        };

        match serde_json::to_string(&StreamChunk::new(content, metadata)) {
            Ok(chunk) => chunk,
            Err(e) => {
                error!("Failed to encode chat chunk: {}", e);
                format!("Error: {}", e)
            }
        }
    }

    /// Same as [`exchange`](Self::exchange), reporting the chunk through `on_chunk` as it arrives.
    pub async fn exchange_with<F>(&self, messages: &[Message], options: &ChatOptions, mut on_chunk: F) -> String
    where
        F: FnMut(&str),
    {
        let chunk = self.exchange(messages, options).await;
        on_chunk(&chunk);
        chunk
    }

    /// Runs the exchange in the background and hands back the chunk sequence.
    pub fn stream(self: &Arc<Self>, messages: Vec<Message>, options: ChatOptions) -> ChunkStream {
        let (tx, rx) = mpsc::channel::<String>(1);
        let relay = Arc::clone(self);

        tokio::spawn(async move {
            let chunk = relay.exchange(&messages, &options).await;
            if tx.send(chunk).await.is_err() {
                info!("Chunk receiver dropped before delivery");
            }
        });

        ChunkStream { rx }
    }
}

/// Markdown block listing model, usage and cited sources under the answer.
pub fn append_citations(content: &mut String, response: &NormalizedResponse) {
    if response.model.is_some() || response.usage.is_some() {
        content.push_str("\n\n---\n**Response Metadata:**\n");
        if let Some(model) = &response.model {
            let _ = writeln!(content, "- **Model**: {}", model);
        }
        if let Some(usage) = &response.usage {
            let _ = writeln!(
                content,
                "- **Token Usage**: {} total ({} prompt + {} completion)",
                usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }
    }

    if response.citations.is_empty() {
        return;
    }
    content.push_str("\n**Sources & Citations:**\n");
    for (index, citation) in response.citations.iter().enumerate() {
        for reference in &citation.references {
            let pages = reference
                .pages
                .as_ref()
                .filter(|p| !p.is_empty())
                .map(|p| p.iter().map(u32::to_string).collect::<Vec<_>>().join(", "))
                .unwrap_or_else(|| "N/A".to_string());
            let _ = writeln!(
                content,
                "{}. **{}** (Pages: {})",
                index + 1,
                reference.file.name,
                pages
            );
            if let Some(url) = &reference.file.signed_url {
                let _ = writeln!(content, "   - [View Document]({})", url);
            }
        }
    }
}
