use actix_web::{post, web, HttpResponse, Result as WebResult};
use bytes::Bytes;
use std::sync::Arc;

use crate::api::models::{bad_request, ChatRequest, NoPayload};
use crate::assistant::AssistantClient;
use crate::chat::{ChatOptions, ChatRelay};
use crate::config::AppConfig;

/// Chat exchange delivered as a server-sent event stream of exactly one event.
#[post("/chat")]
pub async fn chat(
    config: web::Data<AppConfig>,
    client: web::Data<Arc<AssistantClient>>,
    relay: web::Data<Arc<ChatRelay>>,
    req: web::Json<ChatRequest>,
) -> WebResult<HttpResponse> {
    if let Err(e) = client.require_credentials() {
        return Ok(bad_request(e.to_string(), NoPayload {}));
    }

    let defaults = ChatOptions::from_config(&config.chat, &config.assistant);
    let (messages, options) = match req.into_inner().into_parts(&defaults) {
        Ok(parts) => parts,
        Err(e) => return Ok(bad_request(format!("Invalid chat options: {}", e), NoPayload {})),
    };
    if messages.is_empty() {
        return Ok(bad_request("At least one message is required.", NoPayload {}));
    }

    let mut chunks = relay.stream(messages, options);

    let stream = async_stream::stream! {
        while let Some(chunk) = chunks.next().await {
            yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_event(&chunk)));
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream))
}

/// Frames a chunk as one SSE event; embedded newlines become extra `data:` lines.
pub fn sse_event(data: &str) -> String {
    let mut event: String = data
        .split('\n')
        .map(|line| format!("data: {}\n", line))
        .collect();
    event.push('\n');
    event
}
