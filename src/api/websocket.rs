use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_ws::Message;
use async_trait::async_trait;
use futures_util::{
    future::{FutureExt as _, LocalBoxFuture},
    StreamExt as _,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::api::models_ws::{WsClientMessage, WsServerMessage};
use crate::assistant::AssistantClient;
use crate::chat::{session::ExchangeRequest, ChatOptions, ChatRelay, ChatSession, SessionError};
use crate::config::AppConfig;

/// Where server frames go. Returns `false` once the client is gone.
#[async_trait(?Send)]
pub trait FrameSink {
    async fn send_frame(&mut self, frame: WsServerMessage) -> bool;
}

#[async_trait(?Send)]
impl FrameSink for actix_ws::Session {
    async fn send_frame(&mut self, frame: WsServerMessage) -> bool {
        match serde_json::to_string(&frame) {
            Ok(json) => self.text(json).await.is_ok(),
            Err(e) => {
                error!("Failed to encode websocket message: {}", e);
                true
            }
        }
    }
}

type Exchange = LocalBoxFuture<'static, (ChatSession, bool)>;

/// Chat state of one WebSocket connection.
///
/// At most one exchange runs at a time; messages arriving meanwhile are
/// answered with an `error` frame.
pub struct WsConnection<S> {
    idle: Option<ChatSession>,
    in_flight: Option<Exchange>,
    relay: Arc<ChatRelay>,
    sink: S,
}

impl<S: FrameSink + Clone + 'static> WsConnection<S> {
    pub fn new(chat: ChatSession, relay: Arc<ChatRelay>, sink: S) -> Self {
        Self {
            idle: Some(chat),
            in_flight: None,
            relay,
            sink,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Handles one text frame. A valid message starts an exchange, driven by
    /// [`next_completion`](Self::next_completion).
    pub async fn on_text(&mut self, text: &str) -> bool {
        let msg: WsClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => return self.reply_error(e.to_string()).await,
        };
        if msg.r#type != "message" {
            return true;
        }

        let Some(mut chat) = self.idle.take() else {
            return self.reply_error(SessionError::Busy.to_string()).await;
        };

        if let Some(changes) = &msg.options {
            match chat.options.overlay(changes) {
                Ok(options) => chat.options = options,
                Err(e) => {
                    self.idle = Some(chat);
                    return self.reply_error(format!("Invalid chat options: {}", e)).await;
                }
            }
        }

        let request = match chat.set_input(msg.content).and_then(|_| chat.submit()) {
            Ok(request) => request,
            Err(e) => {
                self.idle = Some(chat);
                return self.reply_error(e.to_string()).await;
            }
        };

        let relay = Arc::clone(&self.relay);
        let sink = self.sink.clone();
        self.in_flight = Some(
            async move {
                let mut chat = chat;
                let mut sink = sink;
                let connected = stream_exchange(request, &mut chat, &relay, &mut sink).await;
                (chat, connected)
            }
            .boxed_local(),
        );
        true
    }

    /// Waits for the running exchange. Never resolves while idle.
    pub async fn next_completion(&mut self) -> bool {
        let Some(exchange) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let (chat, connected) = exchange.await;
        self.in_flight = None;
        self.idle = Some(chat);
        connected
    }

    async fn reply_error(&mut self, message: String) -> bool {
        self.sink.send_frame(WsServerMessage::new("error", message)).await
    }
}

/// Streams one submitted exchange as `chunk`, `metadata`, `references`, `done` frames.
pub async fn stream_exchange<S: FrameSink>(
    request: ExchangeRequest,
    chat: &mut ChatSession,
    relay: &Arc<ChatRelay>,
    sink: &mut S,
) -> bool {
    let mut chunks = relay.stream(request.messages, request.options);
    if let Err(e) = chat.begin_streaming() {
        error!("Chat session refused to stream: {}", e);
        return sink.send_frame(WsServerMessage::new("error", e.to_string())).await;
    }

    let mut connected = true;
    while let Some(chunk) = chunks.next().await {
        if let Err(e) = chat.apply_chunk(&chunk) {
            error!("Failed to apply chunk: {}", e);
        }
        if connected && !sink.send_frame(WsServerMessage::new("chunk", chunk)).await {
            // Client likely disconnected
            connected = false;
        }
    }

    let references = match chat.finish() {
        Ok(message) => message.references.clone().unwrap_or_default(),
        Err(e) => {
            error!("Failed to finish exchange: {}", e);
            Vec::new()
        }
    };
    if !connected {
        return false;
    }

    let metadata = serde_json::to_string(&chat.metadata()).unwrap_or_else(|_| "null".to_string());
    let references = serde_json::to_string(&references).unwrap_or_else(|_| "[]".to_string());

    sink.send_frame(WsServerMessage::new("metadata", metadata)).await
        && sink.send_frame(WsServerMessage::new("references", references)).await
        && sink.send_frame(WsServerMessage::new("done", "")).await
}

#[get("/ws/chat")]
pub async fn ws_chat(
    req: HttpRequest,
    body: web::Payload,
    config: web::Data<AppConfig>,
    client: web::Data<Arc<AssistantClient>>,
    relay: web::Data<Arc<ChatRelay>>,
) -> Result<HttpResponse, Error> {
    if let Err(e) = client.require_credentials() {
        return Ok(HttpResponse::BadRequest().body(e.to_string()));
    }

    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    info!("WebSocket chat connection established");

    let chat = ChatSession::new(ChatOptions::from_config(&config.chat, &config.assistant));
    let mut connection = WsConnection::new(chat, relay.as_ref().clone(), session.clone());

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                connected = connection.next_completion() => {
                    if !connected {
                        break;
                    }
                }
                msg = msg_stream.next() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Text(text) => {
                            if !connection.on_text(&text).await {
                                break;
                            }
                        }
                        Message::Close(reason) => {
                            let _ = session.close(reason).await;
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
        info!("WebSocket chat connection closed");
    });

    Ok(response)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ws_chat);
}
