mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{simple_answer, FakeAssistant};
use docassist::api::models_ws::WsServerMessage;
use docassist::api::websocket::{FrameSink, WsConnection};
use docassist::chat::{ChatOptions, ChatRelay, ChatSession, StreamChunk};
use docassist::config::FeatureFlags;
use serde_json::Value;

#[derive(Clone, Default)]
struct RecordingSink {
    frames: Arc<Mutex<Vec<WsServerMessage>>>,
}

impl RecordingSink {
    fn frames(&self) -> Vec<WsServerMessage> {
        self.frames.lock().unwrap().clone()
    }

    fn kinds(&self) -> Vec<String> {
        self.frames().into_iter().map(|f| f.r#type).collect()
    }
}

#[async_trait(?Send)]
impl FrameSink for RecordingSink {
    async fn send_frame(&mut self, frame: WsServerMessage) -> bool {
        self.frames.lock().unwrap().push(frame);
        true
    }
}

fn connection(
    options: ChatOptions,
) -> (WsConnection<RecordingSink>, RecordingSink, Arc<FakeAssistant>) {
    let fake = Arc::new(FakeAssistant::answering(simple_answer()));
    let relay = Arc::new(ChatRelay::new(fake.clone(), FeatureFlags::default()));
    let sink = RecordingSink::default();
    let conn = WsConnection::new(ChatSession::new(options), relay, sink.clone());
    (conn, sink, fake)
}

#[tokio::test]
async fn test_exchange_frames_arrive_in_order() {
    let (mut conn, sink, _) = connection(ChatOptions::default());

    assert!(conn.on_text(r#"{"type":"message","content":"hello"}"#).await);
    assert!(conn.is_busy());
    assert!(conn.next_completion().await);
    assert!(!conn.is_busy());

    assert_eq!(sink.kinds(), vec!["chunk", "metadata", "references", "done"]);
    let frames = sink.frames();

    let chunk: StreamChunk = serde_json::from_str(&frames[0].content).unwrap();
    assert_eq!(chunk.content(), "hi");

    let metadata: Value = serde_json::from_str(&frames[1].content).unwrap();
    assert_eq!(metadata["model"], "m");
    assert_eq!(metadata["usage"]["total_tokens"], 3);

    assert_eq!(frames[2].content, "[]");
    assert_eq!(frames[3].content, "");
}

#[tokio::test]
async fn test_invalid_json_gets_error_frame() {
    let (mut conn, sink, fake) = connection(ChatOptions::default());

    assert!(conn.on_text("{not json").await);
    assert!(!conn.is_busy());
    assert_eq!(sink.kinds(), vec!["error"]);
    assert!(fake.chat_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_other_message_types_are_ignored() {
    let (mut conn, sink, _) = connection(ChatOptions::default());

    assert!(conn.on_text(r#"{"type":"ping"}"#).await);
    assert!(!conn.is_busy());
    assert!(sink.frames().is_empty());
}

#[tokio::test]
async fn test_empty_input_gets_error_frame_and_stays_usable() {
    let (mut conn, sink, _) = connection(ChatOptions::default());

    assert!(conn.on_text(r#"{"type":"message","content":"   "}"#).await);
    assert!(!conn.is_busy());
    assert_eq!(
        sink.frames(),
        vec![WsServerMessage::new("error", "message is empty")]
    );

    assert!(conn.on_text(r#"{"type":"message","content":"hello"}"#).await);
    assert!(conn.next_completion().await);
    assert_eq!(sink.kinds(), vec!["error", "chunk", "metadata", "references", "done"]);
}

#[tokio::test]
async fn test_second_message_while_in_flight_is_rejected() {
    let (mut conn, sink, fake) = connection(ChatOptions::default());

    assert!(conn.on_text(r#"{"type":"message","content":"first"}"#).await);
    assert!(conn.on_text(r#"{"type":"message","content":"second"}"#).await);
    assert_eq!(
        sink.frames(),
        vec![WsServerMessage::new("error", "an exchange is already in flight")]
    );

    assert!(conn.next_completion().await);
    assert_eq!(sink.kinds(), vec!["error", "chunk", "metadata", "references", "done"]);

    let calls = fake.chat_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].messages.len(), 1);
    assert_eq!(calls[0].messages[0].content, "first");
}

#[tokio::test]
async fn test_partial_options_keep_connection_defaults() {
    let defaults = ChatOptions {
        model: "claude-3-5-sonnet-20241022".to_string(),
        ..Default::default()
    };
    let (mut conn, _, fake) = connection(defaults);

    let text = r#"{"type":"message","content":"hello","options":{"temperature":0.3}}"#;
    assert!(conn.on_text(text).await);
    assert!(conn.next_completion().await);

    let calls = fake.chat_calls.lock().unwrap();
    assert_eq!(calls[0].model, "claude-3-5-sonnet-20241022");
    assert_eq!(calls[0].temperature, 0.3);
}

#[tokio::test]
async fn test_invalid_options_get_error_frame() {
    let (mut conn, sink, fake) = connection(ChatOptions::default());

    let text = r#"{"type":"message","content":"hello","options":{"temperature":"warm"}}"#;
    assert!(conn.on_text(text).await);
    assert!(!conn.is_busy());
    assert_eq!(sink.kinds(), vec!["error"]);
    assert!(sink.frames()[0].content.starts_with("Invalid chat options"));
    assert!(fake.chat_calls.lock().unwrap().is_empty());
}
