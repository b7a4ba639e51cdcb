#![allow(dead_code)]

use async_trait::async_trait;
use docassist::assistant::{
    models::{ChatPayload, ContextResponse, EvaluationRequest, EvaluationResponse, Message},
    AssistantChat, AssistantError,
};
use serde_json::{json, Value};
use std::sync::Mutex;

pub enum ChatReply {
    Answer(Value),
    Http(u16, String),
    Network(String),
}

/// In-process stand-in for the hosted assistant.
pub struct FakeAssistant {
    pub reply: ChatReply,
    pub evaluation: Option<EvaluationResponse>,
    pub context: Option<ContextResponse>,
    pub chat_calls: Mutex<Vec<ChatPayload>>,
    pub evaluate_calls: Mutex<Vec<EvaluationRequest>>,
    pub context_calls: Mutex<Vec<(String, u32)>>,
}

impl FakeAssistant {
    pub fn new(reply: ChatReply) -> Self {
        Self {
            reply,
            evaluation: None,
            context: None,
            chat_calls: Mutex::new(Vec::new()),
            evaluate_calls: Mutex::new(Vec::new()),
            context_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(data: Value) -> Self {
        Self::new(ChatReply::Answer(data))
    }
}

#[async_trait]
impl AssistantChat for FakeAssistant {
    async fn chat(&self, payload: &ChatPayload) -> Result<Value, AssistantError> {
        self.chat_calls.lock().unwrap().push(payload.clone());
        match &self.reply {
            ChatReply::Answer(data) => Ok(data.clone()),
            ChatReply::Http(status, body) => Err(AssistantError::Http {
                status: *status,
                body: body.clone(),
            }),
            ChatReply::Network(msg) => Err(AssistantError::Network(msg.clone())),
        }
    }

    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResponse, AssistantError> {
        self.evaluate_calls.lock().unwrap().push(request.clone());
        self.evaluation
            .clone()
            .ok_or_else(|| AssistantError::Network("evaluation unreachable".to_string()))
    }

    async fn context(&self, query: &str, top_k: u32) -> Result<ContextResponse, AssistantError> {
        self.context_calls.lock().unwrap().push((query.to_string(), top_k));
        self.context
            .clone()
            .ok_or_else(|| AssistantError::Network("context unreachable".to_string()))
    }
}

pub fn simple_answer() -> Value {
    json!({
        "message": {"role": "assistant", "content": "hi"},
        "model": "m",
        "usage": {"total_tokens": 3, "prompt_tokens": 1, "completion_tokens": 2}
    })
}

pub fn evaluation() -> EvaluationResponse {
    serde_json::from_value(json!({
        "metrics": {"correctness": 0.9, "completeness": 0.75, "alignment": 0.8},
        "reasoning": {"evaluated_facts": [
            {"fact": {"content": "Paris is the capital"}, "entailment": "entailed"},
            {"fact": {"content": "It has 2 residents"}, "entailment": "contradicted"}
        ]},
        "usage": {"total_tokens": 10, "prompt_tokens": 8, "completion_tokens": 2}
    }))
    .unwrap()
}

pub fn history(contents: &[&str]) -> Vec<Message> {
    contents
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i % 2 == 0 {
                Message::user(*c)
            } else {
                Message::assistant(*c)
            }
        })
        .collect()
}
