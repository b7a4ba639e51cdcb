//! One user's conversation: message list, exchange state and panel metadata.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::assistant::models::{Message, ResponseMetadata};
use crate::chat::{ChatOptions, ChatRelay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Composing,
    Sending,
    Streaming,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("an exchange is already in flight")]
    Busy,
    #[error("message is empty")]
    EmptyInput,
    #[error("cannot {action} while {state:?}")]
    InvalidTransition { action: &'static str, state: ChatState },
}

/// A submitted exchange: the history to send and the settings to send it with.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

pub struct ChatSession {
    state: ChatState,
    input: String,
    messages: Vec<Message>,
    metadata: Option<ResponseMetadata>,
    pending_metadata: Option<ResponseMetadata>,
    accumulated: String,
    referenced_files: Vec<String>,
    pub options: ChatOptions,
}

impl ChatSession {
    pub fn new(options: ChatOptions) -> Self {
        Self {
            state: ChatState::Idle,
            input: String::new(),
            messages: Vec::new(),
            metadata: None,
            pending_metadata: None,
            accumulated: String::new(),
            referenced_files: Vec::new(),
            options,
        }
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Metadata of the most recently completed exchange.
    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        self.metadata.as_ref()
    }

    pub fn referenced_files(&self) -> &[String] {
        &self.referenced_files
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, ChatState::Sending | ChatState::Streaming)
    }

    pub fn can_submit(&self) -> bool {
        !self.is_busy() && !self.input.trim().is_empty()
    }

    pub fn set_input(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        self.input = text.into();
        self.state = if self.input.trim().is_empty() {
            ChatState::Idle
        } else {
            ChatState::Composing
        };
        Ok(())
    }

    /// Appends the user message and moves to `Sending`.
    pub fn submit(&mut self) -> Result<ExchangeRequest, SessionError> {
        if self.is_busy() {
            return Err(SessionError::Busy);
        }
        if self.input.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let content = std::mem::take(&mut self.input);
        self.messages.push(Message::user(content));
        self.state = ChatState::Sending;

        Ok(ExchangeRequest {
            messages: self.messages.clone(),
            options: self.options.clone(),
        })
    }

    /// Adds the empty assistant message that chunks are written into.
    pub fn begin_streaming(&mut self) -> Result<(), SessionError> {
        if self.state != ChatState::Sending {
            return Err(SessionError::InvalidTransition {
                action: "begin streaming",
                state: self.state,
            });
        }
        self.accumulated.clear();
        self.pending_metadata = None;
        let mut reply = Message::assistant("");
        reply.references = Some(Vec::new());
        self.messages.push(reply);
        self.state = ChatState::Streaming;
        Ok(())
    }

    /// Folds one chunk into the assistant message.
    ///
    /// Envelopes contribute `choices[0].delta.content` and stage their metadata.
    /// Anything that is not an envelope is shown verbatim.
    pub fn apply_chunk(&mut self, chunk: &str) -> Result<(), SessionError> {
        if self.state != ChatState::Streaming {
            return Err(SessionError::InvalidTransition {
                action: "apply a chunk",
                state: self.state,
            });
        }

        match parse_envelope(chunk) {
            Some((content, metadata)) => {
                self.accumulated.push_str(&content);
                if metadata.is_some() {
                    self.pending_metadata = metadata;
                }
            }
            None => {
                debug!("Chunk is not an envelope, treating it as text");
                self.accumulated.push_str(chunk);
            }
        }

        if let Some(last) = self.messages.last_mut() {
            last.content = self.accumulated.clone();
        }
        Ok(())
    }

    /// Closes the exchange: commits metadata and scans the answer for file names.
    pub fn finish(&mut self) -> Result<&Message, SessionError> {
        if self.state != ChatState::Streaming {
            return Err(SessionError::InvalidTransition {
                action: "finish",
                state: self.state,
            });
        }

        self.metadata = self.pending_metadata.take();
        self.referenced_files = extract_references(&self.accumulated);
        self.accumulated.clear();
        self.state = ChatState::Idle;

        let references = self.referenced_files.clone();
        match self.messages.last_mut() {
            Some(last) => {
                last.references = Some(references);
                Ok(&*last)
            }
            None => Err(SessionError::InvalidTransition {
                action: "finish",
                state: ChatState::Idle,
            }),
        }
    }

    /// Drives a full exchange for the current input through `relay`.
    pub async fn run_exchange<F>(&mut self, relay: &Arc<ChatRelay>, mut on_chunk: F) -> Result<&Message, SessionError>
    where
        F: FnMut(&str),
    {
        let request = self.submit()?;
        let mut stream = relay.stream(request.messages, request.options);
        self.begin_streaming()?;

        while let Some(chunk) = stream.next().await {
            self.apply_chunk(&chunk)?;
            on_chunk(&self.accumulated);
        }

        self.finish()
    }
}

/// Content and metadata of a `{choices, metadata}` envelope, `None` for plain text.
fn parse_envelope(chunk: &str) -> Option<(String, Option<ResponseMetadata>)> {
    let value: Value = serde_json::from_str(chunk).ok()?;
    let choices = value.get("choices")?;
    let content = choices
        .pointer("/0/delta/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let metadata = value
        .get("metadata")
        .filter(|m| !m.is_null())
        .and_then(|m| match serde_json::from_value::<ResponseMetadata>(m.clone()) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Error parsing chunk metadata: {}", e);
                None
            }
        });
    Some((content, metadata))
}

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([^:\n]+\.[a-zA-Z0-9]+)").expect("file name pattern is valid"))
}

/// Heuristic scan for file-name-like runs of text. Over- and under-matches.
pub fn extract_references(content: &str) -> Vec<String> {
    file_name_pattern()
        .find_iter(content)
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Two-way substring containment between a referenced name and a file name.
pub fn file_matches_reference(file_name: &str, reference: &str) -> bool {
    let file_name = file_name.to_lowercase();
    let reference = reference.to_lowercase();
    if file_name.is_empty() || reference.is_empty() {
        return false;
    }
    file_name.contains(&reference) || reference.contains(&file_name)
}
