//! Builds the outbound chat payload from a session's messages and settings.

use crate::assistant::models::{
    ChatPayload, ContextOptions, FilterOptions, Message, RequestParams, Role, WireMessage,
};
use crate::chat::ChatOptions;

/// Keyword groups tried in order against the latest user message. First hit wins.
pub const CATEGORY_KEYWORDS: &[(&[&str], &str)] = &[
    (&["diagnostic", "test", "screening"], "diagnostics"),
    (&["private", "acute"], "private_healthcare"),
    (&["market", "business"], "market_analysis"),
    (&["digital", "technology"], "digital_health"),
];

pub fn compose(messages: &[Message], options: &ChatOptions) -> ChatPayload {
    let selected = select_messages(messages, options.include_message_history);
    let filter = resolve_filter(messages, options);
    let context = resolve_context(&options.context);

    ChatPayload {
        model: options.model.clone(),
        messages: selected.iter().map(|m| WireMessage::from(*m)).collect(),
        stream: false,
        temperature: clamp_temperature(options.temperature),
        include_highlights: options.include_highlights,
        context_options: context,
        filter: (!filter.is_empty()).then_some(filter),
    }
}

/// The parameters echoed back in the response metadata.
pub fn request_params(payload: &ChatPayload, options: &ChatOptions) -> RequestParams {
    RequestParams {
        model: payload.model.clone(),
        temperature: payload.temperature,
        include_highlights: payload.include_highlights,
        include_message_history: options.include_message_history,
        context_options: payload.context_options,
        filter: payload.filter.clone(),
    }
}

/// With history disabled only the latest user message is sent.
pub fn select_messages(messages: &[Message], include_history: bool) -> Vec<&Message> {
    if include_history {
        return messages.iter().collect();
    }
    latest_user_message(messages).into_iter().collect()
}

pub fn latest_user_message(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == Role::User)
}

/// Explicit filters win; otherwise fall back to keyword categorization.
pub fn resolve_filter(messages: &[Message], options: &ChatOptions) -> FilterOptions {
    if !options.filter.is_empty() {
        return options.filter.cleaned();
    }
    if !options.auto_categorize || messages.is_empty() {
        return FilterOptions::default();
    }
    latest_user_message(messages)
        .and_then(|m| categorize(&m.content))
        .map(|resource| FilterOptions {
            resource: Some(resource.to_string()),
            ..Default::default()
        })
        .unwrap_or_default()
}

pub fn categorize(content: &str) -> Option<&'static str> {
    let lowered = content.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, resource)| *resource)
}

pub fn resolve_context(context: &ContextOptions) -> Option<ContextOptions> {
    (!context.is_empty()).then_some(*context)
}

pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return 0.0;
    }
    temperature.clamp(0.0, 1.0)
}
