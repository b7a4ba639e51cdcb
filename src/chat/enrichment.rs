//! Optional evaluation and context lookups run after the primary answer.

use tracing::{debug, warn};

use crate::assistant::{
    models::{ContextResponse, EvaluationRequest, EvaluationResponse},
    AssistantChat,
};

pub const CONTEXT_TOP_K: u32 = 5;

/// Inputs for the enrichment calls of one exchange.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentInput<'a> {
    pub question: Option<&'a str>,
    pub answer: Option<&'a str>,
    pub ground_truth: Option<&'a str>,
    pub evaluate: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub context_data: Option<ContextResponse>,
    pub evaluation_data: Option<EvaluationResponse>,
}

/// Runs the context lookup and evaluation concurrently. Failures degrade to `None`.
pub async fn enrich(api: &dyn AssistantChat, input: &EnrichmentInput<'_>) -> Enrichment {
    let (context_data, evaluation_data) = tokio::join!(
        fetch_context(api, input.question),
        evaluate_answer(api, input),
    );
    Enrichment {
        context_data,
        evaluation_data,
    }
}

pub async fn fetch_context(api: &dyn AssistantChat, question: Option<&str>) -> Option<ContextResponse> {
    let query = non_blank(question)?;
    match api.context(query, CONTEXT_TOP_K).await {
        Ok(context) => {
            debug!("Context lookup returned {} matches", context.matches.len());
            Some(context)
        }
        Err(e) => {
            warn!("Error calling context API: {}", e);
            None
        }
    }
}

pub async fn evaluate_answer(
    api: &dyn AssistantChat,
    input: &EnrichmentInput<'_>,
) -> Option<EvaluationResponse> {
    if !input.evaluate {
        return None;
    }
    let request = EvaluationRequest {
        question: non_blank(input.question)?.to_string(),
        answer: non_blank(input.answer)?.to_string(),
        ground_truth_answer: non_blank(input.ground_truth)?.to_string(),
    };
    match api.evaluate(&request).await {
        Ok(evaluation) => Some(evaluation),
        Err(e) => {
            warn!("Error calling evaluation API: {}", e);
            None
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Percentage string and band used when showing an evaluation metric.
pub fn format_metric(value: f64) -> (String, MetricBand) {
    let band = if value >= 0.8 {
        MetricBand::Good
    } else if value >= 0.6 {
        MetricBand::Fair
    } else {
        MetricBand::Poor
    };
    (format!("{:.1}%", value * 100.0), band)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricBand {
    Good,
    Fair,
    Poor,
}
