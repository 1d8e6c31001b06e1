//! Text extraction from generator response payloads.
//!
//! Providers do not agree on one response shape, so a reply is run through an
//! ordered chain of typed extractors. The first one that yields non-empty text
//! wins; if none match, the reply carries no usable text.

use serde::Deserialize;
use serde_json::Value;

use crate::GenerationError;

/// One named way of pulling text out of a payload.
type Extractor = fn(&Value) -> Option<String>;

/// Tried in order.
const EXTRACTORS: &[(&str, Extractor)] = &[
    ("candidate_parts", candidate_parts),
    ("candidate_output", candidate_output),
    ("choice_message", choice_message),
    ("top_level_text", top_level_text),
];

/// Pull the generated text out of a decoded response body.
pub(crate) fn extract_text(payload: &Value) -> Result<String, GenerationError> {
    if let Some(rejection) = rejection(payload) {
        return Err(GenerationError::Rejected(rejection));
    }

    for (name, extractor) in EXTRACTORS {
        if let Some(text) = extractor(payload) {
            tracing::trace!(extractor = name, "response text extracted");
            return Ok(text);
        }
    }

    Err(GenerationError::NoText)
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackEnvelope {
    prompt_feedback: PromptFeedback,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// An explicit error object or a blocked prompt.
fn rejection(payload: &Value) -> Option<String> {
    if let Ok(env) = ErrorEnvelope::deserialize(payload) {
        let e = env.error;
        let mut parts = Vec::new();
        if let Some(code) = e.code {
            parts.push(code.to_string());
        }
        if let Some(status) = e.status {
            parts.push(status);
        }
        if let Some(message) = e.message {
            parts.push(message);
        }
        return Some(if parts.is_empty() {
            "error payload without details".to_string()
        } else {
            parts.join(": ")
        });
    }

    FeedbackEnvelope::deserialize(payload)
        .ok()
        .and_then(|f| f.prompt_feedback.block_reason)
        .map(|reason| format!("prompt blocked: {reason}"))
}

// ---------------------------------------------------------------------------
// Extractors
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct Candidates<C> {
    candidates: Vec<C>,
}

#[derive(Deserialize)]
struct ContentCandidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// `candidates[0].content.parts[*].text`, concatenated.
fn candidate_parts(payload: &Value) -> Option<String> {
    let reply = Candidates::<ContentCandidate>::deserialize(payload).ok()?;
    let first = reply.candidates.into_iter().next()?;
    let text: String = first
        .content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    non_blank(text)
}

#[derive(Deserialize)]
struct OutputCandidate {
    output: String,
}

/// `candidates[0].output`
fn candidate_output(payload: &Value) -> Option<String> {
    let reply = Candidates::<OutputCandidate>::deserialize(payload).ok()?;
    non_blank(reply.candidates.into_iter().next()?.output)
}

#[derive(Deserialize)]
struct Choices {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

/// `choices[0].message.content`
fn choice_message(payload: &Value) -> Option<String> {
    let reply = Choices::deserialize(payload).ok()?;
    non_blank(reply.choices.into_iter().next()?.message.content)
}

#[derive(Deserialize)]
struct TopLevel {
    text: String,
}

/// Top-level `text`.
fn top_level_text(payload: &Value) -> Option<String> {
    non_blank(TopLevel::deserialize(payload).ok()?.text)
}

fn non_blank(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}
