//! Text generation backends.
//!
//! [`TextGenerator`] is the seam the summary generator calls through. The
//! production implementation is [`GeminiClient`]. Failures are reported as
//! [`GenerationError`], which knows whether retrying can help.

mod extract;
mod gemini;

use std::future::Future;
use std::time::Duration;

pub use gemini::GeminiClient;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: f32,
    pub top_k: u32,
}

impl From<&arxivsummary_shared::GeneratorConfig> for GenerationOptions {
    fn from(config: &arxivsummary_shared::GeneratorConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            top_p: config.top_p,
            top_k: config.top_k,
        }
    }
}

/// A single failed generation call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// No response within the request timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not decodable JSON.
    #[error("malformed response body: {0}")]
    MalformedPayload(String),

    /// The provider answered with an explicit error or refused the prompt.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// A well-formed reply that contained no text any extractor recognised.
    #[error("response contained no generated text")]
    NoText,
}

impl GenerationError {
    /// Whether the identical request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::MalformedPayload(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Rejected(_) | Self::NoText => false,
        }
    }
}

/// A backend that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    /// Model identifier, as shown in reports.
    fn model(&self) -> &str;

    /// Generate text for `prompt`. One call, no retries.
    fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> impl Future<Output = Result<String, GenerationError>> + Send;
}
