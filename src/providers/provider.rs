//! Generation and transcription provider traits.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::core::history::Role;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Sampling knobs sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.35,
            top_p: 0.8,
            max_output_tokens: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

/// One composite generation request: context, prior turns, current text.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    /// Prior turns followed by the current user message, oldest first.
    pub turns: Vec<ChatTurn>,
    pub params: GenerationParams,
}

/// Streaming text generation.
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Stream reply fragments in arrival order. The stream ends on completion.
    fn stream(&self, request: GenerationRequest) -> BoxStream<'_, Result<String>>;
}

/// What a transcriber returns for audio it cannot make out.
pub const UNINTELLIGIBLE_SENTINEL: &str = "(Audio ininteligible)";

/// Speech to text.
///
/// Implementations return [`UNINTELLIGIBLE_SENTINEL`] rather than an error
/// when the audio was received but not understood.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio. `mime_type` carries no parameters.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String>;
}

impl ProviderError {
    pub fn other(s: impl Into<String>) -> Self {
        ProviderError::Other(s.into())
    }
}
