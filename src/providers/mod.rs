//! Text-generation and transcription providers.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiProvider;
pub use provider::{
    ChatTurn, GenerationParams, GenerationRequest, Generator, ProviderError, Result, Transcriber,
    UNINTELLIGIBLE_SENTINEL,
};
