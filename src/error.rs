//! Error types for warelay.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-text input could not be turned into text. The user gets an apology.
    #[error("Could not process input: {0}")]
    RecoverableInput(String),

    #[error("Generation provider error: {0}")]
    GenerationProvider(String),

    #[error("Generation provider returned an empty reply")]
    EmptyGeneration,

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Campaign setup error: {0}")]
    CampaignSetup(String),

    #[error("Campaign send error: {0}")]
    CampaignItem(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
