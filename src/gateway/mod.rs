//! Messaging gateway: inbound webhook types and outbound delivery.

use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod types;

pub use client::WhatsAppClient;
pub use types::{InboundMessage, MediaRef, MessageKind, WebhookPayload};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unexpected response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Outbound side of the messaging gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a plain text message. `channel` overrides the business number.
    async fn send_text(&self, channel: Option<&str>, to: &str, body: &str) -> Result<()>;

    /// Upload `bytes` and send them as an image with an optional caption.
    async fn send_image(
        &self,
        to: &str,
        bytes: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<()>;

    /// Resolve a short-lived download URL for an inbound media handle.
    async fn media_url(&self, media_id: &str) -> Result<String>;

    /// Download raw bytes from a URL returned by [`Gateway::media_url`].
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
