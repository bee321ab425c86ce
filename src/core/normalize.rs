//! Turn inbound messages into plain text.

use crate::error::{Error, Result};
use crate::gateway::{Gateway, MediaRef, MessageKind};
use crate::providers::UNINTELLIGIBLE_SENTINEL;
use crate::providers::Transcriber;

/// Prefix marking history and notification text that came from a voice note.
pub const TRANSCRIPT_PREFIX: &str = "[Audio transcrito]";

const DEFAULT_AUDIO_MIME: &str = "audio/ogg";

/// Result of normalizing one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Text ready for reply generation.
    Text(String),
    /// Message type the relay does not handle.
    Skipped,
}

/// Drop MIME parameters: `audio/ogg; codecs=opus` becomes `audio/ogg`.
pub fn base_mime_type(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

pub struct MediaNormalizer<'a> {
    gateway: &'a dyn Gateway,
    transcriber: &'a dyn Transcriber,
}

impl<'a> MediaNormalizer<'a> {
    pub fn new(gateway: &'a dyn Gateway, transcriber: &'a dyn Transcriber) -> Self {
        Self {
            gateway,
            transcriber,
        }
    }

    /// Text passes through untouched; audio and voice are transcribed.
    ///
    /// Any transcription problem is [`Error::RecoverableInput`].
    pub async fn normalize(&self, kind: &MessageKind) -> Result<Normalized> {
        match kind {
            MessageKind::Text { body } => Ok(Normalized::Text(body.clone())),
            MessageKind::Audio(media) | MessageKind::Voice(media) => {
                let transcript = self.transcribe(media).await?;
                Ok(Normalized::Text(format!("{} {}", TRANSCRIPT_PREFIX, transcript)))
            }
            MessageKind::Unsupported(kind) => {
                tracing::debug!(kind = %kind, "Ignoring unsupported message type");
                Ok(Normalized::Skipped)
            }
        }
    }

    async fn transcribe(&self, media: &MediaRef) -> Result<String> {
        let url = self
            .gateway
            .media_url(&media.id)
            .await
            .map_err(|e| Error::RecoverableInput(format!("media lookup failed: {}", e)))?;

        let bytes = self
            .gateway
            .download(&url)
            .await
            .map_err(|e| Error::RecoverableInput(format!("media download failed: {}", e)))?;

        let mime = base_mime_type(media.mime_type.as_deref().unwrap_or(DEFAULT_AUDIO_MIME));

        let transcript = self
            .transcriber
            .transcribe(&bytes, mime)
            .await
            .map_err(|e| Error::RecoverableInput(format!("transcription failed: {}", e)))?;

        let transcript = transcript.trim();
        if transcript.is_empty() || transcript.contains(UNINTELLIGIBLE_SENTINEL) {
            return Err(Error::RecoverableInput("audio was unintelligible".to_string()));
        }

        tracing::debug!(media_id = %media.id, chars = transcript.len(), "Transcribed audio");
        Ok(transcript.to_string())
    }
}
