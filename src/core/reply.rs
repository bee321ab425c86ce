//! Reply generation from business context, history and the current message.

use futures::StreamExt;

use crate::core::history::{Role, Turn};
use crate::error::{Error, Result};
use crate::providers::{ChatTurn, GenerationParams, GenerationRequest, Generator};

pub struct ReplyGenerator<'a> {
    generator: &'a dyn Generator,
    system: &'a str,
    params: GenerationParams,
}

impl<'a> ReplyGenerator<'a> {
    pub fn new(generator: &'a dyn Generator, system: &'a str) -> Self {
        Self {
            generator,
            system,
            params: GenerationParams::default(),
        }
    }

    /// Build the composite request for `text` given prior `history`.
    pub fn build_request(&self, text: &str, history: &[Turn]) -> GenerationRequest {
        let mut turns: Vec<ChatTurn> = history
            .iter()
            .map(|turn| ChatTurn {
                role: turn.role,
                text: turn.text.clone(),
            })
            .collect();
        turns.push(ChatTurn {
            role: Role::User,
            text: text.to_string(),
        });

        GenerationRequest {
            system: self.system.to_string(),
            turns,
            params: self.params,
        }
    }

    /// Stream a reply to completion and return it trimmed.
    ///
    /// Dropping the returned future drops the provider stream with it.
    pub async fn generate(&self, text: &str, history: &[Turn]) -> Result<String> {
        let request = self.build_request(text, history);
        let mut stream = self.generator.stream(request);

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment.map_err(|e| {
                tracing::error!(provider = self.generator.name(), "Generation failed: {}", e);
                Error::GenerationProvider(e.to_string())
            })?;
            reply.push_str(&fragment);
        }

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::EmptyGeneration);
        }

        Ok(reply.to_string())
    }
}
