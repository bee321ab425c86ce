//! Per-message delivery pipeline.
//!
//! Normalize input, load history, generate a reply, deliver it, record both
//! turns, then notify the watcher and the next operator. Failures end the
//! pipeline for that message only and never reach the webhook transport:
//!
//! - input that cannot be transcribed gets an apology, nothing else happens
//! - generation or delivery failure gets a best-effort fallback message
//! - notification failures are logged and ignored

use std::sync::Arc;

use tracing::Instrument;

use crate::config::Settings;
use crate::core::history::{HistoryStore, Role, Turn};
use crate::core::normalize::{MediaNormalizer, Normalized};
use crate::core::reply::ReplyGenerator;
use crate::core::rotation::OperatorRotation;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, InboundMessage, MessageKind, WebhookPayload, WhatsAppClient};
use crate::providers::{GeminiProvider, Generator, Transcriber};

pub const APOLOGY_MESSAGE: &str =
    "Lo siento, no pude entender tu mensaje de voz. ¿Podrías escribirlo por texto, por favor?";

pub const FALLBACK_MESSAGE: &str =
    "En este momento no puedo responder. Un asesor humano dará seguimiento en breve.";

pub const RESET_MESSAGE: &str = "Listo, empecemos de nuevo. ¿En qué te puedo ayudar?";

const RESET_COMMANDS: &[&str] = &["/reset", "/clear"];

/// How one inbound message ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Reply delivered and recorded.
    Replied(String),
    /// Input could not be transcribed; user asked to write instead.
    Apologized,
    /// Generation or delivery failed; fallback message attempted.
    FellBack,
    /// User asked to start over.
    Reset,
    /// Message type not handled.
    Skipped,
}

/// Shared state for every inbound message: history, rotation, collaborators.
pub struct Relay {
    history: HistoryStore,
    rotation: OperatorRotation,
    gateway: Arc<dyn Gateway>,
    generator: Arc<dyn Generator>,
    transcriber: Arc<dyn Transcriber>,
    system: String,
    watcher: Option<String>,
    notify_on_fallback: bool,
}

impl Relay {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        generator: Arc<dyn Generator>,
        transcriber: Arc<dyn Transcriber>,
        system: impl Into<String>,
    ) -> Self {
        Self {
            history: HistoryStore::new(),
            rotation: OperatorRotation::new(Vec::new()),
            gateway,
            generator,
            transcriber,
            system: system.into(),
            watcher: None,
            notify_on_fallback: false,
        }
    }

    /// Wire the WhatsApp and Gemini clients from settings.
    pub fn from_settings(settings: &Settings, system: String) -> Result<Self> {
        let gateway = WhatsAppClient::new(&settings.whatsapp, settings.request_timeout)
            .map_err(|e| Error::Config(format!("gateway client: {}", e)))?;
        let gemini = Arc::new(
            GeminiProvider::new(&settings.gemini, settings.request_timeout)
                .map_err(|e| Error::Config(format!("generation client: {}", e)))?,
        );

        let notifications = &settings.notifications;
        Ok(Self::new(Arc::new(gateway), gemini.clone(), gemini, system)
            .with_watcher(notifications.watcher.clone())
            .with_operators(notifications.operators.clone())
            .with_notify_on_fallback(notifications.notify_on_fallback))
    }

    pub fn with_watcher(mut self, watcher: Option<String>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn with_operators(mut self, operators: Vec<String>) -> Self {
        self.rotation = OperatorRotation::new(operators);
        self
    }

    pub fn with_notify_on_fallback(mut self, enabled: bool) -> Self {
        self.notify_on_fallback = enabled;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Handle every message in a webhook payload, in order.
    pub async fn process_payload(&self, payload: &WebhookPayload) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for message in payload.inbound_messages() {
            outcomes.push(self.handle(&message).await);
        }
        outcomes
    }

    /// Run the pipeline for one inbound message. Never fails.
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        let span = tracing::info_span!("inbound", user_id = %msg.user_id);
        self.handle_inner(msg).instrument(span).await
    }

    async fn handle_inner(&self, msg: &InboundMessage) -> Outcome {
        if let MessageKind::Unsupported(kind) = &msg.kind {
            tracing::debug!(kind = %kind, "Skipping unsupported message");
            return Outcome::Skipped;
        }

        if let MessageKind::Text { body } = &msg.kind {
            if RESET_COMMANDS.contains(&body.trim().to_lowercase().as_str()) {
                self.history.clear_history(&msg.user_id);
                self.send_best_effort(msg, RESET_MESSAGE).await;
                tracing::info!("Conversation reset by user");
                return Outcome::Reset;
            }
        }

        let normalizer = MediaNormalizer::new(self.gateway.as_ref(), self.transcriber.as_ref());
        let text = match normalizer.normalize(&msg.kind).await {
            Ok(Normalized::Text(text)) => text,
            Ok(Normalized::Skipped) => return Outcome::Skipped,
            Err(e) => {
                tracing::warn!("Could not normalize input: {}", e);
                self.send_best_effort(msg, APOLOGY_MESSAGE).await;
                return Outcome::Apologized;
            }
        };

        let history = self.history.get_history(&msg.user_id);

        let reply = match self.reply(msg, &text, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Reply pipeline failed: {}", e);
                self.send_best_effort(msg, FALLBACK_MESSAGE).await;
                if self.notify_on_fallback {
                    self.notify(msg, &text).await;
                }
                return Outcome::FellBack;
            }
        };

        self.history.add_turn(&msg.user_id, Role::User, &text);
        self.history.add_turn(&msg.user_id, Role::Model, &reply);
        tracing::info!(chars = reply.len(), "Reply delivered");

        self.notify(msg, &text).await;

        Outcome::Replied(reply)
    }

    /// Generate and deliver a reply.
    async fn reply(
        &self,
        msg: &InboundMessage,
        text: &str,
        history: &[Turn],
    ) -> Result<String> {
        let reply = ReplyGenerator::new(self.generator.as_ref(), &self.system)
            .generate(text, history)
            .await?;

        self.gateway
            .send_text(msg.channel_id.as_deref(), &msg.user_id, &reply)
            .await
            .map_err(|e| Error::Delivery(e.to_string()))?;

        Ok(reply)
    }

    /// Send to the user; failures are logged and dropped.
    async fn send_best_effort(&self, msg: &InboundMessage, body: &str) {
        if let Err(e) = self
            .gateway
            .send_text(msg.channel_id.as_deref(), &msg.user_id, body)
            .await
        {
            tracing::warn!("{}", Error::Delivery(e.to_string()));
        }
    }

    /// Notify the watcher and the next operator. The two sends are independent.
    async fn notify(&self, msg: &InboundMessage, text: &str) {
        let watcher = async {
            if let Some(watcher) = self.watcher.as_deref() {
                let body = format_notification("Chatbot Msg", msg, text);
                self.send_notification(msg, watcher, &body).await;
            }
        };

        let operator = async {
            if let Some(operator) = self.rotation.next() {
                tracing::info!(operator, "Assigned operator");
                let body = format_notification("Asignación Chatbot", msg, text);
                self.send_notification(msg, operator, &body).await;
            }
        };

        futures::join!(watcher, operator);
    }

    async fn send_notification(&self, msg: &InboundMessage, to: &str, body: &str) {
        if let Err(e) = self
            .gateway
            .send_text(msg.channel_id.as_deref(), to, body)
            .await
        {
            tracing::warn!(to, "{}", Error::Notification(e.to_string()));
        }
    }
}

fn format_notification(title: &str, msg: &InboundMessage, text: &str) -> String {
    format!(
        "{}:\nCliente: {}\nTel: {}\nMsg: {}",
        title, msg.display_name, msg.user_id, text
    )
}
