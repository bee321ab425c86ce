//! WhatsApp Cloud API webhook payload types.
//!
//! Shape: `entry[] -> changes[] -> value { metadata, contacts[], messages[] }`.
//! Every level defaults to empty so partial payloads still deserialize.

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ChangeValue {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    pub phone_number_id: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub audio: Option<MediaRef>,
    #[serde(default)]
    pub voice: Option<MediaRef>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TextBody {
    #[serde(default)]
    pub body: String,
}

/// Opaque gateway media handle.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// What an inbound message carries.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Text { body: String },
    Audio(MediaRef),
    Voice(MediaRef),
    Unsupported(String),
}

impl WebhookMessage {
    pub fn kind(&self) -> MessageKind {
        match (self.message_type.as_str(), &self.text, &self.audio, &self.voice) {
            ("text", Some(text), _, _) => MessageKind::Text {
                body: text.body.clone(),
            },
            ("text", None, _, _) => MessageKind::Text {
                body: String::new(),
            },
            ("audio", _, Some(media), _) => MessageKind::Audio(media.clone()),
            ("voice", _, _, Some(media)) => MessageKind::Voice(media.clone()),
            // Some payloads put voice notes under `audio`.
            ("voice", _, Some(media), None) => MessageKind::Voice(media.clone()),
            (other, ..) => MessageKind::Unsupported(other.to_string()),
        }
    }
}

/// One inbound unit with its sender resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub user_id: String,
    pub display_name: String,
    pub kind: MessageKind,
    /// Business phone number id the message arrived on.
    pub channel_id: Option<String>,
}

impl WebhookPayload {
    /// Flatten the payload into inbound messages, in arrival order.
    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        let mut out = Vec::new();

        for entry in &self.entry {
            for change in &entry.changes {
                let value = &change.value;
                let channel_id = value.metadata.as_ref().map(|m| m.phone_number_id.clone());

                for message in &value.messages {
                    let contact = value
                        .contacts
                        .iter()
                        .find(|c| c.wa_id == message.from)
                        .or_else(|| value.contacts.first());

                    let user_id = contact
                        .map(|c| c.wa_id.clone())
                        .unwrap_or_else(|| message.from.clone());
                    let display_name = contact
                        .and_then(|c| c.profile.as_ref())
                        .map(|p| p.name.clone())
                        .unwrap_or_default();

                    out.push(InboundMessage {
                        user_id,
                        display_name,
                        kind: message.kind(),
                        channel_id: channel_id.clone(),
                    });
                }
            }
        }

        out
    }
}
