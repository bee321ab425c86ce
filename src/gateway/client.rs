//! WhatsApp Cloud API client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Gateway, GatewayError, Result};
use crate::config::WhatsApp;

pub struct WhatsAppClient {
    client: Client,
    base_url: String,
    token: String,
    phone_number_id: String,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    text: TextPayload<'a>,
}

#[derive(Serialize)]
struct TextPayload<'a> {
    preview_url: bool,
    body: &'a str,
}

#[derive(Serialize)]
struct ImageMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    message_type: &'static str,
    image: ImagePayload<'a>,
}

#[derive(Serialize)]
struct ImagePayload<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct MediaInfo {
    url: String,
}

impl WhatsAppClient {
    pub fn new(config: &WhatsApp, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/{}",
                config.base_url.trim_end_matches('/'),
                config.api_version
            ),
            token: config.token.clone(),
            phone_number_id: config.phone_number_id.clone(),
        })
    }

    fn messages_url(&self, channel: Option<&str>) -> String {
        format!(
            "{}/{}/messages",
            self.base_url,
            channel.unwrap_or(&self.phone_number_id)
        )
    }

    /// Upload media bytes and return the gateway's media id.
    pub async fn upload_media(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        let part = Part::bytes(bytes.to_vec())
            .file_name("upload")
            .mime_str(mime_type)?;
        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/{}/media", self.base_url, self.phone_number_id))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = check(response).await?.json().await?;
        tracing::debug!(media_id = %upload.id, "Uploaded media");
        Ok(upload.id)
    }

    /// Send an already-uploaded image.
    pub async fn send_uploaded_image(
        &self,
        to: &str,
        media_id: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let payload = ImageMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "image",
            image: ImagePayload {
                id: media_id,
                caption,
            },
        };

        let response = self
            .client
            .post(self.messages_url(None))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

/// Map non-2xx responses to [`GatewayError::Api`].
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl Gateway for WhatsAppClient {
    async fn send_text(&self, channel: Option<&str>, to: &str, body: &str) -> Result<()> {
        if to.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "missing recipient number".to_string(),
            ));
        }

        let payload = TextMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            message_type: "text",
            text: TextPayload {
                preview_url: false,
                body,
            },
        };

        let response = self
            .client
            .post(self.messages_url(channel))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;

        check(response).await?;
        tracing::debug!(to, "Sent text message");
        Ok(())
    }

    async fn send_image(
        &self,
        to: &str,
        bytes: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> Result<()> {
        let media_id = self.upload_media(bytes, mime_type).await?;
        self.send_uploaded_image(to, &media_id, caption).await
    }

    async fn media_url(&self, media_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, media_id))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let info: MediaInfo = check(response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(format!("media info: {}", e)))?;
        Ok(info.url)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let bytes = check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
