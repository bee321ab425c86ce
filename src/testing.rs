//! In-memory collaborators for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::gateway::{self, Gateway, GatewayError};
use crate::providers::{GenerationRequest, Generator, ProviderError, Transcriber};
use crate::storage::{self, AssetStore, MediaAsset, StorageError};

fn api_error(what: &str) -> GatewayError {
    GatewayError::Api {
        status: 500,
        body: format!("{} failed", what),
    }
}

#[derive(Debug, Clone)]
struct TextAttempt {
    to: String,
    body: String,
    channel: Option<String>,
    ok: bool,
}

/// Records every outbound call. Failures are opt-in per recipient.
#[derive(Default)]
pub struct FakeGateway {
    texts: Mutex<Vec<TextAttempt>>,
    images: Mutex<Vec<(String, String, Option<String>)>>,
    image_attempts: Mutex<usize>,
    media_lookups: Mutex<Vec<String>>,
    failing_texts: Mutex<HashSet<String>>,
    failing_images_once: Mutex<HashSet<String>>,
    fail_downloads: Mutex<bool>,
}

impl FakeGateway {
    pub fn fail_text_to(&self, to: &str) {
        self.failing_texts.lock().unwrap().insert(to.to_string());
    }

    pub fn fail_image_once_for(&self, to: &str) {
        self.failing_images_once
            .lock()
            .unwrap()
            .insert(to.to_string());
    }

    pub fn fail_downloads(&self) {
        *self.fail_downloads.lock().unwrap() = true;
    }

    /// Bodies successfully delivered to `to`.
    pub fn texts_to(&self, to: &str) -> Vec<String> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.ok && t.to == to)
            .map(|t| t.body.clone())
            .collect()
    }

    pub fn attempts_to(&self, to: &str) -> usize {
        self.texts.lock().unwrap().iter().filter(|t| t.to == to).count()
    }

    pub fn total_attempts(&self) -> usize {
        self.texts.lock().unwrap().len() + *self.image_attempts.lock().unwrap()
    }

    pub fn channels(&self) -> Vec<Option<String>> {
        self.texts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.channel.clone())
            .collect()
    }

    /// Delivered images as `(to, mime_type, caption)`.
    pub fn images(&self) -> Vec<(String, String, Option<String>)> {
        self.images.lock().unwrap().clone()
    }

    pub fn image_attempts(&self) -> usize {
        *self.image_attempts.lock().unwrap()
    }

    pub fn media_lookups(&self) -> Vec<String> {
        self.media_lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn send_text(&self, channel: Option<&str>, to: &str, body: &str) -> gateway::Result<()> {
        let ok = !self.failing_texts.lock().unwrap().contains(to);
        self.texts.lock().unwrap().push(TextAttempt {
            to: to.to_string(),
            body: body.to_string(),
            channel: channel.map(str::to_string),
            ok,
        });
        if ok {
            Ok(())
        } else {
            Err(api_error("send_text"))
        }
    }

    async fn send_image(
        &self,
        to: &str,
        _bytes: &[u8],
        mime_type: &str,
        caption: Option<&str>,
    ) -> gateway::Result<()> {
        *self.image_attempts.lock().unwrap() += 1;
        if self.failing_images_once.lock().unwrap().remove(to) {
            return Err(api_error("send_image"));
        }
        self.images.lock().unwrap().push((
            to.to_string(),
            mime_type.to_string(),
            caption.map(str::to_string),
        ));
        Ok(())
    }

    async fn media_url(&self, media_id: &str) -> gateway::Result<String> {
        self.media_lookups.lock().unwrap().push(media_id.to_string());
        Ok(format!("https://media.test/{}", media_id))
    }

    async fn download(&self, _url: &str) -> gateway::Result<Vec<u8>> {
        if *self.fail_downloads.lock().unwrap() {
            return Err(api_error("download"));
        }
        Ok(vec![0x4f, 0x67, 0x67, 0x53])
    }
}

/// Replays fixed fragments, optionally ending with an error.
pub struct FakeGenerator {
    fragments: Vec<String>,
    fail_at_end: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    pub fn fragments(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_at_end: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(fragments: &[&str]) -> Self {
        Self {
            fail_at_end: true,
            ..Self::fragments(fragments)
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Generator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    fn stream(
        &self,
        request: GenerationRequest,
    ) -> BoxStream<'_, crate::providers::Result<String>> {
        self.requests.lock().unwrap().push(request);
        let mut items: Vec<crate::providers::Result<String>> =
            self.fragments.iter().cloned().map(Ok).collect();
        if self.fail_at_end {
            items.push(Err(ProviderError::ApiError("429 quota exhausted".to_string())));
        }
        stream::iter(items).boxed()
    }
}

pub struct FakeTranscriber {
    reply: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mime types passed to each call.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8], mime_type: &str) -> crate::providers::Result<String> {
        self.calls.lock().unwrap().push(mime_type.to_string());
        self.reply
            .clone()
            .ok_or_else(|| ProviderError::other("transcription unavailable"))
    }
}

pub struct FakeAssets {
    assets: Vec<MediaAsset>,
    fail_listing: Mutex<bool>,
    panic_listing: Mutex<bool>,
    failing_downloads: Mutex<HashSet<String>>,
    list_calls: Mutex<usize>,
    downloads: Mutex<Vec<String>>,
}

impl FakeAssets {
    pub fn new(assets: Vec<MediaAsset>) -> Self {
        Self {
            assets,
            fail_listing: Mutex::new(false),
            panic_listing: Mutex::new(false),
            failing_downloads: Mutex::new(HashSet::new()),
            list_calls: Mutex::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.lock().unwrap() = true;
    }

    pub fn panic_on_listing(&self) {
        *self.panic_listing.lock().unwrap() = true;
    }

    pub fn fail_download_of(&self, id: &str) {
        self.failing_downloads.lock().unwrap().insert(id.to_string());
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }

    /// Ids requested for download, in order.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for FakeAssets {
    async fn list_assets(&self) -> storage::Result<Vec<MediaAsset>> {
        *self.list_calls.lock().unwrap() += 1;
        if *self.panic_listing.lock().unwrap() {
            panic!("asset listing blew up");
        }
        if *self.fail_listing.lock().unwrap() {
            return Err(StorageError::Api {
                status: 403,
                body: "folder not shared".to_string(),
            });
        }
        Ok(self.assets.clone())
    }

    async fn download(&self, id: &str) -> storage::Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(id.to_string());
        if self.failing_downloads.lock().unwrap().contains(id) {
            return Err(StorageError::Api {
                status: 404,
                body: "gone".to_string(),
            });
        }
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }
}
