//! Google Drive folder as a campaign asset store.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

use super::{AssetStore, MediaAsset, Result, StorageError};
use crate::config::Campaign;

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const PAGE_SIZE: u32 = 50;

pub struct DriveStore {
    client: Client,
    base_url: String,
    folder_id: String,
    api_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<MediaAsset>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl DriveStore {
    pub fn new(config: &Campaign, timeout: Duration) -> Result<Self> {
        Self::with_base_url(DRIVE_API, config, timeout)
    }

    pub fn with_base_url(base_url: &str, config: &Campaign, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            folder_id: config.drive_folder_id.clone(),
            api_key: config.google_api_key.clone(),
        })
    }

    fn image_query(&self) -> String {
        format!("'{}' in parents and (mimeType contains 'image/')", self.folder_id)
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl AssetStore for DriveStore {
    async fn list_assets(&self) -> Result<Vec<MediaAsset>> {
        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;
        let query = self.image_query();
        let page_size = PAGE_SIZE.to_string();

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", "nextPageToken, files(id, name, mimeType)"),
                ("pageSize", page_size.as_str()),
                ("key", self.api_key.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let response = self
                .client
                .get(format!("{}/files", self.base_url))
                .query(&params)
                .send()
                .await?;
            let page: FileList = check(response).await?.json().await?;

            assets.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::info!(folder = %self.folder_id, count = assets.len(), "Listed campaign assets");
        Ok(assets)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.base_url, id))
            .query(&[("alt", "media"), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let bytes = check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}
