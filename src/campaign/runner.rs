//! One campaign run: every asset to every recipient, up to a send cap.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;
use uuid::Uuid;

use crate::config::Campaign as CampaignConfig;
use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::storage::{load_recipients, AssetStore};

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSummary {
    pub run_id: Uuid,
    pub sent: u32,
    pub errors: u32,
}

impl CampaignSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            sent: 0,
            errors: 0,
        }
    }
}

pub struct CampaignRunner {
    gateway: Arc<dyn Gateway>,
    assets: Arc<dyn AssetStore>,
    recipients_path: PathBuf,
    caption: String,
    max_sends: u32,
    send_delay: Duration,
}

impl CampaignRunner {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        assets: Arc<dyn AssetStore>,
        config: &CampaignConfig,
    ) -> Self {
        Self {
            gateway,
            assets,
            recipients_path: config.recipients_path.clone(),
            caption: config.caption.clone(),
            max_sends: config.max_sends,
            send_delay: config.send_delay,
        }
    }

    /// Run the campaign once.
    ///
    /// Loading recipients or listing assets fails the whole run. After that,
    /// individual failures are counted and the run carries on. Progress is
    /// not persisted; a repeated run starts from zero.
    pub async fn run_campaign(&self) -> Result<CampaignSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("campaign", %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<CampaignSummary> {
        let mut summary = CampaignSummary::new(run_id);
        tracing::info!("Starting campaign run");

        let recipients = load_recipients(&self.recipients_path)?;
        if recipients.is_empty() {
            tracing::warn!(
                path = %self.recipients_path.display(),
                "No recipients, nothing to send"
            );
            return Ok(summary);
        }

        let assets = self
            .assets
            .list_assets()
            .await
            .map_err(|e| Error::CampaignSetup(format!("cannot list assets: {}", e)))?;
        if assets.is_empty() {
            tracing::warn!("No media assets, nothing to send");
            return Ok(summary);
        }

        tracing::info!(
            recipients = recipients.len(),
            assets = assets.len(),
            cap = self.max_sends,
            "Campaign targets loaded"
        );
        let total = recipients.len() * assets.len();

        'assets: for asset in &assets {
            if summary.sent >= self.max_sends {
                tracing::warn!(cap = self.max_sends, "Send cap reached");
                break;
            }

            let bytes = match self.assets.download(&asset.id).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    summary.errors += 1;
                    tracing::error!(asset = %asset.name, "Skipping asset: {}", e);
                    continue;
                }
            };

            for recipient in &recipients {
                if summary.sent >= self.max_sends {
                    tracing::warn!(cap = self.max_sends, "Send cap reached");
                    break 'assets;
                }

                match self
                    .gateway
                    .send_image(recipient, &bytes, &asset.mime_type, Some(&self.caption))
                    .await
                {
                    Ok(()) => {
                        summary.sent += 1;
                        tracing::info!(
                            asset = %asset.name,
                            recipient = %recipient,
                            "Sent {}/{}",
                            summary.sent,
                            total
                        );

                        if summary.sent < self.max_sends && !self.send_delay.is_zero() {
                            tokio::time::sleep(self.send_delay).await;
                        }
                    }
                    Err(e) => {
                        summary.errors += 1;
                        let err = Error::CampaignItem(e.to_string());
                        tracing::error!(asset = %asset.name, recipient = %recipient, "{}", err);
                    }
                }
            }
        }

        tracing::info!(sent = summary.sent, errors = summary.errors, "Campaign run finished");
        Ok(summary)
    }
}
