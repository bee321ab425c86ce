//! Media asset storage and campaign recipient lists.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

pub mod drive;

pub use drive::DriveStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A downloadable media file.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub mime_type: String,
}

/// Listing and download of campaign media.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn list_assets(&self) -> Result<Vec<MediaAsset>>;

    async fn download(&self, id: &str) -> Result<Vec<u8>>;
}

#[derive(Deserialize)]
struct RecipientFile {
    #[serde(alias = "prospects")]
    recipients: Vec<String>,
}

#[derive(Serialize)]
struct ProspectFile<'a> {
    prospects: &'a BTreeSet<String>,
}

/// "Phone 1 - Value" in a contacts export.
const PHONE_COLUMN: usize = 18;
const PHONE_SEPARATOR: &str = " ::: ";
const MIN_PHONE_DIGITS: usize = 10;

/// Read the recipient phone numbers from a JSON file.
///
/// Accepts `{"recipients": [...]}` or `{"prospects": [...]}`. Blank entries
/// are dropped; duplicates are kept.
pub fn load_recipients(path: &Path) -> crate::Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::CampaignSetup(format!(
            "cannot read recipient list {}: {}",
            path.display(),
            e
        ))
    })?;

    let file: RecipientFile = serde_json::from_str(&content).map_err(|e| {
        crate::Error::CampaignSetup(format!("invalid recipient list {}: {}", path.display(), e))
    })?;

    Ok(file
        .recipients
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect())
}

/// Pull phone numbers out of a contacts CSV export.
///
/// The header row is skipped. A cell may hold several numbers joined by
/// `" ::: "`; each is stripped of `+`, whitespace and `-` and kept only when
/// it is all digits and at least ten long. The result is sorted and unique.
pub fn extract_contacts(csv: &[u8]) -> BTreeSet<String> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(csv);

    let mut phones = BTreeSet::new();
    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(row = row + 1, "Skipping unreadable contact row: {}", e);
                continue;
            }
        };
        let Some(cell) = record.get(PHONE_COLUMN) else {
            continue;
        };
        for raw in cell.trim().split(PHONE_SEPARATOR) {
            let phone: String = raw
                .chars()
                .filter(|c| *c != '+' && *c != '-' && !c.is_whitespace())
                .collect();
            if phone.len() >= MIN_PHONE_DIGITS && phone.chars().all(|c| c.is_ascii_digit()) {
                phones.insert(phone);
            }
        }
    }
    phones
}

/// Merge the numbers from a contacts CSV into the recipient file.
///
/// Existing entries in `out` are kept. Returns the number of recipients
/// written.
pub fn import_contacts(csv_path: &Path, out: &Path) -> crate::Result<usize> {
    let csv = std::fs::read(csv_path).map_err(|e| {
        crate::Error::CampaignSetup(format!("cannot read contacts {}: {}", csv_path.display(), e))
    })?;
    let mut phones = extract_contacts(&csv);
    let extracted = phones.len();

    if out.exists() {
        phones.extend(load_recipients(out)?);
    }

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&ProspectFile { prospects: &phones })?;
    std::fs::write(out, json)?;

    tracing::info!(
        extracted,
        total = phones.len(),
        path = %out.display(),
        "Imported contacts into recipient list"
    );
    Ok(phones.len())
}
