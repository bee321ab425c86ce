//! Scheduled media campaigns.
//!
//! A run lists the media assets, then sends each one to every recipient
//! until the send cap is hit. The scheduler repeats runs on a cron schedule.

pub mod runner;
pub mod scheduler;

pub use runner::{CampaignRunner, CampaignSummary};
pub use scheduler::{schedule_recurring, CampaignSchedule};
