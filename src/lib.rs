//! warelay library root.

pub mod campaign;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod gateway;
pub mod knowledge;
pub mod logging;
pub mod providers;
pub mod storage;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::Commands;
pub use config::{load_settings, Settings, SettingsArgs};
pub use core::{Outcome, Relay};
pub use error::{Error, Result};
