//! Configuration loading for warelay.
//!
//! Every setting is a global CLI flag backed by an environment variable, so
//! `.env` files, the shell environment and explicit flags all feed the same
//! parser. Required secrets that are missing abort startup with every missing
//! key listed at once.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

const DEFAULT_CAPTION: &str = "¡Hola! Mira nuestras nuevas ofertas 🎉";

/// Raw settings as parsed from flags and environment variables.
#[derive(Args, Clone)]
pub struct SettingsArgs {
    /// Token echoed back during webhook subscription
    #[arg(long, env = "WEBHOOK_VERIFY_TOKEN", hide_env_values = true, global = true)]
    pub verify_token: Option<String>,

    #[arg(long, env = "HOST", default_value = "0.0.0.0", global = true)]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 3000, global = true)]
    pub port: u16,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, global = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash", global = true)]
    pub gemini_model: String,

    #[arg(long, env = "GEMINI_API_VERSION", default_value = "v1beta", global = true)]
    pub gemini_api_version: String,

    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com",
        global = true
    )]
    pub gemini_base_url: String,

    #[arg(long, env = "WHATSAPP_TOKEN", hide_env_values = true, global = true)]
    pub whatsapp_token: Option<String>,

    #[arg(long, env = "WHATSAPP_PHONE_NUMBER_ID", global = true)]
    pub whatsapp_phone_number_id: Option<String>,

    #[arg(long, env = "WHATSAPP_API_VERSION", default_value = "v21.0", global = true)]
    pub whatsapp_api_version: String,

    #[arg(
        long,
        env = "WHATSAPP_BASE_URL",
        default_value = "https://graph.facebook.com",
        global = true
    )]
    pub whatsapp_base_url: String,

    /// Number that receives a copy of every inbound conversation
    #[arg(long = "notify-number", env = "WHATSAPP_NOTIFY_NUMBER", global = true)]
    pub watcher: Option<String>,

    /// Comma-separated operator pool
    #[arg(
        long = "advisor-queue",
        env = "WHATSAPP_ADVISOR_QUEUE",
        value_delimiter = ',',
        global = true
    )]
    pub operators: Vec<String>,

    #[arg(
        long,
        env = "NOTIFY_ON_FALLBACK",
        default_value = "false",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
        global = true
    )]
    pub notify_on_fallback: bool,

    #[arg(long, env = "GOOGLE_DRIVE_FOLDER_ID", global = true)]
    pub drive_folder_id: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    pub google_api_key: Option<String>,

    #[arg(
        long,
        env = "CAMPAIGN_ENABLED",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
        global = true
    )]
    pub campaign_enabled: bool,

    #[arg(long, env = "CAMPAIGN_MESSAGE", default_value = DEFAULT_CAPTION, global = true)]
    pub campaign_message: String,

    #[arg(long, env = "CAMPAIGN_SCHEDULE", default_value = "0 9 * * 1", global = true)]
    pub campaign_schedule: String,

    #[arg(long, env = "CAMPAIGN_MAX_SENDS", default_value_t = 100, global = true)]
    pub campaign_max_sends: u32,

    #[arg(long, env = "CAMPAIGN_DELAY_MS", default_value_t = 2000, global = true)]
    pub campaign_delay_ms: u64,

    #[arg(
        long,
        env = "CAMPAIGN_RECIPIENTS_PATH",
        default_value = "data/prospects.json",
        global = true
    )]
    pub campaign_recipients_path: PathBuf,

    #[arg(long, env = "KNOWLEDGE_PATH", global = true)]
    pub knowledge_path: Option<PathBuf>,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub request_timeout_secs: u64,
}

/// Validate parsed arguments into settings.
pub fn load_settings(args: &SettingsArgs) -> Result<Settings> {
    let settings = Settings::from_args(args)?;
    tracing::debug!("Loaded settings from environment");
    Ok(settings)
}

/// HTTP listener configuration.
#[derive(Clone, Debug)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

/// Text-generation provider configuration.
#[derive(Clone)]
pub struct Gemini {
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub base_url: String,
}

/// Messaging gateway configuration.
#[derive(Clone)]
pub struct WhatsApp {
    pub token: String,
    pub phone_number_id: String,
    pub api_version: String,
    pub base_url: String,
}

/// Who hears about inbound conversations besides the bot.
#[derive(Clone, Debug, Default)]
pub struct Notifications {
    /// Receives a copy of every inbound conversation.
    pub watcher: Option<String>,
    /// Round-robin pool of human operators.
    pub operators: Vec<String>,
    pub notify_on_fallback: bool,
}

/// Batch media campaign configuration.
#[derive(Clone)]
pub struct Campaign {
    pub enabled: bool,
    pub drive_folder_id: String,
    pub google_api_key: String,
    pub caption: String,
    pub schedule: String,
    pub max_sends: u32,
    pub send_delay: Duration,
    pub recipients_path: PathBuf,
}

/// warelay settings.
#[derive(Clone)]
pub struct Settings {
    pub verify_token: String,
    pub server: Server,
    pub gemini: Gemini,
    pub whatsapp: WhatsApp,
    pub notifications: Notifications,
    /// `None` when storage credentials are missing.
    pub campaign: Option<Campaign>,
    pub knowledge_path: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl Settings {
    /// Build settings from parsed arguments, checking required keys.
    pub fn from_args(args: &SettingsArgs) -> Result<Self> {
        let required = [
            ("WEBHOOK_VERIFY_TOKEN", non_blank(&args.verify_token)),
            ("GEMINI_API_KEY", non_blank(&args.gemini_api_key)),
            ("WHATSAPP_TOKEN", non_blank(&args.whatsapp_token)),
            ("WHATSAPP_PHONE_NUMBER_ID", non_blank(&args.whatsapp_phone_number_id)),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }
        let [verify_token, gemini_api_key, whatsapp_token, phone_number_id] =
            required.map(|(_, value)| value.unwrap_or_default());

        let campaign = match (
            non_blank(&args.drive_folder_id),
            non_blank(&args.google_api_key),
        ) {
            (Some(drive_folder_id), Some(google_api_key)) => Some(Campaign {
                enabled: args.campaign_enabled,
                drive_folder_id,
                google_api_key,
                caption: args.campaign_message.clone(),
                schedule: args.campaign_schedule.trim().to_string(),
                max_sends: args.campaign_max_sends,
                send_delay: Duration::from_millis(args.campaign_delay_ms),
                recipients_path: args.campaign_recipients_path.clone(),
            }),
            _ => {
                tracing::warn!(
                    "GOOGLE_DRIVE_FOLDER_ID or GOOGLE_API_KEY not set, campaign subsystem disabled"
                );
                None
            }
        };

        Ok(Self {
            verify_token,
            server: Server {
                host: args.host.trim().to_string(),
                port: args.port,
            },
            gemini: Gemini {
                api_key: gemini_api_key,
                model: args.gemini_model.trim().to_string(),
                api_version: args.gemini_api_version.trim().to_string(),
                base_url: args.gemini_base_url.trim().to_string(),
            },
            whatsapp: WhatsApp {
                token: whatsapp_token,
                phone_number_id,
                api_version: args.whatsapp_api_version.trim().to_string(),
                base_url: args.whatsapp_base_url.trim().to_string(),
            },
            notifications: Notifications {
                watcher: non_blank(&args.watcher),
                operators: args
                    .operators
                    .iter()
                    .map(|op| op.trim())
                    .filter(|op| !op.is_empty())
                    .map(str::to_string)
                    .collect(),
                notify_on_fallback: args.notify_on_fallback,
            },
            campaign,
            knowledge_path: args.knowledge_path.clone(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn redact(secret: &str) -> String {
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", secret.chars().take(2).collect::<String>())
    }
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for WhatsApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsApp")
            .field("token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Campaign")
            .field("enabled", &self.enabled)
            .field("drive_folder_id", &self.drive_folder_id)
            .field("google_api_key", &"[REDACTED]")
            .field("caption", &self.caption)
            .field("schedule", &self.schedule)
            .field("max_sends", &self.max_sends)
            .field("send_delay", &self.send_delay)
            .field("recipients_path", &self.recipients_path)
            .finish()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("verify_token", &redact(&self.verify_token))
            .field("server", &self.server)
            .field("gemini", &self.gemini)
            .field("whatsapp", &self.whatsapp)
            .field("notifications", &self.notifications)
            .field("campaign", &self.campaign)
            .field("knowledge_path", &self.knowledge_path)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
