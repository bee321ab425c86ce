//! CLI commands for warelay using clap.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::campaign::{schedule_recurring, CampaignRunner, CampaignSchedule};
use crate::config::{self, load_settings, Settings, SettingsArgs};
use crate::core::Relay;
use crate::gateway::WhatsAppClient;
use crate::knowledge::load_system_instruction;
use crate::logging::LogFormat;
use crate::storage::{import_contacts, DriveStore};
use crate::web::{run_server, AppState, WebServerConfig};

/// warelay - WhatsApp relay with generated replies and media campaigns.
#[derive(Parser)]
#[command(name = "warelay")]
#[command(version)]
#[command(about = "WhatsApp conversational relay", long_about = None)]
pub struct Commands {
    /// Log file format
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Text,
        global = true
    )]
    pub log_format: LogFormat,

    /// Log file directory (defaults to the platform data directory)
    #[arg(long, env = "LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the webhook server (and the campaign schedule when configured)
    Serve,

    /// Campaign commands
    #[command(subcommand)]
    Campaign(CampaignCommand),

    /// Validate configuration and print it with secrets redacted
    Check,
}

#[derive(Subcommand)]
pub enum CampaignCommand {
    /// Run the campaign once now
    Run,

    /// Show upcoming scheduled runs
    Next {
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },

    /// Merge phone numbers from a contacts CSV export into the recipient list
    ImportContacts {
        /// Contacts CSV export
        csv: PathBuf,

        /// Recipient file to update (defaults to CAMPAIGN_RECIPIENTS_PATH)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Serve => cmd_serve(&self.settings).await,
            Command::Campaign(cmd) => cmd_campaign(&self.settings, cmd).await,
            Command::Check => cmd_check(&self.settings).await,
        }
    }
}

// Command implementations

async fn cmd_serve(args: &SettingsArgs) -> Result<()> {
    let settings = load_settings(args)?;

    let system = load_system_instruction(settings.knowledge_path.as_deref())?;
    let relay = Arc::new(Relay::from_settings(&settings, system)?);

    let scheduler = match settings.campaign.as_ref() {
        Some(campaign) if campaign.enabled => {
            let schedule = CampaignSchedule::parse(&campaign.schedule)?;
            let runner = build_runner(&settings, campaign)?;
            Some(schedule_recurring(runner, schedule))
        }
        Some(_) => {
            tracing::info!("Campaign disabled by CAMPAIGN_ENABLED");
            None
        }
        None => None,
    };

    let state = AppState::new(relay, &settings.verify_token);
    let result = run_server(WebServerConfig::from(&settings.server), state).await;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    result?;
    Ok(())
}

async fn cmd_campaign(args: &SettingsArgs, cmd: &CampaignCommand) -> Result<()> {
    match cmd {
        CampaignCommand::Run => {
            let settings = load_settings(args)?;
            let campaign = require_campaign(&settings)?;
            if !campaign.enabled {
                println!("Note: CAMPAIGN_ENABLED is false; running manually anyway.");
            }
            let runner = build_runner(&settings, campaign)?;
            let summary = runner.run_campaign().await?;
            println!("Campaign run {}", summary.run_id);
            println!("  sent:   {}", summary.sent);
            println!("  errors: {}", summary.errors);
        }
        CampaignCommand::Next { count } => {
            let settings = load_settings(args)?;
            let campaign = require_campaign(&settings)?;
            let schedule = CampaignSchedule::parse(&campaign.schedule)?;
            println!("Schedule: {} ({})", campaign.schedule, schedule.expression);
            for next in schedule.upcoming(*count) {
                println!("  {}", next.format("%a %Y-%m-%d %H:%M %Z"));
            }
        }
        // Only touches local files, so no credentials are needed
        CampaignCommand::ImportContacts { csv, output } => {
            let out = output.as_ref().unwrap_or(&args.campaign_recipients_path);
            let total = import_contacts(csv, out)?;
            println!("Imported contacts: {} unique recipients in {}", total, out.display());
        }
    }
    Ok(())
}

fn require_campaign(settings: &Settings) -> Result<&config::Campaign> {
    settings.campaign.as_ref().ok_or_else(|| {
        anyhow!("Campaign not configured: set GOOGLE_DRIVE_FOLDER_ID and GOOGLE_API_KEY")
    })
}

async fn cmd_check(args: &SettingsArgs) -> Result<()> {
    let settings = load_settings(args)?;
    println!("{:#?}", settings);

    load_system_instruction(settings.knowledge_path.as_deref())?;
    if let Some(campaign) = &settings.campaign {
        CampaignSchedule::parse(&campaign.schedule)?;
        let recipients = crate::storage::load_recipients(&campaign.recipients_path);
        match recipients {
            Ok(list) => println!("Recipients: {}", list.len()),
            Err(e) => println!("Warning: {}", e),
        }
    }

    println!("Configuration OK");
    Ok(())
}

fn build_runner(settings: &Settings, campaign: &config::Campaign) -> Result<Arc<CampaignRunner>> {
    let gateway = WhatsAppClient::new(&settings.whatsapp, settings.request_timeout)?;
    let assets = DriveStore::new(campaign, settings.request_timeout)?;
    Ok(Arc::new(CampaignRunner::new(
        Arc::new(gateway),
        Arc::new(assets),
        campaign,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn global_settings_follow_the_subcommand() {
        let cli = Commands::try_parse_from(["warelay", "serve", "--port", "8080"]).unwrap();
        assert!(matches!(cli.command, Command::Serve));
        assert_eq!(cli.settings.port, 8080);

        let cli = Commands::try_parse_from(["warelay", "check", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[tokio::test]
    async fn import_contacts_runs_without_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("contacts.csv");
        let row = format!("Ana{}Mobile,+52 1 555-123-4567", ",".repeat(17));
        std::fs::write(&csv, format!("header\n{}\n", row)).unwrap();
        let out = dir.path().join("prospects.json");

        let cli = Commands::try_parse_from([
            OsStr::new("warelay"),
            OsStr::new("campaign"),
            OsStr::new("import-contacts"),
            csv.as_os_str(),
            OsStr::new("--output"),
            out.as_os_str(),
        ])
        .unwrap();
        cli.run().await.unwrap();

        let recipients = crate::storage::load_recipients(&out).unwrap();
        assert_eq!(recipients, vec!["5215551234567"]);
    }
}
