//! warelay - WhatsApp conversational relay.

use clap::Parser;
use std::process::ExitCode;

use warelay::{logging, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Pick up a local .env before anything reads the environment
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Commands::parse();

    // Initialize logging; the guard flushes the log file on exit
    let _guard = match logging::init(args.log_format, args.log_dir.as_deref()) {
        Ok((guard, _log_dir)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the command
    match args.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
