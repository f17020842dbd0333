//! `mspace` command line: send a batch or look up a delivery report.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;

use mspace::config::{Config, load_config_from_path};
use mspace::{BatchRequest, DeliveryReportRequest, Dispatcher, MessageId, SqliteStore};

/// Outbound SMS delivery through the Mspace gateway.
#[derive(Parser, Debug)]
#[command(name = "mspace", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./mspace.toml when present).
    #[arg(long, global = true, env = "MSPACE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send one message to a batch of recipients and bill the user once.
    Send {
        /// Account charged for successful messages.
        #[arg(long)]
        user_id: String,
        /// JSON batch request `{recipients, message, senderId?, campaignId?}`; `-` reads stdin.
        #[arg(long, default_value = "-")]
        request: PathBuf,
    },
    /// Fetch the delivery report for a gateway message id.
    Report {
        message_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mspace: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => load_config_from_path(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    debug!(base_url = %config.provider.base_url, "configuration loaded");

    match cli.command {
        Commands::Send { user_id, request } => send(&config, &user_id, &request).await,
        Commands::Report { message_id } => report(&config, message_id).await,
    }
}

async fn send(config: &Config, user_id: &str, request: &Path) -> Result<(), Box<dyn Error>> {
    let body = if request.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin())?
    } else {
        std::fs::read_to_string(request)?
    };
    let request: BatchRequest = serde_json::from_str(&body)?;

    let store = Arc::new(SqliteStore::open(&config.storage.database_path).await?);
    let dispatcher = Dispatcher::from_config(config, store)?;
    let response = dispatcher.send_batch(user_id, request).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    eprintln!("{} message(s) sent", response.summary.successful);
    eprintln!("{} message(s) failed", response.summary.failed);
    Ok(())
}

async fn report(config: &Config, message_id: String) -> Result<(), Box<dyn Error>> {
    let client = config.client()?;
    let request = DeliveryReportRequest::new(MessageId::new(message_id)?);
    let report = client.delivery_report(&request).await?;
    println!("{}", serde_json::to_string_pretty(&report.raw)?);
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mspace=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
