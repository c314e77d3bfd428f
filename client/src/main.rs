//! MR600 command-line client
//!
//! One-shot SMS operations against the router; prints JSON on stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mr600_client::config::BridgeConfig;
use mr600_client::SessionClient;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// MR600 client - SMS over the router web interface
#[derive(Parser, Debug)]
#[command(name = "mr600")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Run in verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List received messages
    Inbox {
        /// Only messages with this unread flag
        #[arg(long)]
        unread: Option<bool>,
    },

    /// List sent messages
    Outbox,

    /// Send a message
    Send {
        /// Recipient phone number
        to: String,
        content: String,

        /// Query the router for the delivery result after submitting
        #[arg(long)]
        wait: bool,
    },

    /// Mark the n-th inbox message as read
    MarkRead { order: u32 },

    /// Delete the n-th inbox message
    DeleteInbox { order: u32 },

    /// Delete the n-th outbox message
    DeleteOutbox { order: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("MR600 client v{}", env!("CARGO_PKG_VERSION"));

    let config = BridgeConfig::load(&args.config).await?;
    info!("Loaded configuration from {}", args.config);

    let client = SessionClient::with_http(config.session_config(), config.transport_config())?;

    let outcome = run(&client, args.command).await;

    if let Err(e) = client.disconnect().await {
        warn!("Logout failed: {}", e);
    }

    outcome
}

async fn run(client: &SessionClient, command: Commands) -> Result<()> {
    let sms = client.sms();

    match command {
        Commands::Inbox { unread } => print_json(&sms.inbox(unread).await?),
        Commands::Outbox => print_json(&sms.outbox().await?),
        Commands::Send { to, content, wait } => {
            sms.send(&to, &content).await?;
            if wait {
                print_json(&sms.send_status().await?)
            } else {
                print_json(&serde_json::json!({ "accepted": true }))
            }
        }
        Commands::MarkRead { order } => {
            sms.mark_read(order).await?;
            print_json(&serde_json::json!({ "order": order, "unread": false }))
        }
        Commands::DeleteInbox { order } => {
            sms.delete_inbox(order).await?;
            print_json(&serde_json::json!({ "deleted": order }))
        }
        Commands::DeleteOutbox { order } => {
            sms.delete_outbox(order).await?;
            print_json(&serde_json::json!({ "deleted": order }))
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
