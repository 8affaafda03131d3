//! cxl-fabricmgrd - CXL Fabric Manager
//!
//! Command line front end for [`FabricController`].

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use cxl_fabricmgrd::{DaemonConfig, FabricController, DEFAULT_CONFIG_PATH};

/// CXL fabric manager for the reference fabric simulator
#[derive(Parser, Debug)]
#[command(name = "cxl-fabricmgrd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one port, or every port
    Ports {
        /// Port (resource block) id
        id: Option<String>,
    },
    /// Show one switch, or every switch
    Switches {
        /// Switch id
        id: Option<String>,
    },
    /// Link a device port to a host port
    Connect {
        /// Host port id
        host: String,
        /// Device port id
        device: String,
    },
    /// Unlink a device port from a host port
    Disconnect {
        /// Host port id
        host: String,
        /// Device port id
        device: String,
    },
}

/// Initializes tracing/logging subsystem
fn init_logging(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{text}");
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = DaemonConfig::load_or_default(&args.config)?;
    init_logging(config.logging.max_level()?)?;

    info!(config = %args.config.display(), "--- Starting cxl-fabricmgrd ---");
    let controller = FabricController::new(config.service);

    match args.command {
        Command::Ports { id } => {
            let response = controller.get_port_info(id.as_deref()).await?;
            print_json(&response)?;
        }
        Command::Switches { id } => {
            let response = controller.get_switch_info(id.as_deref()).await?;
            print_json(&response)?;
        }
        Command::Connect { host, device } => controller.connect(&host, &device).await?,
        Command::Disconnect { host, device } => controller.disconnect(&host, &device).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("cxl-fabricmgrd: {e:#}");
            ExitCode::FAILURE
        }
    }
}
