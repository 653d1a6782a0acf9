//! autoupdated - Steam Deck auto-update plugin back-end
//!
//! Serves the plugin's RPC methods over a Unix socket and runs scheduled
//! loader update checks. One-shot subcommands run single operations.

use anyhow::{Context, Result};
use autoupdate_common::{DeckyPaths, VERSION};
use autoupdated::state::{PluginState, SharedState};
use autoupdated::{logging, rpc_server, scheduler};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "autoupdated")]
#[command(about = "Steam Deck auto-update plugin back-end", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Socket path (default: $DECKY_PLUGIN_RUNTIME_DIR/autoupdated.sock)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default)
    Serve,

    /// Print battery level and charging state
    Battery,

    /// Check for and install a newer loader once
    UpdateLoader,

    /// Check for and stage an OS update once
    RpmOstreeUpdate,

    /// Read or change the plugin configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the merged configuration
    Get,

    /// Store a value (parsed as JSON, plain string otherwise)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = DeckyPaths::from_env();
    let _log_guard = logging::init(cli.verbose, &paths.log_dir);

    let state = PluginState::from_paths(paths)?.into_shared();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let socket = cli.socket.unwrap_or_else(|| state.paths.socket_path());
            serve(state, socket).await?;
        }
        Commands::Battery => {
            let status = state.battery.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::UpdateLoader => {
            let result = state.run_loader_update().await;
            println!("{}", result);
        }
        Commands::RpmOstreeUpdate => {
            let result = state.run_os_update().await;
            println!("{}", result);
        }
        Commands::Config { action } => match action {
            ConfigAction::Get => {
                let config = state.config.read().await.get_config();
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Set { key, value } => {
                let value = serde_json::from_str::<Value>(&value).unwrap_or(Value::String(value));
                state
                    .config
                    .write()
                    .await
                    .set_config(&key, value)
                    .with_context(|| format!("Failed to set '{}'", key))?;
            }
        },
    }

    Ok(())
}

async fn serve(state: SharedState, socket: PathBuf) -> Result<()> {
    info!("autoupdated v{} starting", VERSION);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler::run_scheduler(
        SharedState::clone(&state),
        shutdown_rx,
    ));

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    };

    rpc_server::serve(state, &socket, shutdown).await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler_task.await;
    info!("Shutting down gracefully");
    Ok(())
}
