//! # devsync
//!
//! Command-line interface for devsync sessions.
//!
//! ## Commands
//!
//! - `context list`: List configured contexts
//! - `context use`: Switch the current context
//! - `context delete`: Delete a context
//! - `status`: Show the current context, session phase and settings
//!
//! ## Example
//!
//! ```bash
//! # See which context is in use
//! devsync context list
//!
//! # Switch, then remove the old one
//! devsync context use staging
//! devsync context delete minikube
//!
//! # Inspect the running session
//! devsync -v status
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{context, status};

/// Command-line interface for devsync sessions.
#[derive(Parser, Debug)]
#[command(name = "devsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for contexts, session state and settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage contexts
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },

    /// Show session status
    Status,
}

#[derive(Subcommand, Debug)]
enum ContextCommand {
    /// Delete a context
    Delete {
        /// Context name
        name: String,
    },

    /// List contexts
    List,

    /// Switch the current context
    Use {
        /// Context name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    if !data_dir.exists() {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .context("Failed to create data directory")?;
        config::set_dir_permissions_0700(&data_dir).await?;
    }

    match cli.command {
        Commands::Context { command } => match command {
            ContextCommand::Delete { name } => context::delete(&data_dir, &name).await?,
            ContextCommand::List => context::list(&data_dir).await?,
            ContextCommand::Use { name } => context::use_context(&data_dir, &name).await?,
        },
        Commands::Status => {
            status::run(&data_dir).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "devsync=debug,devsync_client=debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Get the default data directory for devsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "devsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
