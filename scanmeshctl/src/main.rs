//! `scanmeshctl`: operator access to the scanmesh coordination store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scanmesh_config::ConfigLoader;
use scanmesh_model::{GroupScope, Phase};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod connect;

#[derive(Parser)]
#[command(name = "scanmeshctl", about = "Inspect and steer scanmesh scan groups")]
struct Cli {
    /// Path to scanmesh.toml (defaults to ./scanmesh.toml or $SCANMESH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct ScopeArgs {
    #[arg(long)]
    org: i32,
    #[arg(long)]
    group: i32,
}

impl ScopeArgs {
    pub fn scope(self) -> GroupScope {
        GroupScope::new(self.org, self.group)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Scan group configuration and run status
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Address work queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Admission leases
    Lease {
        #[command(subcommand)]
        action: LeaseAction,
    },
    /// Print configuration change notifications until interrupted
    Watch,
}

#[derive(Subcommand)]
pub enum GroupAction {
    /// Print the stored configuration as JSON
    Show {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Skip the per-module settings
        #[arg(long)]
        no_modules: bool,
    },
    Status {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    Start {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    Stop {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Remove every key belonging to the group
    Delete {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Required; deletion cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// Pending and known address counts
    Stats {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Remove up to `limit` addresses from the queue and print them
    Pop {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum LeaseAction {
    /// Report whether a phase lease is currently held for a zone
    Check {
        #[command(flatten)]
        scope: ScopeArgs,
        /// One of ns, brute, mutate, web, bigdata, port
        #[arg(long)]
        phase: Phase,
        #[arg(long)]
        zone: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = cli.env_file {
        loader = loader.with_env_file(path);
    }
    let load = loader.load().context("failed to load configuration")?;
    for warning in &load.warnings.items {
        warn!(hint = %warning.hint, "{}", warning.message);
    }

    let client = connect::connect_with_backoff(&load.config).await?;

    match cli.command {
        Command::Group { action } => commands::group::run(&client, action).await,
        Command::Queue { action } => commands::queue::run(&client, action).await,
        Command::Lease { action } => commands::lease::run(&client, action).await,
        Command::Watch => commands::watch::run(&client).await,
    }
}
