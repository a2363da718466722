//! Binary entry point for entitygraph.
//!
//! This binary provides the CLI interface for managing entity kinds,
//! entities and their super/sub relationships in a `SQLite` database.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    EntityAction, KindAction, OutputFormat, cmd_config, cmd_entity, cmd_kind, cmd_link, cmd_stats,
    cmd_unlink, open_service,
};
use entitygraph::config::{ENV_CONFIG_PATH, EntityGraphConfig};
use entitygraph::observability::{self, ObservabilityConfig, ObservabilityHandle};
use std::process::ExitCode;

/// Entitygraph - activatable entities with super/sub relationship queries.
#[derive(Parser)]
#[command(name = "entitygraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Manage entity kinds.
    Kind {
        #[command(subcommand)]
        action: KindAction,
    },

    /// Manage and query entities.
    Entity {
        #[command(subcommand)]
        action: EntityAction,
    },

    /// Make one entity subordinate to another.
    Link {
        /// Sub entity id.
        sub: i64,

        /// Super entity id.
        #[arg(value_name = "SUPER")]
        sup: i64,
    },

    /// Remove every relationship from one entity to another.
    Unlink {
        /// Sub entity id.
        sub: i64,

        /// Super entity id.
        #[arg(value_name = "SUPER")]
        sup: i64,
    },

    /// Show graph statistics.
    Stats {
        /// Also print collected Prometheus metrics.
        #[arg(long)]
        metrics: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show the effective configuration.
    Config,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let mut observability_config = ObservabilityConfig::from_config(&config, cli.verbose);
    if matches!(cli.command, Commands::Stats { metrics: true, .. }) {
        observability_config.metrics.enabled = true;
    }
    let observability = match observability::init(observability_config) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, &config, &observability) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run_command(
    cli: Cli,
    config: &EntityGraphConfig,
    observability: &ObservabilityHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(cli.command, Commands::Config) {
        return cmd_config(config, cli.verbose);
    }

    let service = open_service(config)?;
    match cli.command {
        Commands::Kind { action } => cmd_kind(&service, action),
        Commands::Entity { action } => cmd_entity(&service, action),
        Commands::Link { sub, sup } => cmd_link(&service, sub, sup),
        Commands::Unlink { sub, sup } => cmd_unlink(&service, sub, sup),
        Commands::Stats { metrics, format } => cmd_stats(&service, observability, metrics, format),
        Commands::Config => cmd_config(config, cli.verbose),
    }
}

/// Loads configuration from `--config`, `ENTITYGRAPH_CONFIG_PATH`, or the
/// default location, then applies environment overrides.
fn load_config(path: Option<&str>) -> Result<EntityGraphConfig, Box<dyn std::error::Error>> {
    let config = if let Some(config_path) = path {
        EntityGraphConfig::load_from_file(std::path::Path::new(config_path))?
    } else {
        match std::env::var(ENV_CONFIG_PATH) {
            Ok(config_path) if !config_path.trim().is_empty() => {
                EntityGraphConfig::load_from_file(std::path::Path::new(&config_path))?
            },
            _ => EntityGraphConfig::load_default(),
        }
    };
    Ok(config.with_env_overrides())
}
