pub mod commands;

use crate::common::Config;
use crate::cli::commands::CommandExecutor;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arb-dispatch")]
#[command(about = "Translate ARB localization files across a pool of workers", long_about = None)]
pub struct Cli {
    /// Path to a config file (default: ./arb-dispatch.toml, then the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Translate a source ARB file into the given languages
    Translate {
        /// Path to the source .arb file
        file: PathBuf,

        /// Comma-separated target language codes
        #[arg(long, short, value_delimiter = ',', required = true)]
        languages: Vec<String>,

        /// Job id (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,

        /// Higher runs first
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        priority: i32,

        /// Give up after this many seconds, abandoning in-flight translations
        #[arg(long)]
        timeout: Option<u64>,

        /// Print the job report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a source ARB file for common problems
    Validate {
        /// Path to the .arb file
        file: PathBuf,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = "arb-dispatch.toml")]
        path: PathBuf,
    },

    /// Print the effective configuration
    Show,
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    let executor = CommandExecutor::new(config);

    match cli.command {
        Commands::Translate {
            file,
            languages,
            job_id,
            priority,
            timeout,
            json,
        } => {
            executor
                .translate(&file, languages, job_id, priority, timeout, json)
                .await?;
        }
        Commands::Validate { file } => {
            executor.validate(&file)?;
        }
        Commands::Config { action } => match action {
            ConfigCommands::Init { path } => executor.config_init(&path)?,
            ConfigCommands::Show => executor.config_show()?,
        },
    }

    Ok(())
}
