//! s3sync CLI - Incremental directory upload to object storage
//!
//! Provides commands for:
//! - Uploading new and changed files from a directory to a bucket
//! - Counting what an upload would consider
//! - Viewing and validating configuration

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, scan::ScanCommand, upload::UploadCommand, CliContext};
use output::{get_formatter, OutputFormat};
use s3sync_core::config::{Config, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "s3sync",
    version,
    about = "Upload new and changed files from a directory to object storage"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload new and changed files to a bucket
    Upload(UploadCommand),
    /// Count the files and bytes an upload would consider
    Scan(ScanCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Log level from `-v` count, else the configured level
fn log_filter(verbose: u8, logging: &LoggingConfig) -> String {
    match verbose {
        0 => logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::from_json_flag(cli.json);
    let ctx = CliContext {
        config_path: cli.config.clone().unwrap_or_else(Config::default_path),
        format,
        verbose: cli.verbose,
    };

    // A broken config file is reported by the command itself; logging only
    // needs the level.
    let logging = ctx
        .load_config()
        .map(|c| c.logging)
        .unwrap_or_default();

    // Setup tracing (stderr, so stdout carries only command output)
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &logging)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Upload(cmd) => cmd.execute(&ctx).await,
        Commands::Scan(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            get_formatter(format).error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
