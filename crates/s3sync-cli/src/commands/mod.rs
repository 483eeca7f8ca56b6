//! Subcommands of the `s3sync` binary

pub mod config;
pub mod scan;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use s3sync_core::config::Config;

use crate::output::OutputFormat;

/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct CliContext {
    pub config_path: PathBuf,
    pub format: OutputFormat,
    pub verbose: u8,
}

impl CliContext {
    /// Load the configuration, falling back to defaults if the file is absent
    pub fn load_config(&self) -> Result<Config> {
        Config::load_or_default(&self.config_path).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }

    /// Load the configuration and refuse to continue if it is invalid
    pub fn load_valid_config(&self) -> Result<Config> {
        let config = self.load_config()?;
        let errors = config.validate();
        if !errors.is_empty() {
            let list: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!(
                "Invalid configuration in {}: {}",
                self.config_path.display(),
                list.join("; ")
            );
        }
        Ok(config)
    }
}

/// Cancel `token` on Ctrl+C (or SIGTERM on unix)
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}
