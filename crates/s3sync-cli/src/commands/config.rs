//! Config command - View and validate s3sync configuration
//!
//! Provides the `s3sync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use s3sync_core::config::Config;

use super::CliContext;
use crate::output::get_formatter;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_config()?;
        let path = &ctx.config_path;

        info!(config_path = %path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            let source = if path.exists() { "" } else { ", defaults" };
            formatter.success(&format!("Configuration ({}{source})", path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    /// Fails (non-zero exit) when the file is unreadable or invalid
    fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let path = &ctx.config_path;
        let json = ctx.format.is_json();

        if !path.exists() {
            if json {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": path.display().to_string(),
                    "defaults": true,
                    "errors": [],
                }));
            } else {
                formatter.success("No configuration file; defaults are valid");
                formatter.info(&format!("Expected at {}", path.display()));
            }
            return Ok(());
        }

        let config = match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                if json {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {e}")],
                    }));
                }
                anyhow::bail!("Failed to parse configuration {}: {e}", path.display());
            }
        };

        info!(config_path = %path.display(), "Validating configuration");
        let errors = config.validate();

        if json {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        } else {
            formatter.info(&format!("File: {}", path.display()));
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration has {} error{}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }
}
