//! Scan command - Pre-flight count of a directory
//!
//! `s3sync scan <DIR>` walks the directory with the same exclusion rules as
//! `upload` and reports how many files and bytes an upload would consider.
//! The manifest file is left out, as it is by `upload`.
//! Nothing is hashed, uploaded or recorded.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use s3sync_core::domain::newtypes::KeyPrefix;
use s3sync_sync::engine::{SyncEngine, SyncOptions};
use s3sync_sync::manifest::JsonManifestStore;
use s3sync_sync::report::format_size;

use super::CliContext;
use crate::output::{get_formatter, plural};

#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Directory to scan
    pub directory: PathBuf,

    /// File or directory name to skip (repeatable)
    #[arg(long, short = 'e', value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Manifest file left out of the count (overrides sync.manifest_path)
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}

impl ScanCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let config = ctx.load_valid_config()?;

        let mut exclude = config.sync.exclude_set();
        exclude.extend(self.exclude.iter().map(String::as_str));

        info!(directory = %self.directory.display(), excluded = exclude.len(), "Scanning");

        let manifest_path = self
            .manifest
            .clone()
            .unwrap_or_else(|| config.sync.manifest_path.clone());
        let options =
            SyncOptions::new(&self.directory, KeyPrefix::default()).with_exclude(exclude.clone());
        let engine = SyncEngine::new(Arc::new(JsonManifestStore::new(manifest_path)), options);

        let summary = engine
            .preflight()
            .with_context(|| format!("Cannot scan {}", self.directory.display()))?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "directory": self.directory.display().to_string(),
                "count": summary.count,
                "total_bytes": summary.total_bytes,
                "total_size": format_size(summary.total_bytes),
                "excluded": exclude.iter().map(|n| n.to_string_lossy()).collect::<Vec<_>>(),
            }));
        } else {
            formatter.success(&format!(
                "{} file{} ({}) in {}",
                summary.count,
                plural(summary.count),
                format_size(summary.total_bytes),
                self.directory.display()
            ));
            if !exclude.is_empty() {
                let names: Vec<String> = exclude
                    .iter()
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                formatter.info(&format!("Excluded: {}", names.join(", ")));
            }
        }

        Ok(())
    }
}
