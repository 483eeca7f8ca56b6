//! Upload command - Incrementally upload a directory to a bucket
//!
//! Provides the `s3sync upload` CLI command which:
//! 1. Checks the bucket and prefix arguments and builds the blob store
//! 2. Prints the pre-flight summary and asks for confirmation
//! 3. Runs the SyncEngine with Ctrl+C wired to cancellation, printing
//!    each file as it is settled
//! 4. Prints the run summary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use s3sync_core::domain::newtypes::KeyPrefix;
use s3sync_store::build_blob_store;
use s3sync_sync::engine::{FileOutcome, FileReport, ProgressFn, SyncEngine, SyncOptions, SyncReport};
use s3sync_sync::manifest::JsonManifestStore;
use s3sync_sync::report::{format_size, PreflightSummary};

use super::{shutdown_signal, CliContext};
use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};

pub const CANCELED_MESSAGE: &str = "Upload operation canceled.";
pub const INTERRUPTED_MESSAGE: &str = "Operation interrupted by the user.";

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Directory whose contents are uploaded
    pub directory: PathBuf,

    /// Destination bucket
    #[arg(long = "s3-bucket", value_name = "BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix prepended to every uploaded path
    #[arg(long = "s3-prefix", value_name = "PREFIX")]
    pub s3_prefix: Option<String>,

    /// File or directory name to skip (repeatable)
    #[arg(long, short = 'e', value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Show what would be uploaded without uploading or recording anything
    #[arg(long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Manifest file (overrides sync.manifest_path)
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    /// Store endpoint (overrides store.endpoint)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,
}

/// Answer to the confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Confirmation {
    Proceed,
    Decline,
    Interrupted,
}

impl UploadCommand {
    /// Bucket and prefix, or a message naming whichever is missing
    fn target(&self) -> Result<(&str, &str)> {
        let bucket = self.s3_bucket.as_deref().filter(|b| !b.trim().is_empty());
        let prefix = self.s3_prefix.as_deref().filter(|p| !p.trim().is_empty());
        match (bucket, prefix) {
            (Some(bucket), Some(prefix)) => Ok((bucket, prefix)),
            (None, None) => {
                anyhow::bail!("Both --s3-bucket <BUCKET> and --s3-prefix <PREFIX> are required")
            }
            (None, Some(_)) => anyhow::bail!("Missing bucket: pass --s3-bucket <BUCKET>"),
            (Some(_), None) => anyhow::bail!("Missing prefix: pass --s3-prefix <PREFIX>"),
        }
    }

    /// Execute the upload command
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = get_formatter(ctx.format);
        let (bucket, raw_prefix) = self.target()?;
        let prefix = KeyPrefix::new(raw_prefix).context("Invalid --s3-prefix")?;

        // Step 1: configuration and blob store (fails before any file is read)
        let config = ctx.load_valid_config()?;
        let mut store_config = config.store.clone();
        if let Some(endpoint) = &self.endpoint {
            store_config.endpoint = Some(endpoint.clone());
        }
        let blob_store =
            build_blob_store(&store_config, bucket).context("Cannot set up the blob store")?;

        // Step 2: engine
        let mut exclude = config.sync.exclude_set();
        exclude.extend(self.exclude.iter().map(String::as_str));
        let manifest_path = self
            .manifest
            .clone()
            .unwrap_or_else(|| config.sync.manifest_path.clone());

        info!(
            directory = %self.directory.display(),
            bucket,
            prefix = %prefix,
            manifest = %manifest_path.display(),
            "Preparing upload"
        );

        // Ctrl+C is handled from here on, the pre-flight count included.
        let cancel = CancellationToken::new();
        tokio::spawn(shutdown_signal(cancel.clone()));

        let options = SyncOptions::new(&self.directory, prefix.clone())
            .with_exclude(exclude)
            .with_dry_run(self.dry_run)
            .with_hash_chunk_size(config.sync.hash_chunk_bytes());
        let mut engine = SyncEngine::new(Arc::new(JsonManifestStore::new(manifest_path)), options);
        if !ctx.format.is_json() {
            engine = engine.with_progress(progress_printer(ctx.format, bucket, ctx.verbose));
        }
        let engine = Arc::new(engine);

        // Step 3: pre-flight summary
        let Some(summary) = preflight(&engine, &cancel).await? else {
            formatter.line(&format!("\n{INTERRUPTED_MESSAGE}"));
            return Ok(());
        };
        print_banner(formatter.as_ref(), bucket, &prefix, &summary, self.dry_run);

        // Step 4: confirmation
        if !self.yes {
            match confirm(formatter.as_ref(), &cancel).await? {
                Confirmation::Proceed => {}
                Confirmation::Decline => {
                    formatter.line(CANCELED_MESSAGE);
                    if ctx.format.is_json() {
                        formatter.print_json(&serde_json::json!({
                            "success": false,
                            "canceled": true,
                        }));
                    }
                    return Ok(());
                }
                Confirmation::Interrupted => {
                    formatter.line(&format!("\n{INTERRUPTED_MESSAGE}"));
                    return Ok(());
                }
            }
        }

        // Step 5: run
        let report = engine.commit(blob_store.as_ref(), &cancel).await?;

        if ctx.format.is_json() {
            let json = serde_json::json!({
                "success": !report.has_failures(),
                "bucket": bucket,
                "prefix": prefix.as_str(),
                "dry_run": self.dry_run,
                "preflight": summary,
                "report": report,
            });
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), &report, self.dry_run);
        }

        if report.cancelled {
            formatter.line(INTERRUPTED_MESSAGE);
        }

        Ok(())
    }
}

fn print_banner(
    formatter: &dyn OutputFormatter,
    bucket: &str,
    prefix: &KeyPrefix,
    summary: &PreflightSummary,
    dry_run: bool,
) {
    if dry_run {
        formatter.line("Dry run: nothing will be uploaded or recorded.");
    }
    formatter.line(&format!("Bucket:            {bucket}"));
    formatter.line(&format!("Prefix:            {prefix}"));
    formatter.line(&format!("Total objects:     {}", summary.count));
    formatter.line(&format!(
        "Total upload size: {}",
        format_size(summary.total_bytes)
    ));
}

/// Pre-flight count, or `None` if interrupted first
///
/// Counted on a plain thread so an interrupted count does not hold up exit.
async fn preflight(
    engine: &Arc<SyncEngine>,
    cancel: &CancellationToken,
) -> Result<Option<PreflightSummary>> {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let engine = Arc::clone(engine);
    std::thread::spawn(move || {
        let _ = tx.send(engine.preflight());
    });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(None),
        counted = rx => {
            let summary = counted.context("Pre-flight count stopped unexpectedly")??;
            Ok(Some(summary))
        }
    }
}

/// Ask for confirmation; only `yes` (any case) proceeds
///
/// Stdin is read on a plain thread so an interrupted prompt does not keep
/// the runtime alive waiting for input.
async fn confirm(
    formatter: &dyn OutputFormatter,
    cancel: &CancellationToken,
) -> Result<Confirmation> {
    formatter.prompt("Proceed with upload? (yes/no):");

    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let mut answer = String::new();
        let result = std::io::stdin().read_line(&mut answer).map(|_| answer);
        let _ = tx.send(result);
    });

    tokio::select! {
        read = rx => {
            let answer = read
                .context("Confirmation reader stopped")?
                .context("Failed to read confirmation")?;
            Ok(parse_confirmation(&answer))
        }
        _ = cancel.cancelled() => Ok(Confirmation::Interrupted),
    }
}

fn parse_confirmation(answer: &str) -> Confirmation {
    if answer.trim().eq_ignore_ascii_case("yes") {
        Confirmation::Proceed
    } else {
        Confirmation::Decline
    }
}

/// Prints each file's line as soon as the engine settles it
fn progress_printer(format: OutputFormat, bucket: &str, verbose: u8) -> ProgressFn {
    let bucket = bucket.to_string();
    Box::new(move |file| {
        if let Some(line) = file_line(file, &bucket, verbose) {
            get_formatter(format).line(&line);
        }
    })
}

fn file_line(file: &FileReport, bucket: &str, verbose: u8) -> Option<String> {
    let key = file.remote_key.as_deref().unwrap_or("-");
    let name = if verbose > 0 {
        file.local_path.display().to_string()
    } else {
        file.file_name()
    };
    match &file.outcome {
        FileOutcome::Simulated => Some(format!(
            "Simulating: would upload {name} to {bucket} as {key}"
        )),
        FileOutcome::Uploaded => Some(format!("Uploaded {name} to {bucket} as {key}")),
        FileOutcome::Skipped if verbose > 0 => {
            Some(format!("Skipping {name}: already uploaded and unchanged"))
        }
        // Failures are listed with the summary.
        FileOutcome::Skipped | FileOutcome::Failed { .. } => None,
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport, dry_run: bool) {
    let duration = format_duration(report.duration_ms);
    if dry_run {
        formatter.success(&format!(
            "Dry run completed in {duration}: {} file{} would be uploaded, {} unchanged",
            report.simulated,
            plural(report.simulated),
            report.skipped
        ));
    } else if report.uploaded == 0 && report.failed == 0 && !report.cancelled {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!(
            "Upload completed in {duration}: {} file{} ({}) uploaded, {} unchanged",
            report.uploaded,
            plural(report.uploaded),
            format_size(report.bytes_uploaded),
            report.skipped
        ));
    }

    if !report.errors.is_empty() {
        formatter.error(&format!(
            "{} file{} failed and will be retried next run:",
            report.failed,
            plural(report.failed)
        ));
        for err in &report.errors {
            formatter.warn(err);
        }
    }
}
