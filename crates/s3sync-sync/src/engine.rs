//! Sync decision engine
//!
//! The [`SyncEngine`] uploads the files below a root directory that are new
//! or changed since the last successful upload recorded in the manifest.
//!
//! ## Run Flow
//!
//! 1. **Resolve**: canonicalize the root (missing root aborts)
//! 2. **Load**: read the manifest (corrupt manifest aborts)
//! 3. **Decide**: for every walked file, fingerprint it and compare with
//!    the manifest entry; skip on a matching hash, otherwise upload
//!    (or only report the upload in a dry run)
//! 4. **Persist**: save the manifest once, if any entry changed
//!
//! Per-file failures (unreadable entry, hashing error, store error) are
//! recorded in the [`SyncReport`] and the run moves on. Each settled file
//! is also handed to the optional [`ProgressFn`].
//!
//! The manifest store's own files are left out of the walk when they live
//! below the root. Entries keyed by the root as typed (older manifests) are
//! still matched, and move to the canonical key once the file is settled.
//!
//! ## Cancellation
//!
//! The [`CancellationToken`] is checked before each file and again just
//! before an upload is issued. An upload already in flight is allowed to
//! finish. Whatever the manifest accumulated is then saved.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use s3sync_core::domain::candidate::{CandidateState, Decision, FailureStage, SyncCandidate};
use s3sync_core::domain::errors::DomainError;
use s3sync_core::domain::manifest::{extension_of, Manifest, ManifestEntry};
use s3sync_core::domain::newtypes::{ExcludeSet, KeyPrefix};
use s3sync_core::ports::blob_store::IBlobStore;
use s3sync_core::ports::manifest_store::IManifestStore;

use crate::fingerprint::{Fingerprinter, DEFAULT_CHUNK_SIZE};
use crate::report::{self, PreflightSummary};
use crate::walker::{self, WalkError, WalkedFile};
use crate::SyncError;

// ============================================================================
// Options
// ============================================================================

/// What to sync and how
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Directory whose contents are uploaded
    pub root: PathBuf,
    /// Prepended to every relative path to form the object key
    pub prefix: KeyPrefix,
    /// File and directory names pruned from the walk
    pub exclude: ExcludeSet,
    /// Decide and report, but never store or record anything
    pub dry_run: bool,
    /// Fingerprint read buffer in bytes
    pub hash_chunk_size: usize,
}

impl SyncOptions {
    pub fn new(root: impl Into<PathBuf>, prefix: KeyPrefix) -> Self {
        Self {
            root: root.into(),
            prefix,
            exclude: ExcludeSet::new(),
            dry_run: false,
            hash_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_exclude(mut self, exclude: ExcludeSet) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_hash_chunk_size(mut self, bytes: usize) -> Self {
        self.hash_chunk_size = bytes;
        self
    }
}

// ============================================================================
// Report
// ============================================================================

/// Final state of one file in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Content matched the manifest
    Skipped,
    /// Stored and recorded
    Uploaded,
    /// Dry run: would have been uploaded
    Simulated,
    /// Not uploaded; retried on the next run
    Failed {
        stage: FailureStage,
        message: String,
    },
}

impl FileOutcome {
    /// Outcome of a settled candidate; `None` while it is still pending
    pub fn from_state(state: &CandidateState) -> Option<Self> {
        match state {
            CandidateState::Pending => None,
            CandidateState::Skipped => Some(Self::Skipped),
            CandidateState::Uploaded => Some(Self::Uploaded),
            CandidateState::Simulated => Some(Self::Simulated),
            CandidateState::Failed { stage, reason } => Some(Self::Failed {
                stage: *stage,
                message: reason.clone(),
            }),
        }
    }
}

/// Per-file line of a [`SyncReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub local_path: PathBuf,
    /// Absent when the walk failed before a key could be built
    pub remote_key: Option<String>,
    pub size_bytes: u64,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    /// File name for operator messages
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.local_path.display().to_string())
    }
}

/// Summary of a completed (or cancelled) sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Files considered (walk failures included)
    pub checked: u64,
    pub skipped: u64,
    pub uploaded: u64,
    pub simulated: u64,
    pub failed: u64,
    /// Bytes sent to the blob store
    pub bytes_uploaded: u64,
    pub files: Vec<FileReport>,
    /// Human-readable per-file errors (non-fatal)
    pub errors: Vec<String>,
    /// The run stopped early on request
    pub cancelled: bool,
    /// The manifest was written back
    pub manifest_saved: bool,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn push(&mut self, file: FileReport) {
        self.checked += 1;
        match &file.outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Uploaded => {
                self.uploaded += 1;
                self.bytes_uploaded += file.size_bytes;
            }
            FileOutcome::Simulated => self.simulated += 1,
            FileOutcome::Failed { stage, message } => {
                self.failed += 1;
                let msg = format!(
                    "{} failed for '{}': {message}",
                    stage,
                    file.local_path.display()
                );
                warn!(%msg);
                self.errors.push(msg);
            }
        }
        self.files.push(file);
    }
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Called with each file's report line as soon as that file is settled
pub type ProgressFn = Box<dyn Fn(&FileReport) + Send + Sync>;

/// Incremental upload engine
pub struct SyncEngine {
    manifest_store: Arc<dyn IManifestStore>,
    options: SyncOptions,
    fingerprinter: Fingerprinter,
    progress: Option<ProgressFn>,
}

impl SyncEngine {
    pub fn new(manifest_store: Arc<dyn IManifestStore>, options: SyncOptions) -> Self {
        let fingerprinter = Fingerprinter::new(options.hash_chunk_size);
        Self {
            manifest_store,
            options,
            fingerprinter,
            progress: None,
        }
    }

    /// Report every file while the run is still going
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Count and size the files a [`commit`](Self::commit) would consider
    ///
    /// Read-only: neither the manifest nor the blob store is touched.
    /// Blocks on filesystem I/O.
    ///
    /// # Errors
    /// Returns [`SyncError::RootNotFound`] if the root does not exist
    #[tracing::instrument(skip(self), fields(root = %self.options.root.display()))]
    pub fn preflight(&self) -> Result<PreflightSummary, SyncError> {
        // Same root form as commit, so the manifest's own files line up.
        let root = std::fs::canonicalize(&self.options.root)
            .unwrap_or_else(|_| self.options.root.clone());
        Ok(report::count_and_size_except(
            &root,
            &self.options.exclude,
            &self.state_files(),
        )?)
    }

    /// Run the sync
    ///
    /// `blob_store` is built by the caller, so a store that cannot be set
    /// up fails before the manifest is ever read.
    ///
    /// # Errors
    /// Fatal errors only: missing root, unreadable manifest, or a manifest
    /// that cannot be written back. Per-file failures are in the report.
    #[tracing::instrument(skip(self, blob_store, cancel), fields(root = %self.options.root.display(), dry_run = self.options.dry_run))]
    pub async fn commit(
        &self,
        blob_store: &dyn IBlobStore,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        let mut report = SyncReport::default();

        // Step 1: resolve the root so manifest keys are absolute and stable
        let root = resolve_root(&self.options.root).await?;
        let state_files = self.state_files();
        let files = walker::walk(&root, &self.options.exclude)?;

        // Step 2: load the manifest
        let mut manifest = self
            .manifest_store
            .load()
            .await
            .map_err(SyncError::CorruptState)?;
        let mut dirty = false;

        info!(
            root = %root.display(),
            prefix = %self.options.prefix,
            known = manifest.len(),
            manifest = %self.manifest_store.location().display(),
            "Starting sync"
        );

        // Step 3: decide per file
        for item in files {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let file = match item {
                Ok(file) if state_files.contains(&file.absolute) => {
                    debug!(path = %file.absolute.display(), "manifest file, not syncing");
                    continue;
                }
                Ok(file) => file,
                Err(err) => {
                    self.settle(&mut report, walk_failure(err));
                    continue;
                }
            };

            match self
                .sync_file(&root, file, &mut manifest, &mut dirty, blob_store, cancel)
                .await
            {
                Some(line) => self.settle(&mut report, line),
                None => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        if report.cancelled {
            warn!(processed = report.checked, "Sync interrupted, saving progress");
        }

        // Step 4: persist
        if dirty {
            self.manifest_store
                .save(&manifest)
                .await
                .map_err(SyncError::ManifestSave)?;
            report.manifest_saved = true;
        } else {
            debug!("manifest unchanged, not rewriting");
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            checked = report.checked,
            uploaded = report.uploaded,
            skipped = report.skipped,
            simulated = report.simulated,
            failed = report.failed,
            bytes = report.bytes_uploaded,
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "Sync completed"
        );

        Ok(report)
    }

    /// Fingerprint, decide and (unless dry) upload one file
    ///
    /// Returns `None` if cancellation arrived before the upload was issued.
    async fn sync_file(
        &self,
        root: &Path,
        file: WalkedFile,
        manifest: &mut Manifest,
        dirty: &mut bool,
        blob_store: &dyn IBlobStore,
        cancel: &CancellationToken,
    ) -> Option<FileReport> {
        let mut candidate =
            match SyncCandidate::new(root, file.absolute.clone(), &self.options.prefix) {
                Ok(candidate) => candidate,
                Err(err) => {
                    return Some(FileReport {
                        local_path: file.absolute,
                        remote_key: None,
                        size_bytes: file.size,
                        outcome: FileOutcome::Failed {
                            stage: FailureStage::Walk,
                            message: err.to_string(),
                        },
                    })
                }
            };

        let hash = match self.fingerprinter.hash(candidate.local_path()).await {
            Ok(hash) => hash,
            Err(err) => {
                return Some(failed(&mut candidate, file.size, FailureStage::Hash, err.to_string()))
            }
        };

        let manifest_key = candidate.manifest_key();
        let legacy_key = self
            .legacy_key(&candidate)
            .filter(|old| !manifest.contains(&manifest_key) && manifest.contains(old));
        let known = manifest.get(legacy_key.as_deref().unwrap_or(manifest_key.as_str()));

        match Decision::decide(known, &hash) {
            Decision::Skip => {
                debug!(path = %manifest_key, "unchanged, skipping");
                let applied = candidate.skip();
                if let Some(old) = legacy_key.as_deref().filter(|_| applied.is_ok()) {
                    if !self.options.dry_run {
                        debug!(from = %old, to = %manifest_key, "moving entry to canonical key");
                        manifest.rekey(old, manifest_key.as_str());
                        *dirty = true;
                    }
                }
                Some(settled(&candidate, file.size, FailureStage::Hash, applied))
            }
            Decision::Upload if self.options.dry_run => {
                info!(path = %manifest_key, key = %candidate.remote_key(), "would upload");
                let applied = candidate.simulate_upload();
                Some(settled(&candidate, file.size, FailureStage::Hash, applied))
            }
            Decision::Upload => {
                if cancel.is_cancelled() {
                    return None;
                }

                // Metadata is taken before the upload so the entry
                // describes the bytes that were hashed.
                let (size, modified) = file_metadata(candidate.local_path(), file.size).await;

                if let Err(err) = blob_store
                    .store(candidate.remote_key(), candidate.local_path())
                    .await
                {
                    return Some(failed(&mut candidate, file.size, FailureStage::Store, format!("{err:#}")));
                }

                let applied = candidate.complete_upload();
                if applied.is_ok() {
                    info!(path = %manifest_key, key = %candidate.remote_key(), bytes = size, "uploaded");
                    if let Some(old) = &legacy_key {
                        manifest.rekey(old, manifest_key.as_str());
                    }
                    let extension = extension_of(candidate.local_path());
                    manifest.record(
                        manifest_key,
                        ManifestEntry::new(hash, size, modified, extension),
                    );
                    *dirty = true;
                }
                Some(settled(&candidate, size, FailureStage::Store, applied))
            }
        }
    }

    /// Key the file had in manifests written against the root as typed
    ///
    /// `None` when that is already the canonical key.
    fn legacy_key(&self, candidate: &SyncCandidate) -> Option<String> {
        let key = self
            .options
            .root
            .join(candidate.relative_path())
            .to_string_lossy()
            .into_owned();
        (key != candidate.manifest_key()).then_some(key)
    }

    /// Absolute paths of the files the manifest store writes
    fn state_files(&self) -> Vec<PathBuf> {
        self.manifest_store
            .state_files()
            .iter()
            .filter_map(|path| absolute_path(path))
            .collect()
    }

    fn settle(&self, report: &mut SyncReport, line: FileReport) {
        if let Some(progress) = &self.progress {
            progress(&line);
        }
        report.push(line);
    }
}

/// Report line for `candidate` after a state change
fn settled(
    candidate: &SyncCandidate,
    size_bytes: u64,
    stage: FailureStage,
    applied: Result<(), DomainError>,
) -> FileReport {
    let outcome = match applied {
        Ok(()) => FileOutcome::from_state(candidate.state()).unwrap_or_else(|| {
            FileOutcome::Failed {
                stage,
                message: "file was left undecided".to_string(),
            }
        }),
        Err(err) => FileOutcome::Failed {
            stage,
            message: err.to_string(),
        },
    };
    FileReport {
        local_path: candidate.local_path().to_path_buf(),
        remote_key: Some(candidate.remote_key().to_string()),
        size_bytes,
        outcome,
    }
}

/// Report line for a file that failed at `stage`
fn failed(
    candidate: &mut SyncCandidate,
    size_bytes: u64,
    stage: FailureStage,
    message: String,
) -> FileReport {
    if let Err(err) = candidate.fail(stage, message.clone()) {
        debug!(%err, "candidate already settled");
    }
    FileReport {
        local_path: candidate.local_path().to_path_buf(),
        remote_key: Some(candidate.remote_key().to_string()),
        size_bytes,
        outcome: FileOutcome::Failed { stage, message },
    }
}

/// Canonical form of `path`; a file that does not exist yet is placed in
/// its canonical parent directory
fn absolute_path(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::fs::canonicalize(path) {
        return Some(path);
    }
    let name = path.file_name()?;
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::canonicalize(parent).ok().map(|dir| dir.join(name))
}

async fn resolve_root(root: &Path) -> Result<PathBuf, SyncError> {
    match tokio::fs::canonicalize(root).await {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SyncError::RootNotFound(root.to_path_buf()))
        }
        Err(e) => Err(SyncError::Io(e)),
    }
}

/// Size and mtime of `path`, falling back to the walked size
async fn file_metadata(path: &Path, walked_size: u64) -> (u64, Option<DateTime<Utc>>) {
    match tokio::fs::metadata(path).await {
        Ok(meta) => (
            meta.len(),
            meta.modified().ok().map(DateTime::<Utc>::from),
        ),
        Err(err) => {
            debug!(path = %path.display(), %err, "metadata unavailable after hashing");
            (walked_size, None)
        }
    }
}

fn walk_failure(err: WalkError) -> FileReport {
    let local_path = match &err {
        WalkError::Entry { path, .. } => path.clone(),
        WalkError::RootNotFound(path) | WalkError::RootNotDirectory(path) => path.clone(),
    };
    let message = match err {
        WalkError::Entry { source, .. } => source.to_string(),
        other => other.to_string(),
    };
    FileReport {
        local_path,
        remote_key: None,
        size_bytes: 0,
        outcome: FileOutcome::Failed {
            stage: FailureStage::Walk,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_line(outcome: FileOutcome, size: u64) -> FileReport {
        FileReport {
            local_path: PathBuf::from("/data/a.txt"),
            remote_key: Some("backup/a.txt".to_string()),
            size_bytes: size,
            outcome,
        }
    }

    #[test]
    fn test_report_counts_outcomes() {
        let mut report = SyncReport::default();
        report.push(report_line(FileOutcome::Uploaded, 10));
        report.push(report_line(FileOutcome::Uploaded, 5));
        report.push(report_line(FileOutcome::Skipped, 100));
        report.push(report_line(FileOutcome::Simulated, 7));
        report.push(report_line(
            FileOutcome::Failed {
                stage: FailureStage::Store,
                message: "503".to_string(),
            },
            1,
        ));

        assert_eq!(report.checked, 5);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.bytes_uploaded, 15);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.simulated, 1);
        assert_eq!(report.failed, 1);
        assert!(report.has_failures());
        assert_eq!(report.errors, vec!["store failed for '/data/a.txt': 503"]);
    }

    #[test]
    fn test_file_outcome_serializes_flat() {
        let line = report_line(
            FileOutcome::Failed {
                stage: FailureStage::Hash,
                message: "permission denied".to_string(),
            },
            3,
        );
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["stage"], "hash");
        assert_eq!(value["message"], "permission denied");
        assert_eq!(value["remote_key"], "backup/a.txt");
    }

    #[test]
    fn test_walk_failure_uses_entry_path() {
        let line = walk_failure(WalkError::Entry {
            path: PathBuf::from("/data/locked"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(line.local_path, PathBuf::from("/data/locked"));
        assert!(line.remote_key.is_none());
        assert!(matches!(
            line.outcome,
            FileOutcome::Failed {
                stage: FailureStage::Walk,
                ..
            }
        ));
    }

    #[test]
    fn test_options_builder() {
        let options = SyncOptions::new("/data", KeyPrefix::new("backup").unwrap())
            .with_dry_run(true)
            .with_hash_chunk_size(4096)
            .with_exclude(["node_modules"].into_iter().collect());
        assert!(options.dry_run);
        assert_eq!(options.hash_chunk_size, 4096);
        assert_eq!(options.exclude.len(), 1);
    }

    fn pending(path: &str) -> SyncCandidate {
        SyncCandidate::new(
            Path::new("/data"),
            PathBuf::from(path),
            &KeyPrefix::new("backup").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejected_transition_becomes_file_failure() {
        let mut candidate = pending("/data/a.txt");
        candidate.skip().unwrap();

        let applied = candidate.complete_upload();
        let line = settled(&candidate, 4, FailureStage::Store, applied);

        assert_eq!(line.remote_key.as_deref(), Some("backup/a.txt"));
        match line.outcome {
            FileOutcome::Failed { stage, message } => {
                assert_eq!(stage, FailureStage::Store);
                assert!(message.contains("Skipped"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_settled_reflects_candidate_state() {
        let mut candidate = pending("/data/a.txt");
        let applied = candidate.simulate_upload();
        let line = settled(&candidate, 4, FailureStage::Hash, applied);
        assert_eq!(line.outcome, FileOutcome::Simulated);
        assert_eq!(line.size_bytes, 4);
    }

    #[test]
    fn test_failed_keeps_failure_message_on_settled_candidate() {
        let mut candidate = pending("/data/a.txt");
        candidate.skip().unwrap();

        let line = failed(&mut candidate, 1, FailureStage::Hash, "gone".to_string());
        assert_eq!(
            line.outcome,
            FileOutcome::Failed {
                stage: FailureStage::Hash,
                message: "gone".to_string(),
            }
        );
    }

    #[test]
    fn test_from_state_pending_has_no_outcome() {
        assert_eq!(FileOutcome::from_state(&CandidateState::Pending), None);
        assert_eq!(
            FileOutcome::from_state(&CandidateState::Uploaded),
            Some(FileOutcome::Uploaded)
        );
    }

    #[test]
    fn test_absolute_path_of_missing_file_uses_parent() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join(".state.json");
        let resolved = absolute_path(&missing).unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join(".state.json"));
    }
}
