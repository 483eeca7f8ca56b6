//! Per-file sync candidates
//!
//! A [`SyncCandidate`] is created for every file produced by the tree walk
//! and lives for one run only. Its state machine is:
//!
//! ```text
//! Pending ──► Skipped
//!        ├──► Uploaded
//!        ├──► Simulated   (dry run: an upload was decided but not performed)
//!        └──► Failed
//! ```
//!
//! All four outcomes are terminal for the run; there are no retries
//! within a single run.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::errors::DomainError;
use super::manifest::ManifestEntry;
use super::newtypes::{ContentHash, KeyPrefix, ObjectKey};

/// Which step of the per-file pipeline failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    /// The walker could not read the entry
    Walk,
    /// The file could not be read for fingerprinting
    Hash,
    /// The blob store rejected or failed the upload
    Store,
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Walk => "walk",
            Self::Hash => "hash",
            Self::Store => "store",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a [`SyncCandidate`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CandidateState {
    /// Walked but not yet decided
    #[default]
    Pending,
    /// Content hash matches the manifest
    Skipped,
    /// Stored in the blob store and recorded in the manifest
    Uploaded,
    /// Would have been uploaded; nothing was stored or recorded
    Simulated,
    /// Hashing or storing failed; the manifest is untouched for this file
    Failed {
        stage: FailureStage,
        reason: String,
    },
}

impl CandidateState {
    /// Returns the state name for display
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Skipped => "Skipped",
            Self::Uploaded => "Uploaded",
            Self::Simulated => "Simulated",
            Self::Failed { .. } => "Failed",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome of comparing a fresh fingerprint with the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Upload,
}

impl Decision {
    /// Skip only when an entry exists and its hash equals `hash`.
    ///
    /// Size and mtime are deliberately not consulted.
    #[must_use]
    pub fn decide(entry: Option<&ManifestEntry>, hash: &ContentHash) -> Self {
        match entry {
            Some(entry) if entry.matches(hash) => Self::Skip,
            _ => Self::Upload,
        }
    }
}

/// A file seen by the walker during one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCandidate {
    local_path: PathBuf,
    relative_path: PathBuf,
    remote_key: ObjectKey,
    state: CandidateState,
}

impl SyncCandidate {
    /// Create a pending candidate for `local_path` under `root`
    ///
    /// # Errors
    /// Returns `DomainError::PathNotInSyncRoot` if `local_path` is not below
    /// `root`, or `DomainError::InvalidKey` if no key can be built from it
    pub fn new(root: &Path, local_path: PathBuf, prefix: &KeyPrefix) -> Result<Self, DomainError> {
        let relative_path = local_path
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .map_err(|_| {
                DomainError::PathNotInSyncRoot(format!(
                    "{} is not within {}",
                    local_path.display(),
                    root.display()
                ))
            })?;
        let remote_key = ObjectKey::from_relative(prefix, &relative_path)?;

        Ok(Self {
            local_path,
            relative_path,
            remote_key,
            state: CandidateState::Pending,
        })
    }

    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    #[must_use]
    pub fn remote_key(&self) -> &ObjectKey {
        &self.remote_key
    }

    #[must_use]
    pub fn state(&self) -> &CandidateState {
        &self.state
    }

    /// Identity of this file in the manifest
    #[must_use]
    pub fn manifest_key(&self) -> String {
        self.local_path.to_string_lossy().into_owned()
    }

    /// Display name used in operator-facing messages
    #[must_use]
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.manifest_key())
    }

    fn transition_to(&mut self, target: CandidateState) -> Result<(), DomainError> {
        if self.state.is_terminal() {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    pub fn skip(&mut self) -> Result<(), DomainError> {
        self.transition_to(CandidateState::Skipped)
    }

    pub fn complete_upload(&mut self) -> Result<(), DomainError> {
        self.transition_to(CandidateState::Uploaded)
    }

    pub fn simulate_upload(&mut self) -> Result<(), DomainError> {
        self.transition_to(CandidateState::Simulated)
    }

    pub fn fail(&mut self, stage: FailureStage, reason: impl Into<String>) -> Result<(), DomainError> {
        self.transition_to(CandidateState::Failed {
            stage,
            reason: reason.into(),
        })
    }
}
