//! Upload manifest
//!
//! The [`Manifest`] maps a local file identity (its path string) to the
//! [`ManifestEntry`] recorded at the last *successful* upload of that file.
//! Entries are only added or overwritten, never removed, and never reflect
//! a failed or simulated attempt.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::newtypes::ContentHash;

/// Record of the last successful upload of one local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Fingerprint of the file contents at upload time.
    /// This is the only field used for change detection.
    pub content_hash: ContentHash,
    /// Size at upload time (absent in manifests from older releases)
    pub size_bytes: Option<u64>,
    /// Local mtime at upload time (absent in manifests from older releases)
    pub last_modified: Option<DateTime<Utc>>,
    /// File extension including the dot (`".txt"`), or empty. Informational.
    pub extension: String,
}

impl ManifestEntry {
    pub fn new(
        content_hash: ContentHash,
        size_bytes: u64,
        last_modified: Option<DateTime<Utc>>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            content_hash,
            size_bytes: Some(size_bytes),
            last_modified,
            extension: extension.into(),
        }
    }

    /// Entry carrying only a hash, as written by the oldest manifest format
    pub fn hash_only(content_hash: ContentHash, local_path: &str) -> Self {
        Self {
            content_hash,
            size_bytes: None,
            last_modified: None,
            extension: extension_of(Path::new(local_path)),
        }
    }

    /// Returns true if `hash` matches the recorded content
    #[must_use]
    pub fn matches(&self, hash: &ContentHash) -> bool {
        &self.content_hash == hash
    }
}

/// Extension of `path` with a leading dot, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Mapping from local path to [`ManifestEntry`]
///
/// Ordered by path so the persisted document is stable between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, local_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(local_path)
    }

    /// Adds or overwrites the entry for `local_path`, returning the previous one
    pub fn record(
        &mut self,
        local_path: impl Into<String>,
        entry: ManifestEntry,
    ) -> Option<ManifestEntry> {
        self.entries.insert(local_path.into(), entry)
    }

    /// Moves the entry stored under `from` to `to`
    ///
    /// An entry already under `to` is replaced. Returns false, changing
    /// nothing, when `from` has no entry.
    pub fn rekey(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.entries.remove(from) {
            Some(entry) => {
                self.entries.insert(to.into(), entry);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn contains(&self, local_path: &str) -> bool {
        self.entries.contains_key(local_path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ManifestEntry)> {
        self.entries.iter()
    }
}

impl FromIterator<(String, ManifestEntry)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (String, ManifestEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
