//! JSON manifest store
//!
//! [`JsonManifestStore`] persists the [`Manifest`] as a single JSON document
//! at an explicit location.
//!
//! ## Format
//!
//! ```json
//! { "version": 2,
//!   "entries": { "/abs/a.txt": { "hash": "…", "size": 1,
//!                                "last_modified": "2026-10-17T09:00:00Z",
//!                                "extension": ".txt" } } }
//! ```
//!
//! Older manifests are plain objects keyed by local path, whose values are
//! either a bare hash string or an object with a `hash` and optional
//! metadata. Both are still read; saves always write the versioned form.
//!
//! ## Atomic saves
//!
//! The document is written to `<path>.tmp`, flushed to disk, then renamed
//! over `<path>`. A crash before the rename leaves the previous manifest in
//! place; a leftover `.tmp` is overwritten by the next save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use s3sync_core::domain::errors::ManifestError;
use s3sync_core::domain::manifest::{Manifest, ManifestEntry};
use s3sync_core::domain::newtypes::ContentHash;
use s3sync_core::ports::manifest_store::IManifestStore;

/// Version written by [`JsonManifestStore::save`]
pub const MANIFEST_VERSION: u32 = 2;

// ============================================================================
// Persisted document
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyEntry {
    Hash(String),
    Entry(StoredEntry),
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionedDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

impl From<LegacyEntry> for StoredEntry {
    fn from(legacy: LegacyEntry) -> Self {
        match legacy {
            LegacyEntry::Hash(hash) => StoredEntry {
                hash,
                size: None,
                last_modified: None,
                extension: None,
            },
            LegacyEntry::Entry(entry) => entry,
        }
    }
}

impl From<&ManifestEntry> for StoredEntry {
    fn from(entry: &ManifestEntry) -> Self {
        StoredEntry {
            hash: entry.content_hash.as_str().to_string(),
            size: entry.size_bytes,
            last_modified: entry
                .last_modified
                .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
            extension: Some(entry.extension.clone()),
        }
    }
}

/// Accepts RFC 3339, or a naive ISO-8601 timestamp taken as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn corrupt(path: &Path, source: serde_json::Error) -> ManifestError {
    ManifestError::Corrupt {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse any supported manifest document into a [`Manifest`]
fn parse_document(path: &Path, text: &str) -> Result<Manifest, ManifestError> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| corrupt(path, e))?;

    let stored: BTreeMap<String, StoredEntry> = if value.get("version").is_some() {
        let doc: VersionedDocument =
            serde_json::from_value(value).map_err(|e| corrupt(path, e))?;
        if doc.version > MANIFEST_VERSION {
            return Err(corrupt(
                path,
                serde::de::Error::custom(format!(
                    "unsupported manifest version {} (newest known is {MANIFEST_VERSION})",
                    doc.version
                )),
            ));
        }
        doc.entries
    } else {
        let legacy: BTreeMap<String, LegacyEntry> =
            serde_json::from_value(value).map_err(|e| corrupt(path, e))?;
        debug!(entries = legacy.len(), "read legacy manifest format");
        legacy.into_iter().map(|(k, v)| (k, v.into())).collect()
    };

    stored
        .into_iter()
        .map(|(local_path, stored)| {
            let hash = ContentHash::new(stored.hash).map_err(|source| {
                ManifestError::InvalidEntry {
                    path: path.to_path_buf(),
                    local_path: local_path.clone(),
                    source,
                }
            })?;
            let mut entry = ManifestEntry::hash_only(hash, &local_path);
            entry.size_bytes = stored.size;
            entry.last_modified = stored.last_modified.as_deref().and_then(parse_timestamp);
            if let Some(ext) = stored.extension {
                entry.extension = ext;
            }
            Ok((local_path, entry))
        })
        .collect()
}

fn render_document(manifest: &Manifest) -> Result<Vec<u8>, ManifestError> {
    let doc = VersionedDocument {
        version: MANIFEST_VERSION,
        entries: manifest
            .iter()
            .map(|(k, v)| (k.clone(), StoredEntry::from(v)))
            .collect(),
    };
    let mut bytes = serde_json::to_vec_pretty(&doc).map_err(ManifestError::Serialize)?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ============================================================================
// JsonManifestStore
// ============================================================================

/// [`IManifestStore`] backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonManifestStore {
    path: PathBuf,
}

impl JsonManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Temporary file used during [`IManifestStore::save`]
    pub fn temp_path(&self) -> PathBuf {
        let mut p = self.path.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ManifestError {
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl IManifestStore for JsonManifestStore {
    fn location(&self) -> &Path {
        &self.path
    }

    fn state_files(&self) -> Vec<PathBuf> {
        vec![self.path.clone(), self.temp_path()]
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Manifest, ManifestError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no manifest yet, starting empty");
                return Ok(Manifest::new());
            }
            Err(e) => return Err(self.io_error(&self.path, e)),
        };

        let manifest = parse_document(&self.path, &text)?;
        debug!(entries = manifest.len(), "manifest loaded");
        Ok(manifest)
    }

    #[instrument(skip(self, manifest), fields(path = %self.path.display(), entries = manifest.len()))]
    async fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let bytes = render_document(manifest)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(parent, e))?;
        }

        let tmp_path = self.temp_path();
        debug!(?tmp_path, "writing manifest to temporary file");
        {
            let mut file = tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|e| self.io_error(&tmp_path, e))?;
            file.write_all(&bytes)
                .await
                .map_err(|e| self.io_error(&tmp_path, e))?;
            file.sync_all()
                .await
                .map_err(|e| self.io_error(&tmp_path, e))?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(&self.path, e))?;

        info!("manifest saved");
        Ok(())
    }
}
