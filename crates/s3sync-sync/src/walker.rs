//! Tree walker
//!
//! Enumerates the files below a sync root in a deterministic order.
//!
//! - Entries are sorted by file name at every directory level.
//! - An entry whose *name* is in the [`ExcludeSet`] is pruned; for a
//!   directory the whole subtree is never visited. The root itself is
//!   never excluded.
//! - Symlinked directories are not followed. A symlink whose target is a
//!   regular file is reported like a regular file; dangling links are
//!   ignored.
//! - Errors on individual entries are yielded in-line so the caller can
//!   record them and keep going.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use s3sync_core::domain::newtypes::ExcludeSet;

/// Errors produced by [`walk`]
#[derive(Debug, Error)]
pub enum WalkError {
    /// The root does not exist
    #[error("Directory not found: {0}")]
    RootNotFound(PathBuf),

    /// The root exists but is not a directory
    #[error("Not a directory: {0}")]
    RootNotDirectory(PathBuf),

    /// A single entry could not be read
    #[error("Cannot read {path}: {source}")]
    Entry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file produced by the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// `root` joined with `relative`
    pub absolute: PathBuf,
    /// Path relative to the root, used to build the object key
    pub relative: PathBuf,
    /// Size in bytes of the file (or of the symlink target)
    pub size: u64,
}

/// Walk `root`, yielding every non-excluded file
///
/// The returned iterator is lazy; nothing below the root is read until it
/// is polled.
///
/// # Errors
/// Fails up front with [`WalkError::RootNotFound`] or
/// [`WalkError::RootNotDirectory`]. Later failures are yielded as
/// [`WalkError::Entry`] items.
pub fn walk<'a>(
    root: &Path,
    exclude: &'a ExcludeSet,
) -> Result<impl Iterator<Item = Result<WalkedFile, WalkError>> + 'a, WalkError> {
    check_root(root)?;

    let root_buf = root.to_path_buf();
    let iter = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let keep = entry.depth() == 0 || !exclude.is_excluded(entry.file_name());
            if !keep {
                debug!(path = %entry.path().display(), "excluded");
            }
            keep
        })
        .filter_map(move |entry| classify(&root_buf, entry));

    Ok(iter)
}

fn check_root(root: &Path) -> Result<(), WalkError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(WalkError::RootNotDirectory(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(WalkError::RootNotFound(root.to_path_buf()))
        }
        Err(e) => Err(WalkError::Entry {
            path: root.to_path_buf(),
            source: e,
        }),
    }
}

/// Turn a raw walkdir entry into a file, an error, or nothing
fn classify(
    root: &Path,
    entry: walkdir::Result<walkdir::DirEntry>,
) -> Option<Result<WalkedFile, WalkError>> {
    let entry = match entry {
        Ok(entry) => entry,
        Err(err) => {
            let path = err
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            return Some(Err(WalkError::Entry {
                path,
                source: err.into(),
            }));
        }
    };

    let file_type = entry.file_type();
    let size = if file_type.is_file() {
        match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(err) => {
                return Some(Err(WalkError::Entry {
                    path: entry.path().to_path_buf(),
                    source: err.into(),
                }))
            }
        }
    } else if file_type.is_symlink() {
        // Follow the link once to see what it points at.
        match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                debug!(path = %entry.path().display(), "not following symlinked directory");
                return None;
            }
            Err(_) => {
                debug!(path = %entry.path().display(), "ignoring dangling symlink");
                return None;
            }
        }
    } else {
        return None;
    };

    let relative = match entry.path().strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            return Some(Err(WalkError::Entry {
                path: entry.path().to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "entry is outside the walk root",
                ),
            }))
        }
    };

    Some(Ok(WalkedFile {
        absolute: entry.into_path(),
        relative,
        size,
    }))
}
