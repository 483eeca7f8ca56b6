//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain values.
//! Each newtype ensures data validity at construction time.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Content hash
// ============================================================================

/// Hex-encoded content digest of a local file
///
/// New fingerprints are SHA-256 (64 hex chars). Any non-empty hex digest is
/// accepted so manifests written by older tools still load; a digest of a
/// different width simply never matches and the file is uploaded again.
/// The value is normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash
    ///
    /// # Errors
    /// Returns `DomainError::InvalidHash` if the value is empty or not hex
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(DomainError::InvalidHash("Hash cannot be empty".to_string()));
        }
        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not hexadecimal: {hash}"
            )));
        }
        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// Key prefix and object key
// ============================================================================

/// Checks that every `/`-separated segment is a usable key segment
fn validate_segments(value: &str) -> Result<(), String> {
    if value.contains('\\') {
        return Err(format!("backslashes are not allowed: {value}"));
    }
    for segment in value.split('/') {
        match segment {
            "" => return Err(format!("empty path segment: {value}")),
            "." | ".." => return Err(format!("relative segment '{segment}': {value}")),
            _ => {}
        }
    }
    Ok(())
}

/// Prefix prepended to every object key of a sync run
///
/// Leading and trailing slashes are stripped, so `"backup"`, `"/backup"`
/// and `"backup/"` are the same prefix. An empty prefix is allowed and
/// places objects at the bucket root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Create a new KeyPrefix
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrefix` on empty inner segments,
    /// `.`/`..` segments or backslashes
    pub fn new(prefix: impl AsRef<str>) -> Result<Self, DomainError> {
        let trimmed = prefix.as_ref().trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        validate_segments(trimmed).map_err(DomainError::InvalidPrefix)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string reference (no leading or trailing slash)
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for KeyPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeyPrefix {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Remote object key: `prefix/relative/path` with `/` separators
///
/// Keys never start with `/` and never contain empty, `.` or `..` segments,
/// regardless of the host's path separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new ObjectKey from an already-joined key string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidKey` if the key is empty, starts with `/`
    /// or contains invalid segments
    pub fn new(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        if key.is_empty() {
            return Err(DomainError::InvalidKey("Key cannot be empty".to_string()));
        }
        validate_segments(&key).map_err(DomainError::InvalidKey)?;
        Ok(Self(key))
    }

    /// Build the key for a file at `relative` (relative to the sync root)
    ///
    /// # Errors
    /// Returns `DomainError::InvalidKey` if `relative` is absolute, escapes
    /// the root, or has no normal components
    pub fn from_relative(prefix: &KeyPrefix, relative: &Path) -> Result<Self, DomainError> {
        let mut segments: Vec<String> = Vec::new();
        if !prefix.is_empty() {
            segments.push(prefix.as_str().to_string());
        }

        let mut has_component = false;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    segments.push(part.to_string_lossy().into_owned());
                    has_component = true;
                }
                Component::CurDir => {}
                _ => {
                    return Err(DomainError::InvalidKey(format!(
                        "Relative path must stay within the sync root: {}",
                        relative.display()
                    )));
                }
            }
        }

        if !has_component {
            return Err(DomainError::InvalidKey(format!(
                "Relative path has no file component: {}",
                relative.display()
            )));
        }

        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment of the key
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

// ============================================================================
// Exclusion set
// ============================================================================

/// Set of file and directory names that are pruned from a walk
///
/// Matching is on the entry *name* only, never on the full path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExcludeSet(BTreeSet<OsString>);

impl ExcludeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if an entry called `name` must be skipped
    #[must_use]
    pub fn is_excluded(&self, name: &OsStr) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<OsString>) -> bool {
        self.0.insert(name.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &OsStr> {
        self.0.iter().map(OsString::as_os_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<OsString>> FromIterator<S> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<OsString>> Extend<S> for ExcludeSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}
