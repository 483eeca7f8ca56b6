//! Pre-flight reporting
//!
//! A read-only pass over the same walk the engine performs, so the count
//! an operator confirms is the count that will be processed.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use s3sync_core::domain::newtypes::ExcludeSet;

use crate::walker::{self, WalkError};

/// Number of candidate files and their combined size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreflightSummary {
    pub count: u64,
    pub total_bytes: u64,
}

/// Count the files below `root` that a sync would consider
///
/// Entries the walker cannot read are left out of the totals; the sync
/// pass reports them as failures.
pub fn count_and_size(root: &Path, exclude: &ExcludeSet) -> Result<PreflightSummary, WalkError> {
    count_and_size_except(root, exclude, &[])
}

/// Like [`count_and_size`], leaving out the files at `skip`
///
/// `skip` holds absolute paths in the same form as `root`.
pub fn count_and_size_except(
    root: &Path,
    exclude: &ExcludeSet,
    skip: &[PathBuf],
) -> Result<PreflightSummary, WalkError> {
    let mut summary = PreflightSummary::default();

    for item in walker::walk(root, exclude)? {
        match item {
            Ok(file) if skip.contains(&file.absolute) => {}
            Ok(file) => {
                summary.count += 1;
                summary.total_bytes += file.size;
            }
            Err(e) => warn!(error = %e, "unreadable entry left out of pre-flight count"),
        }
    }

    debug!(count = summary.count, bytes = summary.total_bytes, "pre-flight complete");
    Ok(summary)
}

/// Format a byte count with base-1024 units and two decimals
///
/// `0` is `"0.00 B"`, `1536` is `"1.50 KB"`. Values beyond terabytes stay
/// in `TB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_count_and_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "X").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "YYYY").unwrap();

        let summary = count_and_size(dir.path(), &ExcludeSet::new()).unwrap();
        assert_eq!(
            summary,
            PreflightSummary {
                count: 2,
                total_bytes: 5
            }
        );
    }

    #[test]
    fn test_count_excludes_pruned_subtree() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "abc").unwrap();
        let nm = dir.path().join("node_modules");
        std::fs::create_dir(&nm).unwrap();
        for i in 0..50 {
            std::fs::write(nm.join(format!("f{i}.js")), "0123456789").unwrap();
        }

        let exclude: ExcludeSet = ["node_modules"].into_iter().collect();
        let summary = count_and_size(dir.path(), &exclude).unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.total_bytes, 3);
    }

    #[test]
    fn test_count_leaves_out_skipped_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "X").unwrap();
        std::fs::write(dir.path().join(".state.json"), "{}").unwrap();

        let skip = vec![dir.path().join(".state.json")];
        let summary = count_and_size_except(dir.path(), &ExcludeSet::new(), &skip).unwrap();
        assert_eq!(
            summary,
            PreflightSummary {
                count: 1,
                total_bytes: 1
            }
        );
    }

    #[test]
    fn test_count_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = count_and_size(&dir.path().join("absent"), &ExcludeSet::new()).unwrap_err();
        assert!(matches!(err, WalkError::RootNotFound(_)));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_size(2048 * 1024 * 1024 * 1024 * 1024), "2048.00 TB");
    }
}
