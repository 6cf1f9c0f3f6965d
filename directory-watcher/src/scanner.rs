//! Directory scanning and statistics.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, error};
use walkdir::{DirEntry, WalkDir};

use crate::config::DirectorySpec;

/// Value exported for every statistic of a scan that failed outright.
pub const SENTINEL: i64 = -1;

/// Statistics gathered by one scan of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanResult {
    /// Entries counted as files (included, or not excluded).
    pub file_count: i64,

    /// Entries matching an exclude pattern.
    pub excluded_files: i64,

    /// Size of every visited entry, filtered or not.
    pub dir_size: i64,

    /// Size of the counted entries. Stays 0 when include patterns are set.
    pub files_size: i64,

    /// Wall time spent walking the tree.
    pub duration: Duration,

    /// Entries that could not be read during the walk.
    pub entry_errors: u64,

    /// The root could not be read; statistics hold [`SENTINEL`].
    pub failed: bool,
}

impl ScanResult {
    /// Result for a scan whose root could not be read.
    pub fn failed(duration: Duration) -> Self {
        Self {
            file_count: SENTINEL,
            excluded_files: SENTINEL,
            dir_size: SENTINEL,
            files_size: SENTINEL,
            duration,
            entry_errors: 0,
            failed: true,
        }
    }

    /// Errors this scan adds to the directory's error counter.
    pub fn error_count(&self) -> u64 {
        if self.failed { 1 } else { self.entry_errors }
    }
}

/// Walks a directory tree and classifies entries by a [`DirectorySpec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self
    }

    /// Recursively scan `root` using the patterns and flags of `spec`.
    ///
    /// Per-entry failures are logged and counted; only an unreadable root
    /// yields a failed result. Symlinks are not followed and the root itself
    /// is not a counted entry.
    pub fn scan(&self, root: &Path, spec: &DirectorySpec) -> ScanResult {
        let start = Instant::now();

        if let Err(e) = std::fs::metadata(root) {
            error!("Error scanning '{}': {e}", root.display());
            return ScanResult::failed(start.elapsed());
        }

        let mut result = ScanResult::default();
        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            match entry {
                Ok(entry) => self.visit(&entry, spec, &mut result),
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    error!("Error iterating path '{path}': {e}");
                    result.entry_errors += 1;
                }
            }
        }

        result.duration = start.elapsed();
        debug!(
            "Scanned '{}' in {:?}: {} files, {} excluded, {} bytes ({} errors)",
            root.display(),
            result.duration,
            result.file_count,
            result.excluded_files,
            result.dir_size,
            result.entry_errors
        );
        result
    }

    fn visit(&self, entry: &DirEntry, spec: &DirectorySpec, result: &mut ScanResult) {
        let path = entry.path();
        let size = match entry.metadata() {
            Ok(metadata) => i64::try_from(metadata.len()).unwrap_or(i64::MAX),
            Err(e) => {
                error!("Can't get stat for path '{}': {e}", path.display());
                result.entry_errors += 1;
                return;
            }
        };

        result.dir_size = result.dir_size.saturating_add(size);

        if spec.only_files && is_directory(entry) {
            return;
        }

        if spec.exclude.matches(path) {
            result.excluded_files += 1;
            return;
        }

        // Include patterns gate the count only; matched sizes are not added.
        if !spec.include.is_empty() {
            if spec.include.matches(path) {
                result.file_count += 1;
            }
            return;
        }

        result.file_count += 1;
        result.files_size = result.files_size.saturating_add(size);
    }
}

/// Directories, including symlinks that resolve to one.
fn is_directory(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir())
}
