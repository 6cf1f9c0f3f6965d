//! Registry of observed directories and their schedule state.
//!
//! Entries are keyed by canonical (symlink-resolved) path. Event paths that
//! have no entry of their own are matched against registered directories by
//! filesystem identity, and fall back to a default spec when nothing matches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::config::DirectorySpec;

/// Decides whether two paths name the same underlying filesystem object.
pub trait PathIdentity: Send + Sync {
    /// `true` when both paths resolve to the same object.
    fn same_object(&self, a: &Path, b: &Path) -> bool;
}

/// [`PathIdentity`] backed by filesystem metadata.
///
/// Compares device and inode numbers on unix, canonical paths elsewhere.
/// Paths that cannot be stat'ed never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsIdentity;

impl PathIdentity for FsIdentity {
    #[cfg(unix)]
    fn same_object(&self, a: &Path, b: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;

        match (std::fs::metadata(a), std::fs::metadata(b)) {
            (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
            _ => false,
        }
    }

    #[cfg(not(unix))]
    fn same_object(&self, a: &Path, b: &Path) -> bool {
        match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Schedule state for one registered directory.
#[derive(Debug, Clone)]
pub struct WatchEntry {
    /// Canonical path; the registry key.
    pub path: PathBuf,

    /// Configuration shared with aliases of the same directory.
    pub spec: Arc<DirectorySpec>,

    /// Earliest time the next scheduled scan may run.
    pub next_scan_due: DateTime<Utc>,
}

impl WatchEntry {
    fn new(path: PathBuf, spec: Arc<DirectorySpec>, now: DateTime<Utc>) -> Self {
        Self {
            path,
            spec,
            next_scan_due: now,
        }
    }

    /// Whether a scheduled scan should run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_scan_due
    }
}

/// Owns every [`WatchEntry`] for the lifetime of the engine.
pub struct Registry {
    entries: BTreeMap<PathBuf, WatchEntry>,
    identity: Box<dyn PathIdentity>,
    default_interval: Duration,
}

impl Registry {
    /// Create an empty registry.
    pub fn new(identity: Box<dyn PathIdentity>, default_interval: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            identity,
            default_interval,
        }
    }

    /// Register a configured directory under its canonical path.
    ///
    /// The entry is due immediately. Returns the key it was stored under.
    pub fn register(&mut self, spec: DirectorySpec, now: DateTime<Utc>) -> PathBuf {
        let key = match std::fs::canonicalize(&spec.path) {
            Ok(resolved) => {
                if resolved != spec.path {
                    warn!(
                        "{} is a symlink to {}",
                        spec.path.display(),
                        resolved.display()
                    );
                }
                resolved
            }
            Err(e) => {
                warn!(
                    "Could not resolve '{}', registering as configured: {e}",
                    spec.path.display()
                );
                spec.path.clone()
            }
        };

        if self.entries.contains_key(&key) {
            warn!(
                "Directory '{}' configured more than once, keeping the last entry",
                key.display()
            );
        }

        let entry = WatchEntry::new(key.clone(), Arc::new(spec), now);
        self.entries.insert(key.clone(), entry);
        key
    }

    /// Direct lookup, without any fallback.
    pub fn lookup(&self, path: &Path) -> Option<&WatchEntry> {
        self.entries.get(path)
    }

    /// Resolve an event path to its entry, registering one if needed.
    ///
    /// Unknown paths first adopt the spec of a registered directory that is
    /// the same filesystem object (a symlink pointing at it). Failing that, a
    /// default spec is synthesized. Either way the new entry is kept, so later
    /// events for the path resolve directly.
    pub fn resolve(&mut self, path: &Path, now: DateTime<Utc>) -> &WatchEntry {
        if !self.entries.contains_key(path) {
            let entry = self.fallback_entry(path, now);
            self.entries.insert(path.to_path_buf(), entry);
        }

        &self.entries[path]
    }

    fn fallback_entry(&self, path: &Path, now: DateTime<Utc>) -> WatchEntry {
        warn!(
            "No config found for directory '{}', looking for a symlinked directory",
            path.display()
        );

        let matched = self
            .entries
            .values()
            .find(|entry| self.identity.same_object(path, &entry.path));

        let spec = match matched {
            Some(entry) => {
                info!(
                    "Found symlink from '{}' -> '{}', attaching config for '{}'",
                    path.display(),
                    entry.path.display(),
                    entry.spec.path.display()
                );
                entry.spec.clone()
            }
            None => {
                warn!(
                    "Building default config for directory '{}'",
                    path.display()
                );
                Arc::new(DirectorySpec::fallback(path, self.default_interval))
            }
        };

        WatchEntry::new(path.to_path_buf(), spec, now)
    }

    /// Schedule the next scan of `path` one interval after `started_at`.
    ///
    /// Returns the new due time, or `None` for an unregistered path.
    pub fn record_scan(&mut self, path: &Path, started_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let entry = self.entries.get_mut(path)?;
        entry.next_scan_due = TimeDelta::from_std(entry.spec.interval)
            .ok()
            .and_then(|interval| started_at.checked_add_signed(interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(entry.next_scan_due)
    }

    /// Paths whose scheduled scan is due at `now`, in key order.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        self.entries
            .values()
            .filter(|entry| entry.is_due(now))
            .map(|entry| entry.path.clone())
            .collect()
    }

    /// All entries, in key order.
    pub fn entries(&self) -> impl Iterator<Item = &WatchEntry> {
        self.entries.values()
    }

    /// All registered paths, in key order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries, including aliases and synthesized ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.entries)
            .field("default_interval", &self.default_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DirectoryConfig, EngineSettings};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Treats configured pairs as identical and records every query.
    #[derive(Default)]
    struct FakeIdentity {
        pairs: Vec<(PathBuf, PathBuf)>,
        queries: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
    }

    impl PathIdentity for FakeIdentity {
        fn same_object(&self, a: &Path, b: &Path) -> bool {
            self.queries
                .lock()
                .unwrap()
                .push((a.to_path_buf(), b.to_path_buf()));
            self.pairs.iter().any(|(x, y)| x == a && y == b)
        }
    }

    fn spec(dir: &Path, frequency: u64) -> DirectorySpec {
        let config = DirectoryConfig::new(dir.display().to_string()).with_frequency(frequency);
        DirectorySpec::compile(&config, &EngineSettings::default()).unwrap()
    }

    fn canonical(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap()
    }

    #[test]
    fn test_register_uses_canonical_path() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = Registry::new(Box::new(FsIdentity), Duration::from_secs(1800));
        let now = Utc::now();

        let key = registry.register(spec(temp_dir.path(), 60), now);

        assert_eq!(key, canonical(temp_dir.path()));
        let entry = registry.lookup(&key).unwrap();
        assert_eq!(entry.next_scan_due, now);
        assert!(entry.is_due(now));
        assert_eq!(entry.spec.path, temp_dir.path());
    }

    #[cfg(unix)]
    #[test]
    fn test_register_resolves_symlink() {
        let target = TempDir::new().unwrap();
        let links = TempDir::new().unwrap();
        let link = links.path().join("data");
        std::os::unix::fs::symlink(target.path(), &link).unwrap();

        let mut registry = Registry::new(Box::new(FsIdentity), Duration::from_secs(1800));
        let key = registry.register(spec(&link, 60), Utc::now());

        assert_eq!(key, canonical(target.path()));
        assert!(registry.lookup(&link).is_none());
        assert_eq!(registry.lookup(&key).unwrap().spec.path, link);
    }

    #[test]
    fn test_register_missing_directory_keeps_configured_path() {
        let mut registry = Registry::new(Box::new(FsIdentity), Duration::from_secs(1800));
        let key = registry.register(spec(Path::new("/nonexistent/dirstat"), 60), Utc::now());

        assert_eq!(key, Path::new("/nonexistent/dirstat"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_direct_hit_skips_identity() {
        let temp_dir = TempDir::new().unwrap();
        let identity = FakeIdentity::default();
        let queries = identity.queries.clone();
        let mut registry = Registry::new(Box::new(identity), Duration::from_secs(1800));
        let key = registry.register(spec(temp_dir.path(), 60), Utc::now());

        let entry = registry.resolve(&key, Utc::now());

        assert_eq!(entry.path, key);
        assert!(queries.lock().unwrap().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_aliases_same_object() {
        let temp_dir = TempDir::new().unwrap();
        let key = canonical(temp_dir.path());
        let alias = PathBuf::from("/mnt/alias");
        let identity = FakeIdentity {
            pairs: vec![(alias.clone(), key.clone())],
            ..Default::default()
        };
        let mut registry = Registry::new(Box::new(identity), Duration::from_secs(1800));
        registry.register(spec(temp_dir.path(), 600), Utc::now());

        let entry = registry.resolve(&alias, Utc::now()).clone();

        assert_eq!(entry.path, alias);
        assert_eq!(entry.spec.path, temp_dir.path());
        assert_eq!(entry.spec.interval, Duration::from_secs(600));
        assert!(Arc::ptr_eq(
            &entry.spec,
            &registry.lookup(&key).unwrap().spec
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_resolve_synthesizes_default_once() {
        let temp_dir = TempDir::new().unwrap();
        let identity = FakeIdentity::default();
        let queries = identity.queries.clone();
        let mut registry = Registry::new(Box::new(identity), Duration::from_secs(1800));
        registry.register(spec(temp_dir.path(), 600), Utc::now());
        let unknown = PathBuf::from("/elsewhere");

        let first = registry.resolve(&unknown, Utc::now()).spec.clone();
        assert_eq!(first.path, unknown);
        assert_eq!(first.interval, Duration::from_secs(1800));
        assert!(first.exclude.is_empty());
        assert!(first.include.is_empty());
        assert!(!first.only_files);
        assert_eq!(queries.lock().unwrap().len(), 1);

        let second = registry.resolve(&unknown, Utc::now()).spec.clone();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(queries.lock().unwrap().len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_fs_identity_matches_symlink() {
        let target = TempDir::new().unwrap();
        let links = TempDir::new().unwrap();
        let link = links.path().join("data");
        std::os::unix::fs::symlink(target.path(), &link).unwrap();

        assert!(FsIdentity.same_object(&link, target.path()));
        assert!(!FsIdentity.same_object(links.path(), target.path()));
        assert!(!FsIdentity.same_object(Path::new("/nonexistent/a"), target.path()));
    }

    #[test]
    fn test_record_scan_advances_from_start() {
        let fast = TempDir::new().unwrap();
        let mut registry = Registry::new(Box::new(FsIdentity), Duration::from_secs(1800));
        let key = registry.register(spec(fast.path(), 60), Utc::now());
        let started_at = Utc::now();

        let next = registry.record_scan(&key, started_at).unwrap();

        assert_eq!(next, started_at + TimeDelta::seconds(60));
        assert_eq!(registry.lookup(&key).unwrap().next_scan_due, next);
        assert!(registry.due(started_at).is_empty());
        assert_eq!(registry.due(next), vec![key]);
        assert!(registry.record_scan(Path::new("/unknown"), started_at).is_none());
    }
}
