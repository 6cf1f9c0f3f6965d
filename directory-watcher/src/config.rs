//! Configuration types for observed directories.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, WatcherError};
use crate::pattern::PatternSet;

/// Default period of the coarse scheduling tick.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval used when a directory has no usable frequency configured.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Configured frequencies at or below this floor fall back to the default.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Top-level configuration file: `{ "dirs": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Directories to observe, in configuration order.
    #[serde(default)]
    pub dirs: Vec<DirectoryConfig>,
}

impl ExporterConfig {
    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded {} directories from {}",
            config.dirs.len(),
            path.display()
        );
        Ok(config)
    }

    /// Validate every directory and compile its patterns.
    pub fn compile(&self, settings: &EngineSettings) -> Result<Vec<DirectorySpec>> {
        self.dirs
            .iter()
            .map(|dir| DirectorySpec::compile(dir, settings))
            .collect()
    }
}

/// Configuration for one observed directory, as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Path to the directory.
    pub dir: String,

    /// Minimum seconds between scheduled scans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,

    /// Count files only; directories are not countable entries.
    #[serde(default)]
    pub only_files: bool,

    /// Regular expressions for entries to exclude.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_files: Vec<String>,

    /// Regular expressions for entries to include.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_files: Vec<String>,
}

impl DirectoryConfig {
    /// Create a new directory config.
    pub fn new(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the scan frequency in seconds.
    pub fn with_frequency(mut self, seconds: u64) -> Self {
        self.frequency = Some(seconds);
        self
    }

    /// Count files only.
    pub fn only_files(mut self) -> Self {
        self.only_files = true;
        self
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_files.push(pattern.into());
        self
    }

    /// Add an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include_files.push(pattern.into());
        self
    }
}

/// Process-wide scheduling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Period of the coarse scheduling tick.
    pub tick_interval: Duration,

    /// Interval for directories without a usable frequency.
    pub default_interval: Duration,

    /// Frequencies at or below this floor are replaced by the default.
    pub min_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            default_interval: DEFAULT_SCAN_INTERVAL,
            min_interval: MIN_SCAN_INTERVAL,
        }
    }
}

/// Effective re-scan interval for a configured frequency.
pub fn effective_interval(frequency: Option<u64>, settings: &EngineSettings) -> Duration {
    match frequency.map(Duration::from_secs) {
        Some(interval) if interval > settings.min_interval => interval,
        _ => settings.default_interval,
    }
}

/// A validated directory with compiled patterns. Immutable after load.
#[derive(Debug, Clone)]
pub struct DirectorySpec {
    /// The path as configured. Used as the metric label.
    pub path: PathBuf,

    /// Minimum time between scheduled scans.
    pub interval: Duration,

    /// Count files only.
    pub only_files: bool,

    /// Entries matching any of these are excluded.
    pub exclude: PatternSet,

    /// When non-empty, only matching entries are counted.
    pub include: PatternSet,
}

impl DirectorySpec {
    /// Validate a directory config and compile its patterns.
    pub fn compile(config: &DirectoryConfig, settings: &EngineSettings) -> Result<Self> {
        if config.dir.trim().is_empty() {
            return Err(WatcherError::Config(
                "directory entry with an empty `dir`".to_string(),
            ));
        }

        if !config.exclude_files.is_empty() {
            info!(
                "Building {} exclude patterns for dir '{}'",
                config.exclude_files.len(),
                config.dir
            );
        }
        if !config.include_files.is_empty() {
            info!(
                "Building {} include patterns for dir '{}'",
                config.include_files.len(),
                config.dir
            );
        }

        Ok(Self {
            path: PathBuf::from(&config.dir),
            interval: effective_interval(config.frequency, settings),
            only_files: config.only_files,
            exclude: PatternSet::compile(&config.dir, &config.exclude_files)?,
            include: PatternSet::compile(&config.dir, &config.include_files)?,
        })
    }

    /// Spec used for paths that could not be matched to any configured one.
    pub fn fallback(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            only_files: false,
            exclude: PatternSet::default(),
            include: PatternSet::default(),
        }
    }

    /// Label under which this directory's metrics are exported.
    pub fn label(&self) -> String {
        self.path.display().to_string()
    }
}
