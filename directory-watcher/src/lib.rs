//! # Directory Watcher
//!
//! Continuously computes per-directory file statistics and publishes them to a
//! metrics sink, on a schedule and in reaction to filesystem events.
//!
//! ## Features
//!
//! - **Scheduled Scans**: Coarse timer with a per-directory minimum interval
//! - **Real-time Watching**: Change events trigger an immediate rescan
//! - **Include/Exclude Patterns**: Regular expressions over full entry paths
//! - **Symlink Resolution**: Directories are keyed by their canonical path
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Observation Engine                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ExporterConfig ──► Registry ◄── DirectoryWatcher (events)      │
//! │                        │                                        │
//! │                        ▼                                        │
//! │  PatternSet ──► DirectoryScanner ──► ScanResult ──► MetricsSink │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pattern;
pub mod registry;
pub mod scanner;
pub mod watcher;

pub use config::{DirectoryConfig, DirectorySpec, EngineSettings, ExporterConfig};
pub use engine::ObservationEngine;
pub use error::{Result, WatcherError};
pub use event::{EventBatch, FileEvent, FileEventKind, WatchMessage};
pub use metrics::{MetricsSink, PrometheusSink, UNSPECIFIED_LABEL};
pub use pattern::PatternSet;
pub use registry::{FsIdentity, PathIdentity, Registry, WatchEntry};
pub use scanner::{DirectoryScanner, ScanResult};
pub use watcher::DirectoryWatcher;
