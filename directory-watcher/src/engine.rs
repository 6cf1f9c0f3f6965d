//! Scan scheduling and the event loop.
//!
//! [`ObservationEngine`] decides when each registered directory is scanned:
//! once eagerly at startup, on a coarse timer for directories whose interval
//! has elapsed, and unconditionally whenever the watch subscription reports a
//! change inside a directory.
//!
//! The loop is single-threaded. Scans run inline, so a slow filesystem blocks
//! every other directory until its walk completes, and cancellation is only
//! observed between scans.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{DirectorySpec, EngineSettings};
use crate::error::{Result, WatcherError};
use crate::event::{EventBatch, WatchMessage};
use crate::metrics::{MetricsSink, UNSPECIFIED_LABEL};
use crate::registry::{PathIdentity, Registry};
use crate::scanner::{DirectoryScanner, ScanResult};
use crate::watcher::DirectoryWatcher;

/// Owns the registry and drives scans into a metrics sink.
pub struct ObservationEngine {
    registry: Registry,
    scanner: DirectoryScanner,
    settings: EngineSettings,
    sink: Arc<dyn MetricsSink>,
}

impl ObservationEngine {
    /// Register every directory. All of them start out due.
    pub fn new(
        specs: Vec<DirectorySpec>,
        settings: EngineSettings,
        sink: Arc<dyn MetricsSink>,
        identity: Box<dyn PathIdentity>,
    ) -> Self {
        let now = Utc::now();
        let mut registry = Registry::new(identity, settings.default_interval);
        for spec in specs {
            registry.register(spec, now);
        }

        Self {
            registry,
            scanner: DirectoryScanner::new(),
            settings,
            sink,
        }
    }

    /// The directory registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Scheduling settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Scan every registered directory regardless of its due time.
    pub fn scan_all(&mut self, now: DateTime<Utc>) -> Vec<PathBuf> {
        let paths = self.registry.paths();
        for path in &paths {
            self.scan_directory(path, now);
        }
        paths
    }

    /// Handle a timer tick: heartbeat, then scan every due directory.
    ///
    /// Scans in one tick share `now` as their start time. Returns the
    /// scanned paths.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Vec<PathBuf> {
        self.sink.heartbeat(now);

        for entry in self.registry.entries().filter(|entry| !entry.is_due(now)) {
            let wait = entry.next_scan_due - now;
            debug!(
                "Ignoring dir '{}' for {}s",
                entry.path.display(),
                wait.num_seconds()
            );
        }

        let due = self.registry.due(now);
        for path in &due {
            self.scan_directory(path, now);
        }
        due
    }

    /// Scan every directory touched by a batch of events.
    ///
    /// Event scans ignore due times. Each directory is scanned once per
    /// batch. Returns the scanned paths.
    pub fn on_events(&mut self, batch: &EventBatch, now: DateTime<Utc>) -> Vec<PathBuf> {
        for event in &batch.events {
            debug!(
                "Update detected on path '{}' ({:?})",
                event.path.display(),
                event.kind
            );
        }

        let registry = &self.registry;
        let directories = batch.directories(|path| registry.lookup(path).is_some());
        for dir in &directories {
            self.scan_directory(dir, now);
        }
        directories
    }

    /// Count an error reported by the watch backend.
    pub fn on_watch_error(&self, message: &str) {
        error!("Error while watching directories: {message}");
        self.sink.record_error(UNSPECIFIED_LABEL, 1);
    }

    /// Scan one directory, publish the result, and schedule the next scan.
    ///
    /// Unknown paths are resolved through the registry fallback first.
    pub fn scan_directory(&mut self, path: &Path, started_at: DateTime<Utc>) -> ScanResult {
        let entry = self.registry.resolve(path, started_at);
        let key = entry.path.clone();
        let spec = entry.spec.clone();
        let label = spec.label();

        let result = self.scanner.scan(&key, &spec);
        if result.failed {
            error!("Error getting count of files for '{label}'");
        }
        self.sink.record_error(&label, result.error_count());

        let next_scan_due = self
            .registry
            .record_scan(&key, started_at)
            .unwrap_or(started_at);
        self.sink.publish(&label, &result, next_scan_due);

        result
    }

    /// Subscribe every directory, run the eager pass, then loop until
    /// cancelled. The subscription is released before returning.
    ///
    /// A directory that cannot be watched aborts startup.
    pub async fn start(
        &mut self,
        mut watcher: DirectoryWatcher,
        mut events: mpsc::Receiver<WatchMessage>,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.registry.is_empty() {
            warn!("No directories configured, only the heartbeat will be exported");
        }
        for entry in self.registry.entries() {
            if !entry.path.is_dir() {
                return Err(WatcherError::DirectoryNotFound(
                    entry.path.display().to_string(),
                ));
            }
            info!(
                "Watching dir '{}', updating each {} seconds",
                entry.path.display(),
                entry.spec.interval.as_secs()
            );
        }
        for path in self.registry.paths() {
            watcher.watch(&path)?;
        }

        self.scan_all(Utc::now());
        self.run(&mut events, &cancel).await;

        watcher.unwatch_all();
        Ok(())
    }

    /// The event loop.
    ///
    /// Inputs are polled in a fixed order: cancellation, watch messages, then
    /// the timer. Messages already queued are drained into one batch. The
    /// first tick fires one period after the loop starts. A closed watch
    /// channel leaves the timer running.
    pub async fn run(
        &mut self,
        events: &mut mpsc::Receiver<WatchMessage>,
        cancel: &CancellationToken,
    ) {
        // `interval_at` rejects a zero period.
        let period = self.settings.tick_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Caught signal, stopping.");
                    break;
                }

                Some(message) = events.recv() => {
                    let mut batch = EventBatch::new();
                    self.handle_message(message, &mut batch);
                    while let Ok(message) = events.try_recv() {
                        self.handle_message(message, &mut batch);
                    }
                    if !batch.is_empty() {
                        self.on_events(&batch, Utc::now());
                    }
                }

                _ = ticker.tick() => {
                    self.on_tick(Utc::now());
                }
            }
        }
    }

    fn handle_message(&self, message: WatchMessage, batch: &mut EventBatch) {
        match message {
            WatchMessage::Event(event) => batch.push(event),
            WatchMessage::Error(e) => self.on_watch_error(&e),
        }
    }
}

impl std::fmt::Debug for ObservationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationEngine")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
