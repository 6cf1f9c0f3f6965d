//! Metrics sink for scan results.
//!
//! The engine only writes through [`MetricsSink`]; exposition is left to the
//! caller, which can render a [`PrometheusSink`] with [`PrometheusSink::encode`].

use chrono::{DateTime, Utc};
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::scanner::ScanResult;

/// Namespace prefixed to every per-directory metric.
pub const NAMESPACE: &str = "directory_exporter";

/// Error label for failures not attributable to one directory.
pub const UNSPECIFIED_LABEL: &str = "UNSPECIFIED";

/// Destination for the values produced by the engine.
pub trait MetricsSink: Send + Sync {
    /// Export the statistics of one scan, overwriting the previous values.
    fn publish(&self, label: &str, result: &ScanResult, next_scan_due: DateTime<Utc>);

    /// Add `count` errors to the counter for `label`.
    fn record_error(&self, label: &str, count: u64);

    /// Mark the loop as alive.
    fn heartbeat(&self, now: DateTime<Utc>);
}

/// [`MetricsSink`] backed by a private Prometheus registry.
#[derive(Clone)]
pub struct PrometheusSink {
    registry: Registry,
    file_count: GaugeVec,
    files_size: GaugeVec,
    dir_size: GaugeVec,
    excluded_files: GaugeVec,
    next_scan: GaugeVec,
    scan_seconds: GaugeVec,
    errors: IntCounterVec,
    heartbeat: Gauge,
}

impl PrometheusSink {
    /// Create the sink and register all metrics.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let file_count = dir_gauge(
            &registry,
            "file_count_total",
            "The total number of files found recursively under given directory",
        )?;
        let files_size = dir_gauge(
            &registry,
            "file_size_bytes",
            "The size of all files that have been included or not been excluded",
        )?;
        let dir_size = dir_gauge(
            &registry,
            "dir_size_bytes",
            "The size of all files in the directory, even excluded files",
        )?;
        let excluded_files = dir_gauge(
            &registry,
            "excluded_files_total",
            "The total number of excluded files under given directory",
        )?;
        let next_scan = dir_gauge(
            &registry,
            "files_next_scan_timestamp_seconds",
            "Timestamp when next scan for given dir is started",
        )?;
        let scan_seconds = dir_gauge(
            &registry,
            "files_scan_process_seconds",
            "Seconds taken to scan given directory",
        )?;

        let errors = IntCounterVec::new(
            Opts::new("errors_total", "Errors while trying to access a directory")
                .namespace(NAMESPACE),
            &["dir"],
        )?;
        registry.register(Box::new(errors.clone()))?;

        let heartbeat = Gauge::new("heartbeat_seconds", "Continuous heartbeat of the exporter")?;
        registry.register(Box::new(heartbeat.clone()))?;

        Ok(Self {
            registry,
            file_count,
            files_size,
            dir_size,
            excluded_files,
            next_scan,
            scan_seconds,
            errors,
            heartbeat,
        })
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Content type of [`PrometheusSink::encode`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Current error count for `label`.
    pub fn errors(&self, label: &str) -> u64 {
        self.errors.with_label_values(&[label]).get()
    }
}

impl MetricsSink for PrometheusSink {
    fn publish(&self, label: &str, result: &ScanResult, next_scan_due: DateTime<Utc>) {
        let labels = [label];
        self.file_count
            .with_label_values(&labels)
            .set(result.file_count as f64);
        self.excluded_files
            .with_label_values(&labels)
            .set(result.excluded_files as f64);
        self.dir_size
            .with_label_values(&labels)
            .set(result.dir_size as f64);
        self.files_size
            .with_label_values(&labels)
            .set(result.files_size as f64);
        self.next_scan
            .with_label_values(&labels)
            .set(next_scan_due.timestamp() as f64);
        self.scan_seconds
            .with_label_values(&labels)
            .set(result.duration.as_secs_f64());
    }

    fn record_error(&self, label: &str, count: u64) {
        if count > 0 {
            self.errors.with_label_values(&[label]).inc_by(count);
        }
    }

    fn heartbeat(&self, now: DateTime<Utc>) {
        self.heartbeat.set(now.timestamp() as f64);
    }
}

impl std::fmt::Debug for PrometheusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusSink").finish_non_exhaustive()
    }
}

fn dir_gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["dir"])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}
