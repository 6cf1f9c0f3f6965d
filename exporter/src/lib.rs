//! # Directory Statistics Exporter
//!
//! Wires the observation engine to its outer surfaces: configuration loading,
//! logging, the `/metrics` HTTP endpoint, and process signals.

pub mod cli;
pub mod logging;
pub mod server;

use std::sync::Arc;

use anyhow::Context;
use dirstat_directory_watcher::{
    DirectoryWatcher, ExporterConfig, FsIdentity, ObservationEngine, PrometheusSink,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use cli::Cli;

/// Run the exporter until SIGINT or SIGTERM.
///
/// Configuration problems fail before any directory is watched.
pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    info!("dirstat-exporter {}", env!("CARGO_PKG_VERSION"));

    let settings = cli.settings();
    let config = ExporterConfig::from_file(&cli.config)
        .with_context(|| format!("error reading config file '{}'", cli.config.display()))?;
    let specs = config
        .compile(&settings)
        .context("invalid directory configuration")?;

    let sink = Arc::new(PrometheusSink::new().context("failed to register metrics")?);
    let addr = cli.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("can not start metrics server on {addr}"))?;

    let cancel = CancellationToken::new();
    let server = tokio::spawn(server::serve(listener, sink.clone(), cancel.clone()));
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let mut engine = ObservationEngine::new(specs, settings, sink, Box::new(FsIdentity));
    let (watcher, events) = DirectoryWatcher::new().context("failed to create watcher")?;
    let result = engine.start(watcher, events, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = server.await? {
        error!("Metrics server failed: {e}");
    }

    result.context("watching dirs failed")
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal");
}
