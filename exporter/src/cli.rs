//! Command line flags.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dirstat_directory_watcher::EngineSettings;

/// Export per-directory file statistics as Prometheus metrics.
#[derive(Debug, Clone, Parser)]
#[command(name = "dirstat-exporter", version, about)]
pub struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "directory-exporter.json")]
    pub config: PathBuf,

    /// Listener for the Prometheus metrics handler. `:PORT` binds all interfaces.
    #[arg(long, default_value = ":2112")]
    pub listen: String,

    /// Set the log level to debug. `RUST_LOG` takes precedence.
    #[arg(long)]
    pub debug: bool,

    /// Seconds between scheduling ticks.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval: u64,

    /// Scan interval in seconds for directories without a usable frequency.
    #[arg(long, default_value_t = 1800, value_parser = clap::value_parser!(u64).range(1..))]
    pub default_frequency: u64,

    /// Configured frequencies at or below this many seconds use the default.
    #[arg(long, default_value_t = 30)]
    pub min_frequency: u64,
}

impl Cli {
    /// Scheduling settings derived from the flags.
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            tick_interval: Duration::from_secs(self.tick_interval),
            default_interval: Duration::from_secs(self.default_frequency),
            min_interval: Duration::from_secs(self.min_frequency),
        }
    }

    /// Socket address for the metrics listener.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen.clone(),
        };
        addr.parse()
            .with_context(|| format!("invalid listen address '{}'", self.listen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["dirstat-exporter"]).unwrap();

        assert_eq!(cli.config, PathBuf::from("directory-exporter.json"));
        assert!(!cli.debug);
        assert_eq!(cli.settings(), EngineSettings::default());
        assert_eq!(
            cli.listen_addr().unwrap(),
            "0.0.0.0:2112".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_explicit_flags() {
        let cli = Cli::try_parse_from([
            "dirstat-exporter",
            "--config",
            "/etc/dirstat.json",
            "--listen",
            "127.0.0.1:9100",
            "--debug",
            "--tick-interval",
            "5",
            "--default-frequency",
            "600",
            "--min-frequency",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/dirstat.json"));
        assert!(cli.debug);
        assert_eq!(
            cli.settings(),
            EngineSettings {
                tick_interval: Duration::from_secs(5),
                default_interval: Duration::from_secs(600),
                min_interval: Duration::from_secs(10),
            }
        );
        assert_eq!(
            cli.listen_addr().unwrap(),
            "127.0.0.1:9100".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_rejects_zero_tick() {
        assert!(Cli::try_parse_from(["dirstat-exporter", "--tick-interval", "0"]).is_err());
    }

    #[test]
    fn test_invalid_listen_address() {
        let cli = Cli::try_parse_from(["dirstat-exporter", "--listen", "not-an-addr"]).unwrap();
        assert!(cli.listen_addr().is_err());
    }
}
