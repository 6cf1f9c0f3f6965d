//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `debug` is true.
pub fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(debug)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn default_directive(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }
}
