//! `tracing` subscriber setup.
//!
//! `RUST_LOG` takes precedence over `logging.level`; `--verbose` raises the
//! default to `debug`. Logs go to stderr so command output on stdout stays
//! machine-readable.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Resolve the default filter directive for the given settings.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. Call once, before any engine work.
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let directive = default_directive(config, verbose);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_overrides_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json: false,
        };
        assert_eq!(default_directive(&config, false), "warn");
        assert_eq!(default_directive(&config, true), "debug");
    }
}
