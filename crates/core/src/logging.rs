//! Logging and observability
//!
//! Alcatraz exposes exactly one environment switch for verbose logging
//! (`ALCA_DEBUG`); everything else is driven through `tracing`'s standard
//! `RUST_LOG` filter when set, matching the precedence used across the rest
//! of the tool (explicit override, then env var, then default).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system.
///
/// Precedence for the filter: `RUST_LOG` if set, else `debug` when
/// `ALCA_DEBUG` is set (to any non-empty value), else `info`.
pub fn init() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if std::env::var("ALCA_DEBUG").is_ok_and(|v| !v.is_empty()) {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!("logging initialized");
    Ok(())
}
