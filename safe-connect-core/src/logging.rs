//! Logging setup for the safe-connect binary.
//!
//! All diagnostics go to stderr. Stdout belongs to the client session and may
//! be consumed by automation.

use crate::Result;
use tracing_subscriber::EnvFilter;

/// Maps the command-line verbosity knobs to a maximum log level.
///
/// `quiet` wins over everything, `debug` raises the floor to DEBUG.
pub fn level_for(verbose: u8, quiet: bool, debug: bool) -> tracing::Level {
    match (quiet, debug, verbose) {
        (true, _, _) => tracing::Level::ERROR,
        (false, false, 0) => tracing::Level::WARN,
        (false, false, 1) => tracing::Level::INFO,
        (false, true, 0..=2) | (false, false, 2) => tracing::Level::DEBUG,
        (false, _, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging on stderr.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=WARN, 1=INFO, 2=DEBUG, 3+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `debug` - If true, show at least DEBUG level logs
///
/// `RUST_LOG` takes precedence over the computed level when set.
///
/// # Example
/// ```rust,no_run
/// use safe_connect_core::logging::init_logging;
///
/// init_logging(1, false, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, debug: bool) -> Result<()> {
    let level = level_for(verbose, quiet, debug);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| {
            crate::error::SafeConnectError::configuration(format!(
                "Failed to initialize logging: {}",
                e
            ))
        })?;

    Ok(())
}
