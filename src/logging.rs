//! Diagnostic logging.
//!
//! Log lines go to stderr so they never mix with the menus on stdout. The
//! filter is read from `PAPERSCAN_LOG` using `tracing_subscriber` directive
//! syntax, e.g. `PAPERSCAN_LOG=paperscan=debug`.

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "PAPERSCAN_LOG";
pub const DEFAULT_FILTER: &str = "warn";

/// Filter for the given directives, or [`DEFAULT_FILTER`] when they are absent or invalid.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init() {
    let directives = std::env::var(LOG_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
