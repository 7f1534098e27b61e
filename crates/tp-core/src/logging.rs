//! Diagnostic logging setup.
//!
//! Logs go to stderr; stdout carries only the itinerary text.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Filter variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "TRAVELPLAN_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "warn"
    }
}

fn resolve_env_filter(verbose: bool) -> EnvFilter {
    for key in [LOG_ENV, "RUST_LOG"] {
        if let Ok(value) = std::env::var(key) {
            if let Ok(filter) = EnvFilter::try_new(value) {
                return filter;
            }
        }
    }
    EnvFilter::new(default_directive(verbose))
}

/// Install the stderr subscriber. Later calls are no-ops.
pub fn init_logging(verbose: bool) {
    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(resolve_env_filter(verbose))
        .with(console_layer)
        .try_init();
}
