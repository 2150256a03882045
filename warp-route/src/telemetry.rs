//! Tracing setup.

use std::env;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str =
    "warp_core=info,warp_collateral=info,warp_synthetic=info,warp_route=info";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; `WARP_LOG_FORMAT=json` switches to JSON lines. Safe
/// to call more than once: later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = env::var("WARP_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if installed.is_ok() {
        tracing::debug!("tracing initialised");
    }
}
