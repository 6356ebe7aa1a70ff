//! Diagnostic logging setup.
//!
//! Command echo and stage banners stay on stdout; `tracing` events go to stderr and are filtered
//! through `XTASK_LOG` (for example `XTASK_LOG=xtask=debug`).

use crate::runtime::env::EnvHelper;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "warn";

/// Build the env filter used by [`init`].
pub fn filter_from(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Calling this twice is harmless; the second install is ignored.
pub fn init(env: &EnvHelper) {
    let filter = filter_from(env.log_filter().as_deref());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
