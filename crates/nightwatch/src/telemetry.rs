//! Tracing initialisation for nightwatch binaries.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` overrides `level` when set. JSON output is newline-delimited
/// for log aggregation. Safe to call more than once; only the first call
/// takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let base = tracing_subscriber::registry().with(env_filter);

    if json {
        base.with(fmt::layer().with_target(false).json()).try_init().ok();
    } else {
        base.with(fmt::layer().with_target(false)).try_init().ok();
    }
}
