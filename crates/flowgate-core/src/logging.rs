//! Tracing subscriber bootstrap.
//!
//! The gateway is single-user, single-process: structured logs go to stderr
//! as JSON (for log-shipping) or compact text (for a terminal), selected by
//! `FLOWGATE_LOG_FORMAT`, with the level controlled by `RUST_LOG`/`FLOWGATE_LOG`
//! (`EnvFilter` syntax, e.g. `flowgate_runtime=debug,info`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber. Safe to call once at process
/// start; a second call is a no-op (errors are swallowed).
pub fn init() {
    let filter = EnvFilter::try_from_env("FLOWGATE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("FLOWGATE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let _ = registry.with(fmt::layer().json().with_current_span(true)).try_init();
    } else {
        let _ = registry.with(fmt::layer().compact()).try_init();
    }
}
