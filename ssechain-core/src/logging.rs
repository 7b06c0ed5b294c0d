//! Log output for the `origin`, `relay` and `test` run modes.
//!
//! Events come from three targets: `ssechain` (the binary), `ssechain_core`
//! (relay, upstream client, simulated origin) and `ssechain_http` (routes and
//! sessions). A `ssechain=info` directive covers all three by prefix;
//! `tower_http=debug` adds per-request spans.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber, writing to stderr so stdout stays free for
/// the rendered stream. `RUST_LOG` overrides `default_directives`.
pub fn init_tracing(default_directives: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true);

    if json {
        registry.with(layer.json().with_current_span(false)).init();
    } else {
        registry.with(layer.compact()).init();
    }
}
