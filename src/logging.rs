//! Tracing subscriber setup for the server and client binaries.

use std::io;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install a stderr subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Calling this more than once keeps the first subscriber.
pub fn init_logging(level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .compact()
                    .with_writer(io::stderr),
            )
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
