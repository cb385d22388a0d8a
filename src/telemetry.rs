//! Logging initialisation.
//!
//! Warnings about skipped elements and progress messages go to stderr so
//! that the summary on stdout stays machine-readable. `RUST_LOG` overrides
//! the default level.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `quiet` limits output to errors.
pub fn init(quiet: bool) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .try_init();
}
