//! Logging initialization.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber.
///
/// Log output goes to stderr so redacted text on stdout stays clean. The
/// `SCRUB_LOG` environment variable overrides the level (`EnvFilter`
/// syntax); `verbose` bumps the default from `info` to `debug`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "scrub=debug" } else { "scrub=info" };
    let filter = EnvFilter::try_from_env("SCRUB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
