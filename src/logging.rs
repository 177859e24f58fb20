use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber
///
/// Logs go to stderr; in `invoke` mode stdout carries the response body.
/// `RUST_LOG` overrides the level chosen by `debug`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},lettre=warn", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if debug {
        tracing::debug!("Debug logging enabled");
    }
}
