use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Logs go to stderr; stdout carries the JSON-lines protocol.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
