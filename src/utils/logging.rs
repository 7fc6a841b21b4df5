use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber once at program start. `RUST_LOG` wins over
/// `default_filter`.
pub fn init(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
