use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. RUST_LOG wins over `level` when set.
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
