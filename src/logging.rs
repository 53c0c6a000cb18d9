//! Diagnostic logging setup.
//!
//! Logs go to stderr so JSON output on stdout stays machine-readable.
//! `RUST_LOG` takes precedence over `--log-level`.

use tracing_subscriber::EnvFilter;

pub(crate) fn init(log_level: &str) {
    let fallback_level = match log_level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "error" => "error",
        "off" => "off",
        _ => "warn",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
