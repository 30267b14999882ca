// conversation-memory/src/telemetry.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber using `RUST_LOG` (default `info`).
pub fn init_tracing() -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    init_tracing_with(&filter)
}

/// Install the global subscriber with an explicit filter directive such as
/// `conversation_memory=debug`.
///
/// Log lines go to stderr so command output on stdout stays machine-readable.
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing_with(filter: &str) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_rejected() {
        init_tracing_with("warn");
        assert!(!init_tracing_with("debug"));
    }
}
