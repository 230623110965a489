//! Subscriber setup for binaries and tests embedding the runtime

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
pub const LOG_ENV: &str = "CLOUDWEAVE_LOG";

const DEFAULT_LEVEL: &str = "info";

fn filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LEVEL)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

/// Installs the global fmt subscriber
///
/// `CLOUDWEAVE_LOG` wins over `configured`; both fall back to `info`.
/// Panics when a global subscriber is already set, like
/// `tracing_subscriber::fmt::init`.
pub fn init(configured: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(configured))
        .with_writer(std::io::stderr)
        .init();
}

/// Like [`init`] but a no-op when a subscriber is already installed
pub fn try_init(configured: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(configured))
        .with_writer(std::io::stderr)
        .with_test_writer()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_is_idempotent() {
        try_init(Some("debug"));
        assert!(!try_init(Some("debug")));
    }

    #[test]
    fn test_invalid_directive_falls_back() {
        // unparsable directives must not panic
        let _ = filter(Some("=="));
    }
}
