//! Tracing initialisation for backport binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be installed once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: `level` for the backport crates,
/// `warn` for everything else (HTTP stack included).
pub fn default_filter(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    format!("warn,backport_core={level},backport_github={level},backport={level}")
}

/// Install the global subscriber.
///
/// * `json` - emit newline-delimited JSON instead of human-readable lines.
/// * `level` - verbosity of the backport crates when `RUST_LOG` is unset.
///
/// Logs go to stderr so stdout stays free for command output.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_level_to_backport_crates() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("backport_core=debug"));
        assert!(filter.contains("backport_github=debug"));
    }

    #[test]
    fn test_init_tracing_twice_does_not_panic() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
