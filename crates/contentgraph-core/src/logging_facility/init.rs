//! Logging initialization

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Logging profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, `contentgraph=debug` unless `RUST_LOG` says otherwise
    Development,
    /// JSON lines, `contentgraph=info` unless `RUST_LOG` says otherwise
    Production,
    /// Bare registry; tests install their own layer via `init_test_capture()`
    Test,
}

static INIT_ONCE: Once = Once::new();

/// Initialize the global subscriber for the given profile
///
/// Only the first call has an effect. Later calls, including calls with a
/// different profile, are ignored.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(default_filter("contentgraph=debug"))
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(default_filter("contentgraph=info"))
                .init();
        }
        Profile::Test => {
            tracing_subscriber::registry().init();
        }
    });
}

fn default_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
