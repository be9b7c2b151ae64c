//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LogSettings};

/// Dependency targets that are too chatty below `warn`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rmcp", "h2"];

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn env_filter(settings: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(settings)))
}

fn directives(settings: &LogSettings) -> String {
    let mut directives = vec![settings.level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(settings: &LogSettings) {
    let filter = env_filter(settings);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match settings.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
