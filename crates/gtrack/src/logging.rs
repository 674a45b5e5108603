#![forbid(unsafe_code)]

//! Global `tracing` subscriber setup.
//!
//! The filter comes from the `GTRACK_LOG` environment variable when it is set
//! and parses, otherwise from [`LoggingConfig::level`]. Output goes to stderr.
//!
//! ```no_run
//! use gtrack::logging;
//! use gtrack_runtime::LoggingConfig;
//!
//! logging::init(&LoggingConfig::default()).ok();
//! ```

use std::fmt;

use gtrack_runtime::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured filter.
pub const ENV_VAR: &str = "GTRACK_LOG";

/// Errors from [`init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    /// JSON output was requested without the `tracing-json` feature.
    JsonUnavailable,
    /// A global subscriber is already installed, or installation failed.
    Init(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JsonUnavailable => {
                write!(f, "JSON log output requires the `tracing-json` feature")
            }
            Self::Init(msg) => write!(f, "failed to install subscriber: {msg}"),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Filter from `GTRACK_LOG`, falling back to the configured level.
#[must_use]
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`LoggingError::Init`] if a global subscriber already exists and
/// [`LoggingError::JsonUnavailable`] for JSON output without the
/// `tracing-json` feature.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        #[cfg(feature = "tracing-json")]
        LogFormat::Json => builder.json().try_init(),
        #[cfg(not(feature = "tracing-json"))]
        LogFormat::Json => return Err(LoggingError::JsonUnavailable),
    };
    installed.map_err(|err| LoggingError::Init(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_level_is_the_fallback() {
        if std::env::var_os(ENV_VAR).is_some() {
            return;
        }
        let config = LoggingConfig {
            level: "warn".into(),
            ..LoggingConfig::default()
        };
        assert_eq!(
            env_filter(&config).max_level_hint(),
            Some(tracing_subscriber::filter::LevelFilter::WARN)
        );
    }

    #[cfg(not(feature = "tracing-json"))]
    #[test]
    fn json_needs_feature() {
        let config = LoggingConfig {
            format: LogFormat::Json,
            ..LoggingConfig::default()
        };
        assert_eq!(init(&config), Err(LoggingError::JsonUnavailable));
    }

    #[test]
    fn second_init_fails() {
        let config = LoggingConfig {
            level: "off".into(),
            ..LoggingConfig::default()
        };
        let _ = init(&config);
        assert!(matches!(init(&config), Err(LoggingError::Init(_))));
    }
}
