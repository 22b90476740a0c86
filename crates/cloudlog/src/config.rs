//! Logger configuration types.

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Output encoding for emitted log entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-readable, line-oriented console output.
    #[default]
    Lines,
    /// One JSON object per line, keyed for the Cloud Logging ingestion schema.
    GoogleCloud,
}

/// Log-volume sampling knobs, applied per message pattern per one-second window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Occurrences of a given message logged verbatim at the start of a window.
    pub initial: u64,
    /// After `initial`, one occurrence in every `thereafter` is kept.
    /// A value of 0 is treated as 1.
    pub thereafter: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            initial: 100,
            thereafter: 100,
        }
    }
}

/// Configuration the logger engine is built from.
///
/// Read once at build time; the built engine never observes later changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Output encoding.
    pub format: LogFormat,
    /// When set, debug-level entries are emitted; otherwise the threshold is info.
    pub debug_logging: bool,
    /// Sampling policy, or `None` to log every entry.
    pub sampling: Option<SamplingConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Lines,
            debug_logging: false,
            sampling: Some(SamplingConfig::default()),
        }
    }
}

impl LoggerConfig {
    /// Minimum severity the engine will emit.
    pub fn max_level(&self) -> LevelFilter {
        if self.debug_logging {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    /// The threshold as an `EnvFilter` directive string.
    pub(crate) fn filter_directive(&self) -> &'static str {
        if self.debug_logging {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggerConfig::default();
        assert_eq!(config.format, LogFormat::Lines);
        assert!(!config.debug_logging);
        assert_eq!(config.sampling, Some(SamplingConfig { initial: 100, thereafter: 100 }));
        assert_eq!(config.max_level(), LevelFilter::INFO);
        assert_eq!(config.filter_directive(), "info");
    }

    #[test]
    fn test_debug_raises_threshold() {
        let config = LoggerConfig {
            debug_logging: true,
            ..Default::default()
        };
        assert_eq!(config.max_level(), LevelFilter::DEBUG);
        assert_eq!(config.filter_directive(), "debug");
    }

    #[test]
    fn test_config_deserializes_from_partial_input() {
        let config: LoggerConfig = serde_json::from_str(r#"{"format":"google-cloud"}"#).unwrap();
        assert_eq!(config.format, LogFormat::GoogleCloud);
        assert!(!config.debug_logging);
        assert!(config.sampling.is_some());
    }
}
