//! Layered configuration loading (SPEC_FULL §1A "Configuration").
//!
//! Precedence (lowest to highest): compiled-in defaults → project config
//! file → local override file → `TASKFORGE_`-prefixed environment
//! variables.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to extract configuration: {0}")]
    Extract(String),

    #[error("invalid max_concurrent_sessions: {0}. Must be at least 1")]
    InvalidConcurrency(usize),

    #[error("invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("invalid promotion_threshold: {0}. Must be within [0, 1]")]
    InvalidPromotionThreshold(f64),

    #[error("invalid log_level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error(
        "invalid alert_threshold_secs ({alert}): must be >= warn_threshold_secs ({warn})"
    )]
    InvalidThresholdOrdering { warn: i64, alert: i64 },
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `.taskforge/config.yaml`, `.taskforge/local.yaml`,
    /// and the environment, validating the merged result.
    pub fn load() -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".taskforge/config.yaml"))
            .merge(Yaml::file(".taskforge/local.yaml"))
            .merge(Env::prefixed("TASKFORGE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .map_err(|e| ConfigError::Extract(e.to_string()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.concurrency.max_concurrent_sessions == 0 {
            return Err(ConfigError::InvalidConcurrency(0));
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(0));
        }
        if !(0.0..=1.0).contains(&config.knowledge.promotion_threshold) {
            return Err(ConfigError::InvalidPromotionThreshold(config.knowledge.promotion_threshold));
        }
        if !matches!(config.log_level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::InvalidLogLevel(config.log_level.clone()));
        }
        if config.session.alert_threshold_secs < config.session.warn_threshold_secs {
            return Err(ConfigError::InvalidThresholdOrdering {
                warn: config.session.warn_threshold_secs,
                alert: config.session.alert_threshold_secs,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(ConfigLoader::validate(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.concurrency.max_concurrent_sessions = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConcurrency(0))
        ));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut config = Config::default();
        config.session.warn_threshold_secs = 1000;
        config.session.alert_threshold_secs = 100;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThresholdOrdering { .. })
        ));
    }
}
