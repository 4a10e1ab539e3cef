//! Configuration loader with environment variable expansion

use super::{ConfigError, HarnessConfig};
use regex_lite::{Captures, Regex};
use std::path::Path;

/// Environment variable naming an optional YAML config file
pub const CONFIG_PATH_ENV: &str = "LOCALSTACK_HARNESS_CONFIG";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<HarnessConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<HarnessConfig, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: HarnessConfig = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file named by [`CONFIG_PATH_ENV`], falling back to defaults
    pub fn from_env() -> Result<HarnessConfig, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => {
                tracing::debug!(path = %path, "Loading harness config");
                Self::load(path)
            }
            _ => {
                let config = HarnessConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Expand `${VAR}` and `${VAR:-default}`.
    ///
    /// A variable that is unset and has no default keeps its placeholder.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let expanded = re.replace_all(content, |caps: &Captures<'_>| {
            match std::env::var(&caps[1]) {
                Ok(value) => value,
                Err(_) => match caps.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => caps[0].to_string(),
                },
            }
        });

        Ok(expanded.into_owned())
    }
}
