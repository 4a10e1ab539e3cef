//! Configuration module for the LocalStack S3 harness
//!
//! Handles loading of YAML configuration with environment variable expansion
//! and validation. Every field has a default, so an empty document (or no file
//! at all) yields the stock LocalStack setup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::{ConfigLoader, CONFIG_PATH_ENV};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl HarnessConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Load from the file named by `LOCALSTACK_HARNESS_CONFIG`, or use defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::from_env()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let emulator = &self.emulator;
        if emulator.image.trim().is_empty() || emulator.tag.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Emulator image and tag must not be empty".into(),
            ));
        }

        if emulator.port == 0 {
            return Err(ConfigError::ValidationError(
                "Emulator port must be non-zero".into(),
            ));
        }

        if let Err(e) = regex_lite::Regex::new(&emulator.ready_pattern) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid readiness pattern '{}': {}",
                emulator.ready_pattern, e
            )));
        }

        if emulator.startup_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Startup timeout must be at least one second".into(),
            ));
        }

        if emulator.region.trim().is_empty() || self.client.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Region cannot be empty".into(),
            ));
        }

        // Both blank means "take them from the AWS environment variables".
        if self.client.access_key.is_empty() != self.client.secret_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "Client access_key and secret_key must be set together".into(),
            ));
        }

        if !is_valid_bucket_name(&self.scenario.bucket) {
            return Err(ConfigError::ValidationError(format!(
                "Scenario bucket '{}' is not a valid S3 bucket name \
                 (3-63 chars of a-z, 0-9, '-' and '.', starting and ending with a letter or digit)",
                self.scenario.bucket
            )));
        }

        if self.scenario.fixture_name.contains(['/', '\\']) || self.scenario.fixture_name.is_empty()
        {
            return Err(ConfigError::ValidationError(format!(
                "Fixture name '{}' must be a plain file name",
                self.scenario.fixture_name
            )));
        }

        Ok(())
    }
}

/// S3 naming rules: 3-63 chars, lowercase ASCII letters, digits, `-` and
/// `.`, first and last char a letter or digit
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }
    let edge_ok = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes
        .iter()
        .all(|b| edge_ok(b) || *b == b'-' || *b == b'.')
        && bytes.first().is_some_and(edge_ok)
        && bytes.last().is_some_and(edge_ok)
}

/// Emulator container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Port the storage service listens on inside the container
    #[serde(default = "default_port")]
    pub port: u16,
    /// Value of the `SERVICES` environment variable
    #[serde(default = "default_services")]
    pub services: String,
    /// Value of the `DEFAULT_REGION` environment variable
    #[serde(default = "default_region")]
    pub region: String,
    /// Regex matched against each stdout line to detect readiness
    #[serde(default = "default_ready_pattern")]
    pub ready_pattern: String,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Extra environment passed to the container
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl EmulatorConfig {
    /// Full image reference, `name:tag`
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            tag: default_tag(),
            port: default_port(),
            services: default_services(),
            region: default_region(),
            ready_pattern: default_ready_pattern(),
            startup_timeout_secs: default_startup_timeout_secs(),
            env: BTreeMap::new(),
        }
    }
}

fn default_image() -> String {
    "atlassianlabs/localstack".to_string()
}

fn default_tag() -> String {
    "0.6.0".to_string()
}

fn default_port() -> u16 {
    4572
}

fn default_services() -> String {
    "s3".to_string()
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

fn default_ready_pattern() -> String {
    r"Ready\.".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    10
}

/// S3 client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_access_key")]
    pub access_key: String,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// Put the bucket in the URL path instead of the host name
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Allow aws-chunked streaming uploads (most emulators reject them)
    #[serde(default)]
    pub chunked_encoding: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key: default_access_key(),
            secret_key: default_secret_key(),
            session_token: None,
            force_path_style: default_force_path_style(),
            chunked_encoding: false,
        }
    }
}

fn default_access_key() -> String {
    "LocalStackDummyAccessKey".to_string()
}

fn default_secret_key() -> String {
    "LocalStackDummySecretKey".to_string()
}

fn default_force_path_style() -> bool {
    true
}

/// Per-test-case scenario configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Bucket name, or the base of it when buckets are isolated
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Give every test case its own bucket
    #[serde(default = "default_isolate_buckets")]
    pub isolate_buckets: bool,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_object_count")]
    pub object_count: usize,
    #[serde(default = "default_fixture_name")]
    pub fixture_name: String,
    #[serde(default = "default_fixture_content")]
    pub fixture_content: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            isolate_buckets: default_isolate_buckets(),
            prefix: default_prefix(),
            object_count: default_object_count(),
            fixture_name: default_fixture_name(),
            fixture_content: default_fixture_content(),
        }
    }
}

fn default_bucket() -> String {
    "test-bucket".to_string()
}

fn default_isolate_buckets() -> bool {
    true
}

fn default_prefix() -> String {
    "folder/".to_string()
}

fn default_object_count() -> usize {
    3
}

fn default_fixture_name() -> String {
    "test.txt".to_string()
}

fn default_fixture_content() -> String {
    "localstack".to_string()
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
