//! Harness error taxonomy
//!
//! Every fallible operation in the crate returns [`HarnessError`]. Nothing is
//! retried: a failed upload or listing surfaces immediately so the test run
//! fails loudly.

use crate::config::ConfigError;
use crate::scenario::KeySetDiff;
use std::time::Duration;
use thiserror::Error;

/// Harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Emulator not ready: no log line matched '{pattern}' within {timeout:?}")]
    StartupTimeout { pattern: String, timeout: Duration },

    #[error("Emulator log stream ended before a line matched '{pattern}'")]
    EmulatorExited { pattern: String },

    #[error("Container error: {0}")]
    Container(#[from] testcontainers::TestcontainersError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("S3 error: {0}")]
    S3(#[from] aws_sdk_s3::Error),

    #[error("Listing is missing expected keys\n{0}")]
    MissingKeys(KeySetDiff),

    #[error("ListObjects and ListObjectsV2 disagree under prefix '{prefix}'\n{diff}")]
    VariantMismatch { prefix: String, diff: KeySetDiff },
}

/// Result alias used throughout the harness
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
