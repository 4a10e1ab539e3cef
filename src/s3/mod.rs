//! S3 client configurator
//!
//! Builds an `aws_sdk_s3::Client` bound to an emulator endpoint. Emulators
//! generally need two departures from the SDK defaults:
//!
//! - **Path-style addressing**: the bucket goes in the URL path, since
//!   `<bucket>.localhost` does not resolve.
//! - **No chunked uploads**: the SDK otherwise streams bodies with
//!   `aws-chunked` encoding and trailing checksums when it computes request
//!   checksums, which older emulators reject.
//!
//! Construction is pure: no request is sent until the client is used.
//!
//! # Example
//!
//! ```
//! use localstack_s3_harness::s3::{build_client, ClientOptions, Credentials};
//!
//! let client = build_client(
//!     "http://localhost:4572",
//!     "eu-central-1",
//!     &Credentials::localstack_dummy(),
//!     &ClientOptions::default(),
//! )
//! .unwrap();
//! # let _ = client;
//! ```

mod credentials;

pub use credentials::{Credentials, CredentialsError};

use crate::config::ClientConfig;
use crate::error::{HarnessError, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{Region, RequestChecksumCalculation, ResponseChecksumValidation};
use aws_sdk_s3::Client;

/// Client options that emulators care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub force_path_style: bool,
    pub chunked_encoding: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            force_path_style: true,
            chunked_encoding: false,
        }
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            force_path_style: config.force_path_style,
            chunked_encoding: config.chunked_encoding,
        }
    }
}

/// Build an S3 client for `endpoint`.
///
/// Fails with [`HarnessError::Configuration`] when the endpoint is not an
/// absolute `http`/`https` URL with a host, or when the region is empty.
pub fn build_client(
    endpoint: &str,
    region: &str,
    credentials: &Credentials,
    options: &ClientOptions,
) -> Result<Client> {
    validate_endpoint(endpoint)?;
    if region.trim().is_empty() {
        return Err(HarnessError::Configuration("region cannot be empty".into()));
    }

    let checksums = if options.chunked_encoding {
        RequestChecksumCalculation::WhenSupported
    } else {
        RequestChecksumCalculation::WhenRequired
    };

    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .endpoint_url(endpoint)
        .credentials_provider(credentials.to_sdk())
        .force_path_style(options.force_path_style)
        .request_checksum_calculation(checksums)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .retry_config(RetryConfig::disabled())
        .build();

    tracing::debug!(
        endpoint = %endpoint,
        region = %region,
        path_style = options.force_path_style,
        chunked = options.chunked_encoding,
        "S3 client configured"
    );

    Ok(Client::from_conf(config))
}

/// Build a client from the harness client config.
///
/// A blank access/secret pair in the config falls back to the standard AWS
/// environment variables.
pub fn build_client_from_config(endpoint: &str, config: &ClientConfig) -> Result<Client> {
    let credentials = if config.access_key.is_empty() && config.secret_key.is_empty() {
        Credentials::from_env()
    } else {
        Credentials::from_config(config)
    }
    .map_err(|e| HarnessError::Configuration(e.to_string()))?;
    build_client(
        endpoint,
        &config.region,
        &credentials,
        &ClientOptions::from(config),
    )
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let uri: hyper::Uri = endpoint.parse().map_err(|e| {
        HarnessError::Configuration(format!("malformed endpoint '{}': {}", endpoint, e))
    })?;

    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        _ => {
            return Err(HarnessError::Configuration(format!(
                "endpoint '{}' must start with http:// or https://",
                endpoint
            )))
        }
    }

    match uri.host() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(HarnessError::Configuration(format!(
            "endpoint '{}' has no host",
            endpoint
        ))),
    }
}
