//! Suite-level wiring
//!
//! [`Harness`] owns the one emulator of a suite and hands each test case a
//! fresh client and [`ScenarioRunner`]. Cases depend only on the endpoint they
//! are given, so the same case functions run against LocalStack or any other
//! S3-compatible endpoint.

use crate::config::{ClientConfig, HarnessConfig, ScenarioConfig};
use crate::emulator::{Emulator, Endpoint};
use crate::error::Result;
use crate::s3::build_client_from_config;
use crate::scenario::ScenarioRunner;

/// Running emulator plus the configuration every case is built from
#[derive(Debug)]
pub struct Harness {
    config: HarnessConfig,
    emulator: Emulator,
}

impl Harness {
    /// Validate `config` and start the emulator
    pub async fn start(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let emulator = Emulator::start(&config.emulator).await?;
        Ok(Self { config, emulator })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.emulator.endpoint()
    }

    pub fn emulator(&self) -> &Emulator {
        &self.emulator
    }

    /// Fresh client, bucket and fixture for one test case
    pub async fn new_case(&self) -> Result<ScenarioRunner> {
        new_case(self.endpoint(), &self.config.client, &self.config.scenario).await
    }

    /// Remove the emulator container
    pub async fn stop(self) -> Result<()> {
        self.emulator.stop().await
    }
}

/// Build a client for `endpoint` and set up a scenario on it
pub async fn new_case(
    endpoint: &Endpoint,
    client: &ClientConfig,
    scenario: &ScenarioConfig,
) -> Result<ScenarioRunner> {
    new_case_at(&endpoint.url(), client, scenario).await
}

/// Same as [`new_case`] for a raw endpoint URL
pub async fn new_case_at(
    endpoint_url: &str,
    client: &ClientConfig,
    scenario: &ScenarioConfig,
) -> Result<ScenarioRunner> {
    let client = build_client_from_config(endpoint_url, client)?;
    ScenarioRunner::setup(client, scenario).await
}
