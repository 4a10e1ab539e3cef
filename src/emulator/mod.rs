//! Emulator lifecycle management
//!
//! Starts a LocalStack-style container that serves only S3, waits for its
//! readiness log line on stdout or stderr and exposes the mapped endpoint.
//! One instance is meant to be shared read-only by every test case of a
//! suite; cases receive the [`Endpoint`] explicitly rather than reaching for
//! a global.
//!
//! ```no_run
//! use localstack_s3_harness::config::EmulatorConfig;
//! use localstack_s3_harness::emulator::Emulator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let emulator = Emulator::start(&EmulatorConfig::default()).await?;
//! println!("S3 at {}", emulator.endpoint());
//! emulator.stop().await?;
//! # Ok(())
//! # }
//! ```

mod readiness;

pub use readiness::{wait_for_log_line, LogWatch, ReadinessState};

use crate::config::EmulatorConfig;
use crate::error::Result;
use std::fmt;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

/// Network location of a running emulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Service URL, `http://host:port`
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}", self.host, self.port)
    }
}

/// A running emulator container
///
/// Dropping the value also removes the container; [`Emulator::stop`] does it
/// explicitly and reports failures.
pub struct Emulator {
    container: ContainerAsync<GenericImage>,
    endpoint: Endpoint,
    state: ReadinessState,
}

impl Emulator {
    /// Start the container and block until it logs its readiness line.
    ///
    /// Not idempotent: every call starts a new container bound to a new host
    /// port.
    #[tracing::instrument(
        name = "emulator.start",
        skip(config),
        fields(
            image = %config.image_ref(),
            port = config.port,
            endpoint = tracing::field::Empty
        ),
        err
    )]
    pub async fn start(config: &EmulatorConfig) -> Result<Self> {
        let mut watch = LogWatch::new(&config.ready_pattern, config.startup_timeout())?;

        let mut request = GenericImage::new(config.image.clone(), config.tag.clone())
            .with_exposed_port(config.port.tcp())
            .with_env_var("SERVICES", config.services.clone())
            .with_env_var("DEFAULT_REGION", config.region.clone());
        for (name, value) in &config.env {
            request = request.with_env_var(name.clone(), value.clone());
        }

        let container = request.start().await?;
        tracing::debug!(container = %container.id(), "Container started, waiting for readiness");

        let ready = watch
            .wait_any(container.stdout(true), container.stderr(true))
            .await;
        if let Err(err) = ready {
            tracing::warn!(error = %err, "Emulator did not become ready, removing container");
            if let Err(rm_err) = container.rm().await {
                tracing::warn!(error = %rm_err, "Failed to remove container");
            }
            return Err(err);
        }

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(config.port.tcp()).await?;
        let endpoint = Endpoint::new(host, port);

        tracing::Span::current().record("endpoint", tracing::field::display(&endpoint));
        tracing::info!(endpoint = %endpoint, "Emulator ready");

        Ok(Self {
            container,
            endpoint,
            state: watch.state(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ReadinessState {
        self.state
    }

    pub fn container_id(&self) -> &str {
        self.container.id()
    }

    /// Tear the container down
    pub async fn stop(self) -> Result<()> {
        let id = self.container.id().to_string();
        self.container.rm().await?;
        tracing::info!(container = %id, "Emulator stopped");
        Ok(())
    }
}

impl fmt::Debug for Emulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emulator")
            .field("container", &self.container.id())
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}
