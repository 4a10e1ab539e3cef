//! LocalStack S3 Harness
//!
//! Contract harness that checks the AWS Rust SDK's S3 listing calls against a
//! local emulator.
//!
//! # Flow
//!
//! - **Emulator**: start a LocalStack container serving only S3 and wait for
//!   its readiness log line
//! - **Client**: build an S3 client with dummy credentials, path-style
//!   addressing and no chunked uploads
//! - **Scenario**: per test case, create a bucket, upload a fixture file under
//!   random keys and assert that `ListObjects`/`ListObjectsV2` return them all
//!
//! # Example
//!
//! ```no_run
//! use localstack_s3_harness::{Harness, HarnessConfig, ListVariant};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let harness = Harness::start(HarnessConfig::default()).await?;
//!
//!     let mut case = harness.new_case().await?;
//!     case.upload_fixtures("folder/", 3).await?;
//!     case.list_and_verify("folder/", ListVariant::V2).await?;
//!
//!     harness.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod emulator;
pub mod error;
pub mod harness;
pub mod s3;
pub mod scenario;
pub mod telemetry;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use emulator::{Emulator, Endpoint};
pub use error::{HarnessError, Result};
pub use harness::Harness;
pub use scenario::{KeySetDiff, ListVariant, ScenarioRunner};
