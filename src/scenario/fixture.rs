//! Local fixture file
//!
//! Each test case writes its fixture into a fresh temporary directory. The
//! directory and file are removed when the fixture is dropped.

use crate::error::{HarnessError, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Fixture file with known content
#[derive(Debug)]
pub struct FixtureFile {
    dir: TempDir,
    path: PathBuf,
    content: Bytes,
}

impl FixtureFile {
    /// Write `content` to `<fresh temp dir>/<name>`
    pub async fn create(name: &str, content: impl Into<Bytes>) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(HarnessError::Fixture(format!(
                "fixture name '{}' must be a plain file name",
                name
            )));
        }

        let content = content.into();
        let dir = tempfile::Builder::new()
            .prefix("localstack-s3-")
            .tempdir()?;
        let path = dir.path().join(name);
        tokio::fs::write(&path, &content).await?;

        tracing::info!(path = %path.display(), bytes = content.len(), "Test file created");

        Ok(Self { dir, path, content })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the fixture
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}
