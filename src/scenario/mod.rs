//! Scenario runner
//!
//! One [`ScenarioRunner`] drives one test case: it creates the bucket, writes
//! the fixture file, uploads copies of it under random keys and checks that a
//! listing returns every uploaded key.
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | CreateBucket | `s3.create_bucket` | bucket |
//! | PutObject | `s3.put_object` | bucket, key, upload.bytes, s3.etag |
//! | ListObjects | `s3.list_objects` | bucket, prefix, pages, keys |
//! | ListObjectsV2 | `s3.list_objects_v2` | bucket, prefix, pages, keys |

mod fixture;
mod keys;

pub use fixture::FixtureFile;
pub use keys::{generate_key, KeySetDiff, KEY_SUFFIX};

use crate::config::{is_valid_bucket_name, ScenarioConfig};
use crate::error::{HarnessError, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Longest bucket name S3 accepts
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Region where CreateBucket must not carry a location constraint
const DEFAULT_S3_REGION: &str = "us-east-1";

/// Which listing API to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListVariant {
    /// `ListObjects`, paginated by marker
    V1,
    /// `ListObjectsV2`, paginated by continuation token
    V2,
}

impl ListVariant {
    pub const ALL: [ListVariant; 2] = [ListVariant::V1, ListVariant::V2];
}

impl fmt::Display for ListVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListVariant::V1 => f.write_str("ListObjects"),
            ListVariant::V2 => f.write_str("ListObjectsV2"),
        }
    }
}

/// Per-test-case runner; owns its client, bucket and fixture
pub struct ScenarioRunner {
    client: Client,
    bucket: String,
    fixture: FixtureFile,
    uploaded: Vec<String>,
    // Upload prefix -> keys written under it
    by_prefix: BTreeMap<String, Vec<String>>,
}

impl ScenarioRunner {
    /// Create the bucket and write the fixture file.
    ///
    /// With `isolate_buckets` the bucket name gets a random suffix, so cases
    /// sharing one emulator never see each other's objects. Without it, a
    /// bucket left over from an earlier case is reused.
    pub async fn setup(client: Client, config: &ScenarioConfig) -> Result<Self> {
        let bucket = if config.isolate_buckets {
            isolated_bucket_name(&config.bucket)
        } else {
            config.bucket.clone()
        };
        if !is_valid_bucket_name(&bucket) {
            return Err(HarnessError::Configuration(format!(
                "invalid bucket name '{}'",
                bucket
            )));
        }

        create_bucket(&client, &bucket).await?;
        let fixture =
            FixtureFile::create(&config.fixture_name, config.fixture_content.clone()).await?;

        Ok(Self {
            client,
            bucket,
            fixture,
            uploaded: Vec::new(),
            by_prefix: BTreeMap::new(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn fixture(&self) -> &FixtureFile {
        &self.fixture
    }

    /// Keys uploaded so far, in upload order
    pub fn uploaded(&self) -> &[String] {
        &self.uploaded
    }

    /// Upload the fixture `count` times under `prefix`, returning the new keys
    pub async fn upload_fixtures(&mut self, prefix: &str, count: usize) -> Result<Vec<String>> {
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let key = generate_key(prefix);
            self.put_fixture(&key).await?;
            tracing::info!(key = %key, "File uploaded");
            keys.push(key);
        }

        self.uploaded.extend(keys.iter().cloned());
        self.by_prefix
            .entry(prefix.to_string())
            .or_default()
            .extend(keys.iter().cloned());
        Ok(keys)
    }

    /// Every key under `prefix`, following pagination to the end
    pub async fn list_keys(&self, prefix: &str, variant: ListVariant) -> Result<Vec<String>> {
        match variant {
            ListVariant::V1 => self.list_objects_v1(prefix).await,
            ListVariant::V2 => self.list_objects_v2(prefix).await,
        }
    }

    /// List `prefix` and check that every key uploaded under it is present.
    ///
    /// The expected keys are those uploaded under `prefix` or under an upload
    /// prefix that `prefix` covers. Listing a prefix no upload of this case
    /// used, after keys were uploaded, fails with every uploaded key missing.
    ///
    /// Returns the listed keys. Extra keys are allowed; a missing one yields
    /// [`HarnessError::MissingKeys`].
    pub async fn list_and_verify(&self, prefix: &str, variant: ListVariant) -> Result<Vec<String>> {
        let listed = self.list_keys(prefix, variant).await?;

        let expected = match self.expected_under(prefix) {
            Some(keys) => keys,
            None => {
                tracing::error!(
                    bucket = %self.bucket,
                    prefix = %prefix,
                    variant = %variant,
                    uploaded = self.uploaded.len(),
                    "No upload of this case used the listed prefix"
                );
                let diff = KeySetDiff::between(self.uploaded.iter().cloned(), listed);
                return Err(HarnessError::MissingKeys(diff));
            }
        };

        let diff = KeySetDiff::between(expected, listed.iter().cloned());
        if !diff.is_superset() {
            tracing::error!(
                bucket = %self.bucket,
                prefix = %prefix,
                variant = %variant,
                missing = diff.missing.len(),
                "Listing is missing uploaded keys"
            );
            return Err(HarnessError::MissingKeys(diff));
        }

        tracing::info!(
            variant = %variant,
            prefix = %prefix,
            listed = listed.len(),
            "Listing contains all uploaded keys"
        );
        Ok(listed)
    }

    /// Keys a listing of `prefix` must contain, or `None` when keys were
    /// uploaded but none under an upload prefix that `prefix` covers
    fn expected_under(&self, prefix: &str) -> Option<Vec<String>> {
        let mut covered = self
            .by_prefix
            .iter()
            .filter(|(upload_prefix, _)| upload_prefix.starts_with(prefix))
            .peekable();

        if covered.peek().is_none() && !self.uploaded.is_empty() {
            return None;
        }
        Some(covered.flat_map(|(_, keys)| keys.iter().cloned()).collect())
    }

    /// Check that both listing APIs return the same key set for `prefix`
    pub async fn verify_variants_agree(&self, prefix: &str) -> Result<BTreeSet<String>> {
        let v1 = self.list_keys(prefix, ListVariant::V1).await?;
        let v2 = self.list_keys(prefix, ListVariant::V2).await?;

        let diff = KeySetDiff::between(v1.iter().cloned(), v2);
        if !diff.is_empty() {
            return Err(HarnessError::VariantMismatch {
                prefix: prefix.to_string(),
                diff,
            });
        }

        Ok(v1.into_iter().collect())
    }

    #[tracing::instrument(
        name = "s3.put_object",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.key = %key,
            upload.bytes = self.fixture.size(),
            s3.etag = tracing::field::Empty
        ),
        err
    )]
    async fn put_fixture(&self, key: &str) -> Result<()> {
        let body = ByteStream::from_path(self.fixture.path())
            .await
            .map_err(|e| HarnessError::Fixture(e.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)?;

        if let Some(etag) = output.e_tag() {
            tracing::Span::current().record("s3.etag", etag);
        }
        Ok(())
    }

    #[tracing::instrument(
        name = "s3.list_objects",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.prefix = %prefix,
            pages = tracing::field::Empty,
            keys = tracing::field::Empty
        ),
        err
    )]
    async fn list_objects_v1(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut marker: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let output = self
                .client
                .list_objects()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;
            pages += 1;

            let page: Vec<String> = output
                .contents()
                .iter()
                .filter_map(|object| object.key().map(str::to_string))
                .collect();

            // NextMarker is only sent with a delimiter; otherwise resume after
            // the last key of the page.
            marker = output
                .next_marker()
                .map(str::to_string)
                .or_else(|| page.last().cloned());
            keys.extend(page);

            if !output.is_truncated().unwrap_or(false) || marker.is_none() {
                break;
            }
        }

        let span = tracing::Span::current();
        span.record("pages", pages);
        span.record("keys", keys.len());
        Ok(keys)
    }

    #[tracing::instrument(
        name = "s3.list_objects_v2",
        skip(self),
        fields(
            s3.bucket = %self.bucket,
            s3.prefix = %prefix,
            pages = tracing::field::Empty,
            keys = tracing::field::Empty
        ),
        err
    )]
    async fn list_objects_v2(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)?;
            pages += 1;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            token = output.next_continuation_token().map(str::to_string);
            if !output.is_truncated().unwrap_or(false) || token.is_none() {
                break;
            }
        }

        let span = tracing::Span::current();
        span.record("pages", pages);
        span.record("keys", keys.len());
        Ok(keys)
    }
}

impl fmt::Debug for ScenarioRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("bucket", &self.bucket)
            .field("fixture", &self.fixture.path())
            .field("uploaded", &self.uploaded.len())
            .finish()
    }
}

/// Create `bucket`, treating "already owned by you" as success
#[tracing::instrument(name = "s3.create_bucket", skip(client), err)]
pub async fn create_bucket(client: &Client, bucket: &str) -> Result<()> {
    let mut request = client.create_bucket().bucket(bucket);

    if let Some(region) = client.config().region() {
        let region: &str = region.as_ref();
        if region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
    }

    match request.send().await {
        Ok(_) => {
            tracing::info!(bucket = %bucket, "Test bucket created");
            Ok(())
        }
        Err(err) => match aws_sdk_s3::Error::from(err) {
            aws_sdk_s3::Error::BucketAlreadyOwnedByYou(_) => {
                tracing::debug!(bucket = %bucket, "Reusing existing bucket");
                Ok(())
            }
            other => Err(other.into()),
        },
    }
}

/// `<base>-<8 hex chars>`, trimmed so the result stays a valid bucket name
pub fn isolated_bucket_name(base: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..8];
    let max_base = MAX_BUCKET_NAME_LEN - suffix.len() - 1;
    let base = base.trim_end_matches('-');
    let base = if base.len() > max_base {
        let mut end = max_base;
        while !base.is_char_boundary(end) {
            end -= 1;
        }
        base[..end].trim_end_matches('-')
    } else {
        base
    };
    format!("{}-{}", base, suffix)
}
