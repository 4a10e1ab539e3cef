//! S3 Credentials Module
//!
//! Emulators accept any signature, so the harness normally runs with the
//! fixed LocalStack dummy pair. Credentials can also come from the harness
//! config or from the standard AWS environment variables.
//!
//! # Example
//!
//! ```
//! use localstack_s3_harness::s3::Credentials;
//!
//! let creds = Credentials::localstack_dummy();
//! assert_eq!(creds.access_key_id(), "LocalStackDummyAccessKey");
//! ```

use crate::config::ClientConfig;
use thiserror::Error;

/// Name reported by the SDK as the credentials source
const PROVIDER_NAME: &str = "localstack-s3-harness";

/// Credential loading errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Static credentials for request signing
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    /// Create new credentials
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Create credentials with session token (for temporary credentials)
    pub fn with_session_token(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: Some(session_token.into()),
        }
    }

    /// The pair LocalStack ships in its docs; it is never validated
    pub fn localstack_dummy() -> Self {
        Self::new("LocalStackDummyAccessKey", "LocalStackDummySecretKey")
    }

    /// Load credentials from the client section of the harness config
    pub fn from_config(config: &ClientConfig) -> Result<Self, CredentialsError> {
        if config.access_key.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "access_key not set in config".into(),
            ));
        }
        if config.secret_key.is_empty() {
            return Err(CredentialsError::MissingCredentials(
                "secret_key not set in config".into(),
            ));
        }

        Ok(match &config.session_token {
            Some(token) => Self::with_session_token(&config.access_key, &config.secret_key, token),
            None => Self::new(&config.access_key, &config.secret_key),
        })
    }

    /// Load credentials from environment variables
    ///
    /// Looks for:
    /// - `AWS_ACCESS_KEY_ID`
    /// - `AWS_SECRET_ACCESS_KEY`
    /// - `AWS_SESSION_TOKEN` (optional)
    pub fn from_env() -> Result<Self, CredentialsError> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_ACCESS_KEY_ID not set".into())
        })?;

        let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            CredentialsError::MissingCredentials("AWS_SECRET_ACCESS_KEY not set".into())
        })?;

        Ok(match std::env::var("AWS_SESSION_TOKEN").ok() {
            Some(token) => Self::with_session_token(access_key, secret_key, token),
            None => Self::new(access_key, secret_key),
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// Convert into the SDK's credential type
    pub fn to_sdk(&self) -> aws_credential_types::Credentials {
        aws_credential_types::Credentials::new(
            &self.access_key_id,
            &self.secret_access_key,
            self.session_token.clone(),
            None,
            PROVIDER_NAME,
        )
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}
