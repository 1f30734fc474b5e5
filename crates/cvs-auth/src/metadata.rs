//! Platform metadata server and ambient credentials.
//!
//! When running on Google Cloud, the metadata server answers questions about
//! the running identity (its project and an OAuth access token) without any
//! configured credentials. Off-platform the server is unreachable; callers
//! treat [`AuthError::MetadataUnavailable`] as "no ambient information".

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AuthError, Result};

/// Default metadata server host.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Environment variable overriding the metadata host.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

/// Metadata requests must carry this header.
const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

/// Metadata lookups fail fast off-platform.
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

/// Client for the compute metadata server.
#[derive(Debug, Clone)]
pub struct MetadataServer {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl MetadataServer {
    /// Creates a client for the host in `GCE_METADATA_HOST`, or the default host.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MetadataUnavailable`] if the HTTP client cannot be built.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Self::with_base_url(format!("http://{host}"))
    }

    /// Creates a client for an explicit base URL (scheme and host).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MetadataUnavailable`] if the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| AuthError::metadata_unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The base URL requests go to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}/computeMetadata/v1/{path}", self.base_url);
        debug!(%url, "querying metadata server");
        let response = self
            .http
            .get(&url)
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .send()
            .await
            .map_err(|e| AuthError::metadata_unavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::metadata_unavailable(format!(
                "{path} returned {status}"
            )));
        }
        Ok(response)
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let body = self
            .get(path)
            .await?
            .text()
            .await
            .map_err(|e| AuthError::metadata_unavailable(e.to_string()))?;
        Ok(body.trim().to_string())
    }

    /// Human-readable project ID of the running identity.
    pub async fn project_id(&self) -> Result<String> {
        self.get_text("project/project-id").await
    }

    /// Numeric project ID of the running identity.
    pub async fn numeric_project_id(&self) -> Result<String> {
        self.get_text("project/numeric-project-id").await
    }

    /// OAuth access token of the default service account.
    pub async fn access_token(&self) -> Result<String> {
        let token: MetadataToken = self
            .get("instance/service-accounts/default/token")
            .await?
            .json()
            .await
            .map_err(|e| AuthError::metadata_unavailable(format!("malformed token: {e}")))?;
        Ok(token.access_token)
    }
}

/// Credentials of the environment the tool runs in, used for calls that are
/// not made on behalf of the CVS credential (signing delegation, project
/// lookup).
#[derive(Clone)]
pub enum AmbientCredentials {
    /// A pre-issued OAuth access token, e.g. `gcloud auth print-access-token`.
    Static(String),
    /// Tokens from the metadata server.
    Metadata(MetadataServer),
}

impl AmbientCredentials {
    /// Returns an OAuth access token for the ambient identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MetadataUnavailable`] when no ambient identity exists.
    pub async fn access_token(&self) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata(server) => server.access_token().await,
        }
    }
}

impl fmt::Debug for AmbientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("AmbientCredentials::Static([REDACTED])"),
            Self::Metadata(server) => f
                .debug_tuple("AmbientCredentials::Metadata")
                .field(&server.base_url)
                .finish(),
        }
    }
}
