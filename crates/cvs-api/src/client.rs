//! Cloud Volumes Service REST client.
//!
//! All paths hang off `{base}/v2/projects/{project_number}`. The API only
//! accepts the numeric project ID; see [`crate::ProjectResolver`].

use std::time::Duration;

use cvs_auth::TokenProvider;
use cvs_capacity::volume::merge_fields;
use cvs_capacity::{CapacityError, FieldChanges, Volume, VolumeClient};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};

/// Public CVS API endpoint.
pub const CVS_API_URL: &str = "https://cloudvolumesgcp-api.netapp.com";

/// User agent sent with every request.
pub const USER_AGENT: &str = "CVSCapacityManager";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

type VolumeResult<T> = std::result::Result<T, CapacityError>;

/// Client for one project, authorised by a [`TokenProvider`].
///
/// Headers and tokens are per instance.
pub struct CvsClient<T> {
    http: reqwest::Client,
    base_url: String,
    project_number: String,
    tokens: T,
}

impl<T: TokenProvider> CvsClient<T> {
    /// Creates a client against the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn new(project_number: impl Into<String>, tokens: T) -> Result<Self> {
        Self::with_base_url(CVS_API_URL, project_number, tokens)
    }

    /// Creates a client against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        project_number: impl Into<String>,
        tokens: T,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_number: project_number.into(),
            tokens,
        })
    }

    /// The numeric project this client targets.
    #[must_use]
    pub fn project_number(&self) -> &str {
        &self.project_number
    }

    fn volumes_url(&self, region: &str) -> String {
        format!(
            "{}/v2/projects/{}/locations/{region}/Volumes",
            self.base_url, self.project_number
        )
    }

    fn volume_url(&self, region: &str, volume_id: &str) -> String {
        format!("{}/{volume_id}", self.volumes_url(region))
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> VolumeResult<reqwest::Response> {
        let token = self.tokens.get_token().await.map_err(|e| {
            CapacityError::upstream(operation, None, format!("no bearer token: {e}"))
        })?;

        debug!(%method, url, "CVS request");
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| CapacityError::upstream(operation, None, e.to_string()))
    }

    async fn read_json(operation: &str, response: reqwest::Response) -> VolumeResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation, %status, "CVS request rejected");
            return Err(CapacityError::upstream(
                operation,
                Some(status.as_u16()),
                format!("{status}: {body}"),
            ));
        }
        response
            .json()
            .await
            .map_err(|e| CapacityError::upstream(operation, Some(status.as_u16()), e.to_string()))
    }

    async fn get_document(&self, region: &str, volume_id: &str) -> VolumeResult<Option<Value>> {
        let response = self
            .send("get", Method::GET, &self.volume_url(region, volume_id), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_json("get", response).await.map(Some)
    }
}

fn parse_volume(operation: &str, doc: Value) -> VolumeResult<Volume> {
    serde_json::from_value(doc)
        .map_err(|e| CapacityError::upstream(operation, None, format!("malformed volume: {e}")))
}

impl<T: TokenProvider> VolumeClient for CvsClient<T> {
    async fn list(&self, region: &str) -> VolumeResult<Vec<Volume>> {
        let response = self
            .send("list", Method::GET, &self.volumes_url(region), None)
            .await?;
        let Value::Array(docs) = Self::read_json("list", response).await? else {
            return Err(CapacityError::upstream(
                "list",
                None,
                "expected a JSON array of volumes",
            ));
        };

        let mut volumes = Vec::with_capacity(docs.len());
        for doc in docs {
            match parse_volume("list", doc) {
                Ok(volume) => volumes.push(volume),
                Err(err) => warn!(error = %err, "ignoring unparseable volume"),
            }
        }
        Ok(volumes)
    }

    async fn get(&self, region: &str, volume_id: &str) -> VolumeResult<Option<Volume>> {
        self.get_document(region, volume_id)
            .await?
            .map(|doc| parse_volume("get", doc))
            .transpose()
    }

    async fn patch(
        &self,
        region: &str,
        volume_id: &str,
        changes: &FieldChanges,
    ) -> VolumeResult<()> {
        let mut doc = self
            .get_document(region, volume_id)
            .await?
            .ok_or_else(|| CapacityError::VolumeNotFound {
                region: region.to_string(),
                volume_id: volume_id.to_string(),
            })?;

        let own_region = doc
            .get("region")
            .and_then(Value::as_str)
            .unwrap_or(region)
            .to_string();
        merge_fields(&mut doc, changes);

        let response = self
            .send(
                "patch",
                Method::PUT,
                &self.volume_url(&own_region, volume_id),
                Some(&doc),
            )
            .await?;
        Self::read_json("patch", response).await?;
        info!(region = %own_region, volume_id, "volume updated");
        Ok(())
    }
}
