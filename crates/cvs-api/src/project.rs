//! Project ID to project number resolution.
//!
//! The CVS API only accepts numeric project IDs. Resolution tries, in order:
//!
//! 1. the identifier itself, if it is already numeric
//! 2. the metadata server, if the ambient project is the requested one
//! 3. the Resource Manager `v1/projects/{id}` lookup, authorised by the
//!    ambient identity

use std::time::Duration;

use cvs_auth::{AmbientCredentials, MetadataServer};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{ApiError, Result};

/// Public Resource Manager endpoint.
pub const RESOURCE_MANAGER_URL: &str = "https://cloudresourcemanager.googleapis.com";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

static NUMERIC_PROJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+$").unwrap_or_else(|_| unreachable!()));

/// True if `project` is already a project number.
#[must_use]
pub fn is_project_number(project: &str) -> bool {
    NUMERIC_PROJECT.is_match(project)
}

/// A resolved project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectIdentity {
    /// Identifier as given by the operator.
    pub project_id: String,
    /// Numeric ID accepted by the CVS API.
    pub project_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceManagerProject {
    project_number: String,
}

/// Maps project identifiers to project numbers.
#[derive(Debug, Clone)]
pub struct ProjectResolver {
    http: reqwest::Client,
    resource_manager_url: String,
    ambient: AmbientCredentials,
    metadata: Option<MetadataServer>,
}

impl ProjectResolver {
    /// Creates a resolver.
    ///
    /// `metadata` enables the ambient-project fast path; pass `None` off-platform.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] if the HTTP client cannot be built.
    pub fn new(ambient: AmbientCredentials, metadata: Option<MetadataServer>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|e| ApiError::client(e.to_string()))?;
        Ok(Self {
            http,
            resource_manager_url: RESOURCE_MANAGER_URL.to_string(),
            ambient,
            metadata,
        })
    }

    /// Overrides the Resource Manager endpoint.
    #[must_use]
    pub fn with_resource_manager_url(mut self, url: impl Into<String>) -> Self {
        self.resource_manager_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Resolves `project` to its numeric ID.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ProjectResolution`] if no source knows the project.
    pub async fn resolve(&self, project: &str) -> Result<ProjectIdentity> {
        let project = project.trim();
        if project.is_empty() {
            return Err(ApiError::project_resolution(project, "empty project identifier"));
        }
        if is_project_number(project) {
            debug!(project, "project is already numeric");
            return Ok(ProjectIdentity {
                project_id: project.to_string(),
                project_number: project.to_string(),
            });
        }

        if let Some(number) = self.metadata_number(project).await {
            info!(project, project_number = %number, "project resolved from metadata server");
            return Ok(ProjectIdentity {
                project_id: project.to_string(),
                project_number: number,
            });
        }

        let number = self.resource_manager_number(project).await?;
        info!(project, project_number = %number, "project resolved from Resource Manager");
        Ok(ProjectIdentity {
            project_id: project.to_string(),
            project_number: number,
        })
    }

    async fn metadata_number(&self, project: &str) -> Option<String> {
        let metadata = self.metadata.as_ref()?;
        match metadata.project_id().await {
            Ok(ambient) if ambient == project => match metadata.numeric_project_id().await {
                Ok(number) if is_project_number(&number) => Some(number),
                Ok(number) => {
                    debug!(number, "metadata server returned a non-numeric project number");
                    None
                }
                Err(err) => {
                    debug!(error = %err, "metadata project number unavailable");
                    None
                }
            },
            Ok(ambient) => {
                debug!(ambient, project, "ambient project differs");
                None
            }
            Err(err) => {
                debug!(error = %err, "metadata server unavailable");
                None
            }
        }
    }

    async fn resource_manager_number(&self, project: &str) -> Result<String> {
        let token = self.ambient.access_token().await.map_err(|e| {
            ApiError::project_resolution(project, format!("no ambient credentials: {e}"))
        })?;
        let url = format!("{}/v1/projects/{project}", self.resource_manager_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ApiError::project_resolution(project, e.to_string()))?;

        let status = response.status();
        if matches!(status, StatusCode::FORBIDDEN | StatusCode::NOT_FOUND) {
            error!(
                project,
                %status,
                "cannot resolve project ID to project number; missing resourcemanager.projects.get permission?"
            );
            return Err(ApiError::project_resolution(project, format!("unresolved ({status})")));
        }
        if !status.is_success() {
            return Err(ApiError::project_resolution(
                project,
                format!("Resource Manager returned {status}"),
            ));
        }

        let found: ResourceManagerProject = response
            .json()
            .await
            .map_err(|e| ApiError::project_resolution(project, format!("malformed response: {e}")))?;
        Ok(found.project_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("123456789012", true)]
    #[test_case("0", true)]
    #[test_case("my-project", false)]
    #[test_case("1234a", false)]
    #[test_case("", false)]
    #[test_case(" 123", false ; "leading space")]
    fn numeric_detection(project: &str, expected: bool) {
        assert_eq!(is_project_number(project), expected);
    }

    #[tokio::test]
    async fn numeric_project_skips_network() {
        // Unroutable endpoint: any network access would fail the test.
        let resolver = ProjectResolver::new(AmbientCredentials::Static("t".to_string()), None)
            .expect("resolver")
            .with_resource_manager_url("http://127.0.0.1:1");
        let identity = resolver.resolve("123456789012").await.expect("identity");
        assert_eq!(identity.project_number, "123456789012");
        assert_eq!(identity.project_id, "123456789012");
    }

    #[tokio::test]
    async fn empty_project_is_unresolved() {
        let resolver = ProjectResolver::new(AmbientCredentials::Static("t".to_string()), None)
            .expect("resolver");
        let err = resolver.resolve("  ").await.expect_err("should fail");
        assert!(matches!(err, ApiError::ProjectResolution { .. }));
    }
}
