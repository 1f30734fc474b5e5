//! Signing delegation for impersonated tokens.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AuthError, Result};
use crate::metadata::AmbientCredentials;
use crate::token::TokenClaims;

/// Default IAM Credentials endpoint.
pub const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";

const SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Signs JWT claims on behalf of a principal without exposing its key.
pub trait JwtSigner: Send + Sync {
    /// Returns a signed JWT carrying `claims`, issued by `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRefresh`] if the signing call fails.
    fn sign_jwt(
        &self,
        principal: &str,
        claims: &TokenClaims,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Debug, Serialize)]
struct SignJwtRequest {
    payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignJwtResponse {
    #[serde(default)]
    key_id: Option<String>,
    signed_jwt: String,
}

/// Signs through the IAM Credentials `signJwt` method, authorised by the
/// ambient identity (which needs `iam.serviceAccounts.signJwt` on the target).
#[derive(Debug, Clone)]
pub struct IamCredentialsSigner {
    http: reqwest::Client,
    base_url: String,
    ambient: AmbientCredentials,
}

impl IamCredentialsSigner {
    /// Creates a signer against the public IAM Credentials endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRefresh`] if the HTTP client cannot be built.
    pub fn new(ambient: AmbientCredentials) -> Result<Self> {
        Self::with_base_url(ambient, IAM_CREDENTIALS_URL)
    }

    /// Creates a signer against a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRefresh`] if the HTTP client cannot be built.
    pub fn with_base_url(ambient: AmbientCredentials, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SIGN_TIMEOUT)
            .build()
            .map_err(|e| AuthError::token_refresh(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ambient,
        })
    }

    fn sign_url(&self, principal: &str) -> String {
        format!(
            "{}/v1/projects/-/serviceAccounts/{principal}:signJwt",
            self.base_url
        )
    }
}

impl JwtSigner for IamCredentialsSigner {
    async fn sign_jwt(&self, principal: &str, claims: &TokenClaims) -> Result<String> {
        let access_token = self
            .ambient
            .access_token()
            .await
            .map_err(|e| AuthError::token_refresh(format!("no ambient credentials: {e}")))?;
        let payload = serde_json::to_string(claims)
            .map_err(|e| AuthError::token_refresh(format!("failed to encode claims: {e}")))?;

        let response = self
            .http
            .post(self.sign_url(principal))
            .bearer_auth(access_token)
            .json(&SignJwtRequest { payload })
            .send()
            .await
            .map_err(|e| AuthError::token_refresh(format!("signJwt request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(principal, %status, "signJwt rejected");
            return Err(AuthError::token_refresh(format!(
                "signJwt for {principal} returned {status}: {body}"
            )));
        }

        let signed: SignJwtResponse = response
            .json()
            .await
            .map_err(|e| AuthError::token_refresh(format!("malformed signJwt response: {e}")))?;
        debug!(principal, key_id = ?signed.key_id, "signJwt succeeded");
        Ok(signed.signed_jwt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_url_uses_wildcard_project() {
        let signer = IamCredentialsSigner::with_base_url(
            AmbientCredentials::Static("t".to_string()),
            "https://iam.example.test/",
        )
        .expect("signer");
        assert_eq!(
            signer.sign_url("sa@proj-one.iam.gserviceaccount.com"),
            "https://iam.example.test/v1/projects/-/serviceAccounts/sa@proj-one.iam.gserviceaccount.com:signJwt"
        );
    }

    #[test]
    fn sign_request_wraps_claims_as_string_payload() {
        let claims = TokenClaims {
            iss: "a".into(),
            sub: "a".into(),
            aud: "b".into(),
            iat: 1,
            exp: 2,
        };
        let payload = serde_json::to_string(&claims).expect("claims");
        let body = serde_json::to_value(SignJwtRequest { payload }).expect("body");
        assert!(body["payload"].is_string());
        assert!(body["payload"].as_str().unwrap_or_default().contains("\"aud\":\"b\""));
    }

    #[test]
    fn sign_response_parses_camel_case() {
        let response: SignJwtResponse =
            serde_json::from_str(r#"{"keyId":"k1","signedJwt":"a.b.c"}"#).expect("parse");
        assert_eq!(response.signed_jwt, "a.b.c");
        assert_eq!(response.key_id.as_deref(), Some("k1"));
    }
}
