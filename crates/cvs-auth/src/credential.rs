//! Credential identifier classification.
//!
//! A credential identifier is an opaque string supplied by the operator. It is
//! one of three forms, tested in this order:
//!
//! 1. A service-account principal (`name@project.iam.gserviceaccount.com`),
//!    used for impersonation through a signing delegation call.
//! 2. Base64-encoded JSON key material (`cat key.json | base64`).
//! 3. A path to a JSON key file.
//!
//! Classification happens once, in [`CredentialSource::resolve`]. Everything
//! downstream matches on the resulting variant instead of re-probing strings.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, Result};

/// Domain suffix of impersonable service-account principals.
pub const IMPERSONATION_SUFFIX: &str = "iam.gserviceaccount.com";

/// Expected `type` field of a service-account key.
const SERVICE_ACCOUNT_KEY_TYPE: &str = "service_account";

static PRINCIPAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]@([a-z][a-z0-9-]{4,28}[a-z0-9])\.iam\.gserviceaccount\.com$")
        .unwrap_or_else(|_| unreachable!())
});

/// A service-account JSON key, zeroized on drop.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    key_type: Option<String>,
    project_id: String,
    #[serde(default)]
    private_key_id: Option<String>,
    private_key: String,
    client_email: String,
    #[serde(default)]
    client_id: Option<String>,
}

impl ServiceAccountKey {
    /// Parses key material from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialFormat`] if the JSON is malformed, is not a
    /// service-account key, or lacks a project, email, or private key.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let key: Self = serde_json::from_slice(bytes)
            .map_err(|e| AuthError::credential_format(format!("malformed key JSON: {e}")))?;
        key.validate()?;
        Ok(key)
    }

    /// Reads and parses a key file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialFormat`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read(path).map_err(|e| {
            AuthError::credential_format(format!(
                "failed to read key file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    fn validate(&self) -> Result<()> {
        if let Some(kind) = self.key_type.as_deref() {
            if kind != SERVICE_ACCOUNT_KEY_TYPE {
                return Err(AuthError::credential_format(format!(
                    "expected key type '{SERVICE_ACCOUNT_KEY_TYPE}', got '{kind}'"
                )));
            }
        }
        if self.project_id.trim().is_empty() {
            return Err(AuthError::credential_format("key has no project_id"));
        }
        if self.client_email.trim().is_empty() {
            return Err(AuthError::credential_format("key has no client_email"));
        }
        if self.private_key.trim().is_empty() {
            return Err(AuthError::credential_format("key has no private_key"));
        }
        Ok(())
    }

    /// Project the service account belongs to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Service-account email, used as JWT issuer and subject.
    #[must_use]
    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Key identifier, sent as the JWT `kid` header.
    #[must_use]
    pub fn private_key_id(&self) -> Option<&str> {
        self.private_key_id.as_deref()
    }

    /// Numeric client identifier, if present.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub(crate) fn private_key_pem(&self) -> &[u8] {
        self.private_key.as_bytes()
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// A classified credential identifier.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Impersonate a service account via signing delegation.
    Impersonation {
        /// Full principal email.
        principal: String,
        /// Project segment of the principal's domain.
        project_id: String,
    },

    /// Key material passed inline as base64.
    KeyContent {
        /// Decoded key.
        key: ServiceAccountKey,
    },

    /// Key material read from a file.
    KeyFile {
        /// Path the key was read from.
        path: PathBuf,
        /// Parsed key.
        key: ServiceAccountKey,
    },
}

impl CredentialSource {
    /// Classifies a credential identifier. First match wins: principal,
    /// base64 key, key file.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::CredentialFormat`] when no form matches or when the
    /// recognized key material is malformed.
    pub fn resolve(identifier: &str) -> Result<Self> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(AuthError::credential_format("credential is empty"));
        }

        if let Some(project_id) = principal_project(trimmed) {
            debug!(principal = trimmed, "credential is a service-account principal");
            return Ok(Self::Impersonation {
                principal: trimmed.to_string(),
                project_id: project_id.to_string(),
            });
        }

        if let Some(decoded) = decode_json_base64(trimmed) {
            debug!("credential is base64-encoded key material");
            let key = ServiceAccountKey::from_json(&decoded)?;
            return Ok(Self::KeyContent { key });
        }

        let path = Path::new(trimmed);
        if path.is_file() {
            debug!(path = %path.display(), "credential is a key file");
            let key = ServiceAccountKey::from_file(path)?;
            return Ok(Self::KeyFile {
                path: path.to_path_buf(),
                key,
            });
        }

        Err(AuthError::credential_format(
            "not a service-account principal, a base64 encoded JSON key, nor a path to a key file",
        ))
    }

    /// Project the credential belongs to.
    #[must_use]
    pub fn project_id(&self) -> &str {
        match self {
            Self::Impersonation { project_id, .. } => project_id,
            Self::KeyContent { key } | Self::KeyFile { key, .. } => key.project_id(),
        }
    }

    /// Identity tokens are issued for.
    #[must_use]
    pub fn principal(&self) -> &str {
        match self {
            Self::Impersonation { principal, .. } => principal,
            Self::KeyContent { key } | Self::KeyFile { key, .. } => key.client_email(),
        }
    }

    /// Short label of the credential form.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Impersonation { .. } => "impersonation",
            Self::KeyContent { .. } => "base64-key",
            Self::KeyFile { .. } => "key-file",
        }
    }
}

/// Returns the project segment if `s` is an impersonable principal.
fn principal_project(s: &str) -> Option<&str> {
    PRINCIPAL_REGEX
        .captures(s)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Decodes canonical standard base64 that wraps a JSON object.
///
/// Line breaks are ignored so `base64` output with wrapping still works.
fn decode_json_base64(s: &str) -> Option<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let decoded = STANDARD.decode(compact.as_bytes()).ok()?;
    if STANDARD.encode(&decoded) != compact {
        return None;
    }
    match serde_json::from_slice::<serde_json::Value>(&decoded) {
        Ok(serde_json::Value::Object(_)) => Some(decoded),
        _ => None,
    }
}

/// Truncates a credential for display, keeping the first nine characters.
#[must_use]
pub fn redact_credential(identifier: &str) -> String {
    let prefix: String = identifier.chars().take(9).collect();
    format!("{prefix}...")
}
