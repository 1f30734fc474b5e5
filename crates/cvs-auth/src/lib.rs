//! # cvs-auth
//!
//! Credential resolution and bearer-token lifecycle for the Cloud Volumes
//! Service API.
//!
//! - [`CredentialSource`]: classifies an operator-supplied credential string
//!   (principal, base64 key, or key file) once, up front
//! - [`TokenProvider`]: yields a bearer token that is never observed expired
//! - [`DirectKeyTokenProvider`] / [`ImpersonationTokenProvider`]: the two
//!   provider variants, selected by [`CredentialTokenProvider::from_source`]
//! - [`MetadataServer`] / [`AmbientCredentials`]: the identity the process
//!   itself runs as
//!
//! ```text
//! credential string ──► CredentialSource ──► CredentialTokenProvider ──► Bearer token
//!                                                  │
//!                                  (impersonation) └──► JwtSigner (IAM signJwt)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod credential;
pub mod error;
pub mod metadata;
pub mod signer;
pub mod token;

pub use credential::{CredentialSource, IMPERSONATION_SUFFIX, ServiceAccountKey, redact_credential};
pub use error::{AuthError, Result};
pub use metadata::{AmbientCredentials, MetadataServer};
pub use signer::{IamCredentialsSigner, JwtSigner};
pub use token::{
    AccessToken, CVS_AUDIENCE, CredentialTokenProvider, DirectKeyTokenProvider,
    ImpersonationTokenProvider, REFRESH_SKEW_SECS, TokenClaims, TokenProvider,
};
