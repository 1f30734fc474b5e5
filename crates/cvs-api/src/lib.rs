//! # cvs-api
//!
//! HTTP clients behind the capacity manager:
//!
//! - [`CvsClient`]: the Cloud Volumes Service volume API, implementing
//!   [`cvs_capacity::VolumeClient`]
//! - [`ProjectResolver`]: project ID to project number, via the metadata
//!   server or Resource Manager

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod project;

pub use client::{CVS_API_URL, CvsClient, USER_AGENT};
pub use error::{ApiError, Result};
pub use project::{ProjectIdentity, ProjectResolver, RESOURCE_MANAGER_URL, is_project_number};
