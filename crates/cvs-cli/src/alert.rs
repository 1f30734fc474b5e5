//! Cloud Monitoring incident payloads.
//!
//! An alert policy on volume usage publishes incidents to Pub/Sub; the
//! message `data` is a base64-encoded JSON document:
//!
//! ```json
//! {"incident": {"state": "open",
//!               "resource": {"labels": {"project_id": "...", "resource_container": "...",
//!                                       "location": "...", "volume_id": "...", "name": "..."}}}}
//! ```
//!
//! The raw JSON, the base64 `data`, or a whole Pub/Sub envelope
//! (`{"data": "<base64>"}`) are all accepted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CliError;

/// Message printed for payloads that are not usable incidents.
pub const MISSING_PARAMETERS: &str =
    "PubSub payload is missing parameters. Is it really a Cloud Monitoring alert?";

/// Incident state that means the condition cleared.
pub const CLOSED_STATE: &str = "closed";

/// The volume an incident is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentTarget {
    /// Human-readable project ID, for reporting.
    pub project_id: String,
    /// Project number (the monitored resource's container).
    pub project_number: String,
    /// Region.
    pub region: String,
    /// Volume identifier.
    pub volume_id: String,
    /// Volume name, for reporting.
    pub name: String,
}

impl IncidentTarget {
    /// The identifier to resolve: the project number if it is numeric,
    /// otherwise the project ID.
    #[must_use]
    pub fn project(&self) -> &str {
        if cvs_api::is_project_number(&self.project_number) {
            &self.project_number
        } else {
            &self.project_id
        }
    }
}

/// A parsed incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// The incident closed; nothing to do.
    Resolved(IncidentTarget),
    /// The incident is open; the volume should be evaluated.
    Open(IncidentTarget),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    incident: Incident,
}

#[derive(Debug, Deserialize)]
struct Incident {
    state: String,
    resource: Resource,
}

#[derive(Debug, Deserialize)]
struct Resource {
    labels: Labels,
}

#[derive(Debug, Deserialize)]
struct Labels {
    project_id: String,
    resource_container: String,
    location: String,
    volume_id: String,
    name: String,
}

fn decode_document(payload: &str) -> Result<Value, CliError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(CliError::alert("no alert received"));
    }
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|e| CliError::alert(format!("payload is not valid JSON: {e}")));
    }
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| CliError::alert(format!("payload is neither JSON nor base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| CliError::alert(format!("decoded payload is not valid JSON: {e}")))
}

/// Parses an incident payload.
///
/// # Errors
///
/// Returns [`CliError::Alert`] if the payload is empty, undecodable, or
/// lacks any of the required incident fields.
pub fn parse_alert(payload: &str) -> Result<AlertEvent, CliError> {
    let mut document = decode_document(payload)?;

    // Pub/Sub envelope: unwrap its base64 data.
    if document.get("incident").is_none() {
        if let Some(data) = document.get("data").and_then(Value::as_str) {
            document = decode_document(data)?;
        }
    }

    let envelope: Envelope = serde_json::from_value(document)
        .map_err(|e| CliError::alert(format!("{MISSING_PARAMETERS} ({e})")))?;
    let labels = envelope.incident.resource.labels;
    let project_number = labels
        .resource_container
        .strip_prefix("projects/")
        .unwrap_or(&labels.resource_container)
        .to_string();
    let target = IncidentTarget {
        project_id: labels.project_id,
        project_number,
        region: labels.location,
        volume_id: labels.volume_id,
        name: labels.name,
    };

    if envelope.incident.state == CLOSED_STATE {
        Ok(AlertEvent::Resolved(target))
    } else {
        Ok(AlertEvent::Open(target))
    }
}
