//! Orchestration of the two run modes.
//!
//! ```text
//! Settings ──► CredentialSource ──► CredentialTokenProvider ─┐
//!          └─► ProjectResolver ──► project number ───────────┴─► CvsClient
//!                                                                  │
//!                               ResizeDecisionEngine ◄─────────────┘
//!                                        │
//!                                   OutputFormat ──► stdout
//! ```

use std::io::Write;

use cvs_api::{CvsClient, ProjectResolver};
use cvs_auth::{
    AmbientCredentials, CredentialSource, CredentialTokenProvider, IamCredentialsSigner,
    MetadataServer,
};
use cvs_capacity::{
    Action, CapacityError, Decision, ResizeDecisionEngine, Severity, SkipReason, VolumeClient,
    VolumeReport,
};
use tracing::{error, info};

use crate::alert::{AlertEvent, MISSING_PARAMETERS, parse_alert};
use crate::config::Settings;
use crate::error::CliError;
use crate::output::{
    AlertParameters, IncidentParameters, Message, OutputFormat, ResizeParameters,
};

/// Token provider used against the CVS API.
pub type CvsTokens = CredentialTokenProvider<IamCredentialsSigner>;

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Volumes reported.
    pub volumes: usize,
    /// Volumes resized.
    pub resized: usize,
    /// Volumes that would have been resized in a dry run.
    pub proposed: usize,
    /// Volumes skipped.
    pub skipped: usize,
    /// Volumes whose sizing or resize failed.
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, report: &VolumeReport) {
        self.volumes += 1;
        match (&report.decision, &report.action) {
            (Decision::Skipped(SkipReason::SizingFailed { .. }), _) | (_, Action::Failed { .. }) => {
                self.failed += 1;
            }
            (Decision::Skipped(_), _) => self.skipped += 1,
            (_, Action::Resized) => self.resized += 1,
            (_, Action::DryRun) => self.proposed += 1,
            _ => {}
        }
    }

    /// Converts per-volume failures into an error for the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::PartialFailure`] if any volume failed.
    pub fn into_result(self) -> Result<Self, CliError> {
        if self.failed > 0 {
            Err(CliError::PartialFailure {
                failed: self.failed,
                total: self.volumes,
            })
        } else {
            Ok(self)
        }
    }
}

/// Clients shared by both modes.
struct Connections {
    resolver: ProjectResolver,
    tokens: CvsTokens,
}

fn connect(settings: &Settings) -> Result<Connections, CliError> {
    let metadata = match &settings.endpoints.metadata_url {
        Some(url) => MetadataServer::with_base_url(url.clone())?,
        None => MetadataServer::from_env()?,
    };
    let ambient = settings.access_token.as_ref().map_or_else(
        || AmbientCredentials::Metadata(metadata.clone()),
        |token| AmbientCredentials::Static(token.clone()),
    );

    let source = CredentialSource::resolve(&settings.credential)?;
    info!(kind = source.kind(), project = source.project_id(), "credential resolved");
    let signer = IamCredentialsSigner::with_base_url(
        ambient.clone(),
        settings.endpoints.iam_credentials_url.clone(),
    )?;
    let tokens = CredentialTokenProvider::from_source(&source, signer)?;

    let resolver = ProjectResolver::new(ambient, Some(metadata))?
        .with_resource_manager_url(settings.endpoints.resource_manager_url.clone());
    Ok(Connections { resolver, tokens })
}

fn volume_client(
    settings: &Settings,
    project_number: &str,
    tokens: CvsTokens,
) -> Result<CvsClient<CvsTokens>, CliError> {
    Ok(CvsClient::with_base_url(
        settings.endpoints.cvs_api_url.clone(),
        project_number,
        tokens,
    )?)
}

/// Evaluates every volume in the configured region and resizes as needed.
///
/// # Errors
///
/// Returns an error for invalid settings, credential or project resolution
/// failures, a failed volume listing, or if any volume failed.
pub async fn run_resize<W: Write>(settings: &Settings, writer: &mut W) -> Result<RunSummary, CliError> {
    let output = OutputFormat::new(settings.format);
    let project = settings
        .project
        .clone()
        .ok_or_else(|| CliError::config("project not set"))?;
    let policy = settings.policy()?;

    output.write(
        writer,
        &ResizeParameters {
            config_file: settings
                .config_file
                .as_ref()
                .map(|path| path.display().to_string()),
            project_id: project.clone(),
            duration: settings.interval_minutes,
            margin: settings.margin_percent,
            dry_mode: settings.dry_run,
            service_account: settings.redacted_credential(),
        },
    )?;

    let connections = connect(settings)?;
    let identity = connections.resolver.resolve(&project).await?;
    let client = volume_client(settings, &identity.project_number, connections.tokens)?;

    let engine = ResizeDecisionEngine::new(policy);
    let reports = engine.process_all(&client, &settings.region).await?;

    output.write_header(writer)?;
    let mut summary = RunSummary::default();
    for report in &reports {
        output.write_report(writer, report)?;
        summary.record(report);
    }
    writer.flush()?;

    info!(
        volumes = summary.volumes,
        resized = summary.resized,
        proposed = summary.proposed,
        skipped = summary.skipped,
        failed = summary.failed,
        "resize run complete"
    );
    summary.into_result()
}

/// Handles one incident payload.
///
/// # Errors
///
/// Returns an error for an unusable payload, credential or project
/// resolution failures, a missing volume, or a failed resize.
pub async fn run_alert<W: Write>(
    settings: &Settings,
    payload: &str,
    writer: &mut W,
) -> Result<RunSummary, CliError> {
    let output = OutputFormat::new(settings.format);
    output.write(
        writer,
        &AlertParameters {
            config_file: settings
                .config_file
                .as_ref()
                .map(|path| path.display().to_string()),
            margin: settings.margin_percent,
            dry_mode: settings.dry_run,
            service_account: settings.redacted_credential(),
        },
    )?;

    let event = match parse_alert(payload) {
        Ok(event) => event,
        Err(err) => {
            error!(error = %err, "unusable alert payload");
            let message = if payload.trim().is_empty() {
                "No Alert received".to_string()
            } else {
                MISSING_PARAMETERS.to_string()
            };
            output.write(writer, &Message::new(Severity::Error, message))?;
            return Err(err);
        }
    };

    let target = match event {
        AlertEvent::Resolved(target) => {
            output.write(
                writer,
                &Message::for_incident(
                    Severity::Info,
                    &target.name,
                    &target.volume_id,
                    "Incident resolved",
                ),
            )?;
            return Ok(RunSummary::default());
        }
        AlertEvent::Open(target) => target,
    };

    output.write(
        writer,
        &IncidentParameters {
            parameter_source: "pubsub",
            project_id: target.project_id.clone(),
            project_number: target.project_number.clone(),
            region: target.region.clone(),
            name: target.name.clone(),
            uuid: target.volume_id.clone(),
        },
    )?;

    let policy = settings.policy()?;
    let connections = connect(settings)?;
    let identity = connections.resolver.resolve(target.project()).await?;
    let client = volume_client(settings, &identity.project_number, connections.tokens)?;

    let Some(volume) = client.get(&target.region, &target.volume_id).await? else {
        let message = format!(
            "Cannot find volume {} in region {}",
            target.volume_id, target.region
        );
        output.write(writer, &Message::new(Severity::Error, message))?;
        return Err(CapacityError::VolumeNotFound {
            region: target.region,
            volume_id: target.volume_id,
        }
        .into());
    };

    let report = ResizeDecisionEngine::new(policy)
        .process(&client, &volume)
        .await;
    output.write_report(writer, &report)?;
    writer.flush()?;

    let mut summary = RunSummary::default();
    summary.record(&report);
    summary.into_result()
}
