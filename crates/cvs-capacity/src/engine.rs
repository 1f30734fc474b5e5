//! Per-volume resize decisions and their execution.
//!
//! Every volume passes through the same gate sequence and ends in exactly
//! one [`Decision`]:
//!
//! ```text
//! not available ──────────────► Skipped(NotAvailable)
//! replication secondary ──────► Skipped(ReplicationSecondary)
//! sizing error ───────────────► Skipped(SizingFailed)
//! size (capped) > quota ──────► ResizeProposed(size)
//! otherwise ──────────────────► Unchanged
//! ```
//!
//! Only `ResizeProposed` outside dry-run reaches the [`VolumeClient`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::planner::{MAX_VOLUME_BYTES, plan_capacity};
use crate::policy::Policy;
use crate::tier::api_to_ui;
use crate::volume::{Volume, VolumeClient, quota_change};

/// Severity attached to a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational.
    Info,
    /// Something was adjusted.
    Warning,
    /// Something failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// A severity-tagged message about one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    /// Severity.
    pub severity: Severity,
    /// Message.
    pub message: String,
}

impl Notice {
    /// Creates an INFO notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    /// Creates a WARNING notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    /// Creates an ERROR notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Why a volume was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Lifecycle state is not `available`.
    NotAvailable {
        /// The reported state.
        state: String,
    },
    /// Destination of an active replication; sized through its source.
    ReplicationSecondary,
    /// No size could be computed.
    SizingFailed {
        /// The sizing error.
        reason: String,
    },
}

impl SkipReason {
    /// Operator-facing message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::NotAvailable { .. } => "Volume is not available. Skipping ...".to_string(),
            Self::ReplicationSecondary => {
                "Secondary volume in active replication. Skipping ...".to_string()
            }
            Self::SizingFailed { reason } => format!("Cannot size volume: {reason}. Skipping ..."),
        }
    }

    const fn severity(&self) -> Severity {
        match self {
            Self::NotAvailable { .. } | Self::ReplicationSecondary => Severity::Info,
            Self::SizingFailed { .. } => Severity::Error,
        }
    }
}

/// Outcome of the decision step for one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Not evaluated further.
    Skipped(SkipReason),
    /// Current quota is sufficient.
    Unchanged,
    /// Quota should grow to `new_size` bytes.
    ResizeProposed {
        /// Proposed quota in bytes.
        new_size: u64,
    },
}

/// What was done with a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Nothing to do.
    None,
    /// A resize was proposed but dry-run is on.
    DryRun,
    /// The quota was written.
    Resized,
    /// The write failed.
    Failed {
        /// The upstream error.
        reason: String,
    },
}

/// The report entry for one volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeReport {
    /// Volume name.
    pub name: String,
    /// Volume region.
    pub region: String,
    /// Volume identifier.
    pub volume_id: String,
    /// UI label of the effective tier, `None` if unknown.
    pub service_level: Option<String>,
    /// Bytes in use.
    pub used_bytes: u64,
    /// Allocated bytes before any resize.
    pub quota_bytes: u64,
    /// Snapshot reserve in percent.
    pub snap_reserve: u64,
    /// `used / quota` in percent, one decimal; 0 for an empty quota.
    pub percent_used: f64,
    /// Resulting quota: the proposed size or the kept quota. `None` if skipped.
    pub new_size: Option<u64>,
    /// True if the quota should grow.
    pub enlarge: bool,
    /// The decision.
    pub decision: Decision,
    /// What was done with it.
    pub action: Action,
    /// Notices raised for this volume.
    pub notices: Vec<Notice>,
}

impl VolumeReport {
    fn new(volume: &Volume, decision: Decision, new_size: Option<u64>, notices: Vec<Notice>) -> Self {
        let enlarge = matches!(decision, Decision::ResizeProposed { .. });
        Self {
            name: volume.name.clone(),
            region: volume.region.clone(),
            volume_id: volume.volume_id.clone(),
            service_level: api_to_ui(volume.effective_tier()).map(str::to_string),
            used_bytes: volume.used_bytes,
            quota_bytes: volume.quota_in_bytes,
            snap_reserve: volume.snap_reserve,
            percent_used: percent_used(volume.used_bytes, volume.quota_in_bytes),
            new_size,
            enlarge,
            decision,
            action: Action::None,
            notices,
        }
    }

    /// True if the volume was skipped.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self.decision, Decision::Skipped(_))
    }

    /// Highest severity among the notices, INFO if none.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.notices
            .iter()
            .map(|n| n.severity)
            .max()
            .unwrap_or(Severity::Info)
    }
}

/// `used / quota * 100` rounded to one decimal, 0 when `quota` is 0.
#[must_use]
pub fn percent_used(used: u64, quota: u64) -> f64 {
    if quota == 0 {
        return 0.0;
    }
    (used as f64 / quota as f64 * 1000.0).round() / 10.0
}

/// Applies a [`Policy`] to volumes.
#[derive(Debug, Clone, Copy)]
pub struct ResizeDecisionEngine {
    policy: Policy,
}

impl ResizeDecisionEngine {
    /// Creates an engine for one planning pass.
    #[must_use]
    pub const fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// The policy in force.
    #[must_use]
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Decides what to do with `volume` without touching it.
    #[must_use]
    pub fn evaluate(&self, volume: &Volume) -> VolumeReport {
        if !volume.is_available() {
            return skipped(
                volume,
                SkipReason::NotAvailable {
                    state: volume.life_cycle_state.clone(),
                },
            );
        }
        if volume.is_replication_secondary() {
            return skipped(volume, SkipReason::ReplicationSecondary);
        }

        let tier = volume.effective_tier();
        let mut size = match plan_capacity(volume.used_bytes, tier, &self.policy) {
            Ok(size) => size,
            Err(err) => {
                error!(volume = %volume.name, volume_id = %volume.volume_id, error = %err, "sizing failed");
                return skipped(
                    volume,
                    SkipReason::SizingFailed {
                        reason: err.to_string(),
                    },
                );
            }
        };

        let mut notices = Vec::new();
        if size > MAX_VOLUME_BYTES {
            warn!(volume = %volume.name, computed = size, "resize capped to 100 TiB");
            notices.push(Notice::warning("Resizing capped to 100 TiB"));
            size = MAX_VOLUME_BYTES;
        }

        let (decision, new_size) = if size > volume.quota_in_bytes {
            (Decision::ResizeProposed { new_size: size }, size)
        } else {
            (Decision::Unchanged, volume.quota_in_bytes)
        };
        debug!(
            volume = %volume.name,
            tier,
            used = volume.used_bytes,
            quota = volume.quota_in_bytes,
            new_size,
            "volume evaluated"
        );
        VolumeReport::new(volume, decision, Some(new_size), notices)
    }

    /// Shorthand for the decision of [`Self::evaluate`].
    #[must_use]
    pub fn decide(&self, volume: &Volume) -> Decision {
        self.evaluate(volume).decision
    }

    /// Evaluates `volume` and, unless dry-run, applies a proposed resize.
    ///
    /// A failed write is recorded in the report; it is not an error.
    pub async fn process<C: VolumeClient>(&self, client: &C, volume: &Volume) -> VolumeReport {
        let mut report = self.evaluate(volume);
        let Decision::ResizeProposed { new_size } = report.decision else {
            return report;
        };

        if self.policy.dry_run() {
            info!(volume = %volume.name, new_size, "dry run, not resizing");
            report.action = Action::DryRun;
            return report;
        }

        match client
            .patch(&volume.region, &volume.volume_id, &quota_change(new_size))
            .await
        {
            Ok(()) => {
                info!(
                    volume = %volume.name,
                    region = %volume.region,
                    old_quota = volume.quota_in_bytes,
                    new_size,
                    "volume resized"
                );
                report.action = Action::Resized;
            }
            Err(err) => {
                error!(volume = %volume.name, error = %err, "resize failed");
                report.notices.push(Notice::error(format!("Resize failed: {err}")));
                report.action = Action::Failed {
                    reason: err.to_string(),
                };
            }
        }
        report
    }

    /// Lists `region` and processes every volume in order.
    ///
    /// # Errors
    ///
    /// Returns the listing error; per-volume failures are in the reports.
    pub async fn process_all<C: VolumeClient>(
        &self,
        client: &C,
        region: &str,
    ) -> Result<Vec<VolumeReport>> {
        let volumes = client.list(region).await?;
        info!(region, count = volumes.len(), "volumes listed");

        let mut reports = Vec::with_capacity(volumes.len());
        for volume in &volumes {
            reports.push(self.process(client, volume).await);
        }
        Ok(reports)
    }
}

fn skipped(volume: &Volume, reason: SkipReason) -> VolumeReport {
    let notice = Notice {
        severity: reason.severity(),
        message: reason.message(),
    };
    info!(volume = %volume.name, volume_id = %volume.volume_id, reason = %notice.message, "volume skipped");
    VolumeReport::new(volume, Decision::Skipped(reason), None, vec![notice])
}
