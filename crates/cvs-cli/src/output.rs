//! Output formatting for reports.
//!
//! Table output is a fixed-width listing for terminals. JSON output is one
//! object per line with a `severity` field, the shape log routers such as
//! Cloud Logging pick up as structured entries.

use std::io::Write;

use cvs_capacity::{Action, Decision, Severity, VolumeReport};
use serde::Serialize;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a value as one JSON line or as its table form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => write_json_line(writer, value),
            Format::Table => value.write_table(writer),
        }
    }

    /// Write the column header of the volume listing. JSON output has none.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_header<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if !self.is_json() {
            writeln!(
                writer,
                "{:30} {:12} {:>22} {:>22} {:11} {:5} {:>22} Resize",
                "Name",
                "serviceLevel",
                "used [B]",
                "allocated [B]",
                "snapReserve",
                "%used",
                "new_allocated [B]"
            )?;
        }
        Ok(())
    }

    /// Write everything a volume report has to say.
    ///
    /// Skipped volumes produce their notice only. Evaluated volumes produce
    /// warnings first, then the volume line, then any errors.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_report<W: Write>(
        &self,
        writer: &mut W,
        report: &VolumeReport,
    ) -> Result<(), CliError> {
        if report.is_skipped() {
            for notice in &report.notices {
                self.write(
                    writer,
                    &Message::for_volume(notice.severity, &report.name, &notice.message),
                )?;
            }
            return Ok(());
        }

        let (warnings, errors): (Vec<_>, Vec<_>) = report
            .notices
            .iter()
            .partition(|n| n.severity < Severity::Error);
        for notice in warnings {
            self.write(
                writer,
                &Message::for_volume(notice.severity, &report.name, &notice.message),
            )?;
        }
        self.write(writer, &VolumeLine::from(report))?;
        for notice in errors {
            self.write(
                writer,
                &Message::for_volume(notice.severity, &report.name, &notice.message),
            )?;
        }
        Ok(())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

fn write_json_line<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer(&mut *writer, value).map_err(|e| CliError::Format {
        reason: format!("JSON serialization failed: {e}"),
    })?;
    writeln!(writer)?;
    Ok(())
}

/// Formats `n` with `,` thousands separators.
#[must_use]
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// A severity-tagged message, optionally about one volume.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Severity.
    pub severity: Severity,
    /// Volume name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Volume name, as reported by an incident.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Volume identifier.
    #[serde(rename = "UUID", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Text.
    pub message: String,
}

impl Message {
    /// A message not tied to a volume.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            volume: None,
            name: None,
            uuid: None,
            message: message.into(),
        }
    }

    /// A message about the volume named `volume`.
    pub fn for_volume(severity: Severity, volume: &str, message: impl Into<String>) -> Self {
        Self {
            volume: Some(volume.to_string()),
            ..Self::new(severity, message)
        }
    }

    /// A message about an incident's volume.
    pub fn for_incident(
        severity: Severity,
        name: &str,
        volume_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            uuid: Some(volume_id.to_string()),
            ..Self::new(severity, message)
        }
    }
}

impl TableDisplay for Message {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        match (&self.volume, self.severity) {
            (Some(volume), Severity::Info) => writeln!(writer, "{volume:30} {}", self.message)?,
            (Some(volume), severity) => {
                writeln!(writer, "{volume:30} {severity}: {}", self.message)?;
            }
            (None, Severity::Info) => writeln!(writer, "{}", self.message)?,
            (None, severity) => writeln!(writer, "{severity}: {}", self.message)?,
        }
        Ok(())
    }
}

/// One evaluated volume.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeLine {
    /// Always INFO.
    pub severity: Severity,
    /// Volume name.
    pub volume: String,
    /// Region.
    pub region: String,
    /// Volume identifier.
    #[serde(rename = "UUID")]
    pub uuid: String,
    /// UI tier label.
    pub service_level: Option<String>,
    /// Used bytes.
    pub old_size: u64,
    /// Allocated bytes before the run.
    pub quota: u64,
    /// True if the quota grows.
    pub enlarge: bool,
    /// Allocated bytes after the run.
    pub new_size: u64,
    /// Snapshot reserve in percent.
    pub snap_reserve: u64,
    /// `used / quota` in percent.
    #[serde(skip)]
    pub percent_used: f64,
    /// True if the resize was not applied because of dry-run.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl From<&VolumeReport> for VolumeLine {
    fn from(report: &VolumeReport) -> Self {
        let new_size = match report.decision {
            Decision::ResizeProposed { new_size } => new_size,
            _ => report.new_size.unwrap_or(report.quota_bytes),
        };
        Self {
            severity: Severity::Info,
            volume: report.name.clone(),
            region: report.region.clone(),
            uuid: report.volume_id.clone(),
            service_level: report.service_level.clone(),
            old_size: report.used_bytes,
            quota: report.quota_bytes,
            enlarge: report.enlarge,
            new_size,
            snap_reserve: report.snap_reserve,
            percent_used: report.percent_used,
            dry_run: report.action == Action::DryRun,
        }
    }
}

impl TableDisplay for VolumeLine {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let resize = match (self.enlarge, self.dry_run) {
            (true, false) => "Yes",
            (true, true) => "Yes (dry run)",
            (false, _) => "",
        };
        writeln!(
            writer,
            "{:30} {:12} {:>22} {:>22} {:>11} {:>5.1} {:>22} {resize}",
            self.volume,
            self.service_level.as_deref().unwrap_or("unknown"),
            group_thousands(self.old_size),
            group_thousands(self.quota),
            self.snap_reserve,
            self.percent_used,
            group_thousands(self.new_size),
        )?;
        Ok(())
    }
}

/// Effective parameters of a `resize` run.
#[derive(Debug, Clone, Serialize)]
pub struct ResizeParameters {
    /// Configuration file layered under flags and environment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    /// Project as given.
    pub project_id: String,
    /// Minutes between runs.
    pub duration: u32,
    /// Margin in percent.
    pub margin: u32,
    /// Report only.
    pub dry_mode: bool,
    /// Credential prefix.
    pub service_account: String,
}

impl TableDisplay for ResizeParameters {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Project: {}", self.project_id)?;
        if let Some(path) = &self.config_file {
            writeln!(writer, "Config file: {path}")?;
        }
        writeln!(
            writer,
            "Parameters: CVS_CAPACITY_INTERVAL: {} minutes, CVS_CAPACITY_MARGIN: {}%, CVS_DRY_MODE: {}, credential: {}",
            self.duration, self.margin, self.dry_mode, self.service_account
        )?;
        Ok(())
    }
}

/// Effective parameters of an `alert` run.
#[derive(Debug, Clone, Serialize)]
pub struct AlertParameters {
    /// Configuration file layered under flags and environment, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    /// Margin in percent.
    pub margin: u32,
    /// Report only.
    pub dry_mode: bool,
    /// Credential prefix.
    pub service_account: String,
}

impl TableDisplay for AlertParameters {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "Parameters: CVS_CAPACITY_MARGIN: {}%, CVS_DRY_MODE: {}, credential: {}",
            self.margin, self.dry_mode, self.service_account
        )?;
        if let Some(path) = &self.config_file {
            writeln!(writer, "Config file: {path}")?;
        }
        Ok(())
    }
}

/// The volume an incident points at.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentParameters {
    /// Always `pubsub`.
    pub parameter_source: &'static str,
    /// Project ID.
    pub project_id: String,
    /// Project number.
    pub project_number: String,
    /// Region.
    pub region: String,
    /// Volume name.
    pub name: String,
    /// Volume identifier.
    #[serde(rename = "UUID")]
    pub uuid: String,
}

impl TableDisplay for IncidentParameters {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "Incident: project {} ({}), region {}, volume {} ({})",
            self.project_id, self.project_number, self.region, self.name, self.uuid
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvs_capacity::{GIB, InMemoryVolumeClient, Policy, ResizeDecisionEngine, TIB, Volume};
    use test_case::test_case;

    fn volume(name: &str, used: u64, quota: u64) -> Volume {
        Volume {
            name: name.to_string(),
            region: "europe-west1".to_string(),
            volume_id: format!("{name}-id"),
            storage_class: "hardware".to_string(),
            service_level: "basic".to_string(),
            quota_in_bytes: quota,
            used_bytes: used,
            snap_reserve: 5,
            life_cycle_state: "available".to_string(),
            is_data_protection: false,
            in_replication: false,
        }
    }

    fn render(format: Format, report: &VolumeReport) -> String {
        let mut buf = Vec::new();
        OutputFormat::new(format)
            .write_report(&mut buf, report)
            .expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    fn evaluate(v: &Volume) -> VolumeReport {
        ResizeDecisionEngine::new(Policy::static_margin(20, false).expect("policy")).evaluate(v)
    }

    #[test_case(0, "0")]
    #[test_case(999, "999")]
    #[test_case(1000, "1,000")]
    #[test_case(107_374_182_400, "107,374,182,400")]
    fn thousands_grouping(n: u64, expected: &str) {
        assert_eq!(group_thousands(n), expected);
    }

    #[test]
    fn json_volume_line_has_expected_fields() {
        let report = evaluate(&volume("db", 80 * GIB, 50 * GIB));
        let out = render(Format::Json, &report);
        let line: serde_json::Value = serde_json::from_str(out.trim()).expect("json");
        assert_eq!(line["severity"], "INFO");
        assert_eq!(line["volume"], "db");
        assert_eq!(line["UUID"], "db-id");
        assert_eq!(line["serviceLevel"], "standard");
        assert_eq!(line["oldSize"], 80 * GIB);
        assert_eq!(line["quota"], 50 * GIB);
        assert_eq!(line["enlarge"], true);
        assert_eq!(line["newSize"], 100 * GIB);
        assert_eq!(line["snapReserve"], 5);
        assert!(line.get("dryRun").is_none());
    }

    #[test]
    fn json_cap_warning_precedes_volume_line() {
        let report = evaluate(&volume("huge", 95 * TIB, 90 * TIB));
        let out = render(Format::Json, &report);
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["severity"], "WARNING");
        assert_eq!(lines[0]["message"], "Resizing capped to 100 TiB");
        assert_eq!(lines[1]["newSize"], 100 * TIB);
    }

    #[test]
    fn skipped_volume_prints_only_its_notice() {
        let mut v = volume("busy", GIB, GIB);
        v.life_cycle_state = "creating".to_string();
        let report = evaluate(&v);

        let json = render(Format::Json, &report);
        let line: serde_json::Value = serde_json::from_str(json.trim()).expect("json");
        assert_eq!(line["severity"], "INFO");
        assert_eq!(line["volume"], "busy");
        assert_eq!(line["message"], "Volume is not available. Skipping ...");

        let table = render(Format::Table, &report);
        assert!(table.starts_with("busy "));
        assert!(table.contains("Volume is not available. Skipping ..."));
    }

    #[test]
    fn table_row_marks_resize() {
        let report = evaluate(&volume("db", 80 * GIB, 50 * GIB));
        let table = render(Format::Table, &report);
        assert!(table.contains("85,899,345,920"));
        assert!(table.contains("160.0"));
        assert!(table.trim_end().ends_with("Yes"));
    }

    #[tokio::test]
    async fn failed_resize_is_reported_after_the_line() {
        let v = volume("db", 80 * GIB, 50 * GIB);
        let client = InMemoryVolumeClient::with_volumes([v.clone()]);
        client.fail_patches_for("db-id");
        let report = ResizeDecisionEngine::new(Policy::static_margin(20, false).expect("policy"))
            .process(&client, &v)
            .await;

        let out = render(Format::Json, &report);
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).expect("json"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["severity"], "INFO");
        assert_eq!(lines[1]["severity"], "ERROR");
    }

    #[test]
    fn header_only_in_table_mode() {
        let mut table = Vec::new();
        OutputFormat::new(Format::Table)
            .write_header(&mut table)
            .expect("write");
        assert!(String::from_utf8(table).expect("utf8").starts_with("Name"));

        let mut json = Vec::new();
        OutputFormat::new(Format::Json)
            .write_header(&mut json)
            .expect("write");
        assert!(json.is_empty());
    }

    #[test]
    fn incident_message_uses_name_and_uuid() {
        let mut buf = Vec::new();
        OutputFormat::new(Format::Json)
            .write(
                &mut buf,
                &Message::for_incident(Severity::Info, "db", "uuid-1", "Incident resolved"),
            )
            .expect("write");
        let line: serde_json::Value =
            serde_json::from_slice(&buf).expect("json");
        assert_eq!(line["name"], "db");
        assert_eq!(line["UUID"], "uuid-1");
        assert!(line.get("volume").is_none());
    }
}
