//! Layered settings: flags and environment over an optional TOML file over
//! built-in defaults.
//!
//! ```toml
//! project = "my-project"
//! credential = "/etc/cvs/key.json"
//! interval = 60
//! margin = 20
//! dry_run = false
//! region = "-"
//! format = "json"
//!
//! [endpoints]
//! cvs_api_url = "https://cloudvolumesgcp-api.netapp.com"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use cvs_api::{CVS_API_URL, RESOURCE_MANAGER_URL};
use cvs_auth::redact_credential;
use cvs_auth::signer::IAM_CREDENTIALS_URL;
use cvs_capacity::{ALL_REGIONS, MAX_MARGIN_PERCENT, Policy};
use serde::{Deserialize, Serialize};

use crate::cli::{Format, GlobalArgs, ResizeArgs};
use crate::error::CliError;

/// Default minutes between runs.
pub const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Default free capacity, in percent.
pub const DEFAULT_MARGIN_PERCENT: u32 = 20;

/// Service endpoints, overridable for private access or testing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Endpoints {
    /// CVS volume API.
    pub cvs_api_url: String,
    /// Resource Manager API.
    pub resource_manager_url: String,
    /// IAM Credentials API.
    pub iam_credentials_url: String,
    /// Metadata server; `GCE_METADATA_HOST` or the default host if unset.
    pub metadata_url: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            cvs_api_url: CVS_API_URL.to_string(),
            resource_manager_url: RESOURCE_MANAGER_URL.to_string(),
            iam_credentials_url: IAM_CREDENTIALS_URL.to_string(),
            metadata_url: None,
        }
    }
}

/// Contents of the TOML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Project ID or number.
    pub project: Option<String>,
    /// Credential identifier.
    pub credential: Option<String>,
    /// Minutes between runs.
    pub interval: Option<u32>,
    /// Free capacity in percent.
    pub margin: Option<u32>,
    /// Report only.
    pub dry_run: Option<bool>,
    /// Verbose logging.
    pub debug: Option<bool>,
    /// Region to scan.
    pub region: Option<String>,
    /// Output format.
    pub format: Option<Format>,
    /// Ambient access token.
    pub access_token: Option<String>,
    /// Endpoint overrides.
    pub endpoints: Endpoints,
}

impl FileConfig {
    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::config(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Parses a configuration file's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        toml::from_str(content).map_err(|e| CliError::config(format!("invalid TOML: {e}")))
    }
}

/// Effective settings for one invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Project ID or number; required for `resize`.
    pub project: Option<String>,
    /// Credential identifier.
    pub credential: String,
    /// Minutes until the next run; 0 selects static-margin sizing.
    pub interval_minutes: u32,
    /// Free capacity in percent.
    pub margin_percent: u32,
    /// Report only.
    pub dry_run: bool,
    /// Verbose logging.
    pub debug: bool,
    /// Output format.
    pub format: Format,
    /// Region to scan, `-` for all.
    pub region: String,
    /// Ambient access token; the metadata server is used if `None`.
    pub access_token: Option<String>,
    /// Service endpoints.
    pub endpoints: Endpoints,
    /// Configuration file the settings were layered over, if any.
    pub config_file: Option<PathBuf>,
}

fn load_file(global: &GlobalArgs) -> Result<FileConfig, CliError> {
    global
        .config
        .as_ref()
        .map_or_else(|| Ok(FileConfig::default()), |path| FileConfig::from_file(path))
}

impl Settings {
    /// Settings for `resize`, reading the config file named in `global`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] for an unreadable file or invalid values.
    pub fn for_resize(global: &GlobalArgs, args: &ResizeArgs) -> Result<Self, CliError> {
        let file = load_file(global)?;
        let settings = Self::layer(global, args, file)?;
        if settings.project.is_none() {
            return Err(CliError::config(
                "project not set; pass --project or set DEVSHELL_PROJECT_ID",
            ));
        }
        Ok(settings)
    }

    /// Settings for `alert`: static margin and JSON output.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] for an unreadable file or invalid values.
    pub fn for_alert(global: &GlobalArgs) -> Result<Self, CliError> {
        let file = load_file(global)?;
        let mut settings = Self::layer(global, &ResizeArgs::default(), file)?;
        settings.interval_minutes = 0;
        settings.format = Format::Json;
        Ok(settings)
    }

    /// Merges flags and environment over `file` over defaults, then validates.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] if the credential is missing or the
    /// margin is out of range.
    pub fn layer(global: &GlobalArgs, args: &ResizeArgs, file: FileConfig) -> Result<Self, CliError> {
        let settings = Self {
            project: global.project.clone().or(file.project),
            credential: global
                .credential
                .clone()
                .or(file.credential)
                .unwrap_or_default(),
            interval_minutes: args
                .interval
                .or(file.interval)
                .unwrap_or(DEFAULT_INTERVAL_MINUTES),
            margin_percent: global
                .margin
                .or(file.margin)
                .unwrap_or(DEFAULT_MARGIN_PERCENT),
            dry_run: global.dry_run.or(file.dry_run).unwrap_or(false),
            debug: global.debug.or(file.debug).unwrap_or(false),
            format: global.format.or(file.format).unwrap_or_default(),
            region: args
                .region
                .clone()
                .or(file.region)
                .unwrap_or_else(|| ALL_REGIONS.to_string()),
            access_token: global.access_token.clone().or(file.access_token),
            endpoints: file.endpoints,
            config_file: global.config.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), CliError> {
        if self.credential.trim().is_empty() {
            return Err(CliError::config(
                "service account credential not set; pass --credential or set \
                 SERVICE_ACCOUNT_CREDENTIAL to a key file path, base64 key, or principal",
            ));
        }
        if self.margin_percent > MAX_MARGIN_PERCENT {
            return Err(CliError::config(format!(
                "margin must be between 0 and {MAX_MARGIN_PERCENT}, got {}",
                self.margin_percent
            )));
        }
        if self.region.trim().is_empty() {
            return Err(CliError::config("region cannot be empty"));
        }
        if self.project.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(CliError::config("project cannot be empty"));
        }
        Ok(())
    }

    /// The planning policy these settings describe.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Capacity`] if the margin is out of range.
    pub fn policy(&self) -> Result<Policy, CliError> {
        Ok(Policy::new(
            self.interval_minutes,
            self.margin_percent,
            self.dry_run,
        )?)
    }

    /// Credential prefix safe to print.
    #[must_use]
    pub fn redacted_credential(&self) -> String {
        redact_credential(&self.credential)
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("project", &self.project)
            .field("credential", &self.redacted_credential())
            .field("interval_minutes", &self.interval_minutes)
            .field("margin_percent", &self.margin_percent)
            .field("dry_run", &self.dry_run)
            .field("debug", &self.debug)
            .field("format", &self.format)
            .field("region", &self.region)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("endpoints", &self.endpoints)
            .field("config_file", &self.config_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn global() -> GlobalArgs {
        GlobalArgs {
            credential: Some("/etc/cvs/key.json".to_string()),
            project: Some("my-project".to_string()),
            ..GlobalArgs::default()
        }
    }

    #[test]
    fn defaults_apply_without_file() {
        let settings =
            Settings::layer(&global(), &ResizeArgs::default(), FileConfig::default()).expect("settings");
        assert_eq!(settings.interval_minutes, DEFAULT_INTERVAL_MINUTES);
        assert_eq!(settings.margin_percent, DEFAULT_MARGIN_PERCENT);
        assert_eq!(settings.region, "-");
        assert_eq!(settings.format, Format::Table);
        assert!(!settings.dry_run);
        assert_eq!(settings.endpoints, Endpoints::default());
    }

    #[test]
    fn flags_override_file_and_file_overrides_defaults() {
        let file = FileConfig::from_toml(
            r#"
            margin = 35
            interval = 30
            region = "us-east4"
            dry_run = true
            format = "json"
            "#,
        )
        .expect("file");
        let mut args = global();
        args.margin = Some(10);

        let settings = Settings::layer(&args, &ResizeArgs::default(), file).expect("settings");
        assert_eq!(settings.margin_percent, 10);
        assert_eq!(settings.interval_minutes, 30);
        assert_eq!(settings.region, "us-east4");
        assert!(settings.dry_run);
        assert_eq!(settings.format, Format::Json);
    }

    #[test]
    fn explicit_flag_turns_off_file_switches() {
        let file = FileConfig::from_toml("dry_run = true\ndebug = true").expect("file");
        let mut args = global();
        args.dry_run = Some(false);

        let settings = Settings::layer(&args, &ResizeArgs::default(), file).expect("settings");
        assert!(!settings.dry_run);
        assert!(settings.debug);
    }

    #[test]
    fn credential_is_required() {
        let args = GlobalArgs::default();
        let err = Settings::layer(&args, &ResizeArgs::default(), FileConfig::default())
            .expect_err("should fail");
        assert!(err.to_string().contains("credential"));
    }

    #[test]
    fn margin_above_bound_is_rejected() {
        let mut args = global();
        args.margin = Some(100);
        let err = Settings::layer(&args, &ResizeArgs::default(), FileConfig::default())
            .expect_err("should fail");
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn resize_requires_project() {
        let mut args = global();
        args.project = None;
        let err = Settings::for_resize(&args, &ResizeArgs::default()).expect_err("should fail");
        assert!(err.to_string().contains("project"));
    }

    #[test]
    fn alert_forces_static_margin_and_json() {
        let mut args = global();
        args.project = None;
        args.format = Some(Format::Table);
        let settings = Settings::for_alert(&args).expect("settings");
        assert_eq!(settings.interval_minutes, 0);
        assert_eq!(settings.format, Format::Json);
        assert_eq!(
            settings.policy().expect("policy").mode(),
            cvs_capacity::SizingMode::StaticMargin
        );
    }

    #[test]
    fn loads_file_with_endpoints() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"
            project = "from-file"
            credential = "from-file-credential"

            [endpoints]
            cvs_api_url = "http://127.0.0.1:9000"
            "#
        )
        .expect("write");

        let args = GlobalArgs {
            config: Some(file.path().to_path_buf()),
            ..GlobalArgs::default()
        };
        let settings = Settings::for_resize(&args, &ResizeArgs::default()).expect("settings");
        assert_eq!(settings.project.as_deref(), Some("from-file"));
        assert_eq!(settings.endpoints.cvs_api_url, "http://127.0.0.1:9000");
        assert_eq!(settings.endpoints.resource_manager_url, RESOURCE_MANAGER_URL);
        assert_eq!(settings.config_file.as_deref(), Some(file.path()));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("marginn = 5").is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = FileConfig::from_file("/nonexistent/cvs.toml").expect_err("should fail");
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut args = global();
        args.credential = Some("ewogICJ0eXBlIjogInNlcnZpY2VfYWNjb3VudCIK".to_string());
        args.access_token = Some("ya29.secret-token".to_string());
        let settings =
            Settings::layer(&args, &ResizeArgs::default(), FileConfig::default()).expect("settings");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("InNlcnZpY2VfYWNjb3VudCIK"));
        assert!(debug.contains("ewogICJ0e"));
    }
}
