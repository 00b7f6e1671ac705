use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::collector::DEFAULT_TIMEOUT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_color")]
    pub color: String,
    /// Per-provider time limit for one run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_format() -> String {
    "text".to_string()
}
fn default_color() -> String {
    "auto".to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            color: default_color(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcpConfig {
    pub project: Option<String>,
    pub billing_account: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureConfig {
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub azure: AzureConfig,
}

/// Written by `config init`.
pub const CONFIG_TEMPLATE: &str = r#"# cloud-doctor configuration
# Command-line flags and environment variables override these values.

[settings]
# "text" or "json"
default_format = "text"
# "auto", "always" or "never"
color = "auto"
# Seconds each provider may take before it is reported as failed
timeout_secs = 120

[aws]
# region = "us-east-1"
# profile = "default"

[gcp]
# project = "my-project"
# billing_account = "0123AB-CDEF01-234567"

[azure]
# subscription = "00000000-0000-0000-0000-000000000000"
"#;

impl AppConfig {
    /// Get the config file path, respecting XDG_CONFIG_HOME
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("~"))
                    .join(".config")
            });
        config_dir.join("cloud-doctor").join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the commented template to `path` unless a file is already there.
    /// Returns false when an existing file was left untouched.
    pub fn write_template(path: &Path, force: bool) -> Result<bool, ConfigError> {
        if path.exists() && !force {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, CONFIG_TEMPLATE)?;
        Ok(true)
    }

    /// Validate the config
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !["text", "json"].contains(&self.settings.default_format.as_str()) {
            issues.push(format!(
                "Invalid default_format: '{}' (must be 'text' or 'json')",
                self.settings.default_format
            ));
        }
        if !["auto", "always", "never"].contains(&self.settings.color.as_str()) {
            issues.push(format!(
                "Invalid color: '{}' (must be 'auto', 'always', or 'never')",
                self.settings.color
            ));
        }
        if self.settings.timeout_secs == 0 {
            issues.push("timeout_secs must be greater than 0".to_string());
        }
        if self.gcp.billing_account.is_some() && self.gcp.project.is_none() {
            issues.push("[gcp] billing_account is set but project is missing".to_string());
        }
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        for (name, value) in [
            ("aws.region", &self.aws.region),
            ("aws.profile", &self.aws.profile),
            ("gcp.project", &self.gcp.project),
            ("gcp.billing_account", &self.gcp.billing_account),
            ("azure.subscription", &self.azure.subscription),
        ] {
            if blank(value) {
                issues.push(format!("{} is set but empty", name));
            }
        }
        issues
    }
}
