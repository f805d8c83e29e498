//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.clinaudit.toml` files.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".clinaudit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Analytics policy settings.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "clinaudit_report.md".to_string()
}

/// Analysis backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the analysis backend API.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Delay between job status checks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Status checks before giving up on a running job.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_seconds: default_timeout(),
            poll_interval_seconds: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_poll_attempts() -> u32 {
    120 // 10 min at the default interval
}

/// Analytics policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Mortality rate (percent) above which a comorbidity is flagged high risk.
    #[serde(default = "default_high_risk_threshold")]
    pub high_risk_threshold: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            high_risk_threshold: default_high_risk_threshold(),
        }
    }
}

fn default_high_risk_threshold() -> f64 {
    crate::analysis::DEFAULT_HIGH_RISK_THRESHOLD
}

impl From<&AnalyticsConfig> for crate::analysis::AnalyticsOptions {
    fn from(config: &AnalyticsConfig) -> Self {
        Self {
            high_risk_threshold: config.high_risk_threshold,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows shown in each frequency table.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Include the per-patient table in Markdown reports.
    #[serde(default = "default_true")]
    pub include_patients: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            include_patients: true,
        }
    }
}

fn default_top_n() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }

        if let Some(ref url) = args.backend_url {
            self.backend.url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }

        if let Some(threshold) = args.high_risk_threshold {
            self.analytics.high_risk_threshold = threshold;
        }

        if let Some(top) = args.top {
            self.report.top_n = top;
        }
        if args.no_patients {
            self.report.include_patients = false;
        }
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.analytics.high_risk_threshold;
        ensure!(
            (0.0..=100.0).contains(&threshold),
            "analytics.high_risk_threshold must be between 0 and 100, got {}",
            threshold
        );

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Args;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend.url, "http://localhost:8000");
        assert_eq!(config.analytics.high_risk_threshold, 20.0);
        assert_eq!(config.report.top_n, 10);
        assert!(config.report.include_patients);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "audit.md"

[backend]
url = "https://audit.example.org/api"
poll_interval_seconds = 2

[analytics]
high_risk_threshold = 15.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "audit.md");
        assert_eq!(config.backend.url, "https://audit.example.org/api");
        assert_eq!(config.backend.poll_interval_seconds, 2);
        assert_eq!(config.backend.timeout_seconds, 30);
        assert_eq!(config.analytics.high_risk_threshold, 15.0);
        assert_eq!(config.report.top_n, 10);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[backend]"));
        assert!(toml_str.contains("[analytics]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backend.max_poll_attempts, 120);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_dir(dir.path()).unwrap().is_none());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[report]\ntop_n = 3\ninclude_patients = false\n",
        )
        .unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap().unwrap();
        assert_eq!(config.report.top_n, 3);
        assert!(!config.report.include_patients);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[analytics\nhigh_risk_threshold = ").unwrap();

        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_merge_with_args() {
        let args = Args::parse_from([
            "clinaudit",
            "--job-id",
            "job-9",
            "--backend-url",
            "http://backend:9000",
            "--high-risk-threshold",
            "30",
            "--no-patients",
        ]);

        let mut config = Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.backend.url, "http://backend:9000");
        assert_eq!(config.analytics.high_risk_threshold, 30.0);
        assert!(!config.report.include_patients);
        assert_eq!(config.report.top_n, 10);
        assert_eq!(config.general.output, "clinaudit_report.md");
    }

    #[test]
    fn test_parse_config_with_retired_keys() {
        let config: Config = toml::from_str("[general]\nverbose = true\n").unwrap();
        assert_eq!(config.general.output, "clinaudit_report.md");
    }

    #[test]
    fn test_validate_threshold_range() {
        assert!(Config::default().validate().is_ok());

        let config: Config = toml::from_str("[analytics]\nhigh_risk_threshold = 100.0\n").unwrap();
        assert!(config.validate().is_ok());

        let config: Config = toml::from_str("[analytics]\nhigh_risk_threshold = -1.0\n").unwrap();
        assert!(config.validate().is_err());

        let config: Config = toml::from_str("[analytics]\nhigh_risk_threshold = nan\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_after_cli_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[analytics]\nhigh_risk_threshold = 250.0\n").unwrap();

        let mut config = Config::load(&path).unwrap();
        assert!(config.validate().is_err());

        let args = Args::parse_from(["clinaudit", "--job-id", "1", "--high-risk-threshold", "25"]);
        config.merge_with_args(&args);
        assert!(config.validate().is_ok());
    }
}
