//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// Clinaudit - surgical outcome analytics for clinical audit jobs
///
/// Turns the per-patient results of a comorbidity analysis job into
/// outcome, mortality and risk analytics. Markdown/JSON reports.
///
/// Examples:
///   clinaudit --input job_results.json
///   clinaudit --job-id 42 --backend-url http://localhost:8000 --wait
///   clinaudit --job-id 42 --format json --output analytics.json
///   clinaudit --input job_results.json --fail-on critical
///   clinaudit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Job results JSON file exported from the analysis backend
    #[arg(
        short,
        long,
        value_name = "FILE",
        conflicts_with = "job_id",
        required_unless_present_any = ["job_id", "init_config"]
    )]
    pub input: Option<PathBuf>,

    /// Backend job whose results should be fetched
    #[arg(short, long, value_name = "ID")]
    pub job_id: Option<String>,

    /// Analysis backend base URL
    ///
    /// Can also be set via CLINAUDIT_BACKEND_URL or .clinaudit.toml.
    #[arg(long, value_name = "URL", env = "CLINAUDIT_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Poll the job status until it completes before fetching results
    #[arg(short, long, requires = "job_id")]
    pub wait: bool,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Path to configuration file
    ///
    /// If not specified, looks for .clinaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mortality rate (percent) above which a comorbidity is flagged high risk
    #[arg(long, value_name = "PCT")]
    pub high_risk_threshold: Option<f64>,

    /// Rows shown in each frequency table of the Markdown report
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Leave the per-patient table out of the Markdown report
    #[arg(long)]
    pub no_patients: bool,

    /// Backend request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Fail if any patient is at or above this risk level
    ///
    /// Exit code 2 when the threshold is reached. Values: critical, high, medium, low
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .clinaudit.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Risk level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.input.is_none() && self.job_id.is_none() {
            return Err("Either --input or --job-id is required".to_string());
        }

        if let Some(ref job_id) = self.job_id {
            if job_id.trim().is_empty() {
                return Err("Job id must not be empty".to_string());
            }
        }

        if let Some(ref url) = self.backend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Backend URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(threshold) = self.high_risk_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err("High-risk threshold must be between 0 and 100".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: None,
            job_id: Some("job-1".to_string()),
            backend_url: Some("http://localhost:8000".to_string()),
            wait: false,
            output: None,
            format: OutputFormat::Markdown,
            config: None,
            high_risk_threshold: None,
            top: None,
            no_patients: false,
            timeout: None,
            fail_on: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_valid_args() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.backend_url = Some("localhost:8000".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_threshold_range() {
        let mut args = make_args();
        args.high_risk_threshold = Some(120.0);
        assert!(args.validate().is_err());

        args.high_risk_threshold = Some(0.0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.job_id = None;
        assert!(args.validate().is_err());

        args.input = Some(PathBuf::from("does/not/exist.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_parse_input_and_job_id_conflict() {
        let result =
            Args::try_parse_from(["clinaudit", "--input", "a.json", "--job-id", "7"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_wait_requires_job_id() {
        assert!(Args::try_parse_from(["clinaudit", "--input", "a.json", "--wait"]).is_err());
        assert!(Args::try_parse_from(["clinaudit", "--job-id", "7", "--wait"]).is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
