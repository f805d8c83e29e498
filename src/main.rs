//! Clinaudit - surgical outcome analytics for clinical audit jobs
//!
//! A CLI tool that normalizes the per-patient results of a comorbidity
//! analysis job and derives outcome, mortality and risk analytics.
//!
//! Exit codes:
//!   0 - Success (no patient at or above --fail-on, or no --fail-on set)
//!   1 - Runtime error (config, input file, backend failure, etc.)
//!   2 - Patients found at or above the --fail-on risk level

mod analysis;
mod backend;
mod cli;
mod config;
mod models;
mod report;

use analysis::{AnalyticsOptions, RawJobResults};
use anyhow::{Context, Result};
use backend::{BackendClient, BackendSettings};
use cli::{Args, FailOnLevel, OutputFormat};
use config::Config;
use models::{JobReport, RiskLevel};
use report::MarkdownOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Clinaudit v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .clinaudit.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete analytics workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;

    // Step 1: Obtain the raw job results
    let raw = match (&args.input, &args.job_id) {
        (Some(path), _) => load_results_file(path)?,
        (None, Some(job_id)) => fetch_results(&args, &config, job_id).await?,
        (None, None) => anyhow::bail!("Either --input or --job-id is required"),
    };

    // Step 2: Normalize and aggregate
    let options = AnalyticsOptions::from(&config.analytics);
    let report = analysis::build_job_report(args.job_id.clone(), &raw, &options);
    info!(
        "Aggregated {} patients ({} high-risk comorbidities)",
        report.analytics.total_patients,
        report.analytics.mortality_analytics.high_risk_comorbidities.len()
    );

    if report.analytics.total_patients == 0 {
        warn!("Job results contain no patient records");
    }

    // Step 3: Render and save the report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, &MarkdownOptions::from(&config.report))
        }
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if !args.quiet {
        println!("\n📊 Analytics Summary:");
        for line in analysis::generate_summary_text(&report.analytics).lines() {
            println!("   {}", line);
        }
        println!("\n✅ Report saved to: {}", output_path.display());
    }

    Ok(fail_on_exit_code(&report, args.fail_on))
}

/// Pick the report path, defaulting the extension to the output format.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    if let Some(ref output) = args.output {
        return output.clone();
    }

    let path = PathBuf::from(&config.general.output);
    match args.format {
        OutputFormat::Json if path.extension().is_some_and(|ext| ext == "md") => {
            path.with_extension("json")
        }
        _ => path,
    }
}

/// Exit code 2 when any patient reaches the --fail-on level.
fn fail_on_exit_code(report: &JobReport, fail_on: Option<FailOnLevel>) -> i32 {
    let Some(level) = fail_on else {
        return 0;
    };

    let threshold = fail_on_to_risk(level);
    if report.has_patients_at_or_above(threshold) {
        eprintln!(
            "\n⛔ Patients found at or above {} risk. Failing (exit code 2).",
            threshold
        );
        return 2;
    }

    0
}

/// Convert FailOnLevel to RiskLevel for comparison.
fn fail_on_to_risk(level: FailOnLevel) -> RiskLevel {
    match level {
        FailOnLevel::Low => RiskLevel::Low,
        FailOnLevel::Medium => RiskLevel::Medium,
        FailOnLevel::High => RiskLevel::High,
        FailOnLevel::Critical => RiskLevel::Critical,
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

/// Read job results exported to a JSON file.
fn load_results_file(path: &Path) -> Result<RawJobResults> {
    info!("Reading job results from: {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job results: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse job results: {}", path.display()))
}

/// Fetch job results from the analysis backend, optionally waiting for the job.
async fn fetch_results(args: &Args, config: &Config, job_id: &str) -> Result<RawJobResults> {
    let settings = BackendSettings {
        show_progress: !args.quiet,
        ..BackendSettings::from(&config.backend)
    };
    info!("Using analysis backend at {}", settings.base_url);

    let client = BackendClient::new(settings).context("Failed to create backend client")?;

    if args.wait {
        println!("⏳ Waiting for job {} to complete...", job_id);
        client.wait_for_completion(job_id).await?;
    }

    let raw = client
        .fetch_results(job_id)
        .await
        .with_context(|| format!("Failed to fetch results for job {}", job_id))?;

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const FIXTURE: &str = include_str!("../fixtures/job_results.json");

    fn fixture_report() -> JobReport {
        let raw: RawJobResults = serde_json::from_str(FIXTURE).unwrap();
        analysis::build_job_report(None, &raw, &AnalyticsOptions::default())
    }

    #[test]
    fn test_fail_on_exit_code() {
        let report = fixture_report();

        assert_eq!(fail_on_exit_code(&report, None), 0);
        assert_eq!(fail_on_exit_code(&report, Some(FailOnLevel::Critical)), 2);
        assert_eq!(fail_on_exit_code(&report, Some(FailOnLevel::Low)), 2);
    }

    #[test]
    fn test_fail_on_exit_code_without_critical_patients() {
        let raw: RawJobResults = serde_json::from_str(
            r#"{"patient_summaries": [{"patient_id": 1, "surgery_outcome": "success"}]}"#,
        )
        .unwrap();
        let report = analysis::build_job_report(None, &raw, &AnalyticsOptions::default());

        assert_eq!(fail_on_exit_code(&report, Some(FailOnLevel::Medium)), 0);
        assert_eq!(fail_on_exit_code(&report, Some(FailOnLevel::Low)), 2);
    }

    #[test]
    fn test_load_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, FIXTURE).unwrap();

        let raw = load_results_file(&path).unwrap();
        assert_eq!(raw.patients().len(), 6);
    }

    #[test]
    fn test_load_results_file_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(load_results_file(&path).is_err());
    }

    #[tokio::test]
    async fn test_run_rejects_out_of_range_threshold_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("clinaudit.toml");
        std::fs::write(&config_path, "[analytics]\nhigh_risk_threshold = -1.0\n").unwrap();
        let input_path = dir.path().join("results.json");
        std::fs::write(&input_path, FIXTURE).unwrap();
        let output_path = dir.path().join("report.md");

        let args = Args::parse_from([
            "clinaudit",
            "--input",
            input_path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "-o",
            output_path.to_str().unwrap(),
            "--quiet",
        ]);

        let err = run(args).await.unwrap_err();
        assert!(format!("{:#}", err).contains("high_risk_threshold"));
        assert!(!output_path.exists());
    }

    #[test]
    fn test_output_path_follows_format() {
        let config = Config::default();

        let args = Args::parse_from(["clinaudit", "--job-id", "1", "--format", "json"]);
        assert_eq!(output_path(&args, &config), PathBuf::from("clinaudit_report.json"));

        let args = Args::parse_from(["clinaudit", "--job-id", "1"]);
        assert_eq!(output_path(&args, &config), PathBuf::from("clinaudit_report.md"));

        let args = Args::parse_from(["clinaudit", "--job-id", "1", "-o", "out.txt"]);
        assert_eq!(output_path(&args, &config), PathBuf::from("out.txt"));
    }
}
