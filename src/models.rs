//! Data models for clinical audit analytics.
//!
//! This module contains the canonical patient and match records produced
//! by the normalizer, the analytics summary computed from them, and the
//! report envelope handed to the report generators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of the audited surgical procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurgeryOutcome {
    Success,
    Failure,
    /// No outcome was reported. Never counted as a success.
    #[default]
    Unknown,
}

impl SurgeryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurgeryOutcome::Success => "success",
            SurgeryOutcome::Failure => "failure",
            SurgeryOutcome::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SurgeryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mortality status of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MortalityStatus {
    #[default]
    Alive,
    Deceased,
}

impl MortalityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MortalityStatus::Alive => "alive",
            MortalityStatus::Deceased => "deceased",
        }
    }
}

impl fmt::Display for MortalityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk bucket a patient falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Alive, no failed surgery, fewer than two comorbidities
    Low,
    /// Failed surgery or two or more comorbidities
    Medium,
    /// Deceased, or failed surgery with three or more comorbidities
    High,
    /// Deceased after a failed surgery
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

impl RiskLevel {
    /// Returns an emoji representation of the risk level.
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🟠",
            RiskLevel::Critical => "🔴",
        }
    }
}

/// A normalized per-patient analysis result.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// Patient identifier, unique within a job.
    pub patient_id: i64,
    /// Number of detected comorbidities.
    pub total_comorbidities: u32,
    /// Highest detection confidence across findings, in [0, 1].
    pub highest_confidence: f64,
    pub surgery_outcome: SurgeryOutcome,
    pub mortality_status: MortalityStatus,
    /// Reported causes of surgical failure.
    pub failure_causes: Vec<String>,
    /// Comorbidities flagged as primary concerns.
    pub primary_concerns: Vec<String>,
    /// Reported causes of death.
    pub mortality_causes: Vec<String>,
    /// Number of spreadsheet columns analyzed for this patient.
    pub columns_analyzed: u32,
    pub comprehensive_summary: String,
    pub comorbidity_summary: String,
    pub time_of_death: Option<String>,
}

impl PatientRecord {
    pub fn is_deceased(&self) -> bool {
        self.mortality_status == MortalityStatus::Deceased
    }

    pub fn surgery_failed(&self) -> bool {
        self.surgery_outcome == SurgeryOutcome::Failure
    }

    /// Classifies the patient into a risk bucket. First matching rule wins.
    pub fn risk_level(&self) -> RiskLevel {
        let deceased = self.is_deceased();
        let failed = self.surgery_failed();

        if deceased && failed {
            RiskLevel::Critical
        } else if deceased || (failed && self.total_comorbidities >= 3) {
            RiskLevel::High
        } else if failed || self.total_comorbidities >= 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// A single comorbidity detected in a spreadsheet column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub comorbidity_name: String,
    pub column_name: String,
}

/// Patient counts partitioned by surgery outcome.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurgeryOutcomes {
    pub successful: usize,
    pub failed: usize,
    pub unknown: usize,
    /// Successful surgeries as a percentage of all patients.
    pub success_rate: f64,
}

/// Patient counts per risk bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskDistribution {
    #[serde(rename = "Critical")]
    pub critical: usize,
    #[serde(rename = "High")]
    pub high: usize,
    #[serde(rename = "Medium")]
    pub medium: usize,
    #[serde(rename = "Low")]
    pub low: usize,
}

impl RiskDistribution {
    pub fn record(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Critical => self.critical += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::Low => self.low += 1,
        }
    }

    pub fn count(&self, level: RiskLevel) -> usize {
        match level {
            RiskLevel::Critical => self.critical,
            RiskLevel::High => self.high,
            RiskLevel::Medium => self.medium,
            RiskLevel::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// A comorbidity whose in-group mortality rate exceeds the high-risk threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskComorbidity {
    pub name: String,
    /// Patients listing this comorbidity among their primary concerns.
    pub patient_count: usize,
    /// Deceased patients within that group.
    pub deceased_count: usize,
    pub mortality_rate: f64,
}

/// Mortality counts, rates and cross-tabulations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MortalityAnalytics {
    pub deceased_patients: usize,
    pub alive_patients: usize,
    pub mortality_rate: f64,
    /// Cause of death -> occurrences among deceased patients.
    pub mortality_causes: BTreeMap<String, usize>,
    pub failed_surgery_deaths: usize,
    pub success_surgery_deaths: usize,
    pub death_rate_in_failed: f64,
    pub death_rate_in_successful: f64,
    pub high_risk_comorbidities: Vec<HighRiskComorbidity>,
    pub risk_distribution: RiskDistribution,
}

/// Analytics derived from one job's patient records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_patients: usize,
    pub avg_comorbidities_per_patient: f64,
    /// Comorbidity name -> occurrences.
    pub most_common_comorbidities: BTreeMap<String, usize>,
    /// Column name -> comorbidity matches found in it.
    pub most_effective_columns: BTreeMap<String, usize>,
    pub surgery_outcomes: SurgeryOutcomes,
    pub mortality_analytics: MortalityAnalytics,
    /// Failure cause -> occurrences among failed surgeries.
    pub failure_causes: BTreeMap<String, usize>,
}

/// A normalized patient record together with its risk bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(flatten)]
    pub record: PatientRecord,
    pub risk_level: RiskLevel,
}

impl From<PatientRecord> for PatientSummary {
    fn from(record: PatientRecord) -> Self {
        let risk_level = record.risk_level();
        Self { record, risk_level }
    }
}

/// The complete analytics report for one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    /// Backend job identifier, if the results were fetched from the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    /// Job statistics, passed through as received from the backend.
    pub stats: serde_json::Value,
    pub patient_summaries: Vec<PatientSummary>,
    pub analytics: AnalyticsSummary,
}

impl JobReport {
    /// Returns true if any patient sits at or above the given risk level.
    pub fn has_patients_at_or_above(&self, level: RiskLevel) -> bool {
        self.patient_summaries.iter().any(|p| p.risk_level >= level)
    }
}

/// Lifecycle state of a backend analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "processing" | "running" | "in_progress" => JobState::Processing,
            "completed" | "complete" | "done" => JobState::Completed,
            "failed" | "error" => JobState::Failed,
            _ => JobState::Pending,
        }
    }
}

/// Job status as reported by the analysis backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatus {
    #[serde(default, alias = "jobId")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: String,
    /// Completion percentage, when the backend reports one.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobStatus {
    pub fn state(&self) -> JobState {
        JobState::from(self.status.as_str())
    }
}
