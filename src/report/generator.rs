//! Report generation.
//!
//! This module renders a [`JobReport`] as a Markdown audit report or as
//! pretty-printed JSON for dashboards.

use crate::analysis::top_entries;
use crate::models::{
    AnalyticsSummary, JobReport, MortalityAnalytics, PatientSummary, RiskLevel, SurgeryOutcomes,
};
use anyhow::Result;
use std::collections::BTreeMap;

/// Markdown rendering options.
#[derive(Debug, Clone)]
pub struct MarkdownOptions {
    /// Rows shown in each frequency table.
    pub top_n: usize,
    /// Render the per-patient table.
    pub include_patients: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            include_patients: true,
        }
    }
}

impl From<&crate::config::ReportConfig> for MarkdownOptions {
    fn from(config: &crate::config::ReportConfig) -> Self {
        Self {
            top_n: config.top_n,
            include_patients: config.include_patients,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &JobReport, options: &MarkdownOptions) -> String {
    let analytics = &report.analytics;
    let mut output = String::new();

    output.push_str("# Clinical Audit Report\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_outcomes_section(&analytics.surgery_outcomes));
    output.push_str(&generate_mortality_section(
        &analytics.mortality_analytics,
        options.top_n,
    ));
    output.push_str(&generate_risk_section(&analytics.mortality_analytics));
    output.push_str(&generate_comorbidity_section(analytics, options.top_n));

    if options.include_patients {
        output.push_str(&generate_patients_section(&report.patient_summaries));
    }

    output.push_str("---\n\n*Report generated by clinaudit*\n");

    output
}

/// Generate the metadata section.
fn generate_metadata_section(report: &JobReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if let Some(ref job_id) = report.job_id {
        section.push_str(&format!("- **Job:** `{}`\n", job_id));
    }
    section.push_str(&format!(
        "- **Generated:** {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Patients:** {}\n",
        report.analytics.total_patients
    ));
    section.push_str(&format!(
        "- **Avg. Comorbidities per Patient:** {:.2}\n",
        report.analytics.avg_comorbidities_per_patient
    ));
    section.push('\n');

    section
}

/// Generate the surgery outcomes section.
fn generate_outcomes_section(outcomes: &SurgeryOutcomes) -> String {
    let mut section = String::new();

    section.push_str("## Surgery Outcomes\n\n");
    section.push_str("| Successful | Failed | Unknown | **Success Rate** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{:.1}%** |\n\n",
        outcomes.successful, outcomes.failed, outcomes.unknown, outcomes.success_rate
    ));

    section
}

/// Generate the mortality section.
fn generate_mortality_section(mortality: &MortalityAnalytics, top_n: usize) -> String {
    let mut section = String::new();

    section.push_str("## Mortality\n\n");
    section.push_str(&format!(
        "- **Deceased:** {} | **Alive:** {} | **Mortality Rate:** {:.1}%\n",
        mortality.deceased_patients, mortality.alive_patients, mortality.mortality_rate
    ));
    section.push_str(&format!(
        "- **Deaths after failed surgery:** {} ({:.1}% of failed)\n",
        mortality.failed_surgery_deaths, mortality.death_rate_in_failed
    ));
    section.push_str(&format!(
        "- **Deaths after successful surgery:** {} ({:.1}% of successful)\n\n",
        mortality.success_surgery_deaths, mortality.death_rate_in_successful
    ));

    section.push_str(&generate_frequency_table(
        "Causes of Death",
        "Cause",
        &mortality.mortality_causes,
        top_n,
    ));

    section.push_str("### High-Risk Comorbidities\n\n");
    if mortality.high_risk_comorbidities.is_empty() {
        section.push_str("No comorbidity exceeded the high-risk mortality threshold.\n\n");
    } else {
        section.push_str("| Comorbidity | Patients | Deceased | Mortality Rate |\n");
        section.push_str("|:---|:---:|:---:|:---:|\n");
        for comorbidity in &mortality.high_risk_comorbidities {
            section.push_str(&format!(
                "| {} | {} | {} | {:.1}% |\n",
                comorbidity.name,
                comorbidity.patient_count,
                comorbidity.deceased_count,
                comorbidity.mortality_rate
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the risk distribution section.
fn generate_risk_section(mortality: &MortalityAnalytics) -> String {
    let dist = &mortality.risk_distribution;
    let mut section = String::new();

    section.push_str("## Risk Distribution\n\n");
    section.push_str(&format!(
        "| {} Critical | {} High | {} Medium | {} Low |\n",
        RiskLevel::Critical.emoji(),
        RiskLevel::High.emoji(),
        RiskLevel::Medium.emoji(),
        RiskLevel::Low.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        dist.count(RiskLevel::Critical),
        dist.count(RiskLevel::High),
        dist.count(RiskLevel::Medium),
        dist.count(RiskLevel::Low)
    ));

    section
}

/// Generate the comorbidity, failure cause and column sections.
fn generate_comorbidity_section(analytics: &AnalyticsSummary, top_n: usize) -> String {
    let mut section = String::new();

    section.push_str("## Comorbidities\n\n");
    section.push_str(&generate_frequency_table(
        "Most Common Comorbidities",
        "Comorbidity",
        &analytics.most_common_comorbidities,
        top_n,
    ));
    section.push_str(&generate_frequency_table(
        "Failure Causes",
        "Cause",
        &analytics.failure_causes,
        top_n,
    ));
    section.push_str(&generate_frequency_table(
        "Most Effective Columns",
        "Column",
        &analytics.most_effective_columns,
        top_n,
    ));

    section
}

fn generate_frequency_table(
    title: &str,
    label: &str,
    counts: &BTreeMap<String, usize>,
    top_n: usize,
) -> String {
    let mut table = format!("### {}\n\n", title);

    if counts.is_empty() {
        table.push_str("None reported.\n\n");
        return table;
    }

    table.push_str(&format!("| {} | Count |\n", label));
    table.push_str("|:---|:---:|\n");
    for (name, count) in top_entries(counts, top_n) {
        table.push_str(&format!("| {} | {} |\n", name, count));
    }
    table.push('\n');

    table
}

/// Generate the per-patient table, highest risk first.
fn generate_patients_section(patients: &[PatientSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Patients\n\n");
    if patients.is_empty() {
        section.push_str("No patient records in this job.\n\n");
        return section;
    }

    let mut sorted: Vec<&PatientSummary> = patients.iter().collect();
    sorted.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.record.patient_id.cmp(&b.record.patient_id))
    });

    section.push_str("| Patient | Risk | Surgery | Status | Comorbidities | Primary Concerns |\n");
    section.push_str("|:---:|:---|:---|:---|:---:|:---|\n");
    for patient in sorted {
        let record = &patient.record;
        section.push_str(&format!(
            "| {} | {} {} | {} | {} | {} | {} |\n",
            record.patient_id,
            patient.risk_level.emoji(),
            patient.risk_level,
            record.surgery_outcome,
            record.mortality_status,
            record.total_comorbidities,
            record.primary_concerns.join(", ")
        ));
    }
    section.push('\n');

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &JobReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
