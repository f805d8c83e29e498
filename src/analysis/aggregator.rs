//! Patient outcome aggregation and statistics.
//!
//! This module derives the job-level analytics (surgery outcomes,
//! mortality, comorbidity frequencies, risk distribution) from
//! normalized patient records. Every function here is pure.

use crate::analysis::normalizer::{is_meaningful_token, RawJobResults};
use crate::models::{
    AnalyticsSummary, HighRiskComorbidity, JobReport, MatchRecord, MortalityAnalytics,
    PatientRecord, PatientSummary, RiskDistribution, RiskLevel, SurgeryOutcome, SurgeryOutcomes,
};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Mortality rate (percent) a comorbidity group must exceed to be flagged as high risk.
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 20.0;

/// Tunable aggregation policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyticsOptions {
    /// Percentage, compared with strict greater-than.
    pub high_risk_threshold: f64,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            high_risk_threshold: DEFAULT_HIGH_RISK_THRESHOLD,
        }
    }
}

/// Compute the analytics summary with default options.
#[cfg(test)]
pub fn aggregate(patients: &[PatientRecord], matches: &[MatchRecord]) -> AnalyticsSummary {
    aggregate_with_options(patients, matches, &AnalyticsOptions::default())
}

/// Compute the analytics summary for one job.
pub fn aggregate_with_options(
    patients: &[PatientRecord],
    matches: &[MatchRecord],
    options: &AnalyticsOptions,
) -> AnalyticsSummary {
    debug!(
        "Aggregating {} patients and {} matches",
        patients.len(),
        matches.len()
    );

    let surgery_outcomes = surgery_outcome_breakdown(patients);
    let mortality_analytics =
        mortality_breakdown(patients, &surgery_outcomes, options.high_risk_threshold);

    AnalyticsSummary {
        total_patients: patients.len(),
        avg_comorbidities_per_patient: average_comorbidities(patients),
        most_common_comorbidities: comorbidity_frequency(patients, matches),
        most_effective_columns: column_effectiveness(matches),
        surgery_outcomes,
        mortality_analytics,
        failure_causes: failure_cause_frequency(patients),
    }
}

/// Normalize a raw backend payload and build the full job report.
pub fn build_job_report(
    job_id: Option<String>,
    raw: &RawJobResults,
    options: &AnalyticsOptions,
) -> JobReport {
    let patients = raw.patients();
    let matches = raw.match_records();
    let analytics = aggregate_with_options(&patients, &matches, options);

    JobReport {
        job_id,
        generated_at: Utc::now(),
        stats: raw.stats.clone(),
        patient_summaries: patients.into_iter().map(PatientSummary::from).collect(),
        analytics,
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Count trimmed tokens, ignoring empty, `null` and `undefined` ones.
fn count_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for token in tokens {
        let token = token.trim();
        if is_meaningful_token(token) {
            *counts.entry(token.to_string()).or_default() += 1;
        }
    }

    counts
}

/// Partition patients by surgery outcome.
pub fn surgery_outcome_breakdown(patients: &[PatientRecord]) -> SurgeryOutcomes {
    let mut outcomes = SurgeryOutcomes::default();

    for patient in patients {
        match patient.surgery_outcome {
            SurgeryOutcome::Success => outcomes.successful += 1,
            SurgeryOutcome::Failure => outcomes.failed += 1,
            SurgeryOutcome::Unknown => outcomes.unknown += 1,
        }
    }

    // Unknown outcomes stay in the denominator.
    outcomes.success_rate = percentage(outcomes.successful, patients.len());
    outcomes
}

/// Mortality counts, surgery cross-tabulation, high-risk comorbidities and
/// risk distribution.
pub fn mortality_breakdown(
    patients: &[PatientRecord],
    outcomes: &SurgeryOutcomes,
    high_risk_threshold: f64,
) -> MortalityAnalytics {
    let mut analytics = MortalityAnalytics::default();
    let mut causes: Vec<&str> = Vec::new();

    for patient in patients {
        if !patient.is_deceased() {
            analytics.alive_patients += 1;
            continue;
        }

        analytics.deceased_patients += 1;
        match patient.surgery_outcome {
            SurgeryOutcome::Failure => analytics.failed_surgery_deaths += 1,
            SurgeryOutcome::Success => analytics.success_surgery_deaths += 1,
            SurgeryOutcome::Unknown => {}
        }
        causes.extend(patient.mortality_causes.iter().map(String::as_str));
    }

    analytics.mortality_rate = percentage(analytics.deceased_patients, patients.len());
    analytics.mortality_causes = count_tokens(causes);
    analytics.death_rate_in_failed = percentage(analytics.failed_surgery_deaths, outcomes.failed);
    analytics.death_rate_in_successful =
        percentage(analytics.success_surgery_deaths, outcomes.successful);
    analytics.high_risk_comorbidities = high_risk_comorbidities(patients, high_risk_threshold);
    analytics.risk_distribution = risk_distribution(patients);
    debug_assert_eq!(analytics.risk_distribution.total(), patients.len());

    analytics
}

/// Comorbidity name -> occurrences across all patients' primary concerns.
///
/// Falls back to counting match records when no patient lists any.
pub fn comorbidity_frequency(
    patients: &[PatientRecord],
    matches: &[MatchRecord],
) -> BTreeMap<String, usize> {
    let counts = count_tokens(
        patients
            .iter()
            .flat_map(|p| p.primary_concerns.iter().map(String::as_str)),
    );

    if counts.is_empty() && !matches.is_empty() {
        debug!("No primary concerns reported, counting comorbidity matches instead");
        return count_tokens(matches.iter().map(|m| m.comorbidity_name.as_str()));
    }

    counts
}

/// Comorbidities whose in-group mortality rate exceeds `threshold` percent,
/// highest rate first.
pub fn high_risk_comorbidities(
    patients: &[PatientRecord],
    threshold: f64,
) -> Vec<HighRiskComorbidity> {
    // name -> (patients listing it, deceased among them)
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for patient in patients {
        let names: BTreeSet<&str> = patient
            .primary_concerns
            .iter()
            .map(|c| c.trim())
            .filter(|c| is_meaningful_token(c))
            .collect();

        for name in names {
            let group = groups.entry(name).or_default();
            group.0 += 1;
            if patient.is_deceased() {
                group.1 += 1;
            }
        }
    }

    let mut flagged: Vec<HighRiskComorbidity> = groups
        .into_iter()
        .map(|(name, (patient_count, deceased_count))| HighRiskComorbidity {
            name: name.to_string(),
            patient_count,
            deceased_count,
            mortality_rate: percentage(deceased_count, patient_count),
        })
        .filter(|c| c.mortality_rate > threshold)
        .collect();

    flagged.sort_by(|a, b| {
        b.mortality_rate
            .partial_cmp(&a.mortality_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    flagged
}

/// Count patients per risk bucket.
pub fn risk_distribution(patients: &[PatientRecord]) -> RiskDistribution {
    let mut dist = RiskDistribution::default();
    for patient in patients {
        dist.record(patient.risk_level());
    }
    dist
}

/// Failure cause -> occurrences, over failed surgeries only.
pub fn failure_cause_frequency(patients: &[PatientRecord]) -> BTreeMap<String, usize> {
    count_tokens(
        patients
            .iter()
            .filter(|p| p.surgery_failed())
            .flat_map(|p| p.failure_causes.iter().map(String::as_str)),
    )
}

/// Column name -> number of comorbidity matches found in it.
pub fn column_effectiveness(matches: &[MatchRecord]) -> BTreeMap<String, usize> {
    count_tokens(matches.iter().map(|m| m.column_name.as_str()))
}

/// Mean comorbidity count per patient, 0 for an empty job.
pub fn average_comorbidities(patients: &[PatientRecord]) -> f64 {
    if patients.is_empty() {
        return 0.0;
    }
    let total: u64 = patients.iter().map(|p| u64::from(p.total_comorbidities)).sum();
    total as f64 / patients.len() as f64
}

/// The `n` most frequent entries of a frequency map, ties broken by name.
pub fn top_entries(counts: &BTreeMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> =
        counts.iter().map(|(k, v)| (k.clone(), *v)).collect();

    // Stable sort keeps the map's name ordering among equal counts.
    entries.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    entries.truncate(n);
    entries
}

/// Generate a text summary of the analytics.
pub fn generate_summary_text(summary: &AnalyticsSummary) -> String {
    let mut lines = Vec::new();
    let outcomes = &summary.surgery_outcomes;
    let mortality = &summary.mortality_analytics;

    lines.push(format!("Total Patients: {}", summary.total_patients));
    lines.push(format!(
        "Surgery: {} successful, {} failed, {} unknown ({:.1}% success)",
        outcomes.successful, outcomes.failed, outcomes.unknown, outcomes.success_rate
    ));
    lines.push(format!(
        "Mortality: {} deceased, {} alive ({:.1}%)",
        mortality.deceased_patients, mortality.alive_patients, mortality.mortality_rate
    ));

    let dist = &mortality.risk_distribution;
    lines.push(format!(
        "Risk: {} Critical: {} | {} High: {} | {} Medium: {} | {} Low: {}",
        RiskLevel::Critical.emoji(),
        dist.critical,
        RiskLevel::High.emoji(),
        dist.high,
        RiskLevel::Medium.emoji(),
        dist.medium,
        RiskLevel::Low.emoji(),
        dist.low
    ));

    if !mortality.high_risk_comorbidities.is_empty() {
        let names: Vec<&str> = mortality
            .high_risk_comorbidities
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        lines.push(format!("High-risk comorbidities: {}", names.join(", ")));
    }

    lines.join("\n")
}
