//! Field normalization for raw backend payloads.
//!
//! The analysis backend emits loosely-typed records: list fields may be
//! JSON-encoded strings, comma-separated text or real arrays, and counts
//! may arrive as strings. Everything here maps those shapes onto the
//! canonical types in [`crate::models`] and never fails.

use crate::models::{MatchRecord, MortalityStatus, PatientRecord, SurgeryOutcome};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Raw job results as returned by the analysis backend.
///
/// Record arrays are kept as untyped JSON so one malformed entry cannot
/// fail deserialization of the whole payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawJobResults {
    #[serde(default)]
    pub stats: Value,
    #[serde(default)]
    pub matches: Value,
    #[serde(default, alias = "patientSummaries")]
    pub patient_summaries: Value,
}

impl RawJobResults {
    /// Normalize every patient entry. Entries that are not JSON objects are skipped.
    pub fn patients(&self) -> Vec<PatientRecord> {
        record_entries(&self.patient_summaries, "patient_summaries")
            .map(|entry| RawPatientRecord::from_value(entry).normalize())
            .collect()
    }

    /// Normalize every match entry. Entries that are not JSON objects are skipped.
    pub fn match_records(&self) -> Vec<MatchRecord> {
        record_entries(&self.matches, "matches")
            .map(|entry| RawMatchRecord::from_value(entry).normalize())
            .collect()
    }
}

fn record_entries<'a>(value: &'a Value, field: &'static str) -> impl Iterator<Item = &'a Value> {
    let entries: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Null => &[],
        _ => {
            warn!("Ignoring non-array `{}` field in job results", field);
            &[]
        }
    };

    entries.iter().filter(move |entry| {
        let keep = entry.is_object();
        if !keep {
            warn!("Skipping malformed entry in `{}`: {}", field, entry);
        }
        keep
    })
}

/// A patient entry exactly as the backend sent it.
#[derive(Debug, Clone, Default)]
pub struct RawPatientRecord {
    pub patient_id: Value,
    pub total_comorbidities: Value,
    pub highest_confidence: Value,
    pub surgery_outcome: Value,
    pub mortality_status: Value,
    pub failure_causes: Value,
    pub primary_concerns: Value,
    pub mortality_causes: Value,
    pub columns_analyzed: Value,
    pub comprehensive_summary: Value,
    pub comorbidity_summary: Value,
    pub time_of_death: Value,
}

impl RawPatientRecord {
    /// Read a raw record out of a JSON object, field by field. Each field is
    /// looked up by its snake_case key, then its camelCase key. Non-object
    /// input yields an empty record.
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        Self {
            patient_id: field(map, "patient_id", "patientId"),
            total_comorbidities: field(map, "total_comorbidities", "totalComorbidities"),
            highest_confidence: field(map, "highest_confidence", "highestConfidence"),
            surgery_outcome: field(map, "surgery_outcome", "surgeryOutcome"),
            mortality_status: field(map, "mortality_status", "mortalityStatus"),
            failure_causes: field(map, "failure_causes", "failureCauses"),
            primary_concerns: field(map, "primary_concerns", "primaryConcerns"),
            mortality_causes: field(map, "mortality_causes", "mortalityCauses"),
            columns_analyzed: field(map, "columns_analyzed", "columnsAnalyzed"),
            comprehensive_summary: field(map, "comprehensive_summary", "comprehensiveSummary"),
            comorbidity_summary: field(map, "comorbidity_summary", "comorbiditySummary"),
            time_of_death: field(map, "time_of_death", "timeOfDeath"),
        }
    }

    /// Coerce every field into its canonical type.
    pub fn normalize(&self) -> PatientRecord {
        PatientRecord {
            patient_id: coerce_id(&self.patient_id),
            total_comorbidities: coerce_count(&self.total_comorbidities),
            highest_confidence: coerce_confidence(&self.highest_confidence),
            surgery_outcome: normalize_surgery_outcome(self.surgery_outcome.as_str()),
            mortality_status: normalize_mortality_status(self.mortality_status.as_str()),
            failure_causes: clean_tokens(normalize_string_list(&self.failure_causes)),
            primary_concerns: clean_tokens(normalize_string_list(&self.primary_concerns)),
            mortality_causes: clean_tokens(normalize_string_list(&self.mortality_causes)),
            columns_analyzed: coerce_count(&self.columns_analyzed),
            comprehensive_summary: coerce_text(&self.comprehensive_summary),
            comorbidity_summary: coerce_text(&self.comorbidity_summary),
            time_of_death: coerce_optional_text(&self.time_of_death),
        }
    }
}

/// A comorbidity match entry exactly as the backend sent it.
#[derive(Debug, Clone, Default)]
pub struct RawMatchRecord {
    pub comorbidity_name: Value,
    pub column_name: Value,
}

impl RawMatchRecord {
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };

        Self {
            comorbidity_name: field(map, "comorbidity_name", "comorbidityName"),
            column_name: field(map, "column_name", "columnName"),
        }
    }

    pub fn normalize(&self) -> MatchRecord {
        MatchRecord {
            comorbidity_name: coerce_text(&self.comorbidity_name).trim().to_string(),
            column_name: coerce_text(&self.column_name).trim().to_string(),
        }
    }
}

/// Look up a field under either spelling. A null under one key does not
/// hide a value under the other.
fn field(map: &Map<String, Value>, snake: &str, camel: &str) -> Value {
    map.get(snake)
        .filter(|v| !v.is_null())
        .or_else(|| map.get(camel))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Normalize a list-like field into a list of strings, defaulting to empty.
pub fn normalize_string_list(raw: &Value) -> Vec<String> {
    normalize_string_list_or(raw, Vec::new())
}

/// Normalize a list-like field into a list of strings.
///
/// - Arrays are returned element for element.
/// - Non-empty strings are decoded as JSON; a decoded array is returned
///   as-is and a decoded scalar is wrapped in a one-element list.
/// - Strings that are not valid JSON are split on commas, with quotes and
///   brackets stripped from each piece and empty pieces dropped.
/// - Anything else yields `fallback`.
pub fn normalize_string_list_or(raw: &Value, fallback: Vec<String>) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().map(entry_to_string).collect(),
        Value::String(text) if !text.trim().is_empty() => parse_list_text(text),
        _ => fallback,
    }
}

fn parse_list_text(text: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items.iter().map(entry_to_string).collect(),
        Ok(scalar) => vec![entry_to_string(&scalar)],
        Err(_) if text.contains(',') => text
            .split(',')
            .map(strip_list_punctuation)
            .filter(|piece| !piece.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => vec![strip_list_punctuation(text).to_string()],
    }
}

fn strip_list_punctuation(piece: &str) -> &str {
    piece
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '[' | ']'))
        .trim()
}

/// Render one list element as text. Tagged objects contribute their
/// `comorbidity` (or `name`) field.
fn entry_to_string(entry: &Value) -> String {
    match entry {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("comorbidity")
            .or_else(|| map.get("name"))
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| entry.to_string()),
        other => other.to_string(),
    }
}

/// Returns false for empty, `null` and `undefined` tokens.
pub fn is_meaningful_token(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty()
        && !token.eq_ignore_ascii_case("null")
        && !token.eq_ignore_ascii_case("undefined")
}

/// Trim every entry and drop the ones that carry no information.
pub fn clean_tokens(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| is_meaningful_token(t))
        .collect()
}

/// Map a raw surgery outcome onto the canonical enum. Missing, empty and
/// unrecognized values become [`SurgeryOutcome::Unknown`].
pub fn normalize_surgery_outcome(raw: Option<&str>) -> SurgeryOutcome {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("success") => SurgeryOutcome::Success,
        Some("failure") => SurgeryOutcome::Failure,
        Some("unknown") | Some("") | None => SurgeryOutcome::Unknown,
        Some(other) => {
            debug!("Unrecognized surgery outcome {:?}, treating as unknown", other);
            SurgeryOutcome::Unknown
        }
    }
}

/// Map a raw mortality status onto the canonical enum. Missing and empty
/// values mean no death was reported.
pub fn normalize_mortality_status(raw: Option<&str>) -> MortalityStatus {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("deceased") | Some("dead") | Some("died") | Some("expired") => {
            MortalityStatus::Deceased
        }
        Some("alive") | Some("") | None => MortalityStatus::Alive,
        Some(other) => {
            debug!("Unrecognized mortality status {:?}, treating as alive", other);
            MortalityStatus::Alive
        }
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn coerce_id(value: &Value) -> i64 {
    match value {
        Value::Number(n) if n.is_i64() => n.as_i64().unwrap_or(0),
        _ => coerce_f64(value).map(|n| n.trunc() as i64).unwrap_or(0),
    }
}

fn coerce_count(value: &Value) -> u32 {
    coerce_f64(value)
        .map(|n| n.trunc().clamp(0.0, u32::MAX as f64) as u32)
        .unwrap_or(0)
}

fn coerce_confidence(value: &Value) -> f64 {
    coerce_f64(value).map(|n| n.clamp(0.0, 1.0)).unwrap_or(0.0)
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn coerce_optional_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| is_meaningful_token(s))
        .map(String::from)
}
