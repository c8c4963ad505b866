// Consulting report document and its provenance.
//
// Field names serialize in camelCase because the same shape is what the
// model is asked to return. Every field defaults, so any JSON object parses
// into a structurally complete report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Report body
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsultingReport {
    pub consulting_info: ConsultingInfo,
    pub data_summary: DataSummary,
    pub diagnosis: ReportDiagnosis,
    pub requests: Requests,
    pub solutions: Solutions,
    pub future_plans: FuturePlans,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsultingInfo {
    pub date: String,
    pub time: String,
    pub target: String,
    pub consultant: String,
    pub location: String,
}

/// Key figures per area, as loose key/value maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSummary {
    pub environment: Map<String, Value>,
    pub irrigation: Map<String, Value>,
    pub growth: Map<String, Value>,
    pub pest_control: Map<String, Value>,
    pub management: Map<String, Value>,
}

impl DataSummary {
    /// `(title, map)` pairs in display order.
    pub fn sections(&self) -> [(&'static str, &Map<String, Value>); 5] {
        [
            ("Environment", &self.environment),
            ("Irrigation", &self.irrigation),
            ("Growth", &self.growth),
            ("Pest control", &self.pest_control),
            ("Management", &self.management),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AreaAssessment {
    #[serde(deserialize_with = "lenient_score")]
    pub score: f64,
    pub status: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportDiagnosis {
    #[serde(deserialize_with = "lenient_score")]
    pub overall_score: f64,
    pub overall_status: String,
    pub environment: AreaAssessment,
    pub irrigation: AreaAssessment,
    pub growth: AreaAssessment,
    pub pest_control: AreaAssessment,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub risks: Vec<String>,
}

impl ReportDiagnosis {
    pub fn areas(&self) -> [(&'static str, &AreaAssessment); 4] {
        [
            ("Environment", &self.environment),
            ("Irrigation", &self.irrigation),
            ("Growth", &self.growth),
            ("Pest control", &self.pest_control),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriorityQuestion {
    pub question: String,
    pub category: String,
    pub priority: String,
    pub complexity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Requests {
    pub main_concerns: Vec<String>,
    pub requirements: Vec<String>,
    pub priority_questions: Vec<PriorityQuestion>,
    pub potential_needs: Vec<String>,
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: String,
    pub timeline: String,
    pub cost: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionItem {
    pub action: String,
    pub responsible: String,
    pub deadline: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Solutions {
    pub recommendations: Vec<Recommendation>,
    pub action_items: Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Milestone {
    pub milestone: String,
    pub target_date: String,
    pub success_criteria: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FuturePlans {
    pub short_term: Vec<String>,
    pub medium_term: Vec<String>,
    pub long_term: Vec<String>,
    pub milestones: Vec<Milestone>,
}

/// Accept `87`, `87.5`, `"87"` or `null` for a score. Anything else reads
/// as 0 rather than failing the whole report.
fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// Qualitative label for a 0..100 score.
pub fn status_for_score(score: f64) -> &'static str {
    match score {
        s if s >= 80.0 => "Excellent",
        s if s >= 60.0 => "Good",
        s if s >= 40.0 => "Fair",
        _ => "Needs improvement",
    }
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Why a placeholder report was produced instead of a generated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    NoApiKey,
    Request(String),
    EmptyResponse,
    Unparsable(String),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::NoApiKey => write!(f, "no API key configured"),
            FallbackReason::Request(msg) => write!(f, "request failed: {msg}"),
            FallbackReason::EmptyResponse => write!(f, "the model returned no content"),
            FallbackReason::Unparsable(msg) => write!(f, "response could not be parsed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ReportSource {
    Generated { model: String },
    Fallback { reason: FallbackReason },
}

impl ReportSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, ReportSource::Fallback { .. })
    }
}

/// A report together with where it came from. This is what gets stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub report: ConsultingReport,
    pub source: ReportSource,
    pub generated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_object_parses_to_complete_report() {
        let report: ConsultingReport = serde_json::from_str("{}").unwrap();
        assert_eq!(report, ConsultingReport::default());
        assert!(report.solutions.recommendations.is_empty());
    }

    #[test]
    fn partial_report_keeps_given_fields() {
        let report: ConsultingReport = serde_json::from_value(json!({
            "consultingInfo": {"date": "2025-03-02", "target": "Sunrise Berries"},
            "diagnosis": {
                "overallScore": "72",
                "environment": {"score": 65.5, "issues": ["Night humidity high"]},
                "strengths": ["Good records"]
            },
            "solutions": {"recommendations": [{"title": "Dehumidify"}]}
        }))
        .unwrap();

        assert_eq!(report.consulting_info.date, "2025-03-02");
        assert_eq!(report.consulting_info.time, "");
        assert_eq!(report.diagnosis.overall_score, 72.0);
        assert_eq!(report.diagnosis.environment.score, 65.5);
        assert_eq!(report.diagnosis.environment.issues, vec!["Night humidity high"]);
        assert_eq!(report.diagnosis.irrigation, AreaAssessment::default());
        assert_eq!(report.solutions.recommendations[0].title, "Dehumidify");
        assert_eq!(report.solutions.recommendations[0].priority, "");
    }

    #[test]
    fn lenient_score_tolerates_junk() {
        let area: AreaAssessment =
            serde_json::from_value(json!({"score": "high", "status": "Good"})).unwrap();
        assert_eq!(area.score, 0.0);

        let area: AreaAssessment = serde_json::from_value(json!({"score": "85%"})).unwrap();
        assert_eq!(area.score, 85.0);

        let area: AreaAssessment = serde_json::from_value(json!({"score": null})).unwrap();
        assert_eq!(area.score, 0.0);
    }

    #[test]
    fn serializes_camel_case_keys() {
        let value = serde_json::to_value(ConsultingReport::default()).unwrap();
        assert!(value.get("consultingInfo").is_some());
        assert!(value["futurePlans"].get("shortTerm").is_some());
        assert!(value["dataSummary"].get("pestControl").is_some());
    }

    #[test]
    fn generated_report_round_trips_with_source() {
        let stored = GeneratedReport {
            report: ConsultingReport::default(),
            source: ReportSource::Fallback {
                reason: FallbackReason::Request("HTTP 500".into()),
            },
            generated_at: Utc::now(),
        };
        let json = serde_json::to_string(&stored).unwrap();
        let back: GeneratedReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stored);
        assert!(back.source.is_fallback());
    }

    #[test]
    fn score_status_bands() {
        assert_eq!(status_for_score(92.0), "Excellent");
        assert_eq!(status_for_score(60.0), "Good");
        assert_eq!(status_for_score(41.0), "Fair");
        assert_eq!(status_for_score(0.0), "Needs improvement");
    }
}
