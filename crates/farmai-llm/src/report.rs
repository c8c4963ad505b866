// Consulting report synthesis and final report drafting.
//
// `generate_report` is total: whatever the model call does, the caller gets
// a structurally complete report. When the call fails the report is built
// locally from recorded data only and tagged as a placeholder.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use farmai_core::diagnosis::{DiagnosisSheet, Level};
use farmai_core::farm::Farm;
use farmai_core::plan::FinalReport;
use farmai_core::report::{
    status_for_score, ActionItem, AreaAssessment, ConsultingInfo, ConsultingReport, DataSummary,
    FallbackReason, FuturePlans, GeneratedReport, Recommendation, ReportDiagnosis, ReportSource,
    Requests, Solutions,
};
use farmai_core::session::ConsultingSession;
use farmai_core::wizard::{DataStep, FarmRecords};

use crate::client::{LlmClient, LlmError};
use crate::extract::json_object_span;
use crate::prompt::{self, ReportContext};

const NOT_ASSESSED: &str = "Not assessed";
const NOT_RECORDED: &str = "not recorded";

// ---------------------------------------------------------------------------
// Report synthesis
// ---------------------------------------------------------------------------

/// Generate the consulting report for one visit.
pub async fn generate_report(
    client: &LlmClient,
    ctx: &ReportContext,
    max_tokens: u32,
) -> GeneratedReport {
    let system = prompt::report_system_prompt();
    let user = prompt::build_report_prompt(ctx);

    let outcome = match client.complete(&system, &user, max_tokens).await {
        Ok(text) => parse_report(&text),
        Err(e) => Err(fallback_reason(e)),
    };

    match outcome {
        Ok(report) => {
            let model = client.model().unwrap_or_default().to_string();
            info!(farm_id = %ctx.farm.farm_id, %model, "consulting report generated");
            GeneratedReport {
                report,
                source: ReportSource::Generated { model },
                generated_at: Utc::now(),
            }
        }
        Err(reason) => {
            warn!(farm_id = %ctx.farm.farm_id, %reason, "using placeholder consulting report");
            fallback_report(ctx, reason)
        }
    }
}

/// Parse model output into a report, taking the outermost `{...}` span.
pub fn parse_report(text: &str) -> Result<ConsultingReport, FallbackReason> {
    let json = json_object_span(text)
        .ok_or_else(|| FallbackReason::Unparsable("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| FallbackReason::Unparsable(e.to_string()))
}

fn fallback_reason(err: LlmError) -> FallbackReason {
    match err {
        LlmError::Disabled => FallbackReason::NoApiKey,
        LlmError::EmptyResponse => FallbackReason::EmptyResponse,
        LlmError::InvalidJson(msg) => FallbackReason::Unparsable(msg),
        other => FallbackReason::Request(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Placeholder report
// ---------------------------------------------------------------------------

/// Build a placeholder report from the recorded data alone.
///
/// Nothing is invented: unrecorded areas say so, scores come from the
/// diagnosis rubric when a sheet exists and are 0 otherwise.
pub fn fallback_report(ctx: &ReportContext, reason: FallbackReason) -> GeneratedReport {
    let report = ConsultingReport {
        consulting_info: ConsultingInfo {
            date: ctx.consulting_date.to_string(),
            time: ctx.time_slot.clone(),
            target: ctx.farm.name.clone(),
            consultant: ctx.consultant.clone(),
            location: ctx.farm.location.clone(),
        },
        data_summary: data_summary(&ctx.records),
        diagnosis: rubric_diagnosis(ctx.diagnosis.as_ref()),
        requests: Requests {
            main_concerns: ctx
                .interview
                .entries()
                .iter()
                .map(|e| e.question.clone())
                .collect(),
            focus_areas: unrecorded_steps(&ctx.records),
            ..Requests::default()
        },
        solutions: generic_solutions(),
        future_plans: FuturePlans {
            short_term: vec!["Complete data entry for every area before the next visit".into()],
            medium_term: vec!["Review the diagnosis rubric with the consultant".into()],
            long_term: vec!["Track season results against the cultivation manual".into()],
            milestones: Vec::new(),
        },
    };

    GeneratedReport {
        report,
        source: ReportSource::Fallback { reason },
        generated_at: Utc::now(),
    }
}

fn step_summary(records: &FarmRecords, step: DataStep) -> Map<String, Value> {
    let mut map = Map::new();
    let Some(values) = records.get(step) else {
        map.insert("status".into(), Value::String(NOT_RECORDED.into()));
        return map;
    };
    for spec in step.fields() {
        if let Some(value) = values.get(spec.key) {
            let value = match spec.unit {
                Some(unit) => format!("{value} {unit}"),
                None => value.to_string(),
            };
            map.insert(spec.key.to_string(), Value::String(value));
        }
    }
    if step == DataStep::Management {
        if let Some(profit) = records.net_profit() {
            map.insert("net_profit".into(), Value::String(format!("{profit} KRW")));
        }
    }
    map
}

fn data_summary(records: &FarmRecords) -> DataSummary {
    DataSummary {
        environment: step_summary(records, DataStep::Environment),
        irrigation: step_summary(records, DataStep::Irrigation),
        growth: step_summary(records, DataStep::Growth),
        pest_control: step_summary(records, DataStep::Pest),
        management: step_summary(records, DataStep::Management),
    }
}

fn unrecorded_steps(records: &FarmRecords) -> Vec<String> {
    DataStep::ALL
        .into_iter()
        .filter(|s| records.get(*s).is_none())
        .map(|s| format!("{} data not recorded", s.title()))
        .collect()
}

fn assessment(score: Option<f64>) -> AreaAssessment {
    match score {
        Some(score) => AreaAssessment {
            score,
            status: status_for_score(score).to_string(),
            issues: Vec::new(),
        },
        None => AreaAssessment {
            score: 0.0,
            status: NOT_ASSESSED.to_string(),
            issues: Vec::new(),
        },
    }
}

/// Mean of the selected levels of `keys` as a 0..100 score.
fn items_score(sheet: &DiagnosisSheet, keys: &[&str]) -> Option<f64> {
    let levels: Vec<f64> = keys
        .iter()
        .filter_map(|k| sheet.level(k))
        .map(|l| f64::from(l.get()) * 100.0 / f64::from(Level::MAX))
        .collect();
    (!levels.is_empty()).then(|| levels.iter().sum::<f64>() / levels.len() as f64)
}

fn rubric_diagnosis(sheet: Option<&DiagnosisSheet>) -> ReportDiagnosis {
    let Some(sheet) = sheet else {
        return ReportDiagnosis {
            overall_status: NOT_ASSESSED.to_string(),
            environment: assessment(None),
            irrigation: assessment(None),
            growth: assessment(None),
            pest_control: assessment(None),
            ..ReportDiagnosis::default()
        };
    };

    let breakdown = sheet.score();
    let category_pct = |key: &str| {
        breakdown
            .category(key)
            .filter(|c| c.assessed > 0 && c.max > 0.0)
            .map(|c| c.score * 100.0 / c.max)
    };

    let mut strengths = Vec::new();
    let mut weaknesses = Vec::new();
    for c in breakdown.categories.iter().filter(|c| c.assessed > 0) {
        let pct = c.score * 100.0 / c.max;
        if pct >= 80.0 {
            strengths.push(format!("{}: {:.1} / {:.0}", c.label, c.score, c.max));
        } else if pct < 40.0 {
            weaknesses.push(format!("{}: {:.1} / {:.0}", c.label, c.score, c.max));
        }
    }

    let overall = breakdown.total * 100.0 / breakdown.max;
    ReportDiagnosis {
        overall_score: if breakdown.is_assessed() { overall } else { 0.0 },
        overall_status: if breakdown.is_assessed() {
            status_for_score(overall).to_string()
        } else {
            NOT_ASSESSED.to_string()
        },
        environment: assessment(category_pct("environment")),
        irrigation: assessment(items_score(sheet, &["irrigation", "nutrient_solution"])),
        growth: assessment(category_pct("crop")),
        pest_control: assessment(items_score(sheet, &["pest_control"])),
        strengths,
        weaknesses,
        risks: Vec::new(),
    }
}

fn generic_solutions() -> Solutions {
    Solutions {
        recommendations: vec![Recommendation {
            title: "Regenerate this report".into(),
            description: "This placeholder only restates recorded data. Generate the report \
                          again once the model service is reachable for a full analysis."
                .into(),
            priority: "High".into(),
            timeline: "Before the next visit".into(),
            cost: "-".into(),
        }],
        action_items: vec![ActionItem {
            action: "Record any missing field data and diagnosis items".into(),
            responsible: "Consultant".into(),
            deadline: "Next visit".into(),
            status: "Pending".into(),
        }],
    }
}

// ---------------------------------------------------------------------------
// Final report drafting
// ---------------------------------------------------------------------------

/// Ask the model for a draft of the end-of-engagement report. Unlike
/// `generate_report` there is no placeholder: failures are returned.
pub async fn draft_final_report(
    client: &LlmClient,
    farm: &Farm,
    reports: &[(ConsultingSession, Option<GeneratedReport>)],
    max_tokens: u32,
) -> Result<FinalReport, LlmError> {
    let system = prompt::final_report_system_prompt();
    let user = prompt::build_final_report_prompt(farm, reports);
    let text = client.complete(&system, &user, max_tokens).await?;

    let json = json_object_span(&text)
        .ok_or_else(|| LlmError::InvalidJson("no JSON object in response".to_string()))?;
    let draft: FinalReport =
        serde_json::from_str(json).map_err(|e| LlmError::InvalidJson(e.to_string()))?;
    if draft.is_blank() {
        return Err(LlmError::EmptyResponse);
    }
    info!(farm_id = %farm.farm_id, "final report drafted");
    Ok(draft)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
