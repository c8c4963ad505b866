// Prompt construction for report synthesis, question suggestion, final
// report drafting and ad hoc questions.
//
// Every prompt is assembled from `## SECTION` blocks of plain text so the
// model sees the farm, its recorded data and the reference manual in a
// stable order. Numbers are pre-formatted; the model is never asked to do
// arithmetic.

use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use farmai_core::diagnosis::DiagnosisSheet;
use farmai_core::farm::Farm;
use farmai_core::interview::InterviewLog;
use farmai_core::report::GeneratedReport;
use farmai_core::session::ConsultingSession;
use farmai_core::wizard::FarmRecords;

// ---------------------------------------------------------------------------
// Reference material
// ---------------------------------------------------------------------------

/// Used when the configured manual file cannot be read.
pub const BUILTIN_MANUAL: &str = "\
# Strawberry cultivation manual (summary)
Environment: day temperature 20-25 C, night 8-10 C, relative humidity 60-80 %, CO2 800-1000 ppm.
Irrigation: supply EC 1.2-1.8 mS/cm, pH 5.8-6.2, drain ratio 20-30 %.
Growth: keep 2-3 flower clusters, remove old leaves regularly, thin malformed fruit early.
Pest control: scout weekly for aphids, spider mites, thrips and powdery mildew; rotate modes of action.
Management: track yield, sales volume, revenue and production cost per season.
";

pub const NO_PREVIOUS_REPORTS: &str = "No previous consulting records.";

/// Read the cultivation manual, falling back to [`BUILTIN_MANUAL`].
pub fn load_manual(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!(path = %path.display(), "manual file is empty, using built-in manual");
            BUILTIN_MANUAL.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), "failed to read manual, using built-in manual: {e}");
            BUILTIN_MANUAL.to_string()
        }
    }
}

/// One line per stored report of the farm's sessions, oldest first.
///
/// `reports` pairs each session with its stored report, if any. Sessions
/// without a report are skipped.
pub fn previous_reports_text(reports: &[(ConsultingSession, Option<GeneratedReport>)]) -> String {
    let mut lines: Vec<String> = reports
        .iter()
        .filter_map(|(session, report)| {
            let report = report.as_ref()?;
            let diagnosis = &report.report.diagnosis;
            let mut line = format!(
                "{}: overall {:.0} ({})",
                session.visit_date,
                diagnosis.overall_score,
                if diagnosis.overall_status.is_empty() {
                    "no status"
                } else {
                    &diagnosis.overall_status
                },
            );
            if !diagnosis.weaknesses.is_empty() {
                line.push_str(&format!("; weaknesses: {}", diagnosis.weaknesses.join(", ")));
            }
            let titles: Vec<&str> = report
                .report
                .solutions
                .recommendations
                .iter()
                .map(|r| r.title.as_str())
                .filter(|t| !t.is_empty())
                .collect();
            if !titles.is_empty() {
                line.push_str(&format!("; recommended: {}", titles.join(", ")));
            }
            if report.source.is_fallback() {
                line.push_str(" [placeholder report]");
            }
            Some(line)
        })
        .collect();

    if lines.is_empty() {
        return NO_PREVIOUS_REPORTS.to_string();
    }
    lines.reverse();
    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Report context
// ---------------------------------------------------------------------------

/// Everything report synthesis and question suggestion look at.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub farm: Farm,
    pub manual: String,
    pub previous_reports: String,
    pub interview: InterviewLog,
    pub records: FarmRecords,
    pub diagnosis: Option<DiagnosisSheet>,
    pub consulting_date: NaiveDate,
    pub consultant: String,
    pub time_slot: String,
}

impl ReportContext {
    fn diagnosis_text(&self) -> String {
        match &self.diagnosis {
            Some(sheet) => sheet.score().to_text(),
            None => "No diagnosis recorded.".to_string(),
        }
    }
}

pub fn farm_info_text(farm: &Farm) -> String {
    format!(
        "Farm: {}\nOwner: {}\nLocation: {}\nCrop: {}\nArea: {}\nLast updated: {}\n",
        farm.name,
        farm.owner_name,
        farm.location,
        farm.crop_display(),
        farm.size_display(),
        farm.updated_at.format("%Y-%m-%d"),
    )
}

fn interview_text(log: &InterviewLog) -> String {
    if log.is_empty() {
        return "No interview recorded.\n".to_string();
    }
    let mut out = String::new();
    for (i, entry) in log.entries().iter().enumerate() {
        out.push_str(&format!("Q{n}: {}\nA{n}: {}\n", entry.question, entry.answer, n = i + 1));
    }
    out
}

fn push_section(prompt: &mut String, title: &str, body: &str) {
    prompt.push_str("## ");
    prompt.push_str(title);
    prompt.push('\n');
    prompt.push_str(body.trim_end());
    prompt.push_str("\n\n");
}

// ---------------------------------------------------------------------------
// Report synthesis
// ---------------------------------------------------------------------------

pub fn report_system_prompt() -> String {
    "You are an agricultural consultant specialising in protected strawberry cultivation.\n\
     You write consulting reports for farm visits from the data you are given.\n\
     Answer with a single JSON object in exactly the requested shape and nothing else.\n\
     Never invent measurements: when a value was not recorded, say so."
        .to_string()
}

/// JSON shape the report must follow. Keys match `ConsultingReport`.
const REPORT_SHAPE: &str = r#"{
  "consultingInfo": {"date": "", "time": "", "target": "", "consultant": "", "location": ""},
  "dataSummary": {"environment": {}, "irrigation": {}, "growth": {}, "pestControl": {}, "management": {}},
  "diagnosis": {
    "overallScore": 0, "overallStatus": "",
    "environment": {"score": 0, "status": "", "issues": []},
    "irrigation": {"score": 0, "status": "", "issues": []},
    "growth": {"score": 0, "status": "", "issues": []},
    "pestControl": {"score": 0, "status": "", "issues": []},
    "strengths": [], "weaknesses": [], "risks": []
  },
  "requests": {
    "mainConcerns": [], "requirements": [],
    "priorityQuestions": [{"question": "", "category": "", "priority": "", "complexity": ""}],
    "potentialNeeds": [], "focusAreas": []
  },
  "solutions": {
    "recommendations": [{"title": "", "description": "", "priority": "", "timeline": "", "cost": ""}],
    "actionItems": [{"action": "", "responsible": "", "deadline": "", "status": ""}]
  },
  "futurePlans": {
    "shortTerm": [], "mediumTerm": [], "longTerm": [],
    "milestones": [{"milestone": "", "targetDate": "", "successCriteria": ""}]
  }
}"#;

/// User prompt for a consulting report.
pub fn build_report_prompt(ctx: &ReportContext) -> String {
    let mut prompt = String::with_capacity(4096);

    push_section(&mut prompt, "FARM", &farm_info_text(&ctx.farm));
    push_section(
        &mut prompt,
        "VISIT",
        &format!(
            "Date: {}\nTime: {}\nConsultant: {}\n",
            ctx.consulting_date, ctx.time_slot, ctx.consultant
        ),
    );
    push_section(&mut prompt, "FIELD DATA", &ctx.records.to_text());
    push_section(&mut prompt, "DIAGNOSIS RUBRIC", &ctx.diagnosis_text());
    push_section(&mut prompt, "INTERVIEW", &interview_text(&ctx.interview));
    push_section(&mut prompt, "PREVIOUS CONSULTING", &ctx.previous_reports);
    push_section(&mut prompt, "CULTIVATION MANUAL", &ctx.manual);

    prompt.push_str("## TASK\n");
    prompt.push_str(
        "Write the consulting report for this visit. Scores are 0-100. \
         Base the diagnosis on the field data, the rubric and the interview, \
         compare against the manual, and follow up on previous consulting. \
         Return only JSON in this shape:\n",
    );
    prompt.push_str(REPORT_SHAPE);
    prompt.push('\n');
    prompt
}

// ---------------------------------------------------------------------------
// Question suggestion
// ---------------------------------------------------------------------------

pub fn question_system_prompt() -> String {
    "You are an agricultural consultant preparing a farm interview.\n\
     Answer with a JSON array only."
        .to_string()
}

pub fn build_question_prompt(ctx: &ReportContext) -> String {
    let mut prompt = String::with_capacity(2048);

    push_section(&mut prompt, "FARM", &farm_info_text(&ctx.farm));
    push_section(&mut prompt, "FIELD DATA", &ctx.records.to_text());
    push_section(&mut prompt, "DIAGNOSIS RUBRIC", &ctx.diagnosis_text());
    push_section(&mut prompt, "INTERVIEW SO FAR", &interview_text(&ctx.interview));
    push_section(&mut prompt, "PREVIOUS CONSULTING", &ctx.previous_reports);
    push_section(&mut prompt, "CULTIVATION MANUAL", &ctx.manual);

    prompt.push_str(
        "## TASK\n\
         Suggest 3 interview questions for the farm owner. Each question must be \
         specific to this farm's situation, easy for the owner to answer, and \
         likely to surface useful information. Do not repeat questions already asked.\n\
         Return only JSON: [{\"question\": \"...\", \"reason\": \"...\"}]\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Final report drafting
// ---------------------------------------------------------------------------

pub fn final_report_system_prompt() -> String {
    "You are an agricultural consultant closing a multi-visit consulting engagement.\n\
     Answer with a single JSON object in exactly the requested shape and nothing else."
        .to_string()
}

/// User prompt for the end-of-engagement report. `reports` pairs each
/// session (newest first) with its stored report.
pub fn build_final_report_prompt(
    farm: &Farm,
    reports: &[(ConsultingSession, Option<GeneratedReport>)],
) -> String {
    let mut prompt = String::with_capacity(2048);
    push_section(&mut prompt, "FARM", &farm_info_text(farm));

    let mut sessions = String::new();
    for (i, (session, _)) in reports.iter().enumerate() {
        sessions.push_str(&format!(
            "Round {}: {} ({})\n",
            farmai_core::session::round_number(i, reports.len()),
            session.visit_date,
            session.status.label(),
        ));
    }
    if sessions.is_empty() {
        sessions.push_str("No consulting sessions.\n");
    }
    push_section(&mut prompt, "SESSIONS", &sessions);
    push_section(&mut prompt, "SESSION REPORTS", &previous_reports_text(reports));

    prompt.push_str(
        "## TASK\n\
         Draft the final consulting report for the whole engagement. Return only JSON:\n\
         {\"overallSummary\": \"\", \"keyAchievements\": \"\", \"improvements\": \"\", \
         \"challenges\": \"\", \"recommendations\": \"\", \"nextSteps\": \"\", \"conclusion\": \"\"}\n",
    );
    prompt
}

// ---------------------------------------------------------------------------
// Ad hoc questions
// ---------------------------------------------------------------------------

pub fn ask_system_prompt(farm: &Farm) -> String {
    format!(
        "You are an agricultural consultant answering questions about one farm.\n\
         Be concise and practical.\n\n{}",
        farm_info_text(farm)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
