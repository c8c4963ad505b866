// Consulting plan and final result report.
//
// Both are free-form documents edited field by field on their screens, so
// each exposes a small key-based accessor pair for the form widgets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A form field of a text document: key, label, and whether it takes
/// several lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocField {
    pub key: &'static str,
    pub label: &'static str,
    pub multiline: bool,
}

const fn doc(key: &'static str, label: &'static str, multiline: bool) -> DocField {
    DocField {
        key,
        label,
        multiline,
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// ConsultingPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultingPlan {
    pub total_sessions: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub objectives: String,
    #[serde(default)]
    pub focus_areas: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub budget: String,
    #[serde(default)]
    pub notes: String,
}

impl ConsultingPlan {
    pub const FIELDS: &'static [DocField] = &[
        doc("total_sessions", "Total sessions", false),
        doc("start_date", "Start date (YYYY-MM-DD)", false),
        doc("end_date", "End date (YYYY-MM-DD)", false),
        doc("objectives", "Objectives", true),
        doc("focus_areas", "Focus areas", true),
        doc("schedule", "Schedule", true),
        doc("budget", "Budget", false),
        doc("notes", "Notes", true),
    ];

    /// A fresh plan: one more session than already held, starting today.
    pub fn new_default(existing_sessions: usize, today: NaiveDate) -> Self {
        Self {
            total_sessions: u32::try_from(existing_sessions).unwrap_or(u32::MAX - 1) + 1,
            start_date: today,
            end_date: None,
            objectives: String::new(),
            focus_areas: String::new(),
            schedule: String::new(),
            budget: String::new(),
            notes: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.total_sessions == 0 {
            return Err(ValidationError::new("total_sessions", "must be at least 1"));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(ValidationError::new(
                    "end_date",
                    format!("{end} is before the start date {}", self.start_date),
                ));
            }
        }
        Ok(())
    }

    /// Current value of a form field as text.
    pub fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "total_sessions" => self.total_sessions.to_string(),
            "start_date" => self.start_date.format(DATE_FORMAT).to_string(),
            "end_date" => self
                .end_date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
            "objectives" => self.objectives.clone(),
            "focus_areas" => self.focus_areas.clone(),
            "schedule" => self.schedule.clone(),
            "budget" => self.budget.clone(),
            "notes" => self.notes.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Parse and store a form field.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let trimmed = value.trim();
        match key {
            "total_sessions" => {
                self.total_sessions = trimmed.parse().map_err(|_| {
                    ValidationError::new(key, format!("`{trimmed}` is not a whole number"))
                })?;
            }
            "start_date" => self.start_date = parse_date(key, trimmed)?,
            "end_date" => {
                self.end_date = if trimmed.is_empty() {
                    None
                } else {
                    Some(parse_date(key, trimmed)?)
                };
            }
            "objectives" => self.objectives = value.trim_end().to_string(),
            "focus_areas" => self.focus_areas = value.trim_end().to_string(),
            "schedule" => self.schedule = value.trim_end().to_string(),
            "budget" => self.budget = trimmed.to_string(),
            "notes" => self.notes = value.trim_end().to_string(),
            _ => return Err(ValidationError::new(key, "unknown field")),
        }
        Ok(())
    }
}

fn parse_date(field: &str, text: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|_| ValidationError::new(field, format!("`{text}` is not a YYYY-MM-DD date")))
}

// ---------------------------------------------------------------------------
// FinalReport
// ---------------------------------------------------------------------------

/// Closing report written at the end of a consulting engagement. The
/// model can draft it; serde names match the JSON it is asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FinalReport {
    pub overall_summary: String,
    pub key_achievements: String,
    pub improvements: String,
    pub challenges: String,
    pub recommendations: String,
    pub next_steps: String,
    pub conclusion: String,
}

impl FinalReport {
    pub const FIELDS: &'static [DocField] = &[
        doc("overall_summary", "Overall summary", true),
        doc("key_achievements", "Key achievements", true),
        doc("improvements", "Improvements", true),
        doc("challenges", "Challenges", true),
        doc("recommendations", "Recommendations", true),
        doc("next_steps", "Next steps", true),
        doc("conclusion", "Conclusion", true),
    ];

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "overall_summary" => Some(&mut self.overall_summary),
            "key_achievements" => Some(&mut self.key_achievements),
            "improvements" => Some(&mut self.improvements),
            "challenges" => Some(&mut self.challenges),
            "recommendations" => Some(&mut self.recommendations),
            "next_steps" => Some(&mut self.next_steps),
            "conclusion" => Some(&mut self.conclusion),
            _ => None,
        }
    }

    pub fn field(&self, key: &str) -> Option<String> {
        let value = match key {
            "overall_summary" => &self.overall_summary,
            "key_achievements" => &self.key_achievements,
            "improvements" => &self.improvements,
            "challenges" => &self.challenges,
            "recommendations" => &self.recommendations,
            "next_steps" => &self.next_steps,
            "conclusion" => &self.conclusion,
            _ => return None,
        };
        Some(value.clone())
    }

    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let slot = self
            .slot(key)
            .ok_or_else(|| ValidationError::new(key, "unknown field"))?;
        *slot = value.trim_end().to_string();
        Ok(())
    }

    pub fn is_blank(&self) -> bool {
        Self::FIELDS
            .iter()
            .all(|f| self.field(f.key).map_or(true, |v| v.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn default_plan_adds_one_session() {
        let plan = ConsultingPlan::new_default(2, date(2025, 4, 1));
        assert_eq!(plan.total_sessions, 3);
        assert_eq!(plan.start_date, date(2025, 4, 1));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn plan_rejects_end_before_start() {
        let mut plan = ConsultingPlan::new_default(0, date(2025, 4, 1));
        plan.set_field("end_date", "2025-03-01").unwrap();
        assert_eq!(plan.validate().unwrap_err().field, "end_date");

        plan.set_field("end_date", "").unwrap();
        assert_eq!(plan.end_date, None);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn plan_rejects_zero_sessions() {
        let mut plan = ConsultingPlan::new_default(0, date(2025, 4, 1));
        plan.set_field("total_sessions", "0").unwrap();
        assert_eq!(plan.validate().unwrap_err().field, "total_sessions");
        assert!(plan.set_field("total_sessions", "many").is_err());
    }

    #[test]
    fn plan_fields_read_back() {
        let mut plan = ConsultingPlan::new_default(0, date(2025, 4, 1));
        plan.set_field("objectives", "Raise yield\n").unwrap();
        assert_eq!(plan.field("objectives").as_deref(), Some("Raise yield"));
        assert_eq!(plan.field("start_date").as_deref(), Some("2025-04-01"));
        assert!(plan.field("colour").is_none());
        assert!(plan.set_field("start_date", "April").is_err());
    }

    #[test]
    fn final_report_fields() {
        let mut report = FinalReport::default();
        assert!(report.is_blank());
        report.set_field("next_steps", "Install CO2 dosing").unwrap();
        assert_eq!(report.field("next_steps").as_deref(), Some("Install CO2 dosing"));
        assert!(!report.is_blank());
        assert!(report.set_field("budget", "x").is_err());
    }

    #[test]
    fn final_report_parses_partial_camel_case_json() {
        let report: FinalReport =
            serde_json::from_str(r#"{"overallSummary": "Good season", "nextSteps": "Expand"}"#)
                .unwrap();
        assert_eq!(report.overall_summary, "Good season");
        assert_eq!(report.next_steps, "Expand");
        assert_eq!(report.conclusion, "");
    }
}
