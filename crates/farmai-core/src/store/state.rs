// Typed access to the per-farm working state kept in the local key-value
// table.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::debug;

use super::sqlite::SqliteStore;
use crate::diagnosis::DiagnosisSheet;
use crate::fields::FieldValues;
use crate::interview::InterviewLog;
use crate::plan::{ConsultingPlan, FinalReport};
use crate::report::GeneratedReport;
use crate::wizard::{DataStep, FarmRecords};

/// State key layout. Every key embeds the farm (or session) id so a farm's
/// state can be enumerated and removed with it.
pub mod keys {
    use crate::wizard::DataStep;

    pub fn interview(farm_id: &str) -> String {
        format!("interview_{farm_id}")
    }

    pub fn consulting_date(farm_id: &str) -> String {
        format!("consulting_date_{farm_id}")
    }

    pub fn step_data(farm_id: &str, step: DataStep) -> String {
        format!("data_{farm_id}_{}", step.slug())
    }

    pub fn diagnosis(farm_id: &str) -> String {
        format!("diagnosis_{farm_id}")
    }

    pub fn plan(farm_id: &str) -> String {
        format!("plan_{farm_id}")
    }

    pub fn final_report(farm_id: &str) -> String {
        format!("final_report_{farm_id}")
    }

    pub fn session_report(consulting_id: &str) -> String {
        format!("report_{consulting_id}")
    }

    pub fn latest_report(farm_id: &str) -> String {
        format!("report_{farm_id}_latest")
    }

    /// Every farm-scoped key (session reports are listed separately since
    /// they are keyed by session).
    pub fn all_for_farm(farm_id: &str) -> Vec<String> {
        let mut keys = vec![
            interview(farm_id),
            consulting_date(farm_id),
            diagnosis(farm_id),
            plan(farm_id),
            final_report(farm_id),
            latest_report(farm_id),
        ];
        keys.extend(DataStep::ALL.iter().map(|s| step_data(farm_id, *s)));
        keys
    }
}

/// Per-farm working state over the shared SQLite database.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<SqliteStore>,
}

impl StateStore {
    pub fn new(db: Arc<SqliteStore>) -> Self {
        Self { db }
    }

    // -- interview ----------------------------------------------------------

    /// The saved interview, or an empty log.
    pub fn interview(&self, farm_id: &str) -> Result<InterviewLog> {
        Ok(self.db.load_json(&keys::interview(farm_id))?.unwrap_or_default())
    }

    pub fn save_interview(&self, farm_id: &str, log: &InterviewLog) -> Result<()> {
        self.db.save_json(&keys::interview(farm_id), log)
    }

    // -- consulting date ----------------------------------------------------

    pub fn consulting_date(&self, farm_id: &str) -> Result<Option<NaiveDate>> {
        self.db.load_json(&keys::consulting_date(farm_id))
    }

    pub fn save_consulting_date(&self, farm_id: &str, date: NaiveDate) -> Result<()> {
        self.db.save_json(&keys::consulting_date(farm_id), &date)
    }

    // -- wizard -------------------------------------------------------------

    pub fn step_data(&self, farm_id: &str, step: DataStep) -> Result<Option<FieldValues>> {
        self.db.load_json(&keys::step_data(farm_id, step))
    }

    /// Store one step. An empty record removes the step instead.
    pub fn save_step_data(&self, farm_id: &str, step: DataStep, values: &FieldValues) -> Result<()> {
        let key = keys::step_data(farm_id, step);
        if values.is_empty() {
            return self.db.delete_state(&[key]);
        }
        self.db.save_json(&key, values)
    }

    pub fn records(&self, farm_id: &str) -> Result<FarmRecords> {
        let mut records = FarmRecords::default();
        for step in DataStep::ALL {
            if let Some(values) = self.step_data(farm_id, step)? {
                records.insert(step, values);
            }
        }
        Ok(records)
    }

    // -- diagnosis / plan / final report -------------------------------------

    pub fn diagnosis(&self, farm_id: &str) -> Result<Option<DiagnosisSheet>> {
        self.db.load_json(&keys::diagnosis(farm_id))
    }

    pub fn save_diagnosis(&self, farm_id: &str, sheet: &DiagnosisSheet) -> Result<()> {
        self.db.save_json(&keys::diagnosis(farm_id), sheet)
    }

    pub fn plan(&self, farm_id: &str) -> Result<Option<ConsultingPlan>> {
        self.db.load_json(&keys::plan(farm_id))
    }

    pub fn save_plan(&self, farm_id: &str, plan: &ConsultingPlan) -> Result<()> {
        self.db.save_json(&keys::plan(farm_id), plan)
    }

    pub fn final_report(&self, farm_id: &str) -> Result<Option<FinalReport>> {
        self.db.load_json(&keys::final_report(farm_id))
    }

    pub fn save_final_report(&self, farm_id: &str, report: &FinalReport) -> Result<()> {
        self.db.save_json(&keys::final_report(farm_id), report)
    }

    // -- reports ------------------------------------------------------------

    /// Stored report for a session, or the farm's latest unattached report
    /// when `consulting_id` is `None`.
    pub fn report(&self, farm_id: &str, consulting_id: Option<&str>) -> Result<Option<GeneratedReport>> {
        self.db.load_json(&report_key(farm_id, consulting_id))
    }

    pub fn save_report(
        &self,
        farm_id: &str,
        consulting_id: Option<&str>,
        report: &GeneratedReport,
    ) -> Result<()> {
        self.db.save_json(&report_key(farm_id, consulting_id), report)
    }

    pub fn delete_session_report(&self, consulting_id: &str) -> Result<()> {
        self.db.delete_state(&[keys::session_report(consulting_id)])
    }

    /// Remove all state belonging to a farm, including the reports of the
    /// given sessions.
    pub fn clear_farm(&self, farm_id: &str, consulting_ids: &[String]) -> Result<()> {
        let mut keys = keys::all_for_farm(farm_id);
        keys.extend(consulting_ids.iter().map(|id| keys::session_report(id)));
        debug!("clearing {} state keys for farm {farm_id}", keys.len());
        self.db.delete_state(&keys)
    }
}

fn report_key(farm_id: &str, consulting_id: Option<&str>) -> String {
    match consulting_id {
        Some(id) => keys::session_report(id),
        None => keys::latest_report(farm_id),
    }
}
