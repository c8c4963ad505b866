// Consulting session records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{require_text, ValidationError};

/// Coarse status of one consulting visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Diagnosis,
    Analysis,
    Solution,
}

impl SessionStatus {
    pub const ALL: [SessionStatus; 3] = [
        SessionStatus::Diagnosis,
        SessionStatus::Analysis,
        SessionStatus::Solution,
    ];

    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Diagnosis => "diagnosis",
            SessionStatus::Analysis => "analysis",
            SessionStatus::Solution => "solution",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Diagnosis => "Diagnosis",
            SessionStatus::Analysis => "Analysis",
            SessionStatus::Solution => "Solution",
        }
    }

    /// The following status, wrapping from Solution back to Diagnosis.
    pub fn cycle(self) -> Self {
        match self {
            SessionStatus::Diagnosis => SessionStatus::Analysis,
            SessionStatus::Analysis => SessionStatus::Solution,
            SessionStatus::Solution => SessionStatus::Diagnosis,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::new("status", format!("unknown status `{s}`")))
    }
}

/// One dated consulting visit to a farm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultingSession {
    pub consulting_id: String,
    pub farm_id: String,
    pub consultant_id: Option<String>,
    pub visit_date: NaiveDate,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub farm_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,
    pub visit_date: NaiveDate,
    pub status: SessionStatus,
}

impl NewSession {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("farm_id", &self.farm_id)
    }

    pub fn into_session(self, now: DateTime<Utc>) -> ConsultingSession {
        ConsultingSession {
            consulting_id: uuid::Uuid::new_v4().to_string(),
            farm_id: self.farm_id,
            consultant_id: self.consultant_id,
            visit_date: self.visit_date,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Display round of the session at `index` in a newest-first list of `len`.
pub fn round_number(index: usize, len: usize) -> usize {
    len.saturating_sub(index)
}
