// Message types exchanged between the orchestrator and the terminal UI.
//
// The TUI sends `UserCommand`s; the orchestrator answers with `UiUpdate`s.
// Screens are delivered whole as `ScreenData` after every navigation.

use std::path::PathBuf;

use chrono::NaiveDate;

use farmai_core::diagnosis::DiagnosisSheet;
use farmai_core::farm::{Farm, FarmUpdate, NewFarm};
use farmai_core::fields::FieldValues;
use farmai_core::interview::{InterviewLog, SuggestedQuestion};
use farmai_core::plan::{ConsultingPlan, FinalReport};
use farmai_core::report::{FallbackReason, GeneratedReport};
use farmai_core::session::{ConsultingSession, SessionStatus};
use farmai_core::wizard::DataStep;
use farmai_llm::Transcription;

use crate::route::Route;

// ---------------------------------------------------------------------------
// TUI -> app
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Navigate(Route),
    /// Reload the current screen from storage.
    Reload,

    CreateFarm(NewFarm),
    UpdateFarm(FarmUpdate),
    DeleteFarm { farm_id: String },

    /// Open a new consulting session for today and enter the data wizard.
    StartConsulting { farm_id: String },
    SetSessionStatus { consulting_id: String, status: SessionStatus },
    DeleteSession { consulting_id: String },

    /// Save one wizard step and move to the following screen.
    SaveStepData {
        farm_id: String,
        step: DataStep,
        inputs: Vec<(String, String)>,
    },
    SaveDiagnosis { farm_id: String, sheet: DiagnosisSheet },

    AddInterviewEntry { farm_id: String, question: String, answer: String },
    RemoveInterviewEntry { farm_id: String, index: usize },
    SuggestQuestions { farm_id: String },
    TranscribeAudio { farm_id: String, path: PathBuf },

    /// Generate the report again even when one is stored.
    RegenerateReport { farm_id: String, session: Option<String> },

    SavePlan { farm_id: String, plan: ConsultingPlan },
    SaveFinalReport { farm_id: String, report: FinalReport },
    DraftFinalReport { farm_id: String },

    Ask { farm_id: String, question: String },
    Quit,
}

// ---------------------------------------------------------------------------
// App -> TUI
// ---------------------------------------------------------------------------

/// Progress of a background model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmStatus {
    #[default]
    Idle,
    Pending,
    Streaming,
    Complete,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message shown in a modal until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything a screen displays, loaded for one route.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenData {
    Home {
        backend: String,
        llm_model: Option<String>,
    },
    FarmList {
        farms: Vec<Farm>,
    },
    Consulting {
        farm: Farm,
        /// Newest first.
        sessions: Vec<ConsultingSession>,
        consulting_date: Option<NaiveDate>,
        plan: Option<ConsultingPlan>,
    },
    DataEntry {
        farm: Farm,
        step: DataStep,
        values: FieldValues,
    },
    Diagnosis {
        farm: Farm,
        sheet: DiagnosisSheet,
    },
    Interview {
        farm: Farm,
        log: InterviewLog,
    },
    Report {
        farm: Farm,
        session: Option<ConsultingSession>,
        /// `None` while a report is being generated.
        report: Option<GeneratedReport>,
    },
    Plan {
        farm: Farm,
        plan: ConsultingPlan,
    },
    FinalReport {
        farm: Farm,
        sessions: Vec<ConsultingSession>,
        report: FinalReport,
    },
    Ask {
        farm: Farm,
    },
}

impl ScreenData {
    pub fn farm(&self) -> Option<&Farm> {
        match self {
            ScreenData::Home { .. } | ScreenData::FarmList { .. } => None,
            ScreenData::Consulting { farm, .. }
            | ScreenData::DataEntry { farm, .. }
            | ScreenData::Diagnosis { farm, .. }
            | ScreenData::Interview { farm, .. }
            | ScreenData::Report { farm, .. }
            | ScreenData::Plan { farm, .. }
            | ScreenData::FinalReport { farm, .. }
            | ScreenData::Ask { farm } => Some(farm),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// A route finished loading.
    Screen { route: Route, data: Box<ScreenData> },
    /// A route could not be loaded; the previous screen stays.
    LoadFailed { route: Route, message: String },
    Notice(Notice),
    ReportStatus(LlmStatus),
    ReportReady(Box<GeneratedReport>),
    QuestionsSuggested {
        questions: Vec<SuggestedQuestion>,
        fallback: Option<FallbackReason>,
    },
    Transcribed(Transcription),
    FinalReportDrafted(Box<FinalReport>),
    AskStarted,
    AskToken(String),
    AskComplete,
    AskError(String),
}
