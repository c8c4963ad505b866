// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the TUI,
// streamed model output, and results of background tasks. Owns all
// application state and pushes UI updates to the TUI render loop.
//
// At most one background task of each kind runs at a time. Re-issuing a
// request aborts the previous one of that kind, changing screens aborts all
// of them. Every task takes a fresh `generation`; events whose generation
// is not the outstanding one for their kind are discarded when they arrive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use farmai_core::config::Config;
use farmai_core::farm::Farm;
use farmai_core::plan::FinalReport;
use farmai_core::report::{GeneratedReport, ReportSource};
use farmai_core::session::{ConsultingSession, NewSession, SessionStatus};
use farmai_core::store::{FarmStore, StateStore};
use farmai_core::wizard::DataStep;
use farmai_llm::prompt::{self, ReportContext};
use farmai_llm::questions::{suggest_questions, Suggestions};
use farmai_llm::report::{draft_final_report, generate_report};
use farmai_llm::{LlmClient, LlmEvent, Transcription};

use crate::loader::{load, require_farm, LoadContext};
use crate::protocol::{LlmStatus, Notice, ScreenData, UiUpdate, UserCommand};
use crate::route::{wizard_next, Route};

// ---------------------------------------------------------------------------
// Background task results
// ---------------------------------------------------------------------------

/// The kinds of background request. Each kind has its own task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Report,
    Questions,
    Transcription,
    FinalDraft,
    Ask,
}

#[derive(Debug)]
pub enum TaskOutput {
    Report {
        farm_id: String,
        consulting_id: Option<String>,
        report: Box<GeneratedReport>,
    },
    Questions(Suggestions),
    Transcription(Result<Transcription, String>),
    FinalDraft(Result<FinalReport, String>),
}

impl TaskOutput {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskOutput::Report { .. } => TaskKind::Report,
            TaskOutput::Questions(_) => TaskKind::Questions,
            TaskOutput::Transcription(_) => TaskKind::Transcription,
            TaskOutput::FinalDraft(_) => TaskKind::FinalDraft,
        }
    }
}

/// A finished background task, tagged with the generation it was started in.
#[derive(Debug)]
pub struct TaskEvent {
    pub generation: u64,
    pub output: TaskOutput,
}

impl TaskEvent {
    pub fn kind(&self) -> TaskKind {
        self.output.kind()
    }
}

/// Stored reports of a farm's sessions, newest session first.
pub type SessionReports = Vec<(ConsultingSession, Option<GeneratedReport>)>;

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn FarmStore>,
    pub state: StateStore,
    pub llm: Arc<LlmClient>,
    pub route: Route,
    /// Bumped on every navigation and every new background task.
    pub generation: u64,
    /// Generation of the outstanding request of each kind.
    pub active: HashMap<TaskKind, u64>,
    tasks: HashMap<TaskKind, JoinHandle<()>>,
    pub report_status: LlmStatus,
    pub ask_status: LlmStatus,
    pub llm_tx: mpsc::Sender<LlmEvent>,
    pub task_tx: mpsc::Sender<TaskEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn FarmStore>,
        state: StateStore,
        llm: Arc<LlmClient>,
        llm_tx: mpsc::Sender<LlmEvent>,
        task_tx: mpsc::Sender<TaskEvent>,
    ) -> Self {
        AppState {
            config,
            store,
            state,
            llm,
            route: Route::Home,
            generation: 0,
            active: HashMap::new(),
            tasks: HashMap::new(),
            report_status: LlmStatus::Idle,
            ask_status: LlmStatus::Idle,
            llm_tx,
            task_tx,
        }
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    /// Abort the outstanding request of `kind`, if any.
    pub fn cancel_task(&mut self, kind: TaskKind) {
        if let Some(generation) = self.active.remove(&kind) {
            debug!("cancelled {kind:?} task (gen {generation})");
        }
        if let Some(handle) = self.tasks.remove(&kind) {
            handle.abort();
        }
    }

    /// Abort every outstanding request.
    pub fn cancel_all(&mut self) {
        for (kind, handle) in self.tasks.drain() {
            handle.abort();
            debug!("cancelled {kind:?} task");
        }
        self.active.clear();
    }

    /// Replace the request of `kind` with a new one and return its generation.
    fn begin_task(&mut self, kind: TaskKind) -> u64 {
        self.cancel_task(kind);
        self.generation += 1;
        self.active.insert(kind, self.generation);
        self.generation
    }

    /// Whether `generation` is the outstanding request of `kind`.
    pub fn is_current(&self, kind: TaskKind, generation: u64) -> bool {
        self.active.get(&kind) == Some(&generation)
    }

    fn finish_task(&mut self, kind: TaskKind) {
        self.active.remove(&kind);
        self.tasks.remove(&kind);
    }

    // -- screens ------------------------------------------------------------

    /// Switch to `route`, load its screen and start report generation when
    /// a report screen has nothing stored yet.
    pub async fn navigate(&mut self, route: Route, ui_tx: &mpsc::Sender<UiUpdate>) {
        self.cancel_all();
        self.generation += 1;
        self.report_status = LlmStatus::Idle;
        self.ask_status = LlmStatus::Idle;
        info!("navigate to {route}");

        let Some(data) = self.load_screen(&route, ui_tx).await else {
            return;
        };
        self.route = route;

        let pending = match &data {
            ScreenData::Report {
                farm,
                session,
                report: None,
            } => Some((farm.clone(), session.as_ref().map(|s| s.consulting_id.clone()))),
            _ => None,
        };
        let _ = ui_tx
            .send(UiUpdate::Screen {
                route: self.route.clone(),
                data: Box::new(data),
            })
            .await;

        if let Some((farm, consulting_id)) = pending {
            self.trigger_report(farm, consulting_id, ui_tx).await;
        }
    }

    /// Reload the current screen in place. Running tasks are left alone.
    pub async fn refresh(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) {
        let route = self.route.clone();
        if let Some(data) = self.load_screen(&route, ui_tx).await {
            let _ = ui_tx
                .send(UiUpdate::Screen {
                    route,
                    data: Box::new(data),
                })
                .await;
        }
    }

    async fn load_screen(
        &self,
        route: &Route,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) -> Option<ScreenData> {
        let ctx = LoadContext {
            store: self.store.as_ref(),
            state: &self.state,
            llm_model: self.llm.model(),
            today: self.today(),
        };
        match load(&ctx, route).await {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("failed to load {route}: {e}");
                let _ = ui_tx
                    .send(UiUpdate::LoadFailed {
                        route: route.clone(),
                        message: e.to_string(),
                    })
                    .await;
                notify(ui_tx, Notice::error(e.to_string())).await;
                None
            }
        }
    }

    // -- report inputs ------------------------------------------------------

    /// Sessions of a farm paired with their stored reports, leaving out
    /// `exclude` (the session being reported on).
    pub async fn session_reports(
        &self,
        farm_id: &str,
        exclude: Option<&str>,
    ) -> anyhow::Result<SessionReports> {
        let sessions = self.store.list_sessions(farm_id).await?;
        let mut out = Vec::with_capacity(sessions.len());
        for session in sessions {
            if Some(session.consulting_id.as_str()) == exclude {
                continue;
            }
            let report = self.state.report(farm_id, Some(&session.consulting_id))?;
            out.push((session, report));
        }
        Ok(out)
    }

    pub async fn report_context(
        &self,
        farm: &Farm,
        consulting_id: Option<&str>,
    ) -> anyhow::Result<ReportContext> {
        let id = farm.farm_id.as_str();
        let previous = self.session_reports(id, consulting_id).await?;
        Ok(ReportContext {
            farm: farm.clone(),
            manual: prompt::load_manual(&self.config.manual_path()),
            previous_reports: prompt::previous_reports_text(&previous),
            interview: self.state.interview(id)?,
            records: self.state.records(id)?,
            diagnosis: self.state.diagnosis(id)?,
            consulting_date: self.state.consulting_date(id)?.unwrap_or_else(|| self.today()),
            consultant: self.config.report.consultant.clone(),
            time_slot: self.config.report.time_slot.clone(),
        })
    }

    // -- background tasks ---------------------------------------------------

    fn spawn_task<F>(&mut self, kind: TaskKind, generation: u64, work: F)
    where
        F: std::future::Future<Output = TaskOutput> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        let handle = tokio::spawn(async move {
            let output = work.await;
            let _ = tx.send(TaskEvent { generation, output }).await;
        });
        self.tasks.insert(kind, handle);
    }

    pub async fn trigger_report(
        &mut self,
        farm: Farm,
        consulting_id: Option<String>,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) {
        let ctx = match self.report_context(&farm, consulting_id.as_deref()).await {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!("failed to gather report inputs for {}: {e:#}", farm.farm_id);
                notify(ui_tx, Notice::error(format!("Failed to prepare the report: {e:#}"))).await;
                return;
            }
        };

        let generation = self.begin_task(TaskKind::Report);
        self.report_status = LlmStatus::Pending;
        let _ = ui_tx.send(UiUpdate::ReportStatus(LlmStatus::Pending)).await;

        let client = Arc::clone(&self.llm);
        let max_tokens = self.config.llm.report_max_tokens;
        let farm_id = farm.farm_id.clone();
        info!("generating report for farm {farm_id} (gen {generation})");
        self.spawn_task(TaskKind::Report, generation, async move {
            let report = generate_report(&client, &ctx, max_tokens).await;
            TaskOutput::Report {
                farm_id,
                consulting_id,
                report: Box::new(report),
            }
        });
    }

    pub async fn trigger_questions(&mut self, farm_id: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
        let ctx = match self.farm_context(farm_id).await {
            Ok(ctx) => ctx,
            Err(message) => {
                notify(ui_tx, Notice::error(message)).await;
                return;
            }
        };
        let generation = self.begin_task(TaskKind::Questions);
        let client = Arc::clone(&self.llm);
        let max_tokens = self.config.llm.question_max_tokens;
        info!("suggesting questions for farm {farm_id} (gen {generation})");
        self.spawn_task(TaskKind::Questions, generation, async move {
            TaskOutput::Questions(suggest_questions(&client, &ctx, max_tokens).await)
        });
    }

    async fn farm_context(&self, farm_id: &str) -> Result<ReportContext, String> {
        let farm = require_farm(self.store.as_ref(), farm_id)
            .await
            .map_err(|e| e.to_string())?;
        self.report_context(&farm, None).await.map_err(|e| {
            warn!("failed to gather inputs for farm {farm_id}: {e:#}");
            format!("{e:#}")
        })
    }

    pub fn trigger_transcription(&mut self, path: PathBuf) {
        let generation = self.begin_task(TaskKind::Transcription);
        let client = Arc::clone(&self.llm);
        info!("transcribing {} (gen {generation})", path.display());
        self.spawn_task(TaskKind::Transcription, generation, async move {
            let result = client
                .transcribe_file(&path)
                .await
                .map_err(|e| e.to_string());
            TaskOutput::Transcription(result)
        });
    }

    pub async fn trigger_final_draft(&mut self, farm_id: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
        let inputs = match require_farm(self.store.as_ref(), farm_id).await {
            Ok(farm) => self
                .session_reports(&farm.farm_id, None)
                .await
                .map(|reports| (farm, reports))
                .map_err(|e| format!("{e:#}")),
            Err(e) => Err(e.to_string()),
        };
        let (farm, reports) = match inputs {
            Ok(inputs) => inputs,
            Err(message) => {
                warn!("cannot draft final report: {message}");
                notify(ui_tx, Notice::error(message)).await;
                return;
            }
        };

        let generation = self.begin_task(TaskKind::FinalDraft);
        let client = Arc::clone(&self.llm);
        let max_tokens = self.config.llm.final_report_max_tokens;
        info!("drafting final report for farm {farm_id} (gen {generation})");
        self.spawn_task(TaskKind::FinalDraft, generation, async move {
            let result = draft_final_report(&client, &farm, &reports, max_tokens)
                .await
                .map_err(|e| e.to_string());
            TaskOutput::FinalDraft(result)
        });
    }

    /// Stream an answer to a free-form question about a farm.
    pub async fn start_ask(
        &mut self,
        farm_id: &str,
        question: &str,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) {
        let question = question.trim().to_string();
        if question.is_empty() {
            notify(ui_tx, Notice::error("Question is required")).await;
            return;
        }
        let farm = match require_farm(self.store.as_ref(), farm_id).await {
            Ok(farm) => farm,
            Err(e) => {
                notify(ui_tx, Notice::error(e.to_string())).await;
                return;
            }
        };

        let generation = self.begin_task(TaskKind::Ask);
        self.ask_status = LlmStatus::Streaming;
        let _ = ui_tx.send(UiUpdate::AskStarted).await;

        let system = prompt::ask_system_prompt(&farm);
        let max_tokens = self.config.llm.ask_max_tokens;
        let client = Arc::clone(&self.llm);
        let tx = self.llm_tx.clone();
        info!("asking about farm {farm_id} (gen {generation})");
        let handle = tokio::spawn(async move {
            client
                .stream_chat(&system, &question, max_tokens, tx, generation)
                .await;
        });
        self.tasks.insert(TaskKind::Ask, handle);
    }
}

async fn notify(ui_tx: &mpsc::Sender<UiUpdate>, notice: Notice) {
    let _ = ui_tx.send(UiUpdate::Notice(notice)).await;
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Loads `initial` first, then listens on three channels using
/// `tokio::select!`: user commands from the TUI, streamed model events and
/// background task results.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut llm_rx: mpsc::Receiver<LlmEvent>,
    mut task_rx: mpsc::Receiver<TaskEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
    initial: Route,
) -> anyhow::Result<()> {
    info!("application event loop started");
    state.navigate(initial, &ui_tx).await;

    // Both senders are held by `state`, so these only close on shutdown;
    // stop polling a closed channel so select! never spins on it.
    let mut llm_open = true;
    let mut task_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut state, cmd, &ui_tx).await,
                    None => {
                        info!("command channel closed, shutting down");
                        break;
                    }
                }
            }

            event = llm_rx.recv(), if llm_open => {
                match event {
                    Some(event) => handle_llm_event(&mut state, event, &ui_tx).await,
                    None => llm_open = false,
                }
            }

            event = task_rx.recv(), if task_open => {
                match event {
                    Some(event) => handle_task_event(&mut state, event, &ui_tx).await,
                    None => task_open = false,
                }
            }
        }
    }

    state.cancel_all();
    info!("application event loop exiting");
    Ok(())
}

/// Apply a streamed model event from the ask screen. Events from an older
/// generation belong to an abandoned request and are dropped.
pub async fn handle_llm_event(
    state: &mut AppState,
    event: LlmEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if !state.is_current(TaskKind::Ask, event.generation()) {
        debug!(
            "discarding stale model event (event gen {}, current gen {:?})",
            event.generation(),
            state.active.get(&TaskKind::Ask)
        );
        return;
    }

    match event {
        LlmEvent::Token { text, .. } => {
            state.ask_status = LlmStatus::Streaming;
            let _ = ui_tx.send(UiUpdate::AskToken(text)).await;
        }
        LlmEvent::Complete { .. } => {
            state.ask_status = LlmStatus::Complete;
            state.finish_task(TaskKind::Ask);
            let _ = ui_tx.send(UiUpdate::AskComplete).await;
        }
        LlmEvent::Error { message, .. } => {
            warn!("ask request failed: {message}");
            state.ask_status = LlmStatus::Error;
            state.finish_task(TaskKind::Ask);
            let _ = ui_tx.send(UiUpdate::AskError(message.clone())).await;
            notify(ui_tx, Notice::error(message)).await;
        }
    }
}

/// Apply a finished background task, unless it is stale.
pub async fn handle_task_event(
    state: &mut AppState,
    event: TaskEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    let kind = event.kind();
    if !state.is_current(kind, event.generation) {
        debug!(
            "discarding stale {kind:?} result (event gen {}, current gen {:?})",
            event.generation,
            state.active.get(&kind)
        );
        return;
    }
    state.finish_task(kind);

    match event.output {
        TaskOutput::Report {
            farm_id,
            consulting_id,
            report,
        } => {
            if let Err(e) = state
                .state
                .save_report(&farm_id, consulting_id.as_deref(), &report)
            {
                warn!("failed to save report for farm {farm_id}: {e:#}");
                notify(ui_tx, Notice::error(format!("Failed to save the report: {e:#}"))).await;
            }
            state.report_status = LlmStatus::Complete;
            if let ReportSource::Fallback { reason } = &report.source {
                notify(
                    ui_tx,
                    Notice::error(format!(
                        "Report generation failed ({reason}). Showing a placeholder report."
                    )),
                )
                .await;
            }
            let _ = ui_tx.send(UiUpdate::ReportReady(report)).await;
        }
        TaskOutput::Questions(suggestions) => {
            if let Some(reason) = &suggestions.fallback {
                notify(
                    ui_tx,
                    Notice::error(format!(
                        "Question suggestion failed ({reason}). Showing default questions."
                    )),
                )
                .await;
            }
            let _ = ui_tx
                .send(UiUpdate::QuestionsSuggested {
                    questions: suggestions.questions,
                    fallback: suggestions.fallback,
                })
                .await;
        }
        TaskOutput::Transcription(Ok(transcription)) => {
            if !transcription.success {
                let message = transcription
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string());
                warn!("transcription rejected: {message}");
                notify(ui_tx, Notice::error(format!("Transcription failed: {message}"))).await;
            }
            let _ = ui_tx.send(UiUpdate::Transcribed(transcription)).await;
        }
        TaskOutput::Transcription(Err(message)) => {
            warn!("transcription failed: {message}");
            notify(ui_tx, Notice::error(format!("Transcription failed: {message}"))).await;
        }
        TaskOutput::FinalDraft(Ok(report)) => {
            let _ = ui_tx.send(UiUpdate::FinalReportDrafted(Box::new(report))).await;
        }
        TaskOutput::FinalDraft(Err(message)) => {
            warn!("final report draft failed: {message}");
            notify(ui_tx, Notice::error(format!("Drafting failed: {message}"))).await;
        }
    }
}

/// Handle a user command from the TUI.
pub async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::Navigate(route) => state.navigate(route, ui_tx).await,
        UserCommand::Reload => state.refresh(ui_tx).await,

        // -- farms ----------------------------------------------------------
        UserCommand::CreateFarm(input) => match state.store.create_farm(input).await {
            Ok(farm) => {
                info!("created farm {} ({})", farm.name, farm.farm_id);
                state.navigate(Route::FarmList, ui_tx).await;
            }
            Err(e) => {
                warn!("failed to create farm: {e}");
                notify(ui_tx, Notice::error(e.to_string())).await;
            }
        },
        UserCommand::UpdateFarm(update) => {
            if update.is_empty() {
                return;
            }
            let farm_id = update.farm_id.clone();
            match state.store.update_farm(update).await {
                Ok(_) => {
                    info!("updated farm {farm_id}");
                    state.refresh(ui_tx).await;
                }
                Err(e) => {
                    warn!("failed to update farm {farm_id}: {e}");
                    notify(ui_tx, Notice::error(e.to_string())).await;
                }
            }
        }
        UserCommand::DeleteFarm { farm_id } => delete_farm(state, &farm_id, ui_tx).await,

        // -- sessions -------------------------------------------------------
        UserCommand::StartConsulting { farm_id } => {
            let today = state.today();
            let created = state
                .store
                .create_session(NewSession {
                    farm_id: farm_id.clone(),
                    consultant_id: None,
                    visit_date: today,
                    status: SessionStatus::Diagnosis,
                })
                .await;
            match created {
                Ok(session) => {
                    info!("started session {} for farm {farm_id}", session.consulting_id);
                    if let Err(e) = state.state.save_consulting_date(&farm_id, today) {
                        warn!("failed to save consulting date for {farm_id}: {e:#}");
                    }
                    let first = Route::Data {
                        farm_id,
                        step: DataStep::Environment,
                    };
                    state.navigate(first, ui_tx).await;
                }
                Err(e) => {
                    warn!("failed to start consulting for {farm_id}: {e}");
                    notify(ui_tx, Notice::error(e.to_string())).await;
                }
            }
        }
        UserCommand::SetSessionStatus {
            consulting_id,
            status,
        } => match state
            .store
            .update_session_status(&consulting_id, status)
            .await
        {
            Ok(_) => state.refresh(ui_tx).await,
            Err(e) => {
                warn!("failed to update session {consulting_id}: {e}");
                notify(ui_tx, Notice::error(e.to_string())).await;
            }
        },
        UserCommand::DeleteSession { consulting_id } => {
            match state.store.delete_session(&consulting_id).await {
                Ok(()) => {
                    info!("deleted session {consulting_id}");
                    if let Err(e) = state.state.delete_session_report(&consulting_id) {
                        warn!("failed to remove report of session {consulting_id}: {e:#}");
                    }
                    state.refresh(ui_tx).await;
                }
                Err(e) => {
                    warn!("failed to delete session {consulting_id}: {e}");
                    notify(ui_tx, Notice::error(e.to_string())).await;
                }
            }
        }

        // -- wizard and diagnosis -------------------------------------------
        UserCommand::SaveStepData {
            farm_id,
            step,
            inputs,
        } => {
            let saved = step
                .validate(inputs)
                .map_err(|e| e.to_string())
                .and_then(|values| {
                    state
                        .state
                        .save_step_data(&farm_id, step, &values)
                        .map_err(|e| format!("{e:#}"))
                });
            match saved {
                Ok(()) => {
                    info!("saved {} data for farm {farm_id}", step.slug());
                    state.navigate(wizard_next(&farm_id, step), ui_tx).await;
                }
                Err(message) => notify(ui_tx, Notice::error(message)).await,
            }
        }
        UserCommand::SaveDiagnosis { farm_id, sheet } => {
            match state.state.save_diagnosis(&farm_id, &sheet) {
                Ok(()) => {
                    info!(
                        "saved diagnosis for farm {farm_id} (score {:.1})",
                        sheet.score().total
                    );
                    state.navigate(Route::Interview { farm_id }, ui_tx).await;
                }
                Err(e) => notify(ui_tx, Notice::error(format!("{e:#}"))).await,
            }
        }

        // -- interview ------------------------------------------------------
        UserCommand::AddInterviewEntry {
            farm_id,
            question,
            answer,
        } => {
            let result = state.state.interview(&farm_id).and_then(|mut log| {
                log.push(question, answer)?;
                state.state.save_interview(&farm_id, &log)
            });
            match result {
                Ok(()) => state.refresh(ui_tx).await,
                Err(e) => notify(ui_tx, Notice::error(format!("{e:#}"))).await,
            }
        }
        UserCommand::RemoveInterviewEntry { farm_id, index } => {
            let result = state.state.interview(&farm_id).and_then(|mut log| {
                if log.remove(index).is_some() {
                    state.state.save_interview(&farm_id, &log)?;
                }
                Ok(())
            });
            match result {
                Ok(()) => state.refresh(ui_tx).await,
                Err(e) => notify(ui_tx, Notice::error(format!("{e:#}"))).await,
            }
        }
        UserCommand::SuggestQuestions { farm_id } => {
            state.trigger_questions(&farm_id, ui_tx).await
        }
        UserCommand::TranscribeAudio { path, .. } => state.trigger_transcription(path),

        // -- reports --------------------------------------------------------
        UserCommand::RegenerateReport { farm_id, session } => {
            match require_farm(state.store.as_ref(), &farm_id).await {
                Ok(farm) => state.trigger_report(farm, session, ui_tx).await,
                Err(e) => notify(ui_tx, Notice::error(e.to_string())).await,
            }
        }
        UserCommand::SavePlan { farm_id, plan } => {
            let saved = plan
                .validate()
                .map_err(|e| e.to_string())
                .and_then(|()| {
                    state
                        .state
                        .save_plan(&farm_id, &plan)
                        .map_err(|e| format!("{e:#}"))
                });
            match saved {
                Ok(()) => {
                    info!("saved consulting plan for farm {farm_id}");
                    state.navigate(Route::Consulting { farm_id }, ui_tx).await;
                }
                Err(message) => notify(ui_tx, Notice::error(message)).await,
            }
        }
        UserCommand::SaveFinalReport { farm_id, report } => {
            match state.state.save_final_report(&farm_id, &report) {
                Ok(()) => {
                    info!("saved final report for farm {farm_id}");
                    state.navigate(Route::Consulting { farm_id }, ui_tx).await;
                }
                Err(e) => notify(ui_tx, Notice::error(format!("{e:#}"))).await,
            }
        }
        UserCommand::DraftFinalReport { farm_id } => {
            state.trigger_final_draft(&farm_id, ui_tx).await
        }

        UserCommand::Ask { farm_id, question } => {
            state.start_ask(&farm_id, &question, ui_tx).await
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

/// Delete a farm, its sessions and every piece of local state keyed by it.
async fn delete_farm(state: &mut AppState, farm_id: &str, ui_tx: &mpsc::Sender<UiUpdate>) {
    let session_ids: Vec<String> = match state.store.list_sessions(farm_id).await {
        Ok(sessions) => sessions.into_iter().map(|s| s.consulting_id).collect(),
        Err(e) => {
            warn!("failed to list sessions of farm {farm_id}: {e}");
            notify(ui_tx, Notice::error(e.to_string())).await;
            return;
        }
    };
    if let Err(e) = state.store.delete_farm(farm_id).await {
        warn!("failed to delete farm {farm_id}: {e}");
        notify(ui_tx, Notice::error(e.to_string())).await;
        return;
    }
    if let Err(e) = state.state.clear_farm(farm_id, &session_ids) {
        warn!("failed to clear local state of farm {farm_id}: {e:#}");
    }
    info!("deleted farm {farm_id} and {} sessions", session_ids.len());
    state.navigate(Route::FarmList, ui_tx).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
