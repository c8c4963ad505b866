// Terminal UI: view state, rendering and the input loop.
//
// The TUI owns a `ViewState` that mirrors what the current screen shows.
// The orchestrator pushes `UiUpdate` messages over an mpsc channel; the TUI
// applies them to `ViewState` and re-renders at ~30 fps.

pub mod form;
pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{info, warn};

use farmai_app::protocol::{LlmStatus, Notice, NoticeLevel, ScreenData, UiUpdate, UserCommand};
use farmai_app::route::Route;
use farmai_core::interview::SuggestedQuestion;

use form::{Form, FormKind};
use layout::build_layout;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// A command waiting for a y/n answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirm {
    pub message: String,
    pub command: UserCommand,
}

/// TUI-local state, updated from `UiUpdate` messages and key presses.
#[derive(Debug, Default)]
pub struct ViewState {
    pub route: Route,
    /// `None` until the first screen loads.
    pub screen: Option<ScreenData>,
    /// Why the first screen could not be loaded.
    pub load_error: Option<String>,
    /// Form being edited: the screen itself or a modal over it.
    pub form: Option<Form>,
    /// Selected row in the screen's list.
    pub selected: usize,
    pub scroll: u16,
    pub report_status: LlmStatus,
    pub suggestions: Vec<SuggestedQuestion>,
    /// The suggestions are the built-in defaults.
    pub suggestions_fallback: bool,
    /// Label of a background request the screen is waiting on.
    pub busy: Option<&'static str>,
    pub ask_question: String,
    pub ask_answer: String,
    pub ask_status: LlmStatus,
    /// Diagnosis levels changed since the last save.
    pub unsaved: bool,
    pub notice: Option<Notice>,
    pub confirm: Option<Confirm>,
    pub confirm_quit: bool,
    /// Path being typed after `:`.
    pub goto: Option<String>,
}

impl ViewState {
    pub fn farm_id(&self) -> Option<&str> {
        self.screen
            .as_ref()
            .and_then(ScreenData::farm)
            .map(|f| f.farm_id.as_str())
    }

    /// Number of selectable rows on the current screen.
    pub fn row_count(&self) -> usize {
        match &self.screen {
            Some(ScreenData::FarmList { farms }) => farms.len(),
            Some(ScreenData::Consulting { sessions, .. }) => sessions.len(),
            Some(ScreenData::Interview { log, .. }) => log.len(),
            Some(ScreenData::Diagnosis { .. }) => widgets::diagnosis::rubric_items().len(),
            _ => 0,
        }
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notice = Some(Notice::error(message));
    }
}

/// The form a screen is edited through, if it is a form screen.
fn screen_form(data: &ScreenData) -> Option<Form> {
    match data {
        ScreenData::DataEntry { farm, step, values } => {
            Some(Form::step_data(&farm.farm_id, *step, values))
        }
        ScreenData::Plan { farm, plan } => Some(Form::plan(&farm.farm_id, plan)),
        ScreenData::FinalReport { farm, report, .. } => {
            Some(Form::final_report(&farm.farm_id, report))
        }
        ScreenData::Ask { farm } => Some(Form::ask(&farm.farm_id)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Screen { route, data } => {
            let same_route = route == state.route && state.screen.is_some();
            if !same_route {
                state.selected = 0;
                state.scroll = 0;
                state.suggestions.clear();
                state.suggestions_fallback = false;
                state.busy = None;
                state.ask_question.clear();
                state.ask_answer.clear();
                state.ask_status = LlmStatus::Idle;
                state.report_status = LlmStatus::Idle;
            }
            if let ScreenData::Report { report: None, .. } = data.as_ref() {
                state.report_status = LlmStatus::Pending;
            }
            state.route = route;
            state.form = screen_form(&data);
            state.screen = Some(*data);
            state.load_error = None;
            state.unsaved = false;
            state.selected = state.selected.min(state.row_count().saturating_sub(1));
        }
        UiUpdate::LoadFailed { message, .. } => {
            if state.screen.is_none() {
                state.load_error = Some(message);
            }
        }
        UiUpdate::Notice(notice) => {
            if notice.level == NoticeLevel::Error {
                state.busy = None;
            }
            state.notice = Some(notice);
        }
        UiUpdate::ReportStatus(status) => {
            state.report_status = status;
        }
        UiUpdate::ReportReady(generated) => {
            if let Some(ScreenData::Report { report, .. }) = state.screen.as_mut() {
                *report = Some(*generated);
                state.scroll = 0;
            }
            state.report_status = LlmStatus::Complete;
        }
        UiUpdate::QuestionsSuggested {
            questions,
            fallback,
        } => {
            state.suggestions = questions;
            state.suggestions_fallback = fallback.is_some();
            state.busy = None;
        }
        UiUpdate::Transcribed(transcription) => {
            state.busy = None;
            if !transcription.success {
                return;
            }
            let editing_entry = matches!(
                state.form.as_ref().map(|f| &f.kind),
                Some(FormKind::InterviewEntry { .. })
            );
            if editing_entry {
                if let Some(form) = state.form.as_mut() {
                    form.set_value("answer", &transcription.text);
                }
            } else if let Some(ScreenData::Interview { farm, .. }) = &state.screen {
                state.form = Some(Form::interview_entry(&farm.farm_id, "", &transcription.text));
            }
        }
        UiUpdate::FinalReportDrafted(report) => {
            state.busy = None;
            let farm_id = match state.form.as_ref().map(|f| &f.kind) {
                Some(FormKind::FinalReport { farm_id }) => Some(farm_id.clone()),
                _ => None,
            };
            if let Some(farm_id) = farm_id {
                state.form = Some(Form::final_report(&farm_id, &report));
            }
        }
        UiUpdate::AskStarted => {
            state.ask_answer.clear();
            state.ask_status = LlmStatus::Streaming;
            state.scroll = 0;
        }
        UiUpdate::AskToken(token) => {
            state.ask_answer.push_str(&token);
            state.ask_status = LlmStatus::Streaming;
        }
        UiUpdate::AskComplete => {
            state.ask_status = LlmStatus::Complete;
        }
        UiUpdate::AskError(_) => {
            state.ask_status = LlmStatus::Error;
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame: bars, the current screen, then overlays.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    widgets::render_screen(frame, layout.body, state);
    widgets::status_bar::render_help(frame, layout.help_bar, state);

    if let Some(form) = state.form.as_ref().filter(|f| f.is_modal()) {
        widgets::form_view::render_modal(frame, frame.area(), form);
    }
    if let Some(path) = &state.goto {
        widgets::dialog::render_goto(frame, frame.area(), path);
    }
    if let Some(confirm) = &state.confirm {
        widgets::dialog::render_confirm(frame, frame.area(), "Confirm", &confirm.message);
    }
    if state.confirm_quit {
        widgets::dialog::render_confirm(frame, frame.area(), "Quit?", "Really quit?");
    }
    if let Some(notice) = &state.notice {
        widgets::dialog::render_notice(frame, frame.area(), notice);
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen).
/// 2. Installs a panic hook that restores the terminal.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => apply_ui_update(&mut view_state, update),
                    // The orchestrator has shut down.
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            if cmd_tx.send(cmd).await.is_err() || quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("terminal input error: {e}");
                        break;
                    }
                    None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();
    info!("terminal restored");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
