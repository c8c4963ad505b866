// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages for the
// orchestrator, or into local ViewState changes (selection, scrolling,
// form editing, dialogs). Modal layers take keys first: the quit prompt,
// the notice, a pending confirmation, the path prompt, then any open form.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use farmai_app::protocol::{LlmStatus, ScreenData, UserCommand};
use farmai_app::route::{wizard_previous, Route};
use farmai_core::diagnosis::Level;
use farmai_core::wizard::DataStep;

use crate::form::{Form, FormAction, FormKind, Submission};
use crate::widgets::diagnosis::rubric_items;
use crate::{Confirm, ViewState};

/// Lines moved by PageUp/PageDown.
const PAGE: u16 = 10;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// orchestrator, `None` when it was handled locally.
pub fn handle_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    // Windows reports both press and release.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if state.confirm_quit {
        return handle_confirm_quit(key_event, state);
    }
    if state.notice.is_some() {
        state.notice = None;
        return None;
    }
    if state.confirm.is_some() {
        return handle_confirm(key_event, state);
    }
    if state.goto.is_some() {
        return handle_goto(key_event, state);
    }
    if state.form.is_some() {
        return handle_form(key_event, state);
    }

    match key_event.code {
        KeyCode::Char('q') => {
            state.confirm_quit = true;
            return None;
        }
        KeyCode::Char(':') => {
            state.goto = Some(String::new());
            return None;
        }
        KeyCode::Esc | KeyCode::Backspace if state.route != Route::Home => {
            return Some(UserCommand::Navigate(state.route.parent()));
        }
        KeyCode::Char('r') => return Some(UserCommand::Reload),
        _ => {}
    }

    match state.screen {
        Some(ScreenData::Home { .. }) | None => home_key(key_event),
        Some(ScreenData::FarmList { .. }) => farm_list_key(key_event, state),
        Some(ScreenData::Consulting { .. }) => consulting_key(key_event, state),
        Some(ScreenData::Diagnosis { .. }) => diagnosis_key(key_event, state),
        Some(ScreenData::Interview { .. }) => interview_key(key_event, state),
        Some(ScreenData::Report { .. }) => report_key(key_event, state),
        // Form screens are handled by `handle_form`.
        Some(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Modal layers
// ---------------------------------------------------------------------------

/// `y`/`q` confirm, `n`/Esc cancel, everything else is blocked.
fn handle_confirm_quit(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

fn handle_confirm(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => state.confirm.take().map(|c| c.command),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.confirm = None;
            None
        }
        _ => None,
    }
}

fn handle_goto(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let path = state.goto.as_mut()?;
    match key_event.code {
        KeyCode::Esc => {
            state.goto = None;
            None
        }
        KeyCode::Backspace => {
            path.pop();
            None
        }
        KeyCode::Char(c) => {
            path.push(c);
            None
        }
        KeyCode::Enter => {
            let path = state.goto.take().unwrap_or_default();
            match Route::parse(&path) {
                Ok(route) => Some(UserCommand::Navigate(route)),
                Err(e) => {
                    state.notify_error(e.to_string());
                    None
                }
            }
        }
        _ => None,
    }
}

fn handle_form(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let form = state.form.as_mut()?;
    let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);

    // Screen-specific shortcuts that are not form edits.
    match (&form.kind, key_event.code) {
        (FormKind::StepData { farm_id, step }, KeyCode::Char('b')) if ctrl => {
            return Some(UserCommand::Navigate(wizard_previous(farm_id, *step)));
        }
        (FormKind::FinalReport { farm_id }, KeyCode::Char('g')) if ctrl => {
            let cmd = UserCommand::DraftFinalReport {
                farm_id: farm_id.clone(),
            };
            state.busy = Some("Drafting final report");
            return Some(cmd);
        }
        _ => {}
    }

    match form.handle_key(key_event) {
        FormAction::Edited | FormAction::Ignored => None,
        FormAction::Cancel => {
            if form.is_modal() {
                state.form = None;
                None
            } else {
                Some(UserCommand::Navigate(state.route.parent()))
            }
        }
        FormAction::Submit => submit_form(state),
    }
}

fn submit_form(state: &mut ViewState) -> Option<UserCommand> {
    let form = state.form.as_mut()?;
    let is_ask = matches!(form.kind, FormKind::Ask { .. });
    let is_audio = matches!(form.kind, FormKind::AudioPath { .. });
    let modal = form.is_modal();
    match form.submit() {
        Ok(Submission::Command(cmd)) => {
            if is_ask {
                let question = form.value("question").trim().to_string();
                form.clear();
                if !question.is_empty() {
                    state.ask_status = LlmStatus::Pending;
                }
                state.ask_question = question;
            } else if modal {
                state.form = None;
                if is_audio {
                    state.busy = Some("Transcribing");
                }
            }
            Some(cmd)
        }
        Ok(Submission::GeneralInfo(inputs)) => {
            if let Some(ScreenData::Diagnosis { sheet, .. }) = state.screen.as_mut() {
                match sheet.set_general(inputs) {
                    Ok(()) => {
                        state.form = None;
                        state.unsaved = true;
                    }
                    Err(e) => state.notify_error(e.to_string()),
                }
            }
            None
        }
        Err(message) => {
            state.notify_error(message);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

fn select_up(state: &mut ViewState) {
    state.selected = state.selected.saturating_sub(1);
}

fn select_down(state: &mut ViewState) {
    if state.selected + 1 < state.row_count() {
        state.selected += 1;
    }
}

fn home_key(key_event: KeyEvent) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('f') | KeyCode::Enter => Some(UserCommand::Navigate(Route::FarmList)),
        _ => None,
    }
}

fn farm_list_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let Some(ScreenData::FarmList { farms }) = &state.screen else {
        return None;
    };
    let selected = farms.get(state.selected).cloned();
    match (key_event.code, selected) {
        (KeyCode::Up | KeyCode::Char('k'), _) => select_up(state),
        (KeyCode::Down | KeyCode::Char('j'), _) => select_down(state),
        (KeyCode::Char('n'), _) => state.form = Some(Form::new_farm()),
        (KeyCode::Enter, Some(farm)) => {
            return Some(UserCommand::Navigate(Route::Consulting {
                farm_id: farm.farm_id,
            }))
        }
        (KeyCode::Char('e'), Some(farm)) => state.form = Some(Form::edit_farm(&farm)),
        (KeyCode::Char('d'), Some(farm)) => {
            state.confirm = Some(Confirm {
                message: format!("Delete {} and all of its consulting data?", farm.name),
                command: UserCommand::DeleteFarm {
                    farm_id: farm.farm_id,
                },
            });
        }
        _ => {}
    }
    None
}

fn consulting_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let Some(ScreenData::Consulting { farm, sessions, .. }) = &state.screen else {
        return None;
    };
    let farm_id = farm.farm_id.clone();
    let session = sessions.get(state.selected).cloned();
    let to = |route: Route| Some(UserCommand::Navigate(route));

    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => select_up(state),
        KeyCode::Down | KeyCode::Char('j') => select_down(state),
        KeyCode::Char('e') => state.form = Some(Form::edit_farm(farm)),
        KeyCode::Char('s') => return Some(UserCommand::StartConsulting { farm_id }),
        KeyCode::Char('w') => {
            return to(Route::Data {
                farm_id,
                step: DataStep::Environment,
            })
        }
        KeyCode::Char('x') => return to(Route::Diagnosis { farm_id }),
        KeyCode::Char('i') => return to(Route::Interview { farm_id }),
        KeyCode::Char('l') => {
            return to(Route::Report {
                farm_id,
                session: None,
            })
        }
        KeyCode::Char('p') => return to(Route::Plan { farm_id }),
        KeyCode::Char('f') => return to(Route::FinalReport { farm_id }),
        KeyCode::Char('a') => return to(Route::Ask { farm_id }),
        KeyCode::Enter => {
            if let Some(session) = session {
                return to(Route::Report {
                    farm_id,
                    session: Some(session.consulting_id),
                });
            }
        }
        KeyCode::Char('c') => {
            if let Some(session) = session {
                return Some(UserCommand::SetSessionStatus {
                    consulting_id: session.consulting_id,
                    status: session.status.cycle(),
                });
            }
        }
        KeyCode::Char('d') => {
            if let Some(session) = session {
                state.confirm = Some(Confirm {
                    message: format!("Delete the session of {}?", session.visit_date),
                    command: UserCommand::DeleteSession {
                        consulting_id: session.consulting_id,
                    },
                });
            }
        }
        _ => {}
    }
    None
}

fn diagnosis_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let items = rubric_items();
    let item = *items.get(state.selected)?;
    let selected = state.selected;
    let Some(ScreenData::Diagnosis { farm, sheet }) = state.screen.as_mut() else {
        return None;
    };
    let current = sheet.level(item.key).map_or(0, Level::get);

    let target = match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            state.selected = selected.saturating_sub(1);
            return None;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if selected + 1 < items.len() {
                state.selected = selected + 1;
            }
            return None;
        }
        KeyCode::Right | KeyCode::Char('+') => (current + 1).min(Level::MAX),
        KeyCode::Left | KeyCode::Char('-') => current.saturating_sub(1),
        KeyCode::Char(c @ '0'..='5') => c.to_digit(10).map_or(0, |d| d as u8),
        KeyCode::Char('g') => {
            state.form = Some(Form::general_info(&sheet.general));
            return None;
        }
        KeyCode::Char('s') => {
            return Some(UserCommand::SaveDiagnosis {
                farm_id: farm.farm_id.clone(),
                sheet: sheet.clone(),
            });
        }
        _ => return None,
    };

    if target == current {
        return None;
    }
    match Level::new(target) {
        Some(level) => {
            if let Err(e) = sheet.set_level(item.key, level) {
                state.notify_error(e.to_string());
                return None;
            }
        }
        None => sheet.clear_level(item.key),
    }
    state.unsaved = true;
    None
}

fn interview_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let Some(ScreenData::Interview { farm, .. }) = &state.screen else {
        return None;
    };
    let farm_id = farm.farm_id.clone();

    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => select_up(state),
        KeyCode::Down | KeyCode::Char('j') => select_down(state),
        KeyCode::Char('n') => state.form = Some(Form::interview_entry(&farm_id, "", "")),
        KeyCode::Char('t') => state.form = Some(Form::audio_path(&farm_id)),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c.to_digit(10).map_or(0, |d| d as usize).saturating_sub(1);
            if let Some(suggestion) = state.suggestions.get(index) {
                state.form = Some(Form::interview_entry(&farm_id, &suggestion.question, ""));
            }
        }
        KeyCode::Char('s') => {
            state.busy = Some("Suggesting questions");
            return Some(UserCommand::SuggestQuestions { farm_id });
        }
        KeyCode::Char('d') if state.row_count() > 0 => {
            return Some(UserCommand::RemoveInterviewEntry {
                farm_id,
                index: state.selected,
            });
        }
        _ => {}
    }
    None
}

fn report_key(key_event: KeyEvent, state: &mut ViewState) -> Option<UserCommand> {
    let Some(ScreenData::Report { farm, session, .. }) = &state.screen else {
        return None;
    };
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => state.scroll = state.scroll.saturating_sub(1),
        KeyCode::Down | KeyCode::Char('j') => state.scroll = state.scroll.saturating_add(1),
        KeyCode::PageUp => state.scroll = state.scroll.saturating_sub(PAGE),
        KeyCode::PageDown => state.scroll = state.scroll.saturating_add(PAGE),
        KeyCode::Char('g') if state.report_status != LlmStatus::Pending => {
            let cmd = UserCommand::RegenerateReport {
                farm_id: farm.farm_id.clone(),
                session: session.as_ref().map(|s| s.consulting_id.clone()),
            };
            state.report_status = LlmStatus::Pending;
            return Some(cmd);
        }
        _ => {}
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply_ui_update;
    use crate::test_support::{farm, session};
    use farmai_app::protocol::{Notice, UiUpdate};
    use farmai_core::diagnosis::DiagnosisSheet;
    use farmai_core::interview::InterviewLog;
    use farmai_core::session::SessionStatus;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn on_screen(route: Route, data: ScreenData) -> ViewState {
        let mut state = ViewState::default();
        apply_ui_update(
            &mut state,
            UiUpdate::Screen {
                route,
                data: Box::new(data),
            },
        );
        state
    }

    fn consulting() -> ViewState {
        on_screen(
            Route::Consulting {
                farm_id: "f1".into(),
            },
            ScreenData::Consulting {
                farm: farm(),
                sessions: vec![session("c2", 9), session("c1", 2)],
                consulting_date: None,
                plan: None,
            },
        )
    }

    fn diagnosis() -> ViewState {
        on_screen(
            Route::Diagnosis {
                farm_id: "f1".into(),
            },
            ScreenData::Diagnosis {
                farm: farm(),
                sheet: DiagnosisSheet::default(),
            },
        )
    }

    #[test]
    fn ctrl_c_always_quits() {
        let mut state = diagnosis();
        state.notice = Some(Notice::info("x"));
        assert_eq!(handle_key(ctrl('c'), &mut state), Some(UserCommand::Quit));
    }

    #[test]
    fn q_asks_before_quitting() {
        let mut state = ViewState::default();
        assert_eq!(handle_key(press(KeyCode::Char('q')), &mut state), None);
        assert!(state.confirm_quit);
        assert_eq!(handle_key(press(KeyCode::Char('x')), &mut state), None);
        assert!(state.confirm_quit);
        assert_eq!(handle_key(press(KeyCode::Esc), &mut state), None);
        assert!(!state.confirm_quit);
        handle_key(press(KeyCode::Char('q')), &mut state);
        assert_eq!(
            handle_key(press(KeyCode::Char('y')), &mut state),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn notice_swallows_next_key() {
        let mut state = consulting();
        state.notice = Some(Notice::error("failed"));
        assert_eq!(handle_key(press(KeyCode::Char('s')), &mut state), None);
        assert!(state.notice.is_none());
    }

    #[test]
    fn escape_goes_to_parent() {
        let mut state = consulting();
        assert_eq!(
            handle_key(press(KeyCode::Esc), &mut state),
            Some(UserCommand::Navigate(Route::FarmList))
        );
    }

    #[test]
    fn goto_prompt_parses_paths() {
        let mut state = ViewState::default();
        handle_key(press(KeyCode::Char(':')), &mut state);
        for c in "/farms/myfarms".chars() {
            handle_key(press(KeyCode::Char(c)), &mut state);
        }
        assert_eq!(
            handle_key(press(KeyCode::Enter), &mut state),
            Some(UserCommand::Navigate(Route::FarmList))
        );
        assert!(state.goto.is_none());

        handle_key(press(KeyCode::Char(':')), &mut state);
        for c in "/consulting//plan".chars() {
            handle_key(press(KeyCode::Char(c)), &mut state);
        }
        assert_eq!(handle_key(press(KeyCode::Enter), &mut state), None);
        assert_eq!(state.notice.unwrap().message, "Farm ID is required");
    }

    #[test]
    fn consulting_keys() {
        let mut state = consulting();
        assert_eq!(
            handle_key(press(KeyCode::Char('s')), &mut state),
            Some(UserCommand::StartConsulting {
                farm_id: "f1".into()
            })
        );
        handle_key(press(KeyCode::Down), &mut state);
        assert_eq!(state.selected, 1);
        handle_key(press(KeyCode::Down), &mut state);
        assert_eq!(state.selected, 1);
        assert_eq!(
            handle_key(press(KeyCode::Enter), &mut state),
            Some(UserCommand::Navigate(Route::Report {
                farm_id: "f1".into(),
                session: Some("c1".into())
            }))
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('c')), &mut state),
            Some(UserCommand::SetSessionStatus {
                consulting_id: "c1".into(),
                status: SessionStatus::Analysis
            })
        );
    }

    #[test]
    fn deleting_a_session_needs_confirmation() {
        let mut state = consulting();
        assert_eq!(handle_key(press(KeyCode::Char('d')), &mut state), None);
        assert!(state.confirm.is_some());
        assert_eq!(
            handle_key(press(KeyCode::Char('y')), &mut state),
            Some(UserCommand::DeleteSession {
                consulting_id: "c2".into()
            })
        );
        assert!(state.confirm.is_none());
    }

    #[test]
    fn diagnosis_levels_step_and_clear() {
        let mut state = diagnosis();
        let key = rubric_items()[0].key;
        let level = |state: &ViewState| match &state.screen {
            Some(ScreenData::Diagnosis { sheet, .. }) => sheet.level(key).map(Level::get),
            _ => None,
        };

        handle_key(press(KeyCode::Right), &mut state);
        handle_key(press(KeyCode::Right), &mut state);
        assert_eq!(level(&state), Some(2));
        assert!(state.unsaved);

        handle_key(press(KeyCode::Char('5')), &mut state);
        handle_key(press(KeyCode::Right), &mut state);
        assert_eq!(level(&state), Some(5));

        handle_key(press(KeyCode::Char('0')), &mut state);
        assert_eq!(level(&state), None);

        handle_key(press(KeyCode::Char('3')), &mut state);
        match handle_key(press(KeyCode::Char('s')), &mut state) {
            Some(UserCommand::SaveDiagnosis { sheet, .. }) => {
                assert_eq!(sheet.level(key).map(Level::get), Some(3))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn general_info_form_updates_sheet() {
        let mut state = diagnosis();
        handle_key(press(KeyCode::Char('g')), &mut state);
        state.form.as_mut().unwrap().set_value("own_area", "2,000");
        assert_eq!(handle_key(ctrl('s'), &mut state), None);
        assert!(state.form.is_none());
        match &state.screen {
            Some(ScreenData::Diagnosis { sheet, .. }) => {
                assert_eq!(sheet.general.get("own_area"), Some("2,000"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wizard_form_submits_and_goes_back() {
        let mut state = on_screen(
            Route::Data {
                farm_id: "f1".into(),
                step: DataStep::Irrigation,
            },
            ScreenData::DataEntry {
                farm: farm(),
                step: DataStep::Irrigation,
                values: Default::default(),
            },
        );
        // Typing `q` edits the form instead of quitting.
        handle_key(press(KeyCode::Char('q')), &mut state);
        assert!(!state.confirm_quit);

        assert_eq!(
            handle_key(ctrl('b'), &mut state),
            Some(UserCommand::Navigate(Route::Data {
                farm_id: "f1".into(),
                step: DataStep::Environment
            }))
        );
        assert!(matches!(
            handle_key(ctrl('s'), &mut state),
            Some(UserCommand::SaveStepData {
                step: DataStep::Irrigation,
                ..
            })
        ));
        assert_eq!(
            handle_key(press(KeyCode::Esc), &mut state),
            Some(UserCommand::Navigate(Route::Consulting {
                farm_id: "f1".into()
            }))
        );
    }

    #[test]
    fn interview_suggestion_prefills_entry() {
        let mut state = on_screen(
            Route::Interview {
                farm_id: "f1".into(),
            },
            ScreenData::Interview {
                farm: farm(),
                log: InterviewLog::default(),
            },
        );
        assert_eq!(
            handle_key(press(KeyCode::Char('s')), &mut state),
            Some(UserCommand::SuggestQuestions {
                farm_id: "f1".into()
            })
        );
        assert!(state.busy.is_some());
        state.suggestions = farmai_llm::questions::fallback_questions();

        handle_key(press(KeyCode::Char('2')), &mut state);
        let form = state.form.as_ref().unwrap();
        assert_eq!(form.value("question"), state.suggestions[1].question);

        // An empty log has nothing to delete.
        state.form = None;
        assert_eq!(handle_key(press(KeyCode::Char('d')), &mut state), None);
    }

    #[test]
    fn ask_form_keeps_question_and_clears_input() {
        let mut state = on_screen(
            Route::Ask {
                farm_id: "f1".into(),
            },
            ScreenData::Ask { farm: farm() },
        );
        for c in "Why?".chars() {
            handle_key(press(KeyCode::Char(c)), &mut state);
        }
        assert_eq!(
            handle_key(press(KeyCode::Enter), &mut state),
            Some(UserCommand::Ask {
                farm_id: "f1".into(),
                question: "Why?".into()
            })
        );
        assert_eq!(state.ask_question, "Why?");
        assert_eq!(state.form.as_ref().unwrap().value("question"), "");
    }

    #[test]
    fn report_regenerates_once() {
        let mut state = on_screen(
            Route::Report {
                farm_id: "f1".into(),
                session: Some("c1".into()),
            },
            ScreenData::Report {
                farm: farm(),
                session: Some(session("c1", 2)),
                report: None,
            },
        );
        // Still generating the first one.
        assert_eq!(handle_key(press(KeyCode::Char('g')), &mut state), None);

        state.report_status = LlmStatus::Complete;
        assert_eq!(
            handle_key(press(KeyCode::Char('g')), &mut state),
            Some(UserCommand::RegenerateReport {
                farm_id: "f1".into(),
                session: Some("c1".into())
            })
        );
        assert_eq!(state.report_status, LlmStatus::Pending);
    }
}
