// Status bar widget: screen title, farm, background activity.
//
// The help bar below the body lists the keys of the current screen.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use farmai_app::protocol::{LlmStatus, ScreenData};
use farmai_app::route::Route;

use crate::ViewState;

/// Render the status bar into the given area.
///
/// Layout: [title] | [farm name] | [busy / model activity]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = vec![Span::styled(
        format!(" {} ", state.route.title()),
        Style::default()
            .fg(Color::Black)
            .bg(Color::Green)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(farm) = state.screen.as_ref().and_then(ScreenData::farm) {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            farm.name.clone(),
            Style::default().fg(Color::White),
        ));
    }

    if let Some((text, color)) = activity(state) {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled(text, Style::default().fg(color)));
    }

    if state.unsaved {
        spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
        spans.push(Span::styled("unsaved", Style::default().fg(Color::Yellow)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Background work worth showing, if any.
pub fn activity(state: &ViewState) -> Option<(String, Color)> {
    if let Some(label) = state.busy {
        return Some((format!("{label}..."), Color::Yellow));
    }
    match state.route {
        Route::Report { .. } if state.report_status == LlmStatus::Pending => {
            Some(("Generating report...".to_string(), Color::Yellow))
        }
        Route::Ask { .. } if state.ask_status == LlmStatus::Streaming => {
            Some(("Answering...".to_string(), Color::Yellow))
        }
        _ => None,
    }
}

/// Render the key hints for the current screen.
pub fn render_help(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        format!(" {}", help_text(state)),
        Style::default().fg(Color::DarkGray),
    )))
    .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

pub fn help_text(state: &ViewState) -> &'static str {
    if state.goto.is_some() {
        return "Enter: go  Esc: cancel";
    }
    if let Some(form) = &state.form {
        return match state.route {
            Route::Data { .. } => "Tab: next field  Ctrl+S: save and continue  Ctrl+B: back  Esc: leave",
            Route::FinalReport { .. } if !form.is_modal() => {
                "Tab: next field  Ctrl+S: save  Ctrl+G: draft with AI  Esc: leave"
            }
            Route::Ask { .. } => "Enter: ask  Esc: leave",
            _ => "Tab: next field  Ctrl+S: save  Esc: cancel",
        };
    }
    match state.route {
        Route::Home => "f: my farms  :: go to path  q: quit",
        Route::FarmList => "Enter: open  n: new  e: edit  d: delete  Esc: back  q: quit",
        Route::Consulting { .. } => {
            "s: start  w: data  x: diagnosis  i: interview  Enter/l: report  p: plan  f: final  a: ask  c: status  d: delete"
        }
        Route::Diagnosis { .. } => "Up/Down: item  Left/Right or 0-5: level  g: general info  s: save  Esc: back",
        Route::Interview { .. } => "n: new entry  1-9: use suggestion  s: suggest  t: transcribe  d: delete  Esc: back",
        Route::Report { .. } => "Up/Down/PgUp/PgDn: scroll  g: regenerate  Esc: back",
        _ => "Esc: back  q: quit",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_label_wins_over_status() {
        let mut state = ViewState {
            route: Route::Report {
                farm_id: "f1".into(),
                session: None,
            },
            report_status: LlmStatus::Pending,
            ..ViewState::default()
        };
        assert_eq!(activity(&state).unwrap().0, "Generating report...");
        state.busy = Some("Transcribing");
        assert_eq!(activity(&state).unwrap().0, "Transcribing...");
    }

    #[test]
    fn idle_home_has_no_activity() {
        assert!(activity(&ViewState::default()).is_none());
    }

    #[test]
    fn help_follows_route_and_goto() {
        let mut state = ViewState::default();
        assert!(help_text(&state).contains("my farms"));
        state.goto = Some(String::new());
        assert!(help_text(&state).contains("go"));
    }

    #[test]
    fn render_does_not_panic() {
        let backend = ratatui::backend::TestBackend::new(80, 1);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = ViewState {
            unsaved: true,
            ..ViewState::default()
        };
        terminal
            .draw(|frame| {
                render(frame, frame.area(), &state);
                render_help(frame, frame.area(), &state);
            })
            .unwrap();
    }
}
