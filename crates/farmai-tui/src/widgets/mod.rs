// TUI widget modules, one per screen plus shared bars and dialogs.

pub mod ask;
pub mod consulting;
pub mod diagnosis;
pub mod dialog;
pub mod document;
pub mod farm_list;
pub mod form_view;
pub mod home;
pub mod interview;
pub mod report;
pub mod status_bar;

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use farmai_app::protocol::ScreenData;

use crate::ViewState;

/// Render the body of the current screen.
pub fn render_screen(frame: &mut Frame, area: Rect, state: &ViewState) {
    let Some(screen) = &state.screen else {
        render_placeholder(frame, area, state.load_error.as_deref());
        return;
    };

    match screen {
        ScreenData::Home {
            backend,
            llm_model,
        } => home::render(frame, area, backend, llm_model.as_deref()),
        ScreenData::FarmList { farms } => farm_list::render(frame, area, farms, state.selected),
        ScreenData::Consulting {
            farm,
            sessions,
            consulting_date,
            plan,
        } => consulting::render(
            frame,
            area,
            consulting::ConsultingView {
                farm,
                sessions,
                consulting_date: *consulting_date,
                plan: plan.as_ref(),
                selected: state.selected,
            },
        ),
        ScreenData::DataEntry { step, .. } => document::render_step(frame, area, *step, state),
        ScreenData::Diagnosis { sheet, .. } => {
            diagnosis::render(frame, area, sheet, state.selected, state.unsaved)
        }
        ScreenData::Interview { log, .. } => interview::render(frame, area, log, state),
        ScreenData::Report {
            session, report, ..
        } => report::render(frame, area, session.as_ref(), report.as_ref(), state),
        ScreenData::Plan { .. } => document::render_plan(frame, area, state),
        ScreenData::FinalReport { sessions, .. } => {
            document::render_final_report(frame, area, sessions, state)
        }
        ScreenData::Ask { .. } => ask::render(frame, area, state),
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, error: Option<&str>) {
    let line = match error {
        Some(message) => Line::from(Span::styled(
            format!("Could not load: {message}"),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(Span::styled("Loading...", Style::default().fg(Color::DarkGray))),
    };
    let paragraph = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Bold white header line used by section titles inside panels.
pub(crate) fn heading(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(
        text.into(),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ))
}

/// `- item` lines, or a dimmed `(none)` for an empty list.
pub(crate) fn bullets(items: &[String]) -> Vec<Line<'static>> {
    if items.is_empty() {
        return vec![Line::from(Span::styled(
            "  (none)",
            Style::default().fg(Color::DarkGray),
        ))];
    }
    items
        .iter()
        .map(|item| Line::from(format!("  - {item}")))
        .collect()
}

/// `label: value` with a dimmed label.
pub(crate) fn labeled(label: &str, value: impl Into<String>) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(Color::Gray)),
        Span::raw(value.into()),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::buffer_text;

    #[test]
    fn loading_then_error_placeholder() {
        let backend = ratatui::backend::TestBackend::new(60, 5);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let mut state = ViewState::default();
        terminal
            .draw(|frame| render_screen(frame, frame.area(), &state))
            .unwrap();
        assert!(buffer_text(terminal.backend().buffer()).contains("Loading..."));

        state.load_error = Some("database locked".into());
        terminal
            .draw(|frame| render_screen(frame, frame.area(), &state))
            .unwrap();
        assert!(buffer_text(terminal.backend().buffer()).contains("database locked"));
    }

    #[test]
    fn bullets_mark_empty_lists() {
        assert_eq!(bullets(&[]).len(), 1);
        assert_eq!(bullets(&["a".into(), "b".into()]).len(), 2);
    }
}
