// Form screens: wizard steps, the consulting plan and the final report.
//
// The editable part is the screen's `Form`; this module adds the step
// progress line above the wizard and the session list beside the final
// report.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use farmai_core::session::{round_number, ConsultingSession};
use farmai_core::wizard::DataStep;

use super::consulting::status_color;
use super::form_view;
use crate::layout::split_side;
use crate::ViewState;

pub fn render_step(frame: &mut Frame, area: Rect, step: DataStep, state: &ViewState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    frame.render_widget(Paragraph::new(step_progress(step)), rows[0]);
    render_form(frame, rows[1], state);
}

/// `1 Environment > 2 Irrigation > ...` with completed, current and
/// upcoming steps styled differently.
pub fn step_progress(current: DataStep) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, step) in DataStep::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
        }
        let style = match step.number().cmp(&current.number()) {
            std::cmp::Ordering::Less => Style::default().fg(Color::Green),
            std::cmp::Ordering::Equal => Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            std::cmp::Ordering::Greater => Style::default().fg(Color::Gray),
        };
        spans.push(Span::styled(
            format!("{} {}", step.number(), step.title()),
            style,
        ));
    }
    Line::from(spans)
}

pub fn render_plan(frame: &mut Frame, area: Rect, state: &ViewState) {
    render_form(frame, area, state);
}

pub fn render_final_report(
    frame: &mut Frame,
    area: Rect,
    sessions: &[ConsultingSession],
    state: &ViewState,
) {
    let (main, side) = split_side(area, 70);
    render_form(frame, main, state);

    let mut lines: Vec<Line> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Line::from(vec![
                Span::raw(format!("#{} {} ", round_number(i, sessions.len()), s.visit_date)),
                Span::styled(s.status.label(), Style::default().fg(status_color(s.status))),
            ])
        })
        .collect();
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No sessions recorded.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Sessions ({}) ", sessions.len())),
    );
    frame.render_widget(paragraph, side);
}

fn render_form(frame: &mut Frame, area: Rect, state: &ViewState) {
    match state.form.as_ref().filter(|f| !f.is_modal()) {
        Some(form) => form_view::render(frame, area, form),
        None => frame.render_widget(Block::default().borders(Borders::ALL), area),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply_ui_update;
    use crate::test_support::{buffer_text, farm, session};
    use farmai_app::protocol::{ScreenData, UiUpdate};
    use farmai_app::route::Route;
    use farmai_core::plan::FinalReport;

    #[test]
    fn progress_marks_current_step() {
        let line = step_progress(DataStep::Growth);
        let current = line
            .spans
            .iter()
            .find(|s| s.content.contains("Growth"))
            .unwrap();
        assert!(current.style.add_modifier.contains(Modifier::BOLD));
        let done = line
            .spans
            .iter()
            .find(|s| s.content.contains("Environment"))
            .unwrap();
        assert_eq!(done.style.fg, Some(Color::Green));
    }

    #[test]
    fn final_report_lists_sessions() {
        let mut state = ViewState::default();
        let sessions = vec![session("c1", 2)];
        apply_ui_update(
            &mut state,
            UiUpdate::Screen {
                route: Route::FinalReport {
                    farm_id: "f1".into(),
                },
                data: Box::new(ScreenData::FinalReport {
                    farm: farm(),
                    sessions: sessions.clone(),
                    report: FinalReport::default(),
                }),
            },
        );
        let backend = ratatui::backend::TestBackend::new(120, 30);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render_final_report(frame, frame.area(), &sessions, &state))
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("#1 2025-03-02"));
        assert!(text.contains("Final report"));
    }
}
