// Ask widget: question input on top, the streamed answer below.
//
// Header: "Answer -- streaming.../complete/error"
// Auto-scroll to bottom while streaming

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use farmai_app::protocol::LlmStatus;

use super::form_view;
use crate::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(area);

    match &state.form {
        Some(form) => form_view::render(frame, rows[0], form),
        None => frame.render_widget(Block::default().borders(Borders::ALL), rows[0]),
    }
    render_answer(frame, rows[1], state);
}

fn render_answer(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = Vec::new();
    if !state.ask_question.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Q: {}", state.ask_question),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
    }
    if state.ask_answer.is_empty() {
        lines.push(Line::from(Span::styled(
            placeholder_text(state.ask_status),
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.extend(state.ask_answer.lines().map(|l| Line::from(l.to_string())));
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = if state.ask_status == LlmStatus::Streaming && lines.len() > inner_height {
        (lines.len() - inner_height) as u16
    } else {
        state.scroll
    };

    let (status_text, status_color) = status_indicator(state.ask_status);
    let title = Line::from(vec![
        Span::styled(" Answer", Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" -- ", Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{status_text} "), Style::default().fg(status_color)),
    ]);

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Return status text and color for the model status.
pub fn status_indicator(status: LlmStatus) -> (&'static str, Color) {
    match status {
        LlmStatus::Idle => ("ready", Color::DarkGray),
        LlmStatus::Pending => ("waiting...", Color::Yellow),
        LlmStatus::Streaming => ("streaming...", Color::Yellow),
        LlmStatus::Complete => ("complete", Color::Green),
        LlmStatus::Error => ("error", Color::Red),
    }
}

fn placeholder_text(status: LlmStatus) -> &'static str {
    match status {
        LlmStatus::Idle => "Type a question about this farm and press Enter.",
        LlmStatus::Pending | LlmStatus::Streaming => "Waiting for the answer...",
        LlmStatus::Complete => "The model returned an empty answer.",
        LlmStatus::Error => "The answer could not be generated.",
    }
}
