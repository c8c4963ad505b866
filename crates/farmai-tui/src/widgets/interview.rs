// Interview widget: recorded Q&A on the left, suggested questions on the
// right.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use farmai_core::interview::InterviewLog;

use crate::layout::split_side;
use crate::ViewState;

pub fn render(frame: &mut Frame, area: Rect, log: &InterviewLog, state: &ViewState) {
    let (main, side) = split_side(area, 60);
    render_log(frame, main, log, state.selected);
    render_suggestions(frame, side, state);
}

fn render_log(frame: &mut Frame, area: Rect, log: &InterviewLog, selected: usize) {
    let mut lines = Vec::new();
    let mut selected_line = 0;

    for (i, entry) in log.entries().iter().enumerate() {
        let is_selected = i == selected;
        if is_selected {
            selected_line = lines.len();
        }
        let marker = if is_selected { ">> " } else { "   " };
        let question_style = if is_selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(Span::styled(
            format!("{marker}Q{}. {}", i + 1, entry.question),
            question_style,
        )));
        for text in entry.answer.lines() {
            lines.push(Line::from(format!("      {text}")));
        }
        lines.push(Line::from(""));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No answers recorded. Press n to add one or t to transcribe a recording.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = (selected_line + 2).saturating_sub(inner_height) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" Interview ({}) ", log.len())),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

fn render_suggestions(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut lines = Vec::new();

    if state.suggestions_fallback {
        lines.push(Line::from(Span::styled(
            "Default questions (no model answer)",
            Style::default().fg(Color::Yellow),
        )));
        lines.push(Line::from(""));
    }

    for (i, suggestion) in state.suggestions.iter().take(9).enumerate() {
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}. ", i + 1),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(suggestion.question.clone()),
        ]));
        if !suggestion.reason.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("   {}", suggestion.reason),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    if state.suggestions.is_empty() {
        let hint = if state.busy.is_some() {
            "Thinking..."
        } else {
            "Press s for question suggestions."
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray))));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Suggested "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
