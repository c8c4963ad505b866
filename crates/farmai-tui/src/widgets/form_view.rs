// Form widget: labelled text fields with the focused one highlighted.
//
// Screen forms fill the body; modal forms are drawn in a centered dialog
// over the screen they belong to.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::form::Form;
use crate::layout::centered_rect;

const MODAL_WIDTH: u16 = 70;

/// Render `form` into `area` with a titled border.
pub fn render(frame: &mut Frame, area: Rect, form: &Form) {
    let (lines, focus_line) = form_lines(form);

    // Keep the focused field in view.
    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = (focus_line + 2).saturating_sub(inner_height) as u16;

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", form.title)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Render `form` as a centered dialog over `area`.
pub fn render_modal(frame: &mut Frame, area: Rect, form: &Form) {
    let (lines, focus_line) = form_lines(form);
    let height = u16::try_from(lines.len()).unwrap_or(u16::MAX).saturating_add(2);
    let dialog_area = centered_rect(MODAL_WIDTH, height, area);

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            format!(" {} ", form.title),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));
    let inner_height = dialog_area.height.saturating_sub(2) as usize;
    let scroll = (focus_line + 2).saturating_sub(inner_height) as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, dialog_area);
}

/// Lines for every field plus the index of the focused field's label line.
pub fn form_lines(form: &Form) -> (Vec<Line<'static>>, usize) {
    let mut lines = Vec::new();
    let mut focus_line = 0;

    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focus;
        if focused {
            focus_line = lines.len();
        }

        let label_style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let marker = if focused { "> " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{marker}{}", field.label),
            label_style,
        )));

        let value_style = if focused {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        };
        let mut value_lines: Vec<String> = field.value.split('\n').map(str::to_string).collect();
        if focused {
            if let Some(last) = value_lines.last_mut() {
                last.push('_');
            }
        }
        for text in value_lines {
            lines.push(Line::from(Span::styled(format!("    {text}"), value_style)));
        }
    }

    (lines, focus_line)
}
