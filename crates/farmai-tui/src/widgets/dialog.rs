// Overlay dialogs: y/n confirmation, notices and the `:` path prompt.
//
// All are centered over the whole frame and clear the area behind them.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use farmai_app::protocol::{Notice, NoticeLevel};

use crate::layout::centered_rect;

const DIALOG_WIDTH: u16 = 60;

fn dialog_block(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Span::styled(
            format!(" {title} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
}

/// Height for `text` wrapped inside a dialog, plus borders and `extra` rows.
fn dialog_height(text: &str, extra: u16) -> u16 {
    let inner = usize::from(DIALOG_WIDTH.saturating_sub(4)).max(1);
    let rows: usize = text
        .lines()
        .map(|l| l.chars().count().div_ceil(inner).max(1))
        .sum();
    u16::try_from(rows.max(1))
        .unwrap_or(u16::MAX)
        .saturating_add(2 + extra)
}

/// A question answered with y or n.
pub fn render_confirm(frame: &mut Frame, area: Rect, title: &str, message: &str) {
    let dialog_area = centered_rect(DIALOG_WIDTH, dialog_height(message, 2), area);
    frame.render_widget(Clear, dialog_area);

    let mut lines: Vec<Line> = message.lines().map(|l| Line::from(format!(" {l}"))).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw(" ("),
        Span::styled("y", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
        Span::raw("/"),
        Span::styled("n", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw(")"),
    ]));

    let paragraph = Paragraph::new(lines)
        .block(dialog_block(title, Color::Yellow))
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, dialog_area);
}

/// A message dismissed with any key.
pub fn render_notice(frame: &mut Frame, area: Rect, notice: &Notice) {
    let (title, color) = match notice.level {
        NoticeLevel::Info => ("Notice", Color::Cyan),
        NoticeLevel::Error => ("Error", Color::Red),
    };
    let dialog_area = centered_rect(DIALOG_WIDTH, dialog_height(&notice.message, 2), area);
    frame.render_widget(Clear, dialog_area);

    let mut lines: Vec<Line> = notice
        .message
        .lines()
        .map(|l| Line::from(format!(" {l}")))
        .collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Press any key",
        Style::default().fg(Color::DarkGray),
    )));

    let paragraph = Paragraph::new(lines)
        .block(dialog_block(title, color))
        .style(Style::default().bg(Color::Black))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, dialog_area);
}

/// The `:` prompt for jumping to a route path.
pub fn render_goto(frame: &mut Frame, area: Rect, path: &str) {
    let dialog_area = centered_rect(DIALOG_WIDTH, 3, area);
    frame.render_widget(Clear, dialog_area);

    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(" :", Style::default().fg(Color::Yellow)),
        Span::raw(format!("{path}_")),
    ]))
    .block(dialog_block("Go to", Color::Yellow))
    .style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, dialog_area);
}
