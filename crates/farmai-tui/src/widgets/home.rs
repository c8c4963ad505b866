// Home screen: what the tool is, which backends are active.

use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use super::{heading, labeled};

pub fn render(frame: &mut Frame, area: Rect, backend: &str, llm_model: Option<&str>) {
    let model = match llm_model {
        Some(model) => Span::styled(model.to_string(), Style::default().fg(Color::Green)),
        None => Span::styled(
            "not configured (reports use placeholders)",
            Style::default().fg(Color::Yellow),
        ),
    };

    let lines = vec![
        heading("Farm consulting assistant"),
        Line::from(""),
        Line::from("Record farm data, score the diagnosis sheet, log the interview"),
        Line::from("and turn it all into a consulting report."),
        Line::from(""),
        labeled("Storage", backend),
        Line::from(vec![
            Span::styled("Model: ", Style::default().fg(Color::Gray)),
            model,
        ]),
        Line::from(""),
        Line::from("Press f to open your farms."),
    ];

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" FarmAI "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}
