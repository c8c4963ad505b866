// Farm list widget: table of registered farms.
//
// Columns: Name, Location, Owner, Size, Crop. Selected row highlighted.

use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use farmai_core::farm::Farm;

pub fn render(frame: &mut Frame, area: Rect, farms: &[Farm], selected: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" My farms ({}) ", farms.len()));

    if farms.is_empty() {
        let paragraph = Paragraph::new(Line::from("No farms yet. Press n to register one."))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Name"),
        Cell::from("Location"),
        Cell::from("Owner"),
        Cell::from("Size"),
        Cell::from("Crop"),
    ])
    .style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = farms
        .iter()
        .map(|f| {
            Row::new(vec![
                Cell::from(f.name.clone()),
                Cell::from(f.location.clone()),
                Cell::from(f.owner_name.clone()),
                Cell::from(format_size(f.size)),
                Cell::from(f.crop.clone().unwrap_or_else(|| "-".to_string())),
            ])
        })
        .collect();

    let widths = [
        Constraint::Min(16),
        Constraint::Min(12),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol(">> ");

    let mut table_state = TableState::default().with_selected(Some(selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}

/// Area in square metres, `-` when unknown.
pub fn format_size(size: Option<f64>) -> String {
    match size {
        Some(s) if s.fract() == 0.0 => format!("{s:.0} m²"),
        Some(s) => format!("{s:.1} m²"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{buffer_text, farm};

    #[test]
    fn format_size_values() {
        assert_eq!(format_size(Some(1650.0)), "1650 m²");
        assert_eq!(format_size(Some(12.4)), "12.4 m²");
        assert_eq!(format_size(None), "-");
    }

    #[test]
    fn render_lists_farms() {
        let backend = ratatui::backend::TestBackend::new(90, 8);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), &[farm()], 0))
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Sunrise Berries"));
        assert!(text.contains("My farms (1)"));
    }

    #[test]
    fn render_empty_hint() {
        let backend = ratatui::backend::TestBackend::new(60, 5);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), &[], 0))
            .unwrap();
        assert!(buffer_text(terminal.backend().buffer()).contains("No farms yet"));
    }
}
