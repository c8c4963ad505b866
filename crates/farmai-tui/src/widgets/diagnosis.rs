// Diagnosis sheet widget: rubric items with their levels and the score.
//
// Left: every rubric item grouped by category, selected item highlighted.
// Right: level descriptions of the selected item, then the score breakdown
// and the general information entered so far.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use farmai_core::diagnosis::{DiagnosisSheet, Level, RubricItem, GENERAL_INFO_FIELDS, RUBRIC};

use super::heading;
use crate::layout::split_side;

/// Rubric items in display order, across all categories.
pub fn rubric_items() -> Vec<&'static RubricItem> {
    RUBRIC.iter().flat_map(|c| c.items.iter()).collect()
}

pub fn render(
    frame: &mut Frame,
    area: Rect,
    sheet: &DiagnosisSheet,
    selected: usize,
    unsaved: bool,
) {
    let (main, side) = split_side(area, 55);
    render_items(frame, main, sheet, selected, unsaved);
    render_detail(frame, side, sheet, selected);
}

fn render_items(
    frame: &mut Frame,
    area: Rect,
    sheet: &DiagnosisSheet,
    selected: usize,
    unsaved: bool,
) {
    let mut lines = Vec::new();
    let mut selected_line = 0;
    let mut index = 0;

    for category in RUBRIC {
        lines.push(Line::from(Span::styled(
            category.label,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        for item in category.items {
            let is_selected = index == selected;
            if is_selected {
                selected_line = lines.len();
            }
            let level = level_text(sheet.level(item.key));
            let style = if is_selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            lines.push(
                Line::from(vec![
                    Span::raw(if is_selected { ">> " } else { "   " }),
                    Span::styled(format!("{level:<4}"), level_style(sheet.level(item.key))),
                    Span::raw(format!("{} (x{})", item.label, item.weight)),
                ])
                .style(style),
            );
            index += 1;
        }
    }

    let inner_height = area.height.saturating_sub(2) as usize;
    let scroll = (selected_line + 1).saturating_sub(inner_height) as u16;

    let title = if unsaved {
        " Diagnosis (unsaved) "
    } else {
        " Diagnosis "
    };
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Roman numeral of a level, `-` when unset.
pub fn level_text(level: Option<Level>) -> &'static str {
    level.map_or("-", Level::roman)
}

fn level_style(level: Option<Level>) -> Style {
    match level.map(Level::get) {
        None => Style::default().fg(Color::DarkGray),
        Some(1 | 2) => Style::default().fg(Color::Red),
        Some(3) => Style::default().fg(Color::Yellow),
        Some(_) => Style::default().fg(Color::Green),
    }
}

fn render_detail(frame: &mut Frame, area: Rect, sheet: &DiagnosisSheet, selected: usize) {
    let mut lines = Vec::new();

    if let Some(item) = rubric_items().get(selected) {
        let current = sheet.level(item.key).map(Level::get);
        lines.push(heading(item.label));
        for (i, description) in item.levels.iter().enumerate() {
            let value = (i + 1) as u8;
            let style = if current == Some(value) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(format!(" {value}. {description}"), style)));
        }
        lines.push(Line::from(""));
    }

    let score = sheet.score();
    lines.push(heading(format!("Score {:.1} / {:.0}", score.total, score.max)));
    for category in &score.categories {
        lines.push(Line::from(format!(
            "  {}: {:.1} / {:.0} ({}/{})",
            category.label, category.score, category.max, category.assessed, category.items
        )));
    }

    lines.push(Line::from(""));
    lines.push(heading("General information"));
    let filled: Vec<Line> = GENERAL_INFO_FIELDS
        .iter()
        .filter_map(|spec| {
            sheet
                .general
                .get(spec.key)
                .map(|v| Line::from(format!("  {}: {v}", spec.display_label())))
        })
        .collect();
    if filled.is_empty() {
        lines.push(Line::from(Span::styled(
            "  Press g to fill in.",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.extend(filled);
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Levels "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::buffer_text;

    #[test]
    fn items_cover_every_category() {
        let total: usize = RUBRIC.iter().map(|c| c.items.len()).sum();
        assert_eq!(rubric_items().len(), total);
        assert_eq!(rubric_items()[0].key, RUBRIC[0].items[0].key);
    }

    #[test]
    fn level_text_values() {
        assert_eq!(level_text(None), "-");
        assert_eq!(level_text(Level::new(1)), Level::new(1).unwrap().roman());
    }

    #[test]
    fn render_shows_score_and_selected_levels() {
        let mut sheet = DiagnosisSheet::default();
        let item = rubric_items()[0];
        sheet.set_level(item.key, Level::new(5).unwrap()).unwrap();

        let backend = ratatui::backend::TestBackend::new(140, 60);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), &sheet, 0, true))
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("Diagnosis (unsaved)"));
        assert!(text.contains(&format!("Score {:.1}", sheet.score().total)));
        assert!(text.contains("Press g to fill in."));
    }
}
