// Consulting hub: farm card, session history and plan summary.
//
// Left: sessions table (Round, Visit date, Status), newest first.
// Right: farm details and the consulting plan at a glance.

use chrono::NaiveDate;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;

use farmai_core::farm::Farm;
use farmai_core::plan::ConsultingPlan;
use farmai_core::session::{round_number, ConsultingSession, SessionStatus};

use super::farm_list::format_size;
use super::{heading, labeled};
use crate::layout::split_side;

pub struct ConsultingView<'a> {
    pub farm: &'a Farm,
    pub sessions: &'a [ConsultingSession],
    pub consulting_date: Option<NaiveDate>,
    pub plan: Option<&'a ConsultingPlan>,
    pub selected: usize,
}

pub fn render(frame: &mut Frame, area: Rect, view: ConsultingView<'_>) {
    let (main, side) = split_side(area, 60);
    render_sessions(frame, main, view.sessions, view.selected);
    render_side(frame, side, &view);
}

fn render_sessions(frame: &mut Frame, area: Rect, sessions: &[ConsultingSession], selected: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Sessions ({}) ", sessions.len()));

    if sessions.is_empty() {
        let paragraph = Paragraph::new("No sessions yet. Press s to start consulting.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let header = Row::new(vec![
        Cell::from("Round"),
        Cell::from("Visit date"),
        Cell::from("Status"),
    ])
    .style(
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let rows: Vec<Row> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            Row::new(vec![
                Cell::from(format!("#{}", round_number(i, sessions.len()))),
                Cell::from(s.visit_date.to_string()),
                Cell::from(s.status.label()).style(Style::default().fg(status_color(s.status))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(7),
        Constraint::Length(12),
        Constraint::Min(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol(">> ");

    let mut table_state = TableState::default().with_selected(Some(selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}

pub fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Diagnosis => Color::Yellow,
        SessionStatus::Analysis => Color::Cyan,
        SessionStatus::Solution => Color::Green,
    }
}

fn render_side(frame: &mut Frame, area: Rect, view: &ConsultingView<'_>) {
    let farm = view.farm;
    let mut lines = vec![
        heading(farm.name.clone()),
        labeled("Location", farm.location.clone()),
        labeled("Owner", farm.owner_name.clone()),
        labeled("Size", format_size(farm.size)),
        labeled("Crop", farm.crop.clone().unwrap_or_else(|| "-".to_string())),
        labeled(
            "Consulting date",
            view.consulting_date
                .map_or_else(|| "-".to_string(), |d| d.to_string()),
        ),
        Line::from(""),
        heading("Plan"),
    ];

    match view.plan {
        Some(plan) => {
            let period = match plan.end_date {
                Some(end) => format!("{} to {end}", plan.start_date),
                None => format!("from {}", plan.start_date),
            };
            lines.push(labeled(
                "Sessions",
                format!("{} of {} planned", view.sessions.len(), plan.total_sessions),
            ));
            lines.push(labeled("Period", period));
            if !plan.objectives.trim().is_empty() {
                lines.push(labeled("Objectives", plan.objectives.clone()));
            }
        }
        None => lines.push(Line::from("  No plan yet. Press p to write one.")),
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Farm "))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{buffer_text, farm, session};

    #[test]
    fn sessions_are_numbered_oldest_first() {
        let backend = ratatui::backend::TestBackend::new(100, 12);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let farm = farm();
        let sessions = vec![session("c2", 9), session("c1", 2)];
        terminal
            .draw(|frame| {
                render(
                    frame,
                    frame.area(),
                    ConsultingView {
                        farm: &farm,
                        sessions: &sessions,
                        consulting_date: None,
                        plan: None,
                        selected: 0,
                    },
                )
            })
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        let newest = text.find("2025-03-09").unwrap();
        let oldest = text.find("2025-03-02").unwrap();
        assert!(newest < oldest);
        assert!(text.contains("#2"));
        assert!(text.contains("#1"));
        assert!(text.contains("No plan yet"));
    }

    #[test]
    fn plan_summary_counts_sessions() {
        let backend = ratatui::backend::TestBackend::new(100, 14);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let farm = farm();
        let sessions = vec![session("c1", 2)];
        let plan = ConsultingPlan::new_default(0, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        terminal
            .draw(|frame| {
                render(
                    frame,
                    frame.area(),
                    ConsultingView {
                        farm: &farm,
                        sessions: &sessions,
                        consulting_date: NaiveDate::from_ymd_opt(2025, 3, 2),
                        plan: Some(&plan),
                        selected: 0,
                    },
                )
            })
            .unwrap();
        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains(&format!("1 of {} planned", plan.total_sessions)));
    }
}
