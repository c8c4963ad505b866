// Consulting report widget.
//
// Shows the stored report for a session (or the farm's latest one) as one
// scrollable document. A placeholder report carries a red banner so it is
// never mistaken for an analysis of the farm.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;
use serde_json::{Map, Value};

use farmai_app::protocol::LlmStatus;
use farmai_core::report::{ConsultingReport, GeneratedReport, ReportSource};
use farmai_core::session::ConsultingSession;

use super::{bullets, heading, labeled};
use crate::ViewState;

pub fn render(
    frame: &mut Frame,
    area: Rect,
    session: Option<&ConsultingSession>,
    report: Option<&GeneratedReport>,
    state: &ViewState,
) {
    let title = match session {
        Some(s) => format!(" Report: visit of {} ", s.visit_date),
        None => " Report: latest ".to_string(),
    };

    let lines = match report {
        Some(generated) => report_lines(generated),
        None => vec![pending_line(state.report_status)],
    };

    let border = match report.map(|r| &r.source) {
        Some(ReportSource::Fallback { .. }) => Style::default().fg(Color::Red),
        _ => Style::default(),
    };

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(border),
        )
        .wrap(Wrap { trim: false })
        .scroll((state.scroll, 0));
    frame.render_widget(paragraph, area);
}

fn pending_line(status: LlmStatus) -> Line<'static> {
    match status {
        LlmStatus::Error => Line::from(Span::styled(
            "Report generation failed. Press g to try again.",
            Style::default().fg(Color::Red),
        )),
        _ => Line::from(Span::styled(
            "Generating report...",
            Style::default().fg(Color::Yellow),
        )),
    }
}

/// Full document for a generated report.
pub fn report_lines(generated: &GeneratedReport) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match &generated.source {
        ReportSource::Generated { model } => lines.push(Line::from(Span::styled(
            format!(
                "Generated by {model} at {}",
                generated.generated_at.format("%Y-%m-%d %H:%M")
            ),
            Style::default().fg(Color::DarkGray),
        ))),
        ReportSource::Fallback { reason } => {
            lines.push(Line::from(Span::styled(
                format!(" PLACEHOLDER REPORT: {reason} "),
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Red)
                    .add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                "Only recorded data is shown. Press g to generate again.",
                Style::default().fg(Color::Red),
            )));
        }
    }
    lines.push(Line::from(""));

    push_body(&mut lines, &generated.report);
    lines
}

fn push_body(lines: &mut Vec<Line<'static>>, report: &ConsultingReport) {
    let info = &report.consulting_info;
    lines.push(heading("Consulting information"));
    lines.push(labeled("Date", format!("{} {}", info.date, info.time).trim().to_string()));
    lines.push(labeled("Farm", info.target.clone()));
    lines.push(labeled("Consultant", info.consultant.clone()));
    lines.push(labeled("Location", info.location.clone()));
    lines.push(Line::from(""));

    lines.push(heading("Data summary"));
    let mut any_data = false;
    for (label, values) in report.data_summary.sections() {
        if values.is_empty() {
            continue;
        }
        any_data = true;
        lines.push(Line::from(Span::styled(
            format!("  {label}"),
            Style::default().fg(Color::Cyan),
        )));
        lines.extend(map_lines(values));
    }
    if !any_data {
        lines.extend(bullets(&[]));
    }
    lines.push(Line::from(""));

    let diagnosis = &report.diagnosis;
    lines.push(heading(format!(
        "Diagnosis: {:.0} ({})",
        diagnosis.overall_score, diagnosis.overall_status
    )));
    for (label, area) in diagnosis.areas() {
        lines.push(Line::from(format!(
            "  {label}: {:.0} {}",
            area.score, area.status
        )));
        for issue in &area.issues {
            lines.push(Line::from(format!("      - {issue}")));
        }
    }
    push_list(lines, "Strengths", &diagnosis.strengths);
    push_list(lines, "Weaknesses", &diagnosis.weaknesses);
    push_list(lines, "Risks", &diagnosis.risks);
    lines.push(Line::from(""));

    let requests = &report.requests;
    lines.push(heading("Requests"));
    push_list(lines, "Main concerns", &requests.main_concerns);
    push_list(lines, "Requirements", &requests.requirements);
    if !requests.priority_questions.is_empty() {
        lines.push(Line::from("  Priority questions"));
        for q in &requests.priority_questions {
            lines.push(Line::from(format!(
                "  - {} [{} / {}]",
                q.question, q.priority, q.category
            )));
        }
    }
    push_list(lines, "Potential needs", &requests.potential_needs);
    push_list(lines, "Focus areas", &requests.focus_areas);
    lines.push(Line::from(""));

    lines.push(heading("Solutions"));
    if report.solutions.recommendations.is_empty() {
        lines.extend(bullets(&[]));
    }
    for rec in &report.solutions.recommendations {
        lines.push(Line::from(Span::styled(
            format!("  {} ({})", rec.title, rec.priority),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        if !rec.description.is_empty() {
            lines.push(Line::from(format!("    {}", rec.description)));
        }
        if !rec.timeline.is_empty() || !rec.cost.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("    Timeline: {}  Cost: {}", rec.timeline, rec.cost),
                Style::default().fg(Color::Gray),
            )));
        }
    }
    for item in &report.solutions.action_items {
        lines.push(Line::from(format!(
            "  [{}] {} ({}, by {})",
            item.status, item.action, item.responsible, item.deadline
        )));
    }
    lines.push(Line::from(""));

    let plans = &report.future_plans;
    lines.push(heading("Future plans"));
    push_list(lines, "Short term", &plans.short_term);
    push_list(lines, "Medium term", &plans.medium_term);
    push_list(lines, "Long term", &plans.long_term);
    for m in &plans.milestones {
        lines.push(Line::from(format!(
            "  * {} by {}: {}",
            m.milestone, m.target_date, m.success_criteria
        )));
    }
}

fn push_list(lines: &mut Vec<Line<'static>>, label: &str, items: &[String]) {
    lines.push(Line::from(format!("  {label}")));
    lines.extend(
        bullets(items)
            .into_iter()
            .map(|line| Line::from(format!("  {line}"))),
    );
}

fn map_lines(values: &Map<String, Value>) -> Vec<Line<'static>> {
    values
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Line::from(format!("    {key}: {text}"))
        })
        .collect()
}
