use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
};
use rehab_core::{Role, SessionPhase, SessionStats, StatsStatus};
use rehab_transport::tui::RadialView;

use crate::app::App;

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(8), Constraint::Length(1)])
        .split(f.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(rows[0]);

    let phase = app.controller.phase();
    if phase.is_selecting() {
        protocols(f, app, top[0]);
    } else {
        stats(f, &app.controller.stats(), top[0]);
    }

    let title = if app.frame.as_ref().is_some_and(|frame| frame.speaking) {
        "Coach (speaking)"
    } else {
        "Coach"
    };
    f.render_widget(
        RadialView::new(app.frame.as_ref())
            .block(Block::default().borders(Borders::ALL).title(title)),
        top[1],
    );

    transcript(f, app, rows[1]);
    status_bar(f, app, phase, rows[2]);
}

fn protocols(f: &mut Frame, app: &App, area: Rect) {
    let selected = app.controller.selected_protocol();
    let items: Vec<ListItem> = App::protocols()
        .iter()
        .map(|p| {
            let mark = if selected.as_ref().is_some_and(|s| s.id == p.id) {
                "* "
            } else {
                "  "
            };
            ListItem::new(Line::from(vec![
                Span::raw(mark),
                Span::raw(p.display_name.as_str()),
                Span::styled(
                    format!("  {}x{}", p.rep_count, p.set_count),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Protocols"))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.cursor));
    f.render_stateful_widget(list, area, &mut state);
}

fn stats(f: &mut Frame, stats: &SessionStats, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Session");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .label(format!("form {:.0}%", stats.form_score))
            .ratio(f64::from(stats.form_score / 100.0).clamp(0.0, 1.0)),
        rows[0],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Cyan))
            .label(format!("rep {}/{}", stats.current_rep, stats.total_reps))
            .ratio(fraction(stats.current_rep, stats.total_reps)),
        rows[1],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(Color::Blue))
            .label(format!("sets {}/{}", stats.sets_completed, stats.total_sets))
            .ratio(fraction(stats.sets_completed, stats.total_sets)),
        rows[2],
    );

    let (label, color) = match stats.status {
        StatsStatus::Idle => ("idle", Color::DarkGray),
        StatsStatus::Active => ("tracking", Color::Yellow),
        StatsStatus::Good => ("good form", Color::Green),
        StatsStatus::Correct => ("correcting", Color::Red),
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw(format!(
                "{:02}:{:02}  angle {:.0}°  ",
                stats.elapsed_seconds / 60,
                stats.elapsed_seconds % 60,
                stats.joint_angle_degrees
            )),
            Span::styled(label, Style::default().fg(color)),
        ])),
        rows[3],
    );
}

fn fraction(n: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        (f64::from(n) / f64::from(total)).clamp(0.0, 1.0)
    }
}

fn transcript(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .transcript
        .iter()
        .map(|m| {
            let (who, color) = match m.role {
                Role::Agent => ("coach", Color::Cyan),
                Role::User => ("you", Color::Yellow),
            };
            Line::from(vec![
                Span::styled(format!("{who}: "), Style::default().fg(color)),
                Span::raw(m.text.as_str()),
            ])
        })
        .collect();
    let visible = usize::from(area.height.saturating_sub(2));
    let skip = lines.len().saturating_sub(visible);
    let paragraph = Paragraph::new(lines.into_iter().skip(skip).collect::<Vec<_>>())
        .block(Block::default().borders(Borders::ALL).title("Transcript"))
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn status_bar(f: &mut Frame, app: &App, phase: SessionPhase, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let mut spans = vec![Span::raw(format!(" {phase} "))];
    if let Some(id) = app.controller.session_id() {
        let link = if app.controller.is_live() { "live" } else { "demo" };
        spans.push(Span::styled(
            format!("{id} ({link}) "),
            Style::default().fg(Color::DarkGray),
        ));
    }
    spans.push(Span::raw("| "));
    match phase {
        SessionPhase::Idle | SessionPhase::Setup => {
            spans.extend([
                key("p"),
                Span::raw(" protocols "),
                key("j/k"),
                Span::raw(" move "),
                key("Enter"),
                Span::raw(" choose "),
                key("s"),
                Span::raw(" start "),
            ]);
        }
        SessionPhase::Active => spans.extend([key("e"), Span::raw(" end ")]),
        SessionPhase::Summary => spans.extend([key("r"), Span::raw(" reset ")]),
    }
    spans.extend([key("q"), Span::raw(" quit")]);
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
