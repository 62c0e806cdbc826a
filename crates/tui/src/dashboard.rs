use std::{collections::BTreeSet, path::Path};

use code_window::{CodeWindow, DisplayLine};
use eyre::WrapErr;
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Paragraph, Wrap},
};
use state::{ActivityEntry, ActivityStatus, CodeLocation, DebugState, SharedState};
use tailer::StatsSnapshot;

use crate::widgets::ErrorPanel;

const TITLE: &str = "MCP Debugger";

/// Content of one frame, composed from a state snapshot
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub header: Line<'static>,
    pub activity: Text<'static>,
    pub code_title: String,
    pub code: Text<'static>,
}

pub fn compose(
    state: &SharedState,
    window: &mut CodeWindow,
    stats: &StatsSnapshot,
) -> eyre::Result<Dashboard> {
    let state = state.snapshot().wrap_err("taking state snapshot")?;
    let (code_title, code) = code_panel(&state, window);
    Ok(Dashboard {
        header: header_line(&state, stats),
        activity: activity_text(&state),
        code_title,
        code,
    })
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn placeholder(text: &'static str) -> Text<'static> {
    Text::from(Line::styled(
        text,
        dim().add_modifier(Modifier::ITALIC),
    ))
}

fn header_line(state: &DebugState, stats: &StatsSnapshot) -> Line<'static> {
    let mut spans = vec![Span::styled(
        TITLE,
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(id) = &state.session_id {
        let session = match &state.session_name {
            Some(name) => name.clone(),
            None => format!("{}...", id.chars().take(8).collect::<String>()),
        };
        spans.push(Span::styled(" - Session: ", dim()));
        spans.push(Span::styled(session, Style::default().fg(Color::Cyan)));
    }

    if let Some(location) = &state.current_location {
        spans.push(Span::styled(" | ", dim()));
        spans.push(Span::styled(
            location.to_string(),
            Style::default().fg(Color::Yellow),
        ));
    }

    spans.push(Span::styled(" | ", dim()));
    if state.is_paused {
        spans.push(Span::styled(
            "[PAUSED]",
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ));
    } else {
        spans.push(Span::styled(
            "[RUNNING]",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let dropped = stats.dropped();
    if dropped > 0 {
        spans.push(Span::styled(" | ", dim()));
        spans.push(Span::styled(
            format!("{dropped} dropped lines"),
            Style::default().fg(Color::Red),
        ));
    }

    Line::from(spans)
}

fn status_icon(status: ActivityStatus) -> (&'static str, Color) {
    match status {
        ActivityStatus::Calling => ("⟳", Color::Blue),
        ActivityStatus::Success => ("✓", Color::Green),
        ActivityStatus::Error => ("✗", Color::Red),
        ActivityStatus::Info => ("•", Color::Cyan),
        ActivityStatus::Warning => ("!", Color::Yellow),
    }
}

fn activity_lines(entry: &ActivityEntry) -> Vec<Line<'static>> {
    let (icon, color) = status_icon(entry.status);
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{icon} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            entry.tool.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", entry.timestamp.format("%H:%M:%S")), dim()),
    ])];
    if !entry.details.is_empty() {
        lines.push(Line::styled(format!("  {}", entry.details), dim()));
    }
    lines
}

/// Most recent entry first
fn activity_text(state: &DebugState) -> Text<'static> {
    if state.activity_len() == 0 {
        return placeholder("No activity yet");
    }
    Text::from(
        state
            .activity()
            .rev()
            .flat_map(activity_lines)
            .collect::<Vec<_>>(),
    )
}

/// Line the code window centres on: the current line, else the first breakpoint, else the top
fn focus_line(current_line: Option<usize>, breakpoints: &BTreeSet<usize>) -> usize {
    current_line
        .filter(|line| *line > 0)
        .or_else(|| breakpoints.first().copied())
        .unwrap_or(1)
}

fn code_line(line: &DisplayLine) -> Line<'static> {
    let Some(number) = line.number else {
        return Line::styled(line.to_string(), Style::default().fg(Color::Red));
    };

    let marker_style = match (line.breakpoint, line.current) {
        (true, true) => Style::default()
            .fg(Color::Red)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        (true, false) => Style::default()
            .fg(Color::Red)
            .add_modifier(Modifier::BOLD),
        (false, true) => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        (false, false) => Style::default(),
    };
    let code_style = if line.current {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::styled(format!("{number:>3} "), dim()),
        Span::styled(line.markers(), marker_style),
        Span::raw(" "),
        Span::styled(line.text.clone(), code_style),
    ])
}

fn variable_lines(state: &DebugState) -> Vec<Line<'static>> {
    if state.variables().is_empty() {
        return Vec::new();
    }
    let mut lines = vec![
        Line::styled("─".repeat(50), dim()),
        Line::styled(
            "Variables:",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    lines.extend(state.variables().iter().map(|(name, value)| {
        Line::from(vec![
            Span::styled(
                name.clone(),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" = ", dim()),
            Span::styled(value.clone(), Style::default().fg(Color::Yellow)),
        ])
    }));
    lines
}

fn code_panel(state: &DebugState, window: &mut CodeWindow) -> (String, Text<'static>) {
    let Some(CodeLocation { file_path, line }) = &state.current_location else {
        return ("Code View".to_string(), placeholder("No file loaded"));
    };

    let breakpoints = state.breakpoints_for_file(file_path);
    let focus = focus_line(Some(*line), &breakpoints);
    window.invalidate_if_modified(file_path);
    let view = window.get_window(file_path, focus, &breakpoints, Some(*line));

    let mut lines: Vec<Line<'static>> = view.lines.iter().map(code_line).collect();
    lines.extend(variable_lines(state));

    let title = format!(
        "{} (lines {}-{})",
        basename(file_path),
        view.start,
        view.end
    );
    (title, Text::from(lines))
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Header on top, activity and code side by side below
pub fn draw(frame: &mut Frame, dashboard: &eyre::Result<Dashboard>) {
    let [header_area, body_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(frame.area());

    let header_block = Block::bordered().style(Style::default().bg(Color::Black));
    let dashboard = match dashboard {
        Ok(dashboard) => dashboard,
        Err(e) => {
            tracing::warn!(error = %e, "could not compose frame");
            frame.render_widget(
                Paragraph::new(Line::styled(
                    TITLE,
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::BOLD),
                ))
                .block(header_block),
                header_area,
            );
            frame.render_widget(ErrorPanel::new(e), body_area);
            return;
        }
    };

    frame.render_widget(
        Paragraph::new(dashboard.header.clone()).block(header_block),
        header_area,
    );

    let [tools_area, code_area] =
        Layout::horizontal([Constraint::Ratio(2, 5), Constraint::Ratio(3, 5)]).areas(body_area);

    frame.render_widget(
        Paragraph::new(dashboard.activity.clone())
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .title(Line::styled(
                        "MCP Tool Activity",
                        Style::default()
                            .fg(Color::Blue)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .border_style(Style::default().fg(Color::Blue)),
            ),
        tools_area,
    );

    frame.render_widget(
        Paragraph::new(dashboard.code.clone()).block(
            Block::bordered()
                .title(Line::styled(
                    dashboard.code_title.clone(),
                    Style::default()
                        .fg(Color::Green)
                        .add_modifier(Modifier::BOLD),
                ))
                .border_style(Style::default().fg(Color::Green)),
        ),
        code_area,
    );
}
