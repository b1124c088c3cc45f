use crate::state::{App, Focus};
use crate::theme;
use chrono::NaiveDateTime;
use metalog_core::{
    GroupSummary, MetadataPane, ProcessRecord, RunSummary, StatusCounts, TaskStatus,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Percentage(35),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(area);
    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(outer[2]);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(lower[0]);

    render_header(f, app, outer[0]);
    render_runs(f, app, outer[1]);
    render_groups(f, app, left[0]);
    render_processes(f, app, left[1]);
    render_metadata(f, app, lower[1]);
    render_status(f, app, outer[3]);

    if app.show_help {
        render_help(f, centered_rect(50, 60, area));
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let border_style = if focused {
        Style::default().fg(theme::FOCUS_BORDER)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style)
}

fn render_placeholder(f: &mut Frame, block: Block<'_>, area: Rect, message: &str) {
    let inner = block.inner(area);
    f.render_widget(block, area);
    let p = Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(theme::MUTED),
    )))
    .wrap(Wrap { trim: true });
    f.render_widget(p, inner);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled("metalog ", theme::HEADER_STYLE),
        Span::raw(app.config.db_path.display().to_string()),
        Span::styled(
            format!("  refresh every {}s", app.scheduler.period().as_secs()),
            Style::default().fg(theme::MUTED),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn render_runs(f: &mut Frame, app: &mut App, area: Rect) {
    let block = pane_block("Runs", app.focus == Focus::Runs);
    let runs = &app.dashboard.view().runs;
    if runs.is_empty() {
        render_placeholder(f, block, area, "No runs recorded yet");
        return;
    }

    let rows: Vec<Row> = runs.iter().enumerate().map(|(i, run)| run_row(i, run)).collect();
    let widths = [
        Constraint::Min(20),
        Constraint::Length(19),
        Constraint::Length(8),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["Run", "Last ingested", "Tasks"]).style(theme::HEADER_STYLE))
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.run_state);
}

fn run_row(index: usize, run: &RunSummary) -> Row<'_> {
    Row::new(vec![
        Cell::from(run.run_name.as_str()),
        Cell::from(format_time(run.last_ingested)),
        Cell::from(run.total_tasks.to_string()),
    ])
    .style(theme::zebra_row_style(index))
}

fn render_groups(f: &mut Frame, app: &mut App, area: Rect) {
    let block = pane_block("Groups", app.focus == Focus::Groups);
    let view = app.dashboard.view();
    if view.selection.run.is_none() {
        render_placeholder(f, block, area, "Select a run");
        return;
    }
    if view.groups.is_empty() {
        render_placeholder(f, block, area, "No groups in this run");
        return;
    }

    let rows: Vec<Row> = view
        .groups
        .iter()
        .enumerate()
        .map(|(i, group)| group_row(i, group))
        .collect();
    let widths = [
        Constraint::Min(12),
        Constraint::Length(7),
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(6),
    ];
    let header = Row::new(vec![
        "Group",
        "Total",
        "Submitted",
        "Running",
        "Completed",
        "Failed",
        "Cached",
        "Other",
    ])
    .style(theme::HEADER_STYLE);
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.group_state);
}

fn group_row(index: usize, group: &GroupSummary) -> Row<'_> {
    let mut cells = vec![
        Cell::from(group.group_id.as_str()),
        Cell::from(group.total_tasks.to_string()),
    ];
    for (count, color) in status_cells(&group.counts) {
        cells.push(Cell::from(Span::styled(
            count.to_string(),
            Style::default().fg(color),
        )));
    }
    Row::new(cells).style(theme::zebra_row_style(index))
}

/// Counts in column order, ending with unrecognized statuses so a row always
/// adds up to its total.
fn status_cells(counts: &StatusCounts) -> Vec<(u64, Color)> {
    TaskStatus::KNOWN
        .into_iter()
        .chain([TaskStatus::Unknown])
        .map(|status| {
            let count = counts.get(status);
            let color = match (count, status) {
                (0, _) => theme::MUTED,
                (_, TaskStatus::Unknown) => Color::Magenta,
                _ => theme::status_color(status),
            };
            (count, color)
        })
        .collect()
}

fn format_time(value: Option<NaiveDateTime>) -> String {
    value
        .map(|at| at.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn render_processes(f: &mut Frame, app: &mut App, area: Rect) {
    let block = pane_block("Processes", app.focus == Focus::Processes);
    let view = app.dashboard.view();
    if view.selection.group.is_none() {
        render_placeholder(f, block, area, "Select a group");
        return;
    }
    if view.processes.is_empty() {
        render_placeholder(f, block, area, "No processes in this group");
        return;
    }

    let rows: Vec<Row> = view
        .processes
        .iter()
        .enumerate()
        .map(|(i, record)| process_row(i, record))
        .collect();
    let widths = [
        Constraint::Min(14),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Length(19),
    ];
    let table = Table::new(rows, widths)
        .header(
            Row::new(vec!["Process", "Task ID", "Status", "Ingested"]).style(theme::HEADER_STYLE),
        )
        .block(block)
        .highlight_style(theme::SELECTED_STYLE);
    f.render_stateful_widget(table, area, &mut app.process_state);
}

fn process_row(index: usize, record: &ProcessRecord) -> Row<'_> {
    Row::new(vec![
        Cell::from(record.process.as_str()),
        Cell::from(record.task_id.as_str()),
        Cell::from(Span::styled(
            record.status.as_str(),
            Style::default().fg(theme::status_color(record.status)),
        )),
        Cell::from(format_time(record.ingested)),
    ])
    .style(theme::zebra_row_style(index))
}

fn render_metadata(f: &mut Frame, app: &mut App, area: Rect) {
    let block = pane_block("Metadata", app.focus == Focus::Metadata);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = match &app.dashboard.view().metadata {
        MetadataPane::NoSelection => vec![Line::from(Span::styled(
            "No selection",
            Style::default().fg(theme::MUTED),
        ))],
        MetadataPane::NoData => vec![Line::from(Span::styled(
            "No process data available",
            Style::default().fg(theme::MUTED),
        ))],
        MetadataPane::Document(value) => serde_json::to_string_pretty(value)
            .unwrap_or_else(|_| value.to_string())
            .lines()
            .map(|line| Line::from(line.to_string()))
            .collect(),
    };

    let total_height = wrapped_height(&lines, inner.width);
    app.metadata_max_scroll = total_height.saturating_sub(inner.height);
    if app.metadata_scroll > app.metadata_max_scroll {
        app.metadata_scroll = app.metadata_max_scroll;
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((app.metadata_scroll, 0));
    f.render_widget(p, inner);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let refreshed = app
        .last_refresh
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    let mut spans = vec![
        Span::styled(
            format!(" Last refresh: {refreshed} "),
            Style::default().fg(Color::Black).bg(theme::MUTED),
        ),
        Span::raw(format!(
            " {} runs  {} entries ",
            app.dashboard.view().runs.len(),
            app.entry_count
        )),
    ];
    match &app.status_note {
        Some(note) => spans.push(Span::styled(note.clone(), Style::default().fg(Color::Yellow))),
        None => spans.push(Span::styled(
            "? help  r refresh  q quit",
            Style::default().fg(theme::MUTED),
        )),
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_help(f: &mut Frame, area: Rect) {
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Yellow));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let bindings = [
        ("j / Down", "Next row"),
        ("k / Up", "Previous row"),
        ("g / G", "First / last row"),
        ("Tab", "Next pane"),
        ("Shift-Tab", "Previous pane"),
        ("r", "Refresh now"),
        ("?", "Toggle help"),
        ("Esc", "Close help"),
        ("q", "Quit"),
    ];
    let mut text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    text.extend(bindings.iter().map(|(key, action)| {
        Line::from(vec![
            Span::styled(format!("{key:<12}"), Color::Cyan),
            Span::raw(*action),
        ])
    }));

    f.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let mut total: usize = 0;
    for line in lines {
        let line_width = line.width();
        if line_width == 0 {
            total += 1;
        } else {
            total += line_width.div_ceil(width);
        }
    }
    total.min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_height_counts_blank_and_long_lines() {
        let lines = vec![Line::from(""), Line::from("abcdefghij"), Line::from("abc")];
        assert_eq!(wrapped_height(&lines, 4), 1 + 3 + 1);
        assert_eq!(wrapped_height(&lines, 0), 1 + 10 + 3);
    }

    #[test]
    fn status_cells_add_up_to_total() {
        let counts = StatusCounts {
            completed: 2,
            failed: 1,
            unknown: 1,
            ..StatusCounts::default()
        };
        let cells = status_cells(&counts);
        assert_eq!(cells.len(), 6);
        assert_eq!(cells.iter().map(|(count, _)| count).sum::<u64>(), counts.sum());
        assert_eq!(cells[5], (1, Color::Magenta));
        assert_eq!(cells[0], (0, theme::MUTED));
        assert_eq!(cells[2], (2, theme::status_color(TaskStatus::Completed)));
    }

    #[test]
    fn missing_timestamps_render_as_dash() {
        assert_eq!(format_time(None), "-");
        let at = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(9, 5, 0));
        assert_eq!(format_time(at), "2025-01-01 09:05:00");
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let rect = centered_rect(50, 50, area);
        assert_eq!(rect.width, 50);
        assert_eq!(rect.height, 20);
        assert_eq!(rect.x, 25);
        assert_eq!(rect.y, 10);
    }
}
