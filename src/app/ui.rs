//! Terminal rendering of the dashboard.
//!
//! Panel contents are built as plain lines by the `*_lines` functions so the
//! controller can cache them and tests can inspect them; [`draw`] only lays
//! out widgets around the cached text.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use std::path::Path;

use super::controller::{Controller, Focus, Modal, Panel};
use super::state::AppState;
use crate::analysis::git::CommitReader;
use crate::analysis::stats::{
    Statistics, COMMIT_ACTIVITY_BY_HOUR, COMMIT_COUNT_BY_AUTHOR, COMMIT_LINE_COUNT_BY_AUTHOR,
    LATEST_COMMIT, LATE_NIGHT_COMMITS, WEEKEND_COMMITS,
};
use crate::types::{display_path, CommitRecord};
use crate::utils::{hour_bar, truncate};

/// Width of the repository list column.
const REPO_LIST_WIDTH: u16 = 30;
/// Width of the histogram bars in the timeline panel.
const TIMELINE_BAR_WIDTH: usize = 40;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

fn tally_total(statistics: &Statistics, name: &str) -> usize {
    statistics
        .get(name)
        .and_then(|v| v.as_tally())
        .map_or(0, |(total, _)| total)
}

/// Summary of one repository.
pub fn overview_lines(state: &AppState, repo: &Path) -> Vec<String> {
    let mut lines = vec![format!("Repository: {}", display_path(repo))];

    let Some(statistics) = state.statistics(repo) else {
        lines.push(String::new());
        lines.push(if state.loading {
            "Analyzing...".to_string()
        } else {
            "No data".to_string()
        });
        return lines;
    };

    let commits = state.commits(repo);
    let authors = statistics
        .get(COMMIT_COUNT_BY_AUTHOR)
        .and_then(|v| v.as_counts())
        .map_or(0, |counts| counts.len());
    let lines_changed: u64 = statistics
        .get(COMMIT_LINE_COUNT_BY_AUTHOR)
        .and_then(|v| v.as_lines())
        .map_or(0, |lines| lines.values().sum());

    lines.push(String::new());
    lines.push(format!("Total commits:      {}", commits.len()));
    lines.push(format!("Authors:            {}", authors));
    lines.push(format!("Lines changed:      {}", lines_changed));
    lines.push(format!(
        "Late-night commits: {}",
        tally_total(statistics, LATE_NIGHT_COMMITS)
    ));
    lines.push(format!(
        "Weekend commits:    {}",
        tally_total(statistics, WEEKEND_COMMITS)
    ));
    lines.push(String::new());

    match statistics.get(LATEST_COMMIT).and_then(|v| v.as_commit()) {
        Some(commit) => {
            lines.push("Latest commit:".to_string());
            lines.push(format!("  {} by {}", commit.short_hash(), commit.author));
            lines.push(format!("  {}", commit.timestamp.format(TIMESTAMP_FORMAT)));
            lines.push(format!("  {}", commit.summary()));
        }
        None => lines.push("Latest commit:      none".to_string()),
    }
    lines
}

/// One line per commit, newest first unless `ascending`.
pub fn commit_lines(commits: &[CommitRecord], ascending: bool) -> Vec<String> {
    if commits.is_empty() {
        return vec!["No commits".to_string()];
    }

    let mut sorted: Vec<&CommitRecord> = commits.iter().collect();
    sorted.sort_by_key(|c| c.timestamp);
    if !ascending {
        sorted.reverse();
    }

    sorted
        .into_iter()
        .map(|c| {
            format!(
                "{} {} {:<16} {}",
                c.short_hash(),
                c.timestamp.format(TIMESTAMP_FORMAT),
                truncate(&c.author, 16),
                truncate(c.summary(), 60)
            )
        })
        .collect()
}

/// Commits and lines changed per author, most commits first unless
/// `ascending`. Equal counts are listed by name.
pub fn author_lines(statistics: Option<&Statistics>, ascending: bool) -> Vec<String> {
    let Some(counts) = statistics
        .and_then(|s| s.get(COMMIT_COUNT_BY_AUTHOR))
        .and_then(|v| v.as_counts())
        .filter(|counts| !counts.is_empty())
    else {
        return vec!["No authors".to_string()];
    };
    let line_totals = statistics
        .and_then(|s| s.get(COMMIT_LINE_COUNT_BY_AUTHOR))
        .and_then(|v| v.as_lines());

    let mut authors: Vec<(&String, usize)> = counts.iter().map(|(a, c)| (a, *c)).collect();
    if ascending {
        authors.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    } else {
        authors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    }

    authors
        .into_iter()
        .map(|(author, count)| {
            let changed = line_totals.and_then(|l| l.get(author)).copied().unwrap_or(0);
            format!(
                "{:<24} {:>6} commits {:>8} lines",
                truncate(author, 24),
                count,
                changed
            )
        })
        .collect()
}

/// Histogram of commits per local hour, 00 first unless descending.
pub fn timeline_lines(statistics: Option<&Statistics>, ascending: bool) -> Vec<String> {
    let hourly = statistics
        .and_then(|s| s.get(COMMIT_ACTIVITY_BY_HOUR))
        .and_then(|v| v.as_hourly());
    let count = |hour: u32| hourly.and_then(|h| h.get(&hour)).copied().unwrap_or(0);
    let max = (0..24).map(count).max().unwrap_or(0);

    let mut lines: Vec<String> = (0..24)
        .map(|hour| {
            format!(
                "{:02}:00 {} {}",
                hour,
                hour_bar(count(hour), max, TIMELINE_BAR_WIDTH),
                count(hour)
            )
        })
        .collect();
    if !ascending {
        lines.reverse();
    }
    lines
}

fn focus_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

/// Draw the whole dashboard.
pub fn draw<R: CommitReader + 'static>(f: &mut Frame, controller: &Controller<R>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.area());

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(REPO_LIST_WIDTH), Constraint::Min(0)])
        .split(chunks[0]);

    render_repo_list(f, main_chunks[0], controller);
    render_panel(f, main_chunks[1], controller);
    render_status(f, chunks[1], controller);

    let help = " q:Quit  r:Focus  R:Refresh  1-4:Panels  j/k:Move  Enter:Select  s:Sort  a:Auto  e:Export";
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);

    if let Some(modal) = &controller.view.modal {
        render_modal(f, modal);
    }
}

fn render_repo_list<R: CommitReader + 'static>(f: &mut Frame, area: Rect, controller: &Controller<R>) {
    let view = &controller.view;
    let width = usize::from(REPO_LIST_WIDTH.saturating_sub(4));
    let items: Vec<ListItem> = view
        .repos
        .iter()
        .map(|repo| {
            let name = repo
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| display_path(repo));
            ListItem::new(truncate(&name, width))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Repositories ")
                .border_style(focus_style(view.focus == Focus::RepoList)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(view.selected);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_panel<R: CommitReader + 'static>(f: &mut Frame, area: Rect, controller: &Controller<R>) {
    let view = &controller.view;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let titles: Vec<String> = Panel::ALL
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}:{}", i + 1, p.title()))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL))
        .select(view.active.index())
        .highlight_style(Style::default().fg(Color::Yellow).bold());
    f.render_widget(tabs, chunks[0]);

    let text: Vec<Line> = controller
        .panel_text(view.active)
        .iter()
        .map(|l| Line::from(l.as_str()))
        .collect();
    let panel = view.panel(view.active);
    let order = match view.active {
        Panel::Overview => "",
        _ if panel.sort_ascending => " (asc)",
        _ => " (desc)",
    };
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {}{} ", view.active.title(), order))
                .border_style(focus_style(view.focus == Focus::Panel)),
        )
        .scroll((panel.scroll, 0));
    f.render_widget(paragraph, chunks[1]);
}

fn render_status<R: CommitReader + 'static>(f: &mut Frame, area: Rect, controller: &Controller<R>) {
    let view = &controller.view;
    let auto = if view.auto_refresh { "on" } else { "off" };
    let status = Paragraph::new(format!(" {}  | auto-refresh: {}", view.status, auto))
        .style(if view.refreshing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        })
        .block(Block::default().borders(Borders::ALL).title(" Status "));
    f.render_widget(status, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_modal(f: &mut Frame, modal: &Modal) {
    let area = centered(f.area(), 70, 7);
    f.render_widget(Clear, area);

    let (title, body, style) = match modal {
        Modal::ExportPrompt { path } => (
            " Export ",
            vec![
                Line::from("Save statistics to:"),
                Line::from(Span::styled(
                    format!("{}_", path),
                    Style::default().fg(Color::Cyan),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter:Save  Esc:Cancel",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            Style::default(),
        ),
        Modal::Notice { message, is_error } => (
            if *is_error { " Error " } else { " Exported " },
            vec![
                Line::from(message.as_str()),
                Line::from(""),
                Line::from(Span::styled(
                    "Enter:Close",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
            if *is_error {
                Style::default().fg(Color::Red)
            } else {
                Style::default().fg(Color::Green)
            },
        ),
    };

    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .border_style(style),
        );
    f.render_widget(paragraph, area);
}
