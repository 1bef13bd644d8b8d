//! One-shot report: analyze every repository under a root once and render
//! the export structure as JSON or text.

use std::fmt::Write;
use std::io::{self, Write as IoWrite};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::analysis::stats::{
    StatValue, COMMIT_COUNT_BY_AUTHOR, COMMIT_LINE_COUNT_BY_AUTHOR, LATEST_COMMIT,
    LATE_NIGHT_COMMITS, WEEKEND_COMMITS,
};
use crate::analysis::git::CommitReader;
use crate::app::{Aggregator, RefreshObserver};
use crate::config::ExtractOptions;
use crate::error::Result;
use crate::types::{display_path, ExportSnapshot};

/// Message printed when discovery finds nothing.
pub const NO_REPOSITORIES: &str = "No Git repositories found";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Report output format.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON, identical to the dashboard export
    #[default]
    Json,
    /// Human readable summary per repository
    Text,
}

/// Prints a line as each repository starts and as soon as one fails.
struct Notices<W> {
    out: Mutex<W>,
}

impl<W> Notices<W> {
    fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: IoWrite + Send + 'static> RefreshObserver for Notices<W> {
    fn repository_started(&self, repo: &Path) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "Analyzing repository: {}", display_path(repo));
    }

    fn repository_failed(&self, repo: &Path, reason: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(
            out,
            "Failed to analyze repository {}: {}",
            display_path(repo),
            reason
        );
    }
}

/// Analyze every repository under `root` and render the result.
///
/// Progress and per-repository failures are written to stderr as they
/// happen. Only a discovery failure is an error.
pub async fn run(root: &Path, format: OutputFormat, options: ExtractOptions) -> Result<String> {
    let aggregator = Aggregator::new(root, options);
    render(&aggregator, format, Notices::new(io::stderr())).await
}

async fn render<R, O>(aggregator: &Aggregator<R>, format: OutputFormat, observer: O) -> Result<String>
where
    R: CommitReader + 'static,
    O: RefreshObserver,
{
    let summary = aggregator.refresh_with(observer).await?;

    if summary.repositories == 0 {
        return Ok(NO_REPOSITORIES.to_string());
    }
    info!(
        "Report covers {} of {} repositories",
        summary.analyzed, summary.repositories
    );

    match format {
        OutputFormat::Json => aggregator.export_json(),
        OutputFormat::Text => Ok(render_text(&aggregator.export_snapshot())),
    }
}

fn write_breakdown<V: std::fmt::Display>(
    out: &mut String,
    heading: &str,
    entries: impl Iterator<Item = (String, V)>,
) {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        return;
    }
    let _ = writeln!(out, "{}", heading);
    for (author, value) in entries {
        let _ = writeln!(out, "  {}: {}", author, value);
    }
}

fn write_tally(out: &mut String, value: Option<&StatValue>, title: &str, heading: &str) {
    if let Some((total, authors)) = value.and_then(StatValue::as_tally) {
        let _ = writeln!(out, "\n{}: {}", title, total);
        write_breakdown(out, heading, authors.iter().map(|(a, c)| (a.clone(), *c)));
    }
}

/// Text rendering of an export snapshot, repositories and authors in
/// sorted order.
pub fn render_text(snapshot: &ExportSnapshot) -> String {
    let mut out = String::new();

    for (repo, export) in snapshot {
        let stats = &export.statistics;
        let _ = writeln!(out, "\n=== Repository: {} ===", repo);
        let _ = writeln!(out, "Total commits: {}", export.total_commits);

        if let Some(commit) = stats.get(LATEST_COMMIT).and_then(StatValue::as_commit) {
            let _ = writeln!(
                out,
                "Latest commit: {} by {} at {}",
                commit.short_hash(),
                commit.author,
                commit.timestamp.format(TIMESTAMP_FORMAT)
            );
        }

        if let Some(counts) = stats
            .get(COMMIT_COUNT_BY_AUTHOR)
            .and_then(StatValue::as_counts)
            .filter(|counts| !counts.is_empty())
        {
            out.push('\n');
            write_breakdown(
                &mut out,
                "Author statistics:",
                counts.iter().map(|(a, c)| (a.clone(), *c)),
            );
        }

        write_tally(
            &mut out,
            stats.get(LATE_NIGHT_COMMITS),
            "Late-night commits (23:00-06:59)",
            "Late-night authors:",
        );
        write_tally(
            &mut out,
            stats.get(WEEKEND_COMMITS),
            "Weekend commits",
            "Weekend authors:",
        );

        if let Some(lines) = stats
            .get(COMMIT_LINE_COUNT_BY_AUTHOR)
            .and_then(StatValue::as_lines)
            .filter(|lines| !lines.is_empty())
        {
            out.push('\n');
            write_breakdown(
                &mut out,
                "Lines changed by author:",
                lines.iter().map(|(a, l)| (a.clone(), *l)),
            );
        }
    }
    out
}
