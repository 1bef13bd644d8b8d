//! # Common Types
//!
//! This module contains the common types used throughout the application for
//! representing extracted commits, per-repository snapshots, refresh progress
//! and the export structure shared by the report and the dashboard.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analysis::stats::Statistics;

/// Number of hex characters shown for abbreviated commit ids.
pub const SHORT_HASH_LEN: usize = 7;

/// An immutable snapshot of a single commit.
///
/// Records are created once during extraction and never mutated afterwards.
/// The timestamp keeps the offset recorded by the author, so hour-of-day and
/// weekday computations see the author's local time rather than the time
/// zone of the machine running the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full hex object id
    pub hash: String,
    /// Author display name
    pub author: String,
    /// Author email address
    pub email: String,
    /// Author timestamp with its recorded offset
    pub timestamp: DateTime<FixedOffset>,
    /// Full commit message
    pub message: String,
    /// Lines added plus lines deleted across all changed files
    pub line_count: u64,
}

impl CommitRecord {
    /// Abbreviated object id, as shown in logs and panels.
    pub fn short_hash(&self) -> &str {
        let end = self
            .hash
            .char_indices()
            .nth(SHORT_HASH_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.hash.len());
        &self.hash[..end]
    }

    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// The derived data for one repository at one point in time.
///
/// A snapshot is replaced wholesale on every refresh. The commit list is in
/// the order the extraction workers finished, not history order.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    pub path: PathBuf,
    pub commits: Vec<CommitRecord>,
    pub statistics: Statistics,
    /// Refresh cycle that produced this snapshot
    pub generation: u64,
}

impl RepositorySnapshot {
    pub fn total_commits(&self) -> usize {
        self.commits.len()
    }
}

/// Progress of a refresh, reported once per attempted commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshProgress {
    pub repo: PathBuf,
    pub processed: usize,
    pub total: usize,
}

impl RefreshProgress {
    pub fn percent_complete(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        self.processed * 100 / self.total
    }
}

/// Outcome of a completed refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    pub generation: u64,
    /// Repositories found by discovery
    pub repositories: usize,
    /// Repositories whose snapshot was installed
    pub analyzed: usize,
    /// Repositories skipped because extraction failed, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Exported statistics for one repository.
#[derive(Debug, Clone, Serialize)]
pub struct RepoExport {
    pub total_commits: usize,
    pub statistics: Statistics,
}

/// Repository path to exported statistics, keyed in sorted order.
pub type ExportSnapshot = BTreeMap<String, RepoExport>;

/// Render a path the way it is keyed in exports and shown in the dashboard.
pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
