//! Pluggable per-repository statistics.
//!
//! Each calculator is independent and stateless: it receives the full commit
//! list of one repository and produces one named value. The [`StatsEngine`]
//! keeps an ordered registry of calculators and runs every one of them on the
//! same slice of commits.

use chrono::{Datelike, Timelike, Weekday};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::CommitRecord;

/// Computed statistics of one repository, keyed by calculator name.
pub type Statistics = BTreeMap<String, StatValue>;

/// The value produced by a calculator.
///
/// Maps are ordered so serialized output is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Count per author
    Counts(BTreeMap<String, usize>),
    /// Line total per author
    Lines(BTreeMap<String, u64>),
    /// Count per hour of day (0-23)
    Hourly(BTreeMap<u32, usize>),
    /// A single commit, absent for empty repositories
    Commit(Option<CommitRecord>),
    /// A total with a per-author breakdown
    Tally {
        total: usize,
        authors: BTreeMap<String, usize>,
    },
    /// Free-form value for calculators the built-in shapes do not cover
    Json(serde_json::Value),
}

impl StatValue {
    pub fn as_counts(&self) -> Option<&BTreeMap<String, usize>> {
        match self {
            StatValue::Counts(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_lines(&self) -> Option<&BTreeMap<String, u64>> {
        match self {
            StatValue::Lines(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_hourly(&self) -> Option<&BTreeMap<u32, usize>> {
        match self {
            StatValue::Hourly(map) => Some(map),
            _ => None,
        }
    }

    /// The commit of a [`StatValue::Commit`]; `None` for other variants too.
    pub fn as_commit(&self) -> Option<&CommitRecord> {
        match self {
            StatValue::Commit(commit) => commit.as_ref(),
            _ => None,
        }
    }

    pub fn as_tally(&self) -> Option<(usize, &BTreeMap<String, usize>)> {
        match self {
            StatValue::Tally { total, authors } => Some((*total, authors)),
            _ => None,
        }
    }
}

/// A named metric computed over the commits of one repository.
pub trait StatCalculator: Send + Sync {
    fn name(&self) -> &'static str;
    fn compute(&self, commits: &[CommitRecord]) -> StatValue;
}

pub const COMMIT_COUNT_BY_AUTHOR: &str = "commit_count_by_author";
pub const LATEST_COMMIT: &str = "latest_commit";
pub const LATE_NIGHT_COMMITS: &str = "late_night_commits";
pub const WEEKEND_COMMITS: &str = "weekend_commits";
pub const COMMIT_ACTIVITY_BY_HOUR: &str = "commit_activity_by_hour";
pub const COMMIT_LINE_COUNT_BY_AUTHOR: &str = "commit_line_count_by_author";

/// First hour of the late-night window.
const LATE_NIGHT_START: u32 = 23;
/// Last hour of the late-night window, inclusive.
const LATE_NIGHT_END: u32 = 6;

/// Whether a commit's recorded local hour falls in 23:00-06:59.
pub fn is_late_night(commit: &CommitRecord) -> bool {
    let hour = commit.timestamp.hour();
    hour >= LATE_NIGHT_START || hour <= LATE_NIGHT_END
}

/// Whether a commit's recorded local weekday is Saturday or Sunday.
pub fn is_weekend(commit: &CommitRecord) -> bool {
    matches!(commit.timestamp.weekday(), Weekday::Sat | Weekday::Sun)
}

fn tally(commits: &[CommitRecord], keep: impl Fn(&CommitRecord) -> bool) -> StatValue {
    let mut total = 0;
    let mut authors = BTreeMap::new();
    for commit in commits.iter().filter(|c| keep(c)) {
        total += 1;
        *authors.entry(commit.author.clone()).or_insert(0) += 1;
    }
    StatValue::Tally { total, authors }
}

pub struct CommitCountByAuthor;

impl StatCalculator for CommitCountByAuthor {
    fn name(&self) -> &'static str {
        COMMIT_COUNT_BY_AUTHOR
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        let mut counts = BTreeMap::new();
        for commit in commits {
            *counts.entry(commit.author.clone()).or_insert(0) += 1;
        }
        StatValue::Counts(counts)
    }
}

pub struct LatestCommit;

impl StatCalculator for LatestCommit {
    fn name(&self) -> &'static str {
        LATEST_COMMIT
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        let mut latest: Option<&CommitRecord> = None;
        for commit in commits {
            // Strict comparison keeps the first of equal timestamps
            match latest {
                Some(current) if commit.timestamp <= current.timestamp => {}
                _ => latest = Some(commit),
            }
        }
        StatValue::Commit(latest.cloned())
    }
}

pub struct LateNightCommits;

impl StatCalculator for LateNightCommits {
    fn name(&self) -> &'static str {
        LATE_NIGHT_COMMITS
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        tally(commits, is_late_night)
    }
}

pub struct WeekendCommits;

impl StatCalculator for WeekendCommits {
    fn name(&self) -> &'static str {
        WEEKEND_COMMITS
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        tally(commits, is_weekend)
    }
}

pub struct CommitActivityByHour;

impl StatCalculator for CommitActivityByHour {
    fn name(&self) -> &'static str {
        COMMIT_ACTIVITY_BY_HOUR
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        let mut hours = BTreeMap::new();
        for commit in commits {
            *hours.entry(commit.timestamp.hour()).or_insert(0) += 1;
        }
        StatValue::Hourly(hours)
    }
}

pub struct CommitLineCountByAuthor;

impl StatCalculator for CommitLineCountByAuthor {
    fn name(&self) -> &'static str {
        COMMIT_LINE_COUNT_BY_AUTHOR
    }

    fn compute(&self, commits: &[CommitRecord]) -> StatValue {
        let mut lines = BTreeMap::new();
        for commit in commits {
            *lines.entry(commit.author.clone()).or_insert(0) += commit.line_count;
        }
        StatValue::Lines(lines)
    }
}

/// Ordered registry of calculators.
pub struct StatsEngine {
    calculators: Vec<Box<dyn StatCalculator>>,
}

impl StatsEngine {
    /// An engine with no calculators registered.
    pub fn empty() -> Self {
        Self {
            calculators: Vec::new(),
        }
    }

    /// Append a calculator; it runs after the ones already registered.
    pub fn register(&mut self, calculator: impl StatCalculator + 'static) -> &mut Self {
        self.calculators.push(Box::new(calculator));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calculators.iter().map(|c| c.name()).collect()
    }

    /// Run every registered calculator once over the same commits.
    pub fn compute_all(&self, commits: &[CommitRecord]) -> Statistics {
        self.calculators
            .iter()
            .map(|c| (c.name().to_string(), c.compute(commits)))
            .collect()
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        let mut engine = Self::empty();
        engine
            .register(CommitCountByAuthor)
            .register(LatestCommit)
            .register(LateNightCommits)
            .register(CommitActivityByHour)
            .register(WeekendCommits)
            .register(CommitLineCountByAuthor);
        engine
    }
}
