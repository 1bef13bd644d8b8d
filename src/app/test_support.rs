//! Scripted repositories for aggregator and controller tests.

use chrono::{FixedOffset, TimeZone};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crate::analysis::git::CommitReader;
use crate::error::Result;
use crate::types::CommitRecord;

/// Create `<tmp>/<name>/.git` for every name; returns the repository paths.
pub fn repo_tree(names: &[&str]) -> (TempDir, Vec<PathBuf>) {
    let temp_dir = TempDir::new().unwrap();
    let mut repos = Vec::new();
    for name in names {
        let repo = temp_dir.path().join(name);
        fs::create_dir_all(repo.join(".git")).unwrap();
        repos.push(repo);
    }
    repos.sort();
    (temp_dir, repos)
}

/// Blocks `commit_log` of one repository until opened.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    pub fn close(&self) {
        *self.open.lock().unwrap() = false;
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.changed.wait(open).unwrap();
        }
    }
}

/// Tracks how many history enumerations overlap.
#[derive(Default)]
pub struct ActiveTracker {
    active: AtomicUsize,
    max: AtomicUsize,
}

impl ActiveTracker {
    pub fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reader serving synthetic commits keyed by repository directory name.
///
/// Repositories without a configured count fail to open. Every commit of a
/// cycle has `line_count` equal to the number of times that repository's
/// history has been enumerated.
pub struct FakeReader {
    counts: HashMap<String, usize>,
    growing: bool,
    cycles: Mutex<HashMap<String, u64>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    active: Arc<ActiveTracker>,
}

impl FakeReader {
    pub fn new(counts: &[(&str, usize)]) -> Self {
        Self {
            counts: counts
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect(),
            growing: false,
            cycles: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            active: Arc::new(ActiveTracker::default()),
        }
    }

    /// Each cycle returns one more commit than the previous one.
    pub fn growing(mut self) -> Self {
        self.growing = true;
        self
    }

    /// A closed gate guarding the history of `name`.
    pub fn gate(&self, name: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn active_tracker(&self) -> Arc<ActiveTracker> {
        Arc::clone(&self.active)
    }
}

fn repo_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl CommitReader for FakeReader {
    type Handle = String;
    type Id = (u64, usize);

    fn open(&self, path: &Path) -> Result<String> {
        let name = repo_name(path);
        if self.counts.contains_key(&name) {
            Ok(name)
        } else {
            Err(git2::Error::from_str("not a repository").into())
        }
    }

    fn commit_log(&self, name: &String) -> Result<Vec<(u64, usize)>> {
        self.active.enter();
        let cycle = {
            let mut cycles = self.cycles.lock().unwrap();
            let cycle = cycles.entry(name.clone()).or_insert(0);
            *cycle += 1;
            *cycle
        };
        let gate = self.gates.lock().unwrap().get(name).cloned();
        if let Some(gate) = gate {
            gate.wait();
        }
        std::thread::sleep(Duration::from_millis(5));
        self.active.leave();

        let mut count = self.counts[name];
        if self.growing {
            count += cycle as usize;
        }
        Ok((0..count).map(|i| (cycle, i)).collect())
    }

    fn commit_detail(&self, name: &String, id: &(u64, usize)) -> Result<CommitRecord> {
        let (cycle, index) = *id;
        let timestamp = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 7, 27, 23, 30, 0)
            .unwrap()
            + chrono::Duration::minutes(index as i64);
        Ok(CommitRecord {
            hash: format!("{:040x}", cycle * 1_000_000 + index as u64),
            author: "fake".to_string(),
            email: "fake@example.com".to_string(),
            timestamp,
            message: format!("{} change {}", name, index),
            line_count: cycle,
        })
    }
}
