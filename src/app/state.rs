use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::analysis::git::{extract, CommitReader, GitReader};
use crate::analysis::{discover, Statistics, StatsEngine};
use crate::config::ExtractOptions;
use crate::error::{AnalysisError, Result};
use crate::types::{
    display_path, CommitRecord, ExportSnapshot, RefreshProgress, RefreshSummary, RepoExport,
    RepositorySnapshot,
};

/// Process-wide analysis results.
///
/// Each repository's commits and statistics live in one
/// [`RepositorySnapshot`], so replacing an entry swaps both at once. During a
/// refresh some repositories may still hold the previous cycle's snapshot.
#[derive(Debug, Default)]
pub struct AppState {
    pub root_path: PathBuf,
    /// Repositories found by the most recent discovery, sorted by path
    pub repos: Vec<PathBuf>,
    snapshots: HashMap<PathBuf, Arc<RepositorySnapshot>>,
    pub loading: bool,
    /// Number of the most recently started refresh cycle
    pub generation: u64,
}

impl AppState {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            ..Self::default()
        }
    }

    pub fn snapshot(&self, repo: &Path) -> Option<Arc<RepositorySnapshot>> {
        self.snapshots.get(repo).cloned()
    }

    /// Commits of `repo`, empty when it has not been analyzed.
    pub fn commits(&self, repo: &Path) -> &[CommitRecord] {
        self.snapshots
            .get(repo)
            .map(|s| s.commits.as_slice())
            .unwrap_or(&[])
    }

    pub fn statistics(&self, repo: &Path) -> Option<&Statistics> {
        self.snapshots.get(repo).map(|s| &s.statistics)
    }

    /// Replace the snapshot of one repository.
    pub fn install(&mut self, snapshot: RepositorySnapshot) {
        self.snapshots
            .insert(snapshot.path.clone(), Arc::new(snapshot));
    }

    pub fn remove(&mut self, repo: &Path) {
        self.snapshots.remove(repo);
    }

    /// Drop snapshots of repositories no longer in `repos`.
    fn prune(&mut self) {
        let known = &self.repos;
        self.snapshots.retain(|path, _| known.contains(path));
    }

    /// Export structure of every analyzed repository.
    pub fn export(&self) -> ExportSnapshot {
        self.snapshots
            .values()
            .map(|snapshot| {
                (
                    display_path(&snapshot.path),
                    RepoExport {
                        total_commits: snapshot.total_commits(),
                        statistics: snapshot.statistics.clone(),
                    },
                )
            })
            .collect()
    }
}

/// Receives events of a refresh cycle as they happen.
///
/// `progress` is called from a blocking worker thread; the per-repository
/// hooks are called from the task driving the refresh.
pub trait RefreshObserver: Send + Sync + 'static {
    fn progress(&self, _progress: RefreshProgress) {}

    /// Called before a repository's history is read, including repositories
    /// with no commits.
    fn repository_started(&self, _repo: &Path) {}

    fn repository_failed(&self, _repo: &Path, _reason: &str) {}
}

impl<O: RefreshObserver> RefreshObserver for Arc<O> {
    fn progress(&self, progress: RefreshProgress) {
        (**self).progress(progress)
    }

    fn repository_started(&self, repo: &Path) {
        (**self).repository_started(repo)
    }

    fn repository_failed(&self, repo: &Path, reason: &str) {
        (**self).repository_failed(repo, reason)
    }
}

/// Observer that only forwards progress to a closure.
struct ProgressFn<F>(F);

impl<F> RefreshObserver for ProgressFn<F>
where
    F: Fn(RefreshProgress) + Send + Sync + 'static,
{
    fn progress(&self, progress: RefreshProgress) {
        (self.0)(progress)
    }
}

/// State shared between the refresh task and its readers.
pub type SharedState = Arc<RwLock<AppState>>;

/// Read the shared state, recovering from a poisoned lock.
pub fn read_state(state: &RwLock<AppState>) -> RwLockReadGuard<'_, AppState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<AppState>) -> RwLockWriteGuard<'_, AppState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

/// Runs discovery, extraction and statistics for every repository under a
/// root and owns the resulting [`AppState`].
pub struct Aggregator<R: CommitReader = GitReader> {
    state: SharedState,
    reader: Arc<R>,
    engine: Arc<StatsEngine>,
    options: ExtractOptions,
    refresh_lock: TokioMutex<()>,
}

impl Aggregator<GitReader> {
    pub fn new(root: impl Into<PathBuf>, options: ExtractOptions) -> Self {
        Self::with_reader(root, GitReader, options)
    }
}

impl<R: CommitReader + 'static> Aggregator<R> {
    pub fn with_reader(root: impl Into<PathBuf>, reader: R, options: ExtractOptions) -> Self {
        Self {
            state: Arc::new(RwLock::new(AppState::new(root))),
            reader: Arc::new(reader),
            engine: Arc::new(StatsEngine::default()),
            options,
            refresh_lock: TokioMutex::new(()),
        }
    }

    /// Use a custom statistics engine instead of the built-in calculators.
    pub fn with_engine(mut self, engine: StatsEngine) -> Self {
        self.engine = Arc::new(engine);
        self
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn root_path(&self) -> PathBuf {
        read_state(&self.state).root_path.clone()
    }

    /// Re-run discovery and analyze every repository found.
    ///
    /// Only one refresh runs at a time; a concurrent caller waits for the
    /// running cycle and then starts its own. Each repository's snapshot is
    /// installed as soon as it is computed. A repository that fails to
    /// extract is logged, dropped from the state and reported in the summary.
    /// Discovery failure aborts the cycle and leaves the snapshots untouched.
    pub async fn refresh<F>(&self, on_progress: F) -> Result<RefreshSummary>
    where
        F: Fn(RefreshProgress) + Send + Sync + 'static,
    {
        self.refresh_with(ProgressFn(on_progress)).await
    }

    /// [`refresh`](Self::refresh) reporting to an observer that also hears
    /// when each repository starts and when one fails.
    pub async fn refresh_with<O: RefreshObserver>(&self, observer: O) -> Result<RefreshSummary> {
        let _guard = self.refresh_lock.lock().await;

        let (root, generation) = {
            let mut state = write_state(&self.state);
            state.loading = true;
            state.generation += 1;
            (state.root_path.clone(), state.generation)
        };
        debug!("Starting refresh {} of {}", generation, root.display());

        let discovered = spawn_blocking(move || discover(&root))
            .await
            .map_err(AnalysisError::from)
            .and_then(|result| result);
        let repos = match discovered {
            Ok(repos) => repos,
            Err(e) => {
                write_state(&self.state).loading = false;
                return Err(e);
            }
        };

        write_state(&self.state).repos = repos.clone();

        let observer = Arc::new(observer);
        let mut summary = RefreshSummary {
            generation,
            repositories: repos.len(),
            ..RefreshSummary::default()
        };

        for repo in repos {
            let reader = Arc::clone(&self.reader);
            let engine = Arc::clone(&self.engine);
            let progress = Arc::clone(&observer);
            let options = self.options;
            let path = repo.clone();
            observer.repository_started(&repo);

            let analyzed = spawn_blocking(move || {
                let mut report = |processed: usize, total: usize| {
                    progress.progress(RefreshProgress {
                        repo: path.clone(),
                        processed,
                        total,
                    })
                };
                let commits = extract(reader.as_ref(), &path, options, Some(&mut report))?;
                let statistics = engine.compute_all(&commits);
                Ok::<_, AnalysisError>(RepositorySnapshot {
                    path,
                    commits,
                    statistics,
                    generation,
                })
            })
            .await
            .map_err(AnalysisError::from)
            .and_then(|result| result);

            match analyzed {
                Ok(snapshot) => {
                    write_state(&self.state).install(snapshot);
                    summary.analyzed += 1;
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!("Failed to analyze repository {}: {}", repo.display(), reason);
                    write_state(&self.state).remove(&repo);
                    observer.repository_failed(&repo, &reason);
                    summary.failures.push((repo, reason));
                }
            }
        }

        {
            let mut state = write_state(&self.state);
            state.prune();
            state.loading = false;
        }
        info!(
            "Refresh {} finished: {} of {} repositories analyzed",
            generation, summary.analyzed, summary.repositories
        );

        Ok(summary)
    }

    /// Statistics of every analyzed repository, as currently installed.
    pub fn export_snapshot(&self) -> ExportSnapshot {
        read_state(&self.state).export()
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_snapshot())?)
    }

    /// Write the current snapshot as JSON to `path`.
    pub fn export_to(&self, path: &Path) -> Result<()> {
        let json = self.export_json()?;
        fs::write(path, json)?;
        info!("Exported snapshot to {}", path.display());
        Ok(())
    }
}
