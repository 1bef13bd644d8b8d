use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::{DiffOptions, ErrorCode, Oid, Repository};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use crate::config::ExtractOptions;
use crate::error::{AnalysisError, Result};
use crate::types::CommitRecord;

/// Callback receiving `(processed, total)` after every attempted commit.
pub type ProgressFn<'a> = &'a mut dyn FnMut(usize, usize);

/// Read access to a version-control repository.
///
/// Handles are opened per thread and never shared, so `Handle` does not need
/// to be `Send`. Commit ids are shared by reference between workers.
pub trait CommitReader: Send + Sync {
    type Handle;
    type Id: Send + Sync;

    /// Open the repository rooted at `path`.
    fn open(&self, path: &Path) -> Result<Self::Handle>;

    /// Every commit reachable from HEAD, in history traversal order.
    /// An unborn HEAD yields an empty list.
    fn commit_log(&self, handle: &Self::Handle) -> Result<Vec<Self::Id>>;

    /// Metadata and diff statistics of one commit.
    fn commit_detail(&self, handle: &Self::Handle, id: &Self::Id) -> Result<CommitRecord>;
}

/// [`CommitReader`] backed by libgit2.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitReader;

impl CommitReader for GitReader {
    type Handle = Repository;
    type Id = Oid;

    fn open(&self, path: &Path) -> Result<Repository> {
        Ok(Repository::open(path)?)
    }

    fn commit_log(&self, repo: &Repository) -> Result<Vec<Oid>> {
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                debug!("Repository at {} has no commits", repo.path().display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let head_commit = head.peel_to_commit()?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push(head_commit.id())?;
        Ok(revwalk.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn commit_detail(&self, repo: &Repository, oid: &Oid) -> Result<CommitRecord> {
        let commit = repo.find_commit(*oid)?;
        let author = commit.author();
        let when = author.when();

        let offset = FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let timestamp = DateTime::<Utc>::from_timestamp(when.seconds(), 0)
            .ok_or_else(|| git2::Error::from_str("commit timestamp out of range"))?
            .with_timezone(&offset);

        // Root commits are diffed against the empty tree
        let tree = commit.tree()?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree()?)
        } else {
            None
        };

        let mut diff_opts = DiffOptions::new();
        diff_opts.include_untracked(false).context_lines(0);
        let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut diff_opts))?;
        let stats = diff.stats()?;

        Ok(CommitRecord {
            hash: commit.id().to_string(),
            author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(author.email_bytes()).into_owned(),
            timestamp,
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            line_count: (stats.insertions() + stats.deletions()) as u64,
        })
    }
}

/// Extract every commit reachable from HEAD of the repository at `repo_path`.
///
/// History is enumerated sequentially, then commit details are fetched by a
/// fixed pool of scoped worker threads, each with its own repository handle,
/// claiming ids from a shared cursor. Workers are joined before returning.
///
/// Commits whose details cannot be read are skipped. `on_progress` is called
/// on the calling thread exactly once per commit, successful or not, with
/// `processed` counting up to `total`.
///
/// The returned commits are in the order workers finished them, which is
/// not history order. Sort by timestamp when chronology matters.
pub fn extract<R: CommitReader>(
    reader: &R,
    repo_path: &Path,
    options: ExtractOptions,
    mut on_progress: Option<ProgressFn<'_>>,
) -> Result<Vec<CommitRecord>> {
    let start_time = Instant::now();

    let ids = {
        let handle = reader.open(repo_path)?;
        reader.commit_log(&handle)?
    };
    let total = ids.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let workers = options.workers.clamp(1, total);
    let cursor = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<Option<CommitRecord>>();
    let mut commits = Vec::with_capacity(total);
    let mut processed = 0;

    thread::scope(|scope| {
        for worker in 0..workers {
            let tx = tx.clone();
            let ids = &ids;
            let cursor = &cursor;
            scope.spawn(move || {
                let handle = match reader.open(repo_path) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!("Worker {} could not open {}: {}", worker, repo_path.display(), e);
                        return;
                    }
                };

                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(id) = ids.get(index) else {
                        break;
                    };
                    let outcome = match reader.commit_detail(&handle, id) {
                        Ok(record) => Some(record),
                        Err(e) => {
                            debug!("Skipping commit {} in {}: {}", index, repo_path.display(), e);
                            None
                        }
                    };
                    if tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        for outcome in rx {
            processed += 1;
            if let Some(record) = outcome {
                commits.push(record);
            }
            if let Some(callback) = on_progress.as_mut() {
                callback(processed, total);
            }
        }
    });

    // Ids left unclaimed because every worker failed to open a handle
    if processed < total {
        warn!(
            "{} commits in {} were not fetched",
            total - processed,
            repo_path.display()
        );
        while processed < total {
            processed += 1;
            if let Some(callback) = on_progress.as_mut() {
                callback(processed, total);
            }
        }
    }

    let elapsed_secs = start_time.elapsed().as_secs_f64();
    info!(
        "Extracted {} of {} commits from {} in {:.2}s with {} workers",
        commits.len(),
        total,
        repo_path.display(),
        elapsed_secs,
        workers
    );

    Ok(commits)
}

/// Extract commits with the libgit2 reader and default options.
pub fn extract_commits(
    repo_path: &Path,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<Vec<CommitRecord>> {
    extract(&GitReader, repo_path, ExtractOptions::default(), on_progress)
}

/// Extract commits on the blocking pool, forwarding progress over a channel.
pub async fn extract_commits_async(
    repo_path: PathBuf,
    options: ExtractOptions,
    progress: Option<UnboundedSender<(usize, usize)>>,
) -> Result<Vec<CommitRecord>> {
    spawn_blocking(move || {
        let mut forward = |processed: usize, total: usize| {
            if let Some(tx) = &progress {
                // The receiver going away only stops progress reporting
                let _ = tx.send((processed, total));
            }
        };
        extract(&GitReader, &repo_path, options, Some(&mut forward))
    })
    .await
    .map_err(AnalysisError::from)?
}
