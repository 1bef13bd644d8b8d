use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AnalysisError, Result};

/// Name of the metadata directory that marks a repository root.
const GIT_DIR: &str = ".git";

/// Recursively find Git repositories under `root`.
///
/// A directory holding a `.git` directory is a repository root. The walk does
/// not descend into a repository once found, so repositories nested inside
/// another working tree are not reported. Errors on `root` itself are fatal;
/// unreadable directories further down are skipped with a warning. Results
/// are sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let mut repos = Vec::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(AnalysisError::Discovery {
                    path: root.to_path_buf(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }
        if entry.path().join(GIT_DIR).is_dir() {
            debug!("Found repository at {}", entry.path().display());
            repos.push(entry.path().to_path_buf());
            walker.skip_current_dir();
        }
    }

    repos.sort();
    Ok(repos)
}
