//! Runtime configuration shared by the report and the dashboard.

use std::path::PathBuf;
use std::time::Duration;

/// Default file name offered when exporting from the dashboard.
pub const DEFAULT_EXPORT_FILE: &str = "gitwatcher.json";

/// Default auto-refresh period of the dashboard.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Options for a single commit extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Number of worker threads fetching commit details
    pub workers: usize,
}

impl ExtractOptions {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
        }
    }
}

/// Settings of the interactive dashboard.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Directory scanned for repositories
    pub root: PathBuf,
    /// Period of the auto-refresh timer
    pub refresh_interval: Duration,
    /// File name, relative to `root`, prefilled in the export prompt
    pub export_file_name: String,
}

impl DashboardConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn default_export_path(&self) -> PathBuf {
        self.root.join(&self.export_file_name)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            export_file_name: DEFAULT_EXPORT_FILE.to_string(),
        }
    }
}
