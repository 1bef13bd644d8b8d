use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DashboardConfig, ExtractOptions};
use crate::report::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gitwatch", author, version, about, long_about = None)]
/// Scan a directory for Git repositories and report commit statistics such
/// as authors, commit hours, late-night and weekend activity.
pub struct Cli {
    /// Directory to scan for repositories
    #[arg(short, long, default_value = ".", global = true)]
    pub path: PathBuf,

    /// Report output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Worker threads per repository (defaults to the number of CPUs)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Write logs to this file (the dashboard logs nowhere otherwise)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the interactive terminal dashboard
    Tui {
        /// Auto-refresh period in seconds
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

impl Cli {
    pub fn extract_options(&self) -> ExtractOptions {
        self.jobs
            .map(ExtractOptions::with_workers)
            .unwrap_or_default()
    }

    pub fn dashboard_config(&self, interval: u64) -> DashboardConfig {
        DashboardConfig {
            refresh_interval: Duration::from_secs(interval.max(1)),
            ..DashboardConfig::new(&self.path)
        }
    }
}
