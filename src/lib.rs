//! # Git Repository Statistics
//!
//! `gitwatch` scans a directory tree for Git repositories, extracts every
//! commit reachable from `HEAD` with a pool of worker threads, and computes
//! per-repository statistics: commits per author, the latest commit,
//! late-night and weekend activity, hourly activity and lines changed per
//! author.
//!
//! Results are available as a one-shot JSON or text report, or through an
//! interactive terminal dashboard that refreshes in the background.
//!
//! ## Example
//!
//! ```no_run
//! use gitwatch::{Aggregator, ExtractOptions};
//!
//! # async fn example() -> gitwatch::error::Result<()> {
//! let aggregator = Aggregator::new("/path/to/projects", ExtractOptions::default());
//! let summary = aggregator
//!     .refresh(|progress| println!("{} {}/{}", progress.repo.display(), progress.processed, progress.total))
//!     .await?;
//! println!("{} repositories analyzed", summary.analyzed);
//! println!("{}", aggregator.export_json()?);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod types;
pub mod utils;

// Re-export main types for convenience
pub use analysis::{StatCalculator, StatValue, Statistics, StatsEngine};
pub use app::Aggregator;
pub use config::{DashboardConfig, ExtractOptions};
pub use error::AnalysisError;
pub use types::{CommitRecord, ExportSnapshot, RefreshProgress, RefreshSummary};
