pub mod discovery;
pub mod git;
pub mod stats;


pub use discovery::discover;
pub use git::{extract, extract_commits, extract_commits_async, CommitReader, GitReader};
pub use stats::{StatCalculator, StatValue, Statistics, StatsEngine};
