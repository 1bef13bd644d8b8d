use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while discovering, analyzing or exporting repositories.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to scan directory {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for AnalysisError {
    fn from(e: tokio::task::JoinError) -> Self {
        AnalysisError::Task(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
