//! Error types for basinkit workflows

use thiserror::Error;

/// Errors produced by the processing workflow
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("A task is already running: {0}")]
    Busy(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A task failed; carries everything it logged before failing
    #[error("{task} failed: {source}")]
    Step {
        task: String,
        messages: Vec<String>,
        #[source]
        source: Box<WorkflowError>,
    },

    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("core error: {0}")]
    Core(#[from] basinkit_core::Error),
}

impl WorkflowError {
    pub fn missing<S: Into<String>>(what: S) -> Self {
        Self::MissingInput(what.into())
    }

    pub fn invalid<S: Into<String>>(what: S) -> Self {
        Self::InvalidInput(what.into())
    }

    /// Messages logged by the failed task, empty for other errors
    pub fn messages(&self) -> &[String] {
        match self {
            WorkflowError::Step { messages, .. } => messages,
            _ => &[],
        }
    }
}

/// Result alias for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
