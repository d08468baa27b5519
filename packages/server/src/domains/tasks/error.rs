//! Worker-boundary error kinds.
//!
//! Pipelines map infrastructure failures into these before the engine
//! finalizes the task row. Per-posting errors never surface here; they are
//! skipped (scraper) or counted (matcher).

use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Browser session failure; fatal to the task.
    #[error("browser session failed: {0}")]
    UpstreamBrowser(String),

    /// Provider exhausted retries for the whole run.
    #[error("language model provider failed: {0}")]
    UpstreamLlm(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Cooperative cancellation observed.
    #[error("cancelled")]
    Cancelled,

    /// Wall-clock budget exceeded.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl WorkerError {
    /// Message written to the task's `other_message` on failure.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}
