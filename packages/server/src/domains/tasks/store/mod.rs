//! Store gateway: the typed persistence boundary.
//!
//! Query language never leaks upward; the pipelines and the REST layer only
//! see these operations. Every row is scoped to its owning user, and every
//! status write is conditional on the current status so the state machine
//! holds under concurrency.

mod memory;
mod postgres;

pub use memory::MemoryTaskStore;
pub use postgres::PostgresTaskStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domains::resumes::Resume;

use super::models::{
    AgentFoundJob, AgentTask, FoundJobPatch, NewFoundJob, TaskPatch, TaskStatus, TaskType,
};

/// Store-level errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    /// The requested status change is not admitted by the state machine.
    #[error("illegal status transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// The conditional status write lost a race; the task moved underneath
    /// the caller. Non-fatal: the task must already be past the expected
    /// status.
    #[error("task status changed concurrently")]
    ConcurrentTransition,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Filter for task listings.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 20,
            offset: 0,
        }
    }
}

impl TaskFilter {
    pub fn with_status(status: Option<TaskStatus>) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

/// Filter for found-job listings.
#[derive(Debug, Clone)]
pub struct FoundJobFilter {
    pub task_id: Option<Uuid>,
    pub saved_only: bool,
    /// Restrict to postings with no score yet (matcher input).
    pub unscored_only: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for FoundJobFilter {
    fn default() -> Self {
        Self {
            task_id: None,
            saved_only: false,
            unscored_only: false,
            limit: 20,
            offset: 0,
        }
    }
}

impl FoundJobFilter {
    pub fn for_task(task_id: Uuid) -> Self {
        Self {
            task_id: Some(task_id),
            limit: i64::from(u16::MAX),
            ..Default::default()
        }
    }

    pub fn unscored_for_task(task_id: Uuid) -> Self {
        Self {
            unscored_only: true,
            ..Self::for_task(task_id)
        }
    }
}

/// Typed access to agent tasks, found jobs, and the resume read model.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_task(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        description: &str,
        instructions: &serde_json::Value,
    ) -> Result<AgentTask, StoreError>;

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> Result<AgentTask, StoreError>;

    /// Most recent first.
    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<AgentTask>, StoreError>;

    /// Apply a patch; a status change is validated against the state machine
    /// and written conditionally on the current status.
    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<AgentTask, StoreError>;

    /// Insert postings, deduplicating against existing rows with the same
    /// `(user, task, job_url)`. Returns the number actually inserted.
    async fn insert_found_jobs(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        postings: &[NewFoundJob],
    ) -> Result<usize, StoreError>;

    async fn list_found_jobs(
        &self,
        user_id: Uuid,
        filter: &FoundJobFilter,
    ) -> Result<Vec<AgentFoundJob>, StoreError>;

    async fn get_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
    ) -> Result<AgentFoundJob, StoreError>;

    async fn update_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        patch: FoundJobPatch,
    ) -> Result<AgentFoundJob, StoreError>;

    async fn get_resume(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume, StoreError>;

    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StoreError>;
}

/// Validate a requested transition against the current status.
///
/// Shared by both store implementations so the matrix lives in one place.
pub(crate) fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<(), StoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition { from, to })
    }
}
