//! In-memory store for tests and local development.
//!
//! Mirrors the Postgres implementation's semantics: user scoping, the
//! conditional status write, insert-time dedup, and most-recent-first
//! ordering. Also records the status history per task so tests can assert
//! state-machine soundness.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domains::resumes::Resume;
use crate::domains::tasks::models::{
    AgentFoundJob, AgentTask, FoundJobPatch, NewFoundJob, TaskPatch, TaskStatus, TaskType,
};

use super::{check_transition, FoundJobFilter, StoreError, TaskFilter, TaskStore};

#[derive(Default)]
struct State {
    tasks: HashMap<Uuid, AgentTask>,
    jobs: HashMap<Uuid, AgentFoundJob>,
    resumes: HashMap<Uuid, Resume>,
    status_history: HashMap<Uuid, Vec<TaskStatus>>,
}

/// In-memory implementation of the store gateway.
#[derive(Default)]
pub struct MemoryTaskStore {
    state: RwLock<State>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a resume (tests and local development).
    pub fn insert_resume(&self, resume: Resume) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.resumes.insert(resume.id, resume);
    }

    /// Seed a found job directly, bypassing dedup (tests).
    pub fn insert_job_record(&self, job: AgentFoundJob) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.jobs.insert(job.id, job);
    }

    /// Every status the task has held, in write order (starting at pending).
    pub fn status_history(&self, task_id: Uuid) -> Vec<TaskStatus> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .status_history
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_task(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        description: &str,
        instructions: &serde_json::Value,
    ) -> Result<AgentTask, StoreError> {
        let task = AgentTask::builder()
            .user_id(user_id)
            .task_type(task_type)
            .task_description(description.to_string())
            .task_instructions(instructions.clone())
            .build();

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state
            .status_history
            .insert(task.id, vec![TaskStatus::Pending]);
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> Result<AgentTask, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .tasks
            .get(&task_id)
            .filter(|t| t.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound("task"))
    }

    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<AgentTask>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut tasks: Vec<AgentTask> = state
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<AgentTask, StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        let task = state
            .tasks
            .get_mut(&task_id)
            .filter(|t| t.user_id == user_id)
            .ok_or(StoreError::NotFound("task"))?;

        if let Some(next) = patch.status {
            check_transition(task.status, next)?;
            task.status = next;
        }
        if let Some(result) = patch.execution_result {
            task.execution_result = Some(result);
        }
        if let Some(message) = patch.other_message {
            task.other_message = Some(message);
        }
        if let Some(started_at) = patch.started_at {
            task.started_at = Some(started_at);
        }
        if let Some(completed_at) = patch.completed_at {
            task.completed_at = Some(completed_at);
        }
        task.updated_at = Utc::now();

        let updated = task.clone();
        if let Some(next) = patch.status {
            state
                .status_history
                .entry(task_id)
                .or_default()
                .push(next);
        }
        Ok(updated)
    }

    async fn insert_found_jobs(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        postings: &[NewFoundJob],
    ) -> Result<usize, StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let mut inserted = 0;

        for posting in postings {
            if let Some(url) = posting.job_url.as_deref().filter(|u| !u.is_empty()) {
                let duplicate = state.jobs.values().any(|job| {
                    job.user_id == user_id
                        && job.agent_task_id == Some(task_id)
                        && job.job_url.as_deref() == Some(url)
                });
                if duplicate {
                    continue;
                }
            }

            let job = AgentFoundJob::builder()
                .user_id(user_id)
                .agent_task_id(task_id)
                .title(posting.title.clone())
                .company(posting.company.clone())
                .build();
            let job = AgentFoundJob {
                location: posting.location.clone(),
                salary: posting.salary.clone(),
                job_url: posting.job_url.clone(),
                work_type: posting.work_type.clone(),
                detailed_description: posting.detailed_description.clone(),
                source_platform: posting.source_platform.clone(),
                ..job
            };
            state.jobs.insert(job.id, job);
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn list_found_jobs(
        &self,
        user_id: Uuid,
        filter: &FoundJobFilter,
    ) -> Result<Vec<AgentFoundJob>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<AgentFoundJob> = state
            .jobs
            .values()
            .filter(|j| j.user_id == user_id)
            .filter(|j| filter.task_id.map_or(true, |id| j.agent_task_id == Some(id)))
            .filter(|j| !filter.saved_only || j.saved)
            .filter(|j| !filter.unscored_only || j.match_score.is_none())
            .cloned()
            .collect();

        // Discovery order for pipeline consumers, newest-first is applied by
        // the REST layer via created_at descending; within one run insertion
        // order and created_at agree.
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn get_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
    ) -> Result<AgentFoundJob, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .jobs
            .get(&job_id)
            .filter(|j| j.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound("found job"))
    }

    async fn update_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        patch: FoundJobPatch,
    ) -> Result<AgentFoundJob, StoreError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        let job = state
            .jobs
            .get_mut(&job_id)
            .filter(|j| j.user_id == user_id)
            .ok_or(StoreError::NotFound("found job"))?;

        if let Some(saved) = patch.saved {
            job.saved = saved;
        }
        if let Some(score) = patch.match_score {
            job.match_score = Some(score);
        }
        if let Some(analysis) = patch.ai_analysis {
            job.ai_analysis = Some(analysis);
        }
        if let Some(status) = patch.application_status {
            job.application_status = status;
        }
        job.updated_at = Utc::now();

        Ok(job.clone())
    }

    async fn get_resume(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state
            .resumes
            .get(&resume_id)
            .filter(|r| r.user_id == user_id)
            .cloned()
            .ok_or(StoreError::NotFound("resume"))
    }

    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StoreError> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut resumes: Vec<Resume> = state
            .resumes
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        resumes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(resumes)
    }
}
