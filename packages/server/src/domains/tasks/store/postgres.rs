//! PostgreSQL implementation of the store gateway.
//!
//! Status writes are conditional on the current status (`WHERE status = $n`)
//! so concurrent finalizers cannot violate the state machine; a write that
//! matches zero rows surfaces [`StoreError::ConcurrentTransition`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::resumes::Resume;
use crate::domains::tasks::models::{
    AgentFoundJob, AgentTask, FoundJobPatch, NewFoundJob, TaskPatch, TaskType,
};

use super::{check_transition, FoundJobFilter, StoreError, TaskFilter, TaskStore};

const TASK_COLUMNS: &str = r#"
    id, user_id, task_type, task_description, status,
    task_instructions, execution_result, other_message,
    started_at, completed_at, created_at, updated_at,
    is_recurring, recurrence_config, next_execution_at, last_execution_at,
    execution_count, max_executions, is_active
"#;

const FOUND_JOB_COLUMNS: &str = r#"
    id, agent_task_id, user_id, title, company, location, salary, job_url,
    work_type, detailed_description, application_status, source_platform,
    match_score, ai_analysis, saved, created_at, updated_at
"#;

const RESUME_COLUMNS: &str = r#"
    id, user_id, name, first_name, last_name, email, location,
    professional_summary, target_role, work_experience, education, skills,
    certifications, created_at, updated_at
"#;

/// Store gateway backed by PostgreSQL.
pub struct PostgresTaskStore {
    pool: PgPool,
}

impl PostgresTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_task(
        &self,
        user_id: Uuid,
        task_type: TaskType,
        description: &str,
        instructions: &serde_json::Value,
    ) -> Result<AgentTask, StoreError> {
        let task = sqlx::query_as::<_, AgentTask>(&format!(
            r#"
            INSERT INTO agent_tasks (id, user_id, task_type, task_description, task_instructions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(task_type)
        .bind(description)
        .bind(instructions)
        .fetch_one(&self.pool)
        .await?;

        Ok(task)
    }

    async fn get_task(&self, user_id: Uuid, task_id: Uuid) -> Result<AgentTask, StoreError> {
        sqlx::query_as::<_, AgentTask>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM agent_tasks
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("task"))
    }

    async fn list_tasks(
        &self,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<AgentTask>, StoreError> {
        let tasks = match filter.status {
            Some(status) => {
                sqlx::query_as::<_, AgentTask>(&format!(
                    r#"
                    SELECT {TASK_COLUMNS}
                    FROM agent_tasks
                    WHERE user_id = $1 AND status = $2
                    ORDER BY created_at DESC
                    LIMIT $3 OFFSET $4
                    "#,
                ))
                .bind(user_id)
                .bind(status)
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AgentTask>(&format!(
                    r#"
                    SELECT {TASK_COLUMNS}
                    FROM agent_tasks
                    WHERE user_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2 OFFSET $3
                    "#,
                ))
                .bind(user_id)
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(tasks)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<AgentTask, StoreError> {
        let current = self.get_task(user_id, task_id).await?;

        if let Some(next) = patch.status {
            check_transition(current.status, next)?;
        }

        // The status guard makes the write conditional: if another writer
        // advanced the task since the read above, zero rows match.
        let updated = sqlx::query_as::<_, AgentTask>(&format!(
            r#"
            UPDATE agent_tasks
            SET status = COALESCE($1, status),
                execution_result = COALESCE($2, execution_result),
                other_message = COALESCE($3, other_message),
                started_at = COALESCE($4, started_at),
                completed_at = COALESCE($5, completed_at),
                updated_at = NOW()
            WHERE id = $6 AND user_id = $7 AND status = $8
            RETURNING {TASK_COLUMNS}
            "#,
        ))
        .bind(patch.status)
        .bind(patch.execution_result)
        .bind(patch.other_message)
        .bind(patch.started_at)
        .bind(patch.completed_at)
        .bind(task_id)
        .bind(user_id)
        .bind(current.status)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(StoreError::ConcurrentTransition)
    }

    async fn insert_found_jobs(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        postings: &[NewFoundJob],
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;

        // One statement per posting keeps discovery order and lets the
        // partial unique index absorb duplicates.
        for posting in postings {
            let rows = sqlx::query(
                r#"
                INSERT INTO agent_found_jobs (
                    id, agent_task_id, user_id, title, company, location, salary,
                    job_url, work_type, detailed_description, source_platform
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (user_id, agent_task_id, job_url) WHERE job_url IS NOT NULL
                DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(task_id)
            .bind(user_id)
            .bind(&posting.title)
            .bind(&posting.company)
            .bind(&posting.location)
            .bind(&posting.salary)
            .bind(&posting.job_url)
            .bind(&posting.work_type)
            .bind(&posting.detailed_description)
            .bind(&posting.source_platform)
            .execute(&self.pool)
            .await?
            .rows_affected();

            inserted += rows as usize;
        }

        Ok(inserted)
    }

    async fn list_found_jobs(
        &self,
        user_id: Uuid,
        filter: &FoundJobFilter,
    ) -> Result<Vec<AgentFoundJob>, StoreError> {
        let jobs = sqlx::query_as::<_, AgentFoundJob>(&format!(
            r#"
            SELECT {FOUND_JOB_COLUMNS}
            FROM agent_found_jobs
            WHERE user_id = $1
              AND ($2::uuid IS NULL OR agent_task_id = $2)
              AND (NOT $3 OR saved)
              AND (NOT $4 OR match_score IS NULL)
            ORDER BY created_at ASC
            LIMIT $5 OFFSET $6
            "#,
        ))
        .bind(user_id)
        .bind(filter.task_id)
        .bind(filter.saved_only)
        .bind(filter.unscored_only)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    async fn get_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
    ) -> Result<AgentFoundJob, StoreError> {
        sqlx::query_as::<_, AgentFoundJob>(&format!(
            r#"
            SELECT {FOUND_JOB_COLUMNS}
            FROM agent_found_jobs
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("found job"))
    }

    async fn update_found_job(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        patch: FoundJobPatch,
    ) -> Result<AgentFoundJob, StoreError> {
        sqlx::query_as::<_, AgentFoundJob>(&format!(
            r#"
            UPDATE agent_found_jobs
            SET saved = COALESCE($1, saved),
                match_score = COALESCE($2, match_score),
                ai_analysis = COALESCE($3, ai_analysis),
                application_status = COALESCE($4, application_status),
                updated_at = NOW()
            WHERE id = $5 AND user_id = $6
            RETURNING {FOUND_JOB_COLUMNS}
            "#,
        ))
        .bind(patch.saved)
        .bind(patch.match_score)
        .bind(patch.ai_analysis)
        .bind(patch.application_status)
        .bind(job_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("found job"))
    }

    async fn get_resume(&self, user_id: Uuid, resume_id: Uuid) -> Result<Resume, StoreError> {
        sqlx::query_as::<_, Resume>(&format!(
            r#"
            SELECT {RESUME_COLUMNS}
            FROM resumes
            WHERE id = $1 AND user_id = $2
            "#,
        ))
        .bind(resume_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("resume"))
    }

    async fn list_resumes(&self, user_id: Uuid) -> Result<Vec<Resume>, StoreError> {
        let resumes = sqlx::query_as::<_, Resume>(&format!(
            r#"
            SELECT {RESUME_COLUMNS}
            FROM resumes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(resumes)
    }
}
