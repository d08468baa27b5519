//! Task engine: creates task rows, dispatches workers, enforces the state
//! machine, and finalizes results.
//!
//! One spawned worker per task. Each worker owns a `CancellationToken` that
//! pipelines poll between suspension points; the engine enforces a per-type
//! wall-clock budget and caps concurrently running tasks per user (requests
//! beyond the cap queue on the user's semaphore: `created_at` reflects
//! request time, `started_at` reflects dispatch time). Worker panics are
//! contained by the join handle and finalized as failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::common::ApiError;
use crate::kernel::{BasePageFetcher, BaseResumeScorer};

use super::agent::JobAgentPipeline;
use super::error::WorkerError;
use super::instructions::{to_result_value, TaskInstructions};
use super::matcher::ResumeMatcher;
use super::models::{AgentTask, TaskPatch, TaskStatus, TaskType};
use super::scraper::{ScraperConfig, SeekScraper};
use super::store::{StoreError, TaskStore};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrently running tasks per user; the rest queue.
    pub max_active_per_user: usize,
    pub scraper_budget: Duration,
    pub matcher_budget: Duration,
    pub agent_budget: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_per_user: 2,
            scraper_budget: Duration::from_secs(15 * 60),
            matcher_budget: Duration::from_secs(20 * 60),
            agent_budget: Duration::from_secs(30 * 60),
        }
    }
}

impl EngineConfig {
    fn budget(&self, task_type: TaskType) -> Duration {
        match task_type {
            TaskType::SeekScraper => self.scraper_budget,
            TaskType::ResumeJobMatching => self.matcher_budget,
            TaskType::JobAgent => self.agent_budget,
        }
    }
}

/// What a finished worker reports back for finalization.
#[derive(Debug)]
struct WorkerReport {
    result: Option<Value>,
    disposition: Disposition,
}

#[derive(Debug)]
enum Disposition {
    Completed,
    Cancelled,
    Failed(String),
}

impl WorkerReport {
    fn completed(result: Value) -> Self {
        Self {
            result: Some(result),
            disposition: Disposition::Completed,
        }
    }

    fn cancelled(result: Option<Value>) -> Self {
        Self {
            result,
            disposition: Disposition::Cancelled,
        }
    }

    fn failed(message: String, result: Option<Value>) -> Self {
        Self {
            result,
            disposition: Disposition::Failed(message),
        }
    }
}

/// The per-process task engine. Constructed once at startup and handed to
/// the REST layer; cloning shares the same engine.
#[derive(Clone)]
pub struct TaskEngine {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TaskStore>,
    scorer: Arc<dyn BaseResumeScorer>,
    fetcher: Arc<dyn BasePageFetcher>,
    scraper_config: ScraperConfig,
    config: EngineConfig,
    /// Cancellation tokens for in-flight tasks.
    running: RwLock<HashMap<Uuid, CancellationToken>>,
    /// Per-user run queues.
    user_slots: Mutex<HashMap<Uuid, Arc<Semaphore>>>,
}

impl TaskEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        scorer: Arc<dyn BaseResumeScorer>,
        fetcher: Arc<dyn BasePageFetcher>,
        scraper_config: ScraperConfig,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                scorer,
                fetcher,
                scraper_config,
                config,
                running: RwLock::new(HashMap::new()),
                user_slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.inner.store
    }

    /// Create the task row and dispatch its worker.
    ///
    /// Returns the pending task together with the worker handle; callers that
    /// want the synchronous REST contract await the handle via [`execute`].
    ///
    /// [`execute`]: TaskEngine::execute
    pub async fn submit(
        &self,
        user_id: Uuid,
        mut instructions: TaskInstructions,
    ) -> Result<(AgentTask, JoinHandle<()>), ApiError> {
        instructions.validate().map_err(ApiError::Validation)?;

        // Matcher preconditions are request-time checks: no task row is
        // created for a resume or source task the user does not own.
        if let TaskInstructions::ResumeJobMatching(matching) = &instructions {
            self.inner.store.get_resume(user_id, matching.resume_id).await?;
            self.inner.store.get_task(user_id, matching.task_id).await?;
        }

        let task = self
            .inner
            .store
            .create_task(
                user_id,
                instructions.task_type(),
                &instructions.description(),
                &instructions.to_value(),
            )
            .await?;

        info!(
            task_id = %task.id,
            task_type = %task.task_type,
            "task created"
        );

        let inner = Arc::clone(&self.inner);
        let worker_task = task.clone();
        let handle = tokio::spawn(async move {
            inner.drive(worker_task).await;
        });

        Ok((task, handle))
    }

    /// Submit and wait for the worker to finish; returns the final task row.
    pub async fn execute(
        &self,
        user_id: Uuid,
        instructions: TaskInstructions,
    ) -> Result<AgentTask, ApiError> {
        let (task, handle) = self.submit(user_id, instructions).await?;
        if let Err(e) = handle.await {
            error!(task_id = %task.id, error = %e, "worker join failed");
        }
        Ok(self.inner.store.get_task(user_id, task.id).await?)
    }

    /// Trip the cancellation token and best-effort transition the task.
    ///
    /// Cancelling an already-terminal task is a no-op returning the task
    /// unchanged. Queued tasks are cancelled directly; running workers
    /// observe the token at their next poll and finalize as cancelled with
    /// whatever partial counts they accumulated.
    pub async fn cancel_task(&self, user_id: Uuid, task_id: Uuid) -> Result<AgentTask, ApiError> {
        let inner = &self.inner;
        let task = inner.store.get_task(user_id, task_id).await?;
        if task.status.is_terminal() {
            return Ok(task);
        }

        let token = inner.running.read().await.get(&task_id).cloned();
        if let Some(token) = &token {
            token.cancel();
        }

        // A queued task has no worker mid-pipeline; likewise a running row
        // with no live token (e.g. after a restart) will never finalize
        // itself. Both are transitioned here.
        let worker_will_finalize = token.is_some() && task.status == TaskStatus::Running;
        if !worker_will_finalize {
            match inner
                .store
                .update_task(
                    user_id,
                    task_id,
                    TaskPatch {
                        status: Some(TaskStatus::Cancelled),
                        completed_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(task) => return Ok(task),
                Err(StoreError::InvalidTransition { .. })
                | Err(StoreError::ConcurrentTransition) => {
                    debug!(task_id = %task_id, "task finalized concurrently with cancel");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(inner.store.get_task(user_id, task_id).await?)
    }
}

impl Inner {
    /// Worker driver: queue on the user's slot, move to running, run the
    /// pipeline under its budget, finalize.
    async fn drive(self: Arc<Self>, task: AgentTask) {
        let cancel = CancellationToken::new();
        self.running.write().await.insert(task.id, cancel.clone());

        let slot = self.user_slot(task.user_id);
        let _permit = match slot.acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.running.write().await.remove(&task.id);
                return;
            }
        };

        // started_at is dispatch time, set on first entry into running. A
        // task cancelled while queued fails this transition and stops here.
        let transition = self
            .store
            .update_task(
                task.user_id,
                task.id,
                TaskPatch {
                    status: Some(TaskStatus::Running),
                    started_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await;

        match transition {
            Ok(_) => {}
            Err(StoreError::InvalidTransition { .. }) | Err(StoreError::ConcurrentTransition) => {
                debug!(task_id = %task.id, "task no longer dispatchable, skipping");
                self.running.write().await.remove(&task.id);
                return;
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "failed to mark task running");
                self.running.write().await.remove(&task.id);
                return;
            }
        }

        let budget = self.config.budget(task.task_type);
        let engine = Arc::clone(&self);
        let pipeline_task = task.clone();
        let pipeline_cancel = cancel.clone();
        let mut worker =
            tokio::spawn(async move { engine.run_pipeline(pipeline_task, pipeline_cancel).await });

        let report = tokio::select! {
            result = &mut worker => match result {
                Ok(Ok(report)) => report,
                Ok(Err(WorkerError::Cancelled)) => WorkerReport::cancelled(None),
                Ok(Err(e)) => WorkerReport::failed(e.user_message(), None),
                // A panicking worker never propagates; the task just fails.
                Err(join_error) if join_error.is_panic() => {
                    error!(task_id = %task.id, "worker panicked");
                    WorkerReport::failed("internal worker error".to_string(), None)
                }
                Err(join_error) => WorkerReport::failed(join_error.to_string(), None),
            },
            _ = tokio::time::sleep(budget) => {
                warn!(task_id = %task.id, budget_secs = budget.as_secs(), "task exceeded its budget");
                cancel.cancel();
                worker.abort();
                WorkerReport::failed(WorkerError::DeadlineExceeded.user_message(), None)
            }
        };

        self.finalize(&task, report).await;
        self.running.write().await.remove(&task.id);
    }

    /// Run the pipeline matching the task's type.
    async fn run_pipeline(
        &self,
        task: AgentTask,
        cancel: CancellationToken,
    ) -> Result<WorkerReport, WorkerError> {
        let instructions = TaskInstructions::from_stored(task.task_type, &task.task_instructions)
            .map_err(|e| WorkerError::Internal(format!("invalid task instructions: {e}")))?;

        match instructions {
            TaskInstructions::SeekScraper(scrape) => {
                let scraper = SeekScraper::new(
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.store),
                    self.scraper_config.clone(),
                );
                let run = scraper.run(task.user_id, task.id, &scrape, &cancel).await?;
                let result = to_result_value(&run.outcome);
                Ok(if run.cancelled {
                    WorkerReport::cancelled(Some(result))
                } else {
                    WorkerReport::completed(result)
                })
            }
            TaskInstructions::ResumeJobMatching(matching) => {
                let matcher = ResumeMatcher::new(Arc::clone(&self.store), Arc::clone(&self.scorer));
                let run = matcher
                    .run(
                        task.user_id,
                        matching.resume_id,
                        matching.task_id,
                        &matching.ai_model,
                        &cancel,
                    )
                    .await?;
                let result = to_result_value(&run.outcome);
                Ok(if run.cancelled {
                    WorkerReport::cancelled(Some(result))
                } else if let Some(message) = run.failure_message() {
                    WorkerReport::failed(message, Some(result))
                } else {
                    WorkerReport::completed(result)
                })
            }
            TaskInstructions::JobAgent(agent) => {
                let pipeline = JobAgentPipeline::new(
                    Arc::clone(&self.store),
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.scorer),
                    self.scraper_config.clone(),
                );
                let run = pipeline.run(task.user_id, task.id, &agent, &cancel).await?;
                let result = to_result_value(&run.outcome);
                Ok(if run.cancelled {
                    WorkerReport::cancelled(Some(result))
                } else if let Some(message) = run.failure {
                    WorkerReport::failed(message, Some(result))
                } else {
                    WorkerReport::completed(result)
                })
            }
        }
    }

    /// Terminal transition: status, `completed_at`, result document, and the
    /// failure message, written through the store's conditional update.
    /// Losing the race to an external finalizer is benign.
    async fn finalize(&self, task: &AgentTask, report: WorkerReport) {
        let (status, message) = match report.disposition {
            Disposition::Completed => (TaskStatus::Completed, None),
            Disposition::Cancelled => (TaskStatus::Cancelled, None),
            Disposition::Failed(message) => (TaskStatus::Failed, Some(message)),
        };

        let patch = TaskPatch {
            status: Some(status),
            execution_result: report.result,
            other_message: message,
            completed_at: Some(Utc::now()),
            ..Default::default()
        };

        match self.store.update_task(task.user_id, task.id, patch).await {
            Ok(_) => {
                info!(task_id = %task.id, status = %status, "task finalized");
            }
            Err(StoreError::InvalidTransition { .. }) | Err(StoreError::ConcurrentTransition) => {
                debug!(task_id = %task.id, "task already terminal, finalize skipped");
            }
            Err(e) => {
                error!(task_id = %task.id, error = %e, "failed to finalize task");
            }
        }
    }

    fn user_slot(&self, user_id: Uuid) -> Arc<Semaphore> {
        let mut slots = self.user_slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(user_id)
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_active_per_user))),
        )
    }
}
