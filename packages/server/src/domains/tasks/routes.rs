//! REST handlers for the task surface.
//!
//! Thin mappers from requests to the engine and the store gateway. The
//! pipeline POST endpoints run their worker to completion so the 201 body
//! can carry result counts; the task row is still observable (and
//! cancellable) while the run is in flight.

use anyhow::anyhow;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::common::{ApiError, PageParams};
use crate::domains::resumes::Resume;
use crate::server::middleware::AuthUser;
use crate::server::AppState;

use super::instructions::{
    AgentInstructions, MatchingInstructions, ScraperInstructions, TaskInstructions,
};
use super::models::{AgentFoundJob, AgentTask, FoundJobPatch, TaskPatch, TaskStatus};
use super::schemas::{
    FoundJobsQuery, JobAgentRequest, JobAgentResponse, ResumeJobMatchingRequest,
    ResumeJobMatchingResponse, ScoreDistribution, SeekScraperRequest, SeekScraperResponse,
    TaskAnalysisSummary, TaskListQuery, UpdateFoundJobRequest, UpdateTaskRequest,
};
use super::store::{FoundJobFilter, TaskFilter, TaskStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/seek-scraper", post(run_seek_scraper))
        .route("/resume-job-matching", post(run_resume_job_matching))
        .route("/job-agent", post(run_job_agent))
        .route("/", get(list_tasks))
        .route("/resumes", get(list_resumes))
        .route("/found-jobs", get(list_found_jobs))
        .route(
            "/found-jobs/{job_id}",
            get(get_found_job).put(update_found_job),
        )
        .route("/{task_id}", get(get_task).put(update_task))
        .route("/{task_id}/analysis-summary", get(task_analysis_summary))
}

// ============================================================================
// Pipeline endpoints
// ============================================================================

async fn run_seek_scraper(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SeekScraperRequest>,
) -> Result<(StatusCode, Json<SeekScraperResponse>), ApiError> {
    let instructions = TaskInstructions::SeekScraper(ScraperInstructions {
        job_titles: request.job_titles,
        location: request.location,
        job_required: request.job_required,
        task_description: request.task_description,
    });

    let task = state.engine.execute(user_id, instructions).await?;
    fail_if_task_failed(&task)?;

    let jobs_found = result_u32(&task, "jobs_found");
    Ok((
        StatusCode::CREATED,
        Json(SeekScraperResponse {
            task_id: task.id,
            message: "Scraping completed successfully".to_string(),
            jobs_found,
            status: task.status,
        }),
    ))
}

async fn run_resume_job_matching(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<ResumeJobMatchingRequest>,
) -> Result<(StatusCode, Json<ResumeJobMatchingResponse>), ApiError> {
    let resume_id = request.resume_id;
    let ai_model = request.ai_model.clone();
    let instructions = TaskInstructions::ResumeJobMatching(MatchingInstructions {
        resume_id: request.resume_id,
        task_id: request.task_id,
        ai_model: request.ai_model,
        task_description: request.task_description,
    });

    let task = state.engine.execute(user_id, instructions).await?;
    fail_if_task_failed(&task)?;

    let jobs_analyzed = result_u32(&task, "total_analyzed");
    Ok((
        StatusCode::CREATED,
        Json(ResumeJobMatchingResponse {
            task_id: task.id,
            message: format!("Analysis completed for {jobs_analyzed} jobs"),
            jobs_analyzed,
            resume_id,
            ai_model,
        }),
    ))
}

async fn run_job_agent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<JobAgentRequest>,
) -> Result<(StatusCode, Json<JobAgentResponse>), ApiError> {
    let instructions = TaskInstructions::JobAgent(AgentInstructions {
        job_titles: request.job_titles,
        location: request.location,
        job_required: request.job_required,
        resume_id: request.resume_id,
        ai_model: request.ai_model,
        task_description: request.task_description,
    });

    let task = state.engine.execute(user_id, instructions).await?;
    fail_if_task_failed(&task)?;

    Ok((
        StatusCode::CREATED,
        Json(JobAgentResponse {
            task_id: task.id,
            jobs_found: result_u32(&task, "jobs_found"),
            successful_analyses: result_u32(&task, "successful_analyses"),
            failed_analyses: result_u32(&task, "failed_analyses"),
            average_score: result_i64(&task, "average_score"),
        }),
    ))
}

// ============================================================================
// Task management endpoints
// ============================================================================

async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<AgentTask>>, ApiError> {
    let pagination = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = TaskFilter {
        status: query.status,
        limit: pagination.limit(),
        offset: pagination.offset(),
    };

    let tasks = state.engine.store().list_tasks(user_id, &filter).await?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<AgentTask>, ApiError> {
    let task = state.engine.store().get_task(user_id, task_id).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(request): Json<UpdateTaskRequest>,
) -> Result<Json<AgentTask>, ApiError> {
    // Cancellation goes through the engine so a live worker observes it;
    // cancelling an already-terminal task is a no-op.
    if request.status == Some(TaskStatus::Cancelled) {
        let task = state.engine.cancel_task(user_id, task_id).await?;
        return Ok(Json(task));
    }

    let completed_at = request
        .status
        .filter(|s| s.is_terminal())
        .map(|_| chrono::Utc::now());

    let patch = TaskPatch {
        status: request.status,
        other_message: request.other_message,
        execution_result: request.execution_result,
        completed_at,
        ..Default::default()
    };

    let task = state
        .engine
        .store()
        .update_task(user_id, task_id, patch)
        .await?;
    Ok(Json(task))
}

async fn task_analysis_summary(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskAnalysisSummary>, ApiError> {
    state.engine.store().get_task(user_id, task_id).await?;

    let jobs = state
        .engine
        .store()
        .list_found_jobs(user_id, &FoundJobFilter::for_task(task_id))
        .await?;

    let scores: Vec<i32> = jobs.iter().filter_map(|j| j.match_score).collect();
    let mut distribution = ScoreDistribution::default();
    for score in &scores {
        distribution.add(*score);
    }

    let status = if scores.is_empty() {
        "pending"
    } else if scores.len() == jobs.len() {
        "completed"
    } else {
        "partial"
    };

    let average = if scores.is_empty() {
        0.0
    } else {
        let sum: i64 = scores.iter().map(|s| i64::from(*s)).sum();
        ((sum as f64 / scores.len() as f64) * 100.0).round() / 100.0
    };

    Ok(Json(TaskAnalysisSummary {
        task_id,
        total_jobs: jobs.len() as u32,
        analyzed_jobs: scores.len() as u32,
        status: status.to_string(),
        average_score: average,
        max_score: scores.iter().copied().max().unwrap_or(0),
        min_score: scores.iter().copied().min().unwrap_or(0),
        score_distribution: distribution,
    }))
}

// ============================================================================
// Found-job endpoints
// ============================================================================

async fn list_found_jobs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(query): Query<FoundJobsQuery>,
) -> Result<Json<Vec<AgentFoundJob>>, ApiError> {
    let pagination = PageParams {
        page: query.page,
        per_page: query.per_page,
    };
    let filter = FoundJobFilter {
        task_id: query.task_id,
        saved_only: query.saved_only.unwrap_or(false),
        unscored_only: false,
        limit: pagination.limit(),
        offset: pagination.offset(),
    };

    let jobs = state
        .engine
        .store()
        .list_found_jobs(user_id, &filter)
        .await?;
    Ok(Json(jobs))
}

async fn get_found_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<Uuid>,
) -> Result<Json<AgentFoundJob>, ApiError> {
    let job = state.engine.store().get_found_job(user_id, job_id).await?;
    Ok(Json(job))
}

async fn update_found_job(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(job_id): Path<Uuid>,
    Json(request): Json<UpdateFoundJobRequest>,
) -> Result<Json<AgentFoundJob>, ApiError> {
    let patch = FoundJobPatch {
        saved: request.saved,
        application_status: request.application_status,
        ..Default::default()
    };

    let job = state
        .engine
        .store()
        .update_found_job(user_id, job_id, patch)
        .await?;
    Ok(Json(job))
}

// ============================================================================
// Resumes
// ============================================================================

async fn list_resumes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Resume>>, ApiError> {
    let resumes = state.engine.store().list_resumes(user_id).await?;
    Ok(Json(resumes))
}

// ============================================================================
// Helpers
// ============================================================================

/// Pipeline POSTs surface a failed run as a 500 with the task's message.
fn fail_if_task_failed(task: &AgentTask) -> Result<(), ApiError> {
    if task.status == TaskStatus::Failed {
        let message = task
            .other_message
            .clone()
            .unwrap_or_else(|| "task failed".to_string());
        return Err(ApiError::Internal(anyhow!("{message}")));
    }
    Ok(())
}

fn result_u32(task: &AgentTask, key: &str) -> u32 {
    task.execution_result
        .as_ref()
        .and_then(|r| r.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32
}

fn result_i64(task: &AgentTask, key: &str) -> i64 {
    task.execution_result
        .as_ref()
        .and_then(|r| r.get(key))
        .and_then(|v| v.as_i64())
        .unwrap_or(0)
}
