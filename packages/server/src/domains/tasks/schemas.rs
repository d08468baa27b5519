//! Request and response bodies for the task REST surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::models::TaskStatus;

// ============================================================================
// Pipeline requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SeekScraperRequest {
    pub job_titles: Vec<String>,
    pub location: String,
    pub job_required: u32,
    #[serde(default)]
    pub task_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SeekScraperResponse {
    pub task_id: Uuid,
    pub message: String,
    pub jobs_found: u32,
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct ResumeJobMatchingRequest {
    pub resume_id: Uuid,
    pub task_id: Uuid,
    pub ai_model: String,
    #[serde(default)]
    pub task_description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResumeJobMatchingResponse {
    pub task_id: Uuid,
    pub message: String,
    pub jobs_analyzed: u32,
    pub resume_id: Uuid,
    pub ai_model: String,
}

#[derive(Debug, Deserialize)]
pub struct JobAgentRequest {
    pub job_titles: Vec<String>,
    pub location: String,
    pub job_required: u32,
    #[serde(default)]
    pub task_description: Option<String>,
    pub resume_id: Uuid,
    pub ai_model: String,
}

#[derive(Debug, Serialize)]
pub struct JobAgentResponse {
    pub task_id: Uuid,
    pub jobs_found: u32,
    pub successful_analyses: u32,
    pub failed_analyses: u32,
    pub average_score: i64,
}

// ============================================================================
// Task management
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub other_message: Option<String>,
    #[serde(default)]
    pub execution_result: Option<Value>,
}

// ============================================================================
// Found jobs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FoundJobsQuery {
    #[serde(default)]
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub saved_only: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFoundJobRequest {
    #[serde(default)]
    pub saved: Option<bool>,
    #[serde(default)]
    pub application_status: Option<String>,
}

// ============================================================================
// Analysis summary
// ============================================================================

/// Aggregate of a task's scored postings.
#[derive(Debug, Serialize)]
pub struct TaskAnalysisSummary {
    pub task_id: Uuid,
    pub total_jobs: u32,
    pub analyzed_jobs: u32,
    pub status: String,
    pub average_score: f64,
    pub max_score: i32,
    pub min_score: i32,
    pub score_distribution: ScoreDistribution,
}

#[derive(Debug, Serialize, Default)]
pub struct ScoreDistribution {
    /// 90 and above.
    pub excellent: u32,
    /// 70 to 89.
    pub good: u32,
    /// 50 to 69.
    pub fair: u32,
    /// Below 50.
    pub poor: u32,
}

impl ScoreDistribution {
    pub fn add(&mut self, score: i32) {
        if score >= 90 {
            self.excellent += 1;
        } else if score >= 70 {
            self.good += 1;
        } else if score >= 50 {
            self.fair += 1;
        } else {
            self.poor += 1;
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_distribution_buckets() {
        let mut distribution = ScoreDistribution::default();
        for score in [95, 90, 72, 55, 10, 49] {
            distribution.add(score);
        }
        assert_eq!(distribution.excellent, 2);
        assert_eq!(distribution.good, 1);
        assert_eq!(distribution.fair, 1);
        assert_eq!(distribution.poor, 2);
    }
}
