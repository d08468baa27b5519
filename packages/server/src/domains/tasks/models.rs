//! Task and found-job models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Job descriptions are truncated to this length before scoring to keep the
/// prompt bounded.
const MAX_DESCRIPTION_IN_SUMMARY: usize = 2000;

/// Default application status for postings discovered by the scraper.
pub const APPLICATION_STATUS_AGENT_FOUND: &str = "agent_found";

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SeekScraper,
    ResumeJobMatching,
    JobAgent,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::SeekScraper => "seek_scraper",
            TaskType::ResumeJobMatching => "resume_job_matching",
            TaskType::JobAgent => "job_agent",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
    Scheduled,
    Recurring,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether the state machine admits `self -> next`.
    ///
    /// `pending -> running -> {completed|failed|cancelled}` is the engine's
    /// path; `paused` may return to `running`; a queued `pending` task may be
    /// cancelled before dispatch. `scheduled`/`recurring` are permitted by
    /// the store but never produced by the engine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) | (Running, Paused) => {
                true
            }
            (Paused, Running) | (Paused, Cancelled) => true,
            (Scheduled, Pending) | (Scheduled, Running) | (Scheduled, Cancelled) => true,
            (Recurring, Running) | (Recurring, Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Paused => "paused",
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Recurring => "recurring",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            "paused" => Ok(TaskStatus::Paused),
            "scheduled" => Ok(TaskStatus::Scheduled),
            "recurring" => Ok(TaskStatus::Recurring),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

// ============================================================================
// Task model
// ============================================================================

/// A durable record of one pipeline run.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct AgentTask {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub user_id: Uuid,

    pub task_type: TaskType,
    pub task_description: String,
    #[builder(default)]
    pub status: TaskStatus,

    /// Input parameters; shape depends on `task_type`.
    #[builder(default = json!({}))]
    pub task_instructions: Value,
    /// Output summary, written at terminal transition.
    #[builder(default, setter(strip_option))]
    pub execution_result: Option<Value>,
    /// Free-form diagnostic, typically the failure reason.
    #[builder(default, setter(strip_option))]
    pub other_message: Option<String>,

    #[builder(default, setter(strip_option))]
    pub started_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub completed_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,

    // Recurrence scaffolding: stored and surfaced, never executed here.
    #[builder(default = false)]
    pub is_recurring: bool,
    #[builder(default, setter(strip_option))]
    pub recurrence_config: Option<Value>,
    #[builder(default, setter(strip_option))]
    pub next_execution_at: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_execution_at: Option<DateTime<Utc>>,
    #[builder(default = 0)]
    pub execution_count: i32,
    #[builder(default, setter(strip_option))]
    pub max_executions: Option<i32>,
    #[builder(default = true)]
    pub is_active: bool,
}

/// Partial update applied through the store gateway.
///
/// `updated_at` is written automatically; a status change is validated
/// against the state machine and applied conditionally on the current value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub execution_result: Option<Value>,
    pub other_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Found job model
// ============================================================================

/// A posting discovered by a scraper run, optionally scored later.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct AgentFoundJob {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    /// Nulled when the parent task is deleted; the posting survives.
    #[builder(default, setter(strip_option))]
    pub agent_task_id: Option<Uuid>,
    pub user_id: Uuid,

    pub title: String,
    pub company: String,
    #[builder(default, setter(strip_option))]
    pub location: Option<String>,
    #[builder(default, setter(strip_option))]
    pub salary: Option<String>,
    #[builder(default, setter(strip_option))]
    pub job_url: Option<String>,
    #[builder(default, setter(strip_option))]
    pub work_type: Option<String>,
    #[builder(default, setter(strip_option))]
    pub detailed_description: Option<String>,
    #[builder(default = APPLICATION_STATUS_AGENT_FOUND.to_string())]
    pub application_status: String,
    #[builder(default, setter(strip_option))]
    pub source_platform: Option<String>,

    /// 0-100; set together with `ai_analysis` on a successful scoring attempt.
    #[builder(default, setter(strip_option))]
    pub match_score: Option<i32>,
    #[builder(default, setter(strip_option))]
    pub ai_analysis: Option<Value>,

    #[builder(default = false)]
    pub saved: bool,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl AgentFoundJob {
    /// Project the posting to the compact document the scorer sees.
    pub fn scoring_summary(&self) -> Value {
        let description = self
            .detailed_description
            .as_deref()
            .map(|d| {
                if d.len() <= MAX_DESCRIPTION_IN_SUMMARY {
                    d.to_string()
                } else {
                    let mut end = MAX_DESCRIPTION_IN_SUMMARY;
                    while !d.is_char_boundary(end) {
                        end -= 1;
                    }
                    d[..end].to_string()
                }
            })
            .unwrap_or_default();

        json!({
            "job_info": {
                "title": self.title,
                "company": self.company,
                "location": self.location,
                "work_type": self.work_type,
                "salary": self.salary,
            },
            "job_description": description,
            "job_url": self.job_url,
            "source_platform": self.source_platform,
        })
    }
}

/// Insert payload for a scraped posting.
#[derive(Debug, Clone, Default)]
pub struct NewFoundJob {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub job_url: Option<String>,
    pub work_type: Option<String>,
    pub detailed_description: Option<String>,
    pub source_platform: Option<String>,
}

/// Partial update for a found job.
#[derive(Debug, Clone, Default)]
pub struct FoundJobPatch {
    pub saved: Option<bool>,
    pub match_score: Option<i32>,
    pub ai_analysis: Option<Value>,
    pub application_status: Option<String>,
}

impl FoundJobPatch {
    /// Score and analysis are always written together.
    pub fn scored(score: i32, analysis: Value) -> Self {
        Self {
            match_score: Some(score),
            ai_analysis: Some(analysis),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskStatus::*;

    const ALL_STATUSES: [TaskStatus; 8] = [
        Pending, Running, Completed, Failed, Cancelled, Paused, Scheduled, Recurring,
    ];

    #[test]
    fn terminal_states_admit_no_transition() {
        for terminal in [Completed, Failed, Cancelled] {
            for next in ALL_STATUSES {
                assert!(
                    !terminal.can_transition_to(next),
                    "{terminal} -> {next} must be illegal"
                );
            }
        }
    }

    #[test]
    fn pending_advances_to_running() {
        assert!(Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
    }

    #[test]
    fn queued_task_may_be_cancelled() {
        assert!(Pending.can_transition_to(Cancelled));
    }

    #[test]
    fn running_reaches_every_terminal_state() {
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));
    }

    #[test]
    fn paused_returns_to_running() {
        assert!(Running.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Running));
        assert!(!Paused.can_transition_to(Completed));
    }

    #[test]
    fn no_transition_back_to_pending() {
        assert!(!Running.can_transition_to(Pending));
        assert!(!Paused.can_transition_to(Pending));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in ALL_STATUSES {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn new_task_defaults_to_pending() {
        let task = AgentTask::builder()
            .user_id(Uuid::new_v4())
            .task_type(TaskType::SeekScraper)
            .task_description("test")
            .build();
        assert_eq!(task.status, Pending);
        assert!(task.started_at.is_none());
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn scoring_summary_truncates_long_descriptions() {
        let job = AgentFoundJob::builder()
            .user_id(Uuid::new_v4())
            .title("Engineer")
            .company("Acme")
            .detailed_description("d".repeat(5000))
            .build();
        let summary = job.scoring_summary();
        assert_eq!(
            summary["job_description"].as_str().unwrap().len(),
            MAX_DESCRIPTION_IN_SUMMARY
        );
    }
}
