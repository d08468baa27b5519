//! Batched resume-to-job matching pipeline.
//!
//! Loads the unscored postings of a source task, scores each against the
//! resume through [`BaseResumeScorer`], and writes score + analysis back
//! per row. Calls are sequential within a batch (provider rate limits) and
//! concurrent across at most two batches; per-posting failures are counted,
//! never fatal. The task fails only when every posting failed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::kernel::BaseResumeScorer;

use super::error::WorkerError;
use super::instructions::MatchingOutcome;
use super::models::{AgentFoundJob, FoundJobPatch};
use super::store::{FoundJobFilter, TaskStore};

/// Postings per batch.
const BATCH_SIZE: usize = 5;

/// Concurrent batches in flight.
const MAX_CONCURRENT_BATCHES: usize = 2;

/// Pause after each batch to stay under provider rate limits.
const INTER_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Result of one matcher run.
#[derive(Debug, Clone)]
pub struct MatchRun {
    pub outcome: MatchingOutcome,
    /// Cancellation was observed; counts are partial.
    pub cancelled: bool,
    first_error: Option<String>,
}

impl MatchRun {
    /// Failure reason when the whole run is considered failed: nothing
    /// succeeded while something was attempted.
    pub fn failure_message(&self) -> Option<String> {
        if self.outcome.successful_analyses == 0 && self.outcome.failed_analyses > 0 {
            let detail = self
                .first_error
                .clone()
                .unwrap_or_else(|| "unknown provider failure".to_string());
            Some(format!(
                "all {} analyses failed: {detail}",
                self.outcome.failed_analyses
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
struct BatchStats {
    successful: u32,
    failed: u32,
    score_sum: i64,
    first_error: Option<String>,
}

impl BatchStats {
    fn record_failure(&mut self, error: String) {
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    fn merge(&mut self, other: BatchStats) {
        self.successful += other.successful;
        self.failed += other.failed;
        self.score_sum += other.score_sum;
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
    }
}

/// Resume-vs-jobs scoring pipeline.
pub struct ResumeMatcher {
    store: Arc<dyn TaskStore>,
    scorer: Arc<dyn BaseResumeScorer>,
}

impl ResumeMatcher {
    pub fn new(store: Arc<dyn TaskStore>, scorer: Arc<dyn BaseResumeScorer>) -> Self {
        Self { store, scorer }
    }

    /// Score every unscored posting of `source_task_id` against the resume.
    pub async fn run(
        &self,
        user_id: Uuid,
        resume_id: Uuid,
        source_task_id: Uuid,
        ai_model: &str,
        cancel: &CancellationToken,
    ) -> Result<MatchRun, WorkerError> {
        let started = std::time::Instant::now();

        let resume = self.store.get_resume(user_id, resume_id).await?;
        // The source task must exist and belong to the caller.
        self.store.get_task(user_id, source_task_id).await?;

        let jobs = self
            .store
            .list_found_jobs(user_id, &FoundJobFilter::unscored_for_task(source_task_id))
            .await?;

        if jobs.is_empty() {
            return Ok(MatchRun {
                outcome: MatchingOutcome {
                    total_analyzed: 0,
                    successful_analyses: 0,
                    failed_analyses: 0,
                    average_score: 0,
                    resume_id,
                    ai_model: ai_model.to_string(),
                    processing_time_seconds: round2(started.elapsed().as_secs_f64()),
                },
                cancelled: false,
                first_error: None,
            });
        }

        let resume_summary = Arc::new(resume.scoring_summary());
        info!(
            jobs = jobs.len(),
            ai_model = %ai_model,
            "starting resume-job analysis"
        );

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_BATCHES));
        let mut handles = Vec::new();
        let mut cancelled = false;

        for batch in jobs.chunks(BATCH_SIZE) {
            // Cancellation is polled between batches.
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| WorkerError::Internal(e.to_string()))?;

            let store = Arc::clone(&self.store);
            let scorer = Arc::clone(&self.scorer);
            let resume_summary = Arc::clone(&resume_summary);
            let ai_model = ai_model.to_string();
            let batch: Vec<AgentFoundJob> = batch.to_vec();
            let batch_len = batch.len() as u32;

            let handle = tokio::spawn(async move {
                let mut stats = BatchStats::default();

                for job in batch {
                    match scorer
                        .score(&ai_model, &resume_summary, &job.scoring_summary())
                        .await
                    {
                        Ok(result) => {
                            let score = result.matching_score.clamp(0, 100) as i32;
                            let analysis = serde_json::to_value(&result)
                                .unwrap_or(serde_json::Value::Null);

                            match store
                                .update_found_job(
                                    job.user_id,
                                    job.id,
                                    FoundJobPatch::scored(score, analysis),
                                )
                                .await
                            {
                                Ok(_) => {
                                    stats.successful += 1;
                                    stats.score_sum += i64::from(score);
                                }
                                Err(e) => {
                                    warn!(job_id = %job.id, error = %e, "failed to persist analysis");
                                    stats.record_failure(e.to_string());
                                }
                            }
                        }
                        Err(e) => {
                            warn!(job_id = %job.id, error = %e, "analysis failed");
                            stats.record_failure(e.to_string());
                        }
                    }
                }

                // Pace the provider before the next batch takes this slot.
                tokio::time::sleep(INTER_BATCH_DELAY).await;
                drop(permit);
                stats
            });

            handles.push((batch_len, handle));
        }

        let mut totals = BatchStats::default();
        for (batch_len, handle) in handles {
            match handle.await {
                Ok(stats) => totals.merge(stats),
                Err(e) => {
                    warn!(error = %e, "batch worker crashed");
                    let mut crashed = BatchStats::default();
                    crashed.failed = batch_len;
                    crashed.first_error = Some(format!("batch worker crashed: {e}"));
                    totals.merge(crashed);
                }
            }
        }

        let average_score = if totals.successful > 0 {
            (totals.score_sum as f64 / f64::from(totals.successful)).round() as i64
        } else {
            0
        };

        info!(
            successful = totals.successful,
            failed = totals.failed,
            average_score,
            "resume-job analysis finished"
        );

        Ok(MatchRun {
            outcome: MatchingOutcome {
                total_analyzed: totals.successful + totals.failed,
                successful_analyses: totals.successful,
                failed_analyses: totals.failed,
                average_score,
                resume_id,
                ai_model: ai_model.to_string(),
                processing_time_seconds: round2(started.elapsed().as_secs_f64()),
            },
            cancelled,
            first_error: totals.first_error,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(successful: u32, failed: u32, first_error: Option<&str>) -> MatchRun {
        MatchRun {
            outcome: MatchingOutcome {
                total_analyzed: successful + failed,
                successful_analyses: successful,
                failed_analyses: failed,
                average_score: 0,
                resume_id: Uuid::new_v4(),
                ai_model: "deepseek".into(),
                processing_time_seconds: 0.0,
            },
            cancelled: false,
            first_error: first_error.map(str::to_string),
        }
    }

    #[test]
    fn all_failures_produce_a_task_failure() {
        let run = run_with(0, 4, Some("API error (500): boom"));
        let message = run.failure_message().unwrap();
        assert!(message.contains("all 4 analyses failed"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn partial_success_is_not_a_task_failure() {
        assert!(run_with(1, 3, Some("boom")).failure_message().is_none());
    }

    #[test]
    fn empty_run_is_not_a_task_failure() {
        assert!(run_with(0, 0, None).failure_message().is_none());
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(2.5551), 2.56);
    }
}
