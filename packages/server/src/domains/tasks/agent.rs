//! Composite job-agent pipeline: scrape, then match, under one task record.
//!
//! Stage failures are tagged in the result document (`stage`) and never
//! discard what earlier stages produced: postings inserted during scraping
//! survive a matching-stage failure.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::kernel::{BasePageFetcher, BaseResumeScorer};

use super::error::WorkerError;
use super::instructions::{AgentInstructions, AgentOutcome};
use super::matcher::ResumeMatcher;
use super::scraper::{ScraperConfig, SeekScraper};
use super::store::{FoundJobFilter, StoreError, TaskStore};

pub const STAGE_SCRAPING: &str = "scraping";
pub const STAGE_MATCHING: &str = "matching";
pub const STAGE_COMPLETED: &str = "completed";

/// Result of one composite run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    /// Cancellation was observed; counts are partial.
    pub cancelled: bool,
    /// Stage failure reason; the outcome's `stage` names the failed stage.
    pub failure: Option<String>,
}

/// Scrape-then-match pipeline.
pub struct JobAgentPipeline {
    store: Arc<dyn TaskStore>,
    scraper: SeekScraper,
    matcher: ResumeMatcher,
}

impl JobAgentPipeline {
    pub fn new(
        store: Arc<dyn TaskStore>,
        fetcher: Arc<dyn BasePageFetcher>,
        scorer: Arc<dyn BaseResumeScorer>,
        scraper_config: ScraperConfig,
    ) -> Self {
        let scraper = SeekScraper::new(fetcher, Arc::clone(&store), scraper_config);
        let matcher = ResumeMatcher::new(Arc::clone(&store), scorer);
        Self {
            store,
            scraper,
            matcher,
        }
    }

    pub async fn run(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        instructions: &AgentInstructions,
        cancel: &CancellationToken,
    ) -> Result<AgentRun, WorkerError> {
        let started = std::time::Instant::now();

        // Resume must exist before any scraping happens.
        match self.store.get_resume(user_id, instructions.resume_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => return Err(WorkerError::NotFound("resume")),
            Err(e) => return Err(e.into()),
        }

        // Stage 1: scraping. Found jobs are linked to this composite task.
        info!(task_id = %task_id, "job agent: scraping stage");
        let scrape = match self
            .scraper
            .run(user_id, task_id, &instructions.scraper_part(), cancel)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                // Session-level failure; report whatever got inserted first.
                let jobs_found = self.count_found_jobs(user_id, task_id).await?;
                return Ok(AgentRun {
                    outcome: scraping_outcome(jobs_found),
                    cancelled: false,
                    failure: Some(e.user_message()),
                });
            }
        };

        let jobs_found = scrape.outcome.jobs_found;
        if scrape.cancelled {
            return Ok(AgentRun {
                outcome: scraping_outcome(jobs_found),
                cancelled: true,
                failure: None,
            });
        }

        if jobs_found == 0 {
            info!(task_id = %task_id, "job agent: nothing to analyze");
            return Ok(AgentRun {
                outcome: scraping_outcome(0),
                cancelled: false,
                failure: None,
            });
        }

        // Stage 2: matching over the just-discovered postings.
        info!(task_id = %task_id, jobs_found, "job agent: matching stage");
        let matched = match self
            .matcher
            .run(
                user_id,
                instructions.resume_id,
                task_id,
                &instructions.ai_model,
                cancel,
            )
            .await
        {
            Ok(run) => run,
            Err(e) => {
                return Ok(AgentRun {
                    outcome: AgentOutcome {
                        jobs_found,
                        successful_analyses: None,
                        failed_analyses: None,
                        average_score: None,
                        stage: STAGE_MATCHING.to_string(),
                        processing_time_seconds: None,
                    },
                    cancelled: false,
                    failure: Some(e.user_message()),
                });
            }
        };

        let stage = if matched.cancelled || matched.failure_message().is_some() {
            STAGE_MATCHING
        } else {
            STAGE_COMPLETED
        };

        Ok(AgentRun {
            outcome: AgentOutcome {
                jobs_found,
                successful_analyses: Some(matched.outcome.successful_analyses),
                failed_analyses: Some(matched.outcome.failed_analyses),
                average_score: Some(matched.outcome.average_score),
                stage: stage.to_string(),
                processing_time_seconds: Some(round2(started.elapsed().as_secs_f64())),
            },
            cancelled: matched.cancelled,
            failure: matched.failure_message(),
        })
    }

    async fn count_found_jobs(&self, user_id: Uuid, task_id: Uuid) -> Result<u32, WorkerError> {
        let jobs = self
            .store
            .list_found_jobs(user_id, &FoundJobFilter::for_task(task_id))
            .await?;
        Ok(jobs.len() as u32)
    }
}

fn scraping_outcome(jobs_found: u32) -> AgentOutcome {
    AgentOutcome {
        jobs_found,
        successful_analyses: None,
        failed_analyses: None,
        average_score: None,
        stage: STAGE_SCRAPING.to_string(),
        processing_time_seconds: None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
