//! Typed task instructions and execution results.
//!
//! The store keeps `task_instructions` and `execution_result` as opaque JSON;
//! these are the tagged variants the engine works with. Serialization happens
//! only at the store boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::models::TaskType;

/// Soft ceiling on postings per scraper run.
pub const MAX_JOBS_PER_RUN: u32 = 50;

// ============================================================================
// Instructions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperInstructions {
    pub job_titles: Vec<String>,
    pub location: String,
    pub job_required: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingInstructions {
    pub resume_id: Uuid,
    /// Source task whose found jobs will be scored.
    pub task_id: Uuid,
    pub ai_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstructions {
    pub job_titles: Vec<String>,
    pub location: String,
    pub job_required: u32,
    pub resume_id: Uuid,
    pub ai_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
}

impl AgentInstructions {
    pub fn scraper_part(&self) -> ScraperInstructions {
        ScraperInstructions {
            job_titles: self.job_titles.clone(),
            location: self.location.clone(),
            job_required: self.job_required,
            task_description: self.task_description.clone(),
        }
    }
}

/// Validated input parameters for one task, tagged by type.
#[derive(Debug, Clone)]
pub enum TaskInstructions {
    SeekScraper(ScraperInstructions),
    ResumeJobMatching(MatchingInstructions),
    JobAgent(AgentInstructions),
}

impl TaskInstructions {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskInstructions::SeekScraper(_) => TaskType::SeekScraper,
            TaskInstructions::ResumeJobMatching(_) => TaskType::ResumeJobMatching,
            TaskInstructions::JobAgent(_) => TaskType::JobAgent,
        }
    }

    /// Normalize and validate; returns a human-readable rejection reason.
    ///
    /// Titles are trimmed and must be non-empty; `job_required` above the
    /// soft ceiling is clamped rather than rejected. Zero is allowed (the
    /// scraper completes immediately).
    pub fn validate(&mut self) -> Result<(), String> {
        match self {
            TaskInstructions::SeekScraper(instructions) => {
                validate_scrape_inputs(
                    &mut instructions.job_titles,
                    &instructions.location,
                    &mut instructions.job_required,
                )?;
            }
            TaskInstructions::ResumeJobMatching(instructions) => {
                if instructions.ai_model.trim().is_empty() {
                    return Err("ai_model must not be empty".to_string());
                }
            }
            TaskInstructions::JobAgent(instructions) => {
                validate_scrape_inputs(
                    &mut instructions.job_titles,
                    &instructions.location,
                    &mut instructions.job_required,
                )?;
                if instructions.ai_model.trim().is_empty() {
                    return Err("ai_model must not be empty".to_string());
                }
            }
        }
        Ok(())
    }

    /// Default human label when the client omits one.
    pub fn default_description(&self) -> String {
        match self {
            TaskInstructions::SeekScraper(i) => format!(
                "Scraping {} jobs: {}",
                i.job_required,
                i.job_titles.join(", ")
            ),
            TaskInstructions::ResumeJobMatching(i) => format!(
                "AI analysis of resume {} against jobs from task {}",
                i.resume_id, i.task_id
            ),
            TaskInstructions::JobAgent(i) => format!(
                "Job Agent: find {} jobs and analyze with resume {}",
                i.job_required, i.resume_id
            ),
        }
    }

    /// Provided or synthesized description.
    pub fn description(&self) -> String {
        let provided = match self {
            TaskInstructions::SeekScraper(i) => i.task_description.as_deref(),
            TaskInstructions::ResumeJobMatching(i) => i.task_description.as_deref(),
            TaskInstructions::JobAgent(i) => i.task_description.as_deref(),
        };
        match provided {
            Some(description) if !description.trim().is_empty() => description.to_string(),
            _ => self.default_description(),
        }
    }

    pub fn to_value(&self) -> Value {
        let result = match self {
            TaskInstructions::SeekScraper(i) => serde_json::to_value(i),
            TaskInstructions::ResumeJobMatching(i) => serde_json::to_value(i),
            TaskInstructions::JobAgent(i) => serde_json::to_value(i),
        };
        result.unwrap_or(Value::Null)
    }

    /// Decode the stored instructions document for a task of a known type.
    pub fn from_stored(task_type: TaskType, value: &Value) -> Result<Self, serde_json::Error> {
        Ok(match task_type {
            TaskType::SeekScraper => {
                TaskInstructions::SeekScraper(serde_json::from_value(value.clone())?)
            }
            TaskType::ResumeJobMatching => {
                TaskInstructions::ResumeJobMatching(serde_json::from_value(value.clone())?)
            }
            TaskType::JobAgent => {
                TaskInstructions::JobAgent(serde_json::from_value(value.clone())?)
            }
        })
    }
}

fn validate_scrape_inputs(
    job_titles: &mut Vec<String>,
    location: &str,
    job_required: &mut u32,
) -> Result<(), String> {
    let trimmed: Vec<String> = job_titles
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if trimmed.is_empty() {
        return Err("job_titles must contain at least one non-empty title".to_string());
    }
    if location.trim().is_empty() {
        return Err("location must not be empty".to_string());
    }

    *job_titles = trimmed;
    *job_required = (*job_required).min(MAX_JOBS_PER_RUN);
    Ok(())
}

// ============================================================================
// Execution results
// ============================================================================

/// Scraper run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperOutcome {
    pub jobs_found: u32,
    pub jobs_required: u32,
    pub job_titles_searched: Vec<String>,
    pub location: String,
    /// `jobs_found / jobs_required`, clamped to [0, 1].
    pub completion_rate: f64,
}

impl ScraperOutcome {
    pub fn new(
        jobs_found: u32,
        jobs_required: u32,
        job_titles_searched: Vec<String>,
        location: String,
    ) -> Self {
        let completion_rate = if jobs_required == 0 {
            1.0
        } else {
            (f64::from(jobs_found) / f64::from(jobs_required)).clamp(0.0, 1.0)
        };
        Self {
            jobs_found,
            jobs_required,
            job_titles_searched,
            location,
            completion_rate,
        }
    }
}

/// Matcher run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingOutcome {
    pub total_analyzed: u32,
    pub successful_analyses: u32,
    pub failed_analyses: u32,
    /// Integer mean of successful scores; 0 when nothing succeeded.
    pub average_score: i64,
    pub resume_id: Uuid,
    pub ai_model: String,
    pub processing_time_seconds: f64,
}

/// Composite pipeline summary. Counters are absent when the run never
/// reached the matching stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub jobs_found: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_analyses: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_analyses: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<i64>,
    /// "scraping", "matching", or "completed".
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
}

pub fn to_result_value<T: Serialize>(outcome: &T) -> Value {
    serde_json::to_value(outcome).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper_instructions(titles: &[&str], required: u32) -> TaskInstructions {
        TaskInstructions::SeekScraper(ScraperInstructions {
            job_titles: titles.iter().map(|t| t.to_string()).collect(),
            location: "Sydney NSW".to_string(),
            job_required: required,
            task_description: None,
        })
    }

    #[test]
    fn titles_are_trimmed_and_blank_ones_dropped() {
        let mut instructions = scraper_instructions(&["  Data Analyst ", "   "], 5);
        instructions.validate().unwrap();
        match instructions {
            TaskInstructions::SeekScraper(i) => {
                assert_eq!(i.job_titles, vec!["Data Analyst".to_string()]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn all_blank_titles_are_rejected() {
        let mut instructions = scraper_instructions(&["", "  "], 5);
        assert!(instructions.validate().is_err());
    }

    #[test]
    fn job_required_is_clamped_to_ceiling() {
        let mut instructions = scraper_instructions(&["Engineer"], 500);
        instructions.validate().unwrap();
        match instructions {
            TaskInstructions::SeekScraper(i) => assert_eq!(i.job_required, MAX_JOBS_PER_RUN),
            _ => unreachable!(),
        }
    }

    #[test]
    fn zero_required_is_allowed() {
        let mut instructions = scraper_instructions(&["Engineer"], 0);
        assert!(instructions.validate().is_ok());
    }

    #[test]
    fn completion_rate_is_clamped() {
        let outcome = ScraperOutcome::new(10, 5, vec![], "Remote".into());
        assert_eq!(outcome.completion_rate, 1.0);

        let outcome = ScraperOutcome::new(1, 4, vec![], "Remote".into());
        assert_eq!(outcome.completion_rate, 0.25);

        let outcome = ScraperOutcome::new(0, 0, vec![], "Remote".into());
        assert_eq!(outcome.completion_rate, 1.0);
    }

    #[test]
    fn instructions_round_trip_through_storage() {
        let mut instructions = scraper_instructions(&["Engineer"], 3);
        instructions.validate().unwrap();
        let value = instructions.to_value();
        let decoded = TaskInstructions::from_stored(TaskType::SeekScraper, &value).unwrap();
        match decoded {
            TaskInstructions::SeekScraper(i) => assert_eq!(i.job_required, 3),
            _ => unreachable!(),
        }
    }

    #[test]
    fn description_falls_back_to_synthesized_label() {
        let instructions = scraper_instructions(&["Engineer"], 3);
        assert_eq!(instructions.description(), "Scraping 3 jobs: Engineer");
    }
}
