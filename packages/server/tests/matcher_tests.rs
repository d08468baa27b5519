//! Matcher and composite job-agent scenarios.

mod common;

use agent_core::domains::tasks::instructions::{
    AgentInstructions, MatchingInstructions, TaskInstructions,
};
use agent_core::domains::tasks::models::{NewFoundJob, TaskStatus, TaskType};
use agent_core::domains::tasks::store::{FoundJobFilter, TaskStore};
use agent_core::domains::tasks::EngineConfig;
use serde_json::json;
use uuid::Uuid;

use common::{assert_valid_history, cards, harness, ScorerMode, StubFetcher, StubScorer, TestHarness};

fn matching_instructions(h: &TestHarness, source_task: Uuid) -> TaskInstructions {
    TaskInstructions::ResumeJobMatching(MatchingInstructions {
        resume_id: h.resume_id,
        task_id: source_task,
        ai_model: "deepseek".to_string(),
        task_description: None,
    })
}

async fn seed_source_task(h: &TestHarness, job_count: usize) -> Uuid {
    let task = h
        .store
        .create_task(h.user_id, TaskType::SeekScraper, "source", &json!({}))
        .await
        .unwrap();

    let postings: Vec<NewFoundJob> = (0..job_count)
        .map(|i| NewFoundJob {
            title: format!("Engineer {i}"),
            company: "Acme".to_string(),
            job_url: Some(format!("https://jobs.example.com/job/{i}")),
            detailed_description: Some("Builds things.".to_string()),
            ..Default::default()
        })
        .collect();
    h.store
        .insert_found_jobs(h.user_id, task.id, &postings)
        .await
        .unwrap();

    task.id
}

#[tokio::test]
async fn matcher_on_empty_source_completes_with_zero_counts() {
    let h = harness(
        StubFetcher::new(vec![]),
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );
    let source = seed_source_task(&h, 0).await;

    let task = h
        .engine
        .execute(h.user_id, matching_instructions(&h, source))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["total_analyzed"], 0);
    assert_eq!(result["average_score"], 0);
}

#[tokio::test]
async fn matcher_with_provider_down_fails_and_leaves_scores_null() {
    let h = harness(
        StubFetcher::new(vec![]),
        StubScorer::new(ScorerMode::AlwaysFail),
        EngineConfig::default(),
    );
    let source = seed_source_task(&h, 3).await;

    let task = h
        .engine
        .execute(h.user_id, matching_instructions(&h, source))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    let message = task.other_message.unwrap();
    assert!(message.contains("analyses failed"), "message: {message}");
    assert!(message.contains("provider"), "message: {message}");

    // Failed attempts leave both score and analysis null.
    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(source))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.match_score.is_none()));
    assert!(jobs.iter().all(|j| j.ai_analysis.is_none()));

    // Partial aggregates are still recorded.
    let result = task.execution_result.unwrap();
    assert_eq!(result["failed_analyses"], 3);
    assert_eq!(result["successful_analyses"], 0);

    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn matcher_counts_partial_failures_without_failing_the_task() {
    let h = harness(
        StubFetcher::new(vec![]),
        StubScorer::new(ScorerMode::FailFirst(3, 70)),
        EngineConfig::default(),
    );
    let source = seed_source_task(&h, 7).await;

    let task = h
        .engine
        .execute(h.user_id, matching_instructions(&h, source))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["total_analyzed"], 7);
    assert_eq!(result["successful_analyses"], 4);
    assert_eq!(result["failed_analyses"], 3);
    assert_eq!(result["average_score"], 70);

    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(source))
        .await
        .unwrap();
    let scored = jobs.iter().filter(|j| j.match_score.is_some()).count();
    assert_eq!(scored, 4);
}

#[tokio::test]
async fn matcher_rejects_unknown_resume_without_creating_a_task() {
    let h = harness(
        StubFetcher::new(vec![]),
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );
    let source = seed_source_task(&h, 1).await;

    let instructions = TaskInstructions::ResumeJobMatching(MatchingInstructions {
        resume_id: Uuid::new_v4(),
        task_id: source,
        ai_model: "deepseek".to_string(),
        task_description: None,
    });
    assert!(h.engine.execute(h.user_id, instructions).await.is_err());

    let tasks = h
        .engine
        .store()
        .list_tasks(h.user_id, &Default::default())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1, "only the seeded source task exists");
}

#[tokio::test]
async fn job_agent_full_path_scores_every_found_job() {
    let h = harness(
        StubFetcher::new(cards(&[
            ("Backend Engineer", "Acme", "/job/1"),
            ("Platform Engineer", "Beta", "/job/2"),
            ("Staff Engineer", "Gamma", "/job/3"),
        ])),
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(
            h.user_id,
            TaskInstructions::JobAgent(AgentInstructions {
                job_titles: vec!["Backend Engineer".to_string()],
                location: "Remote".to_string(),
                job_required: 2,
                resume_id: h.resume_id,
                ai_model: "deepseek".to_string(),
                task_description: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["stage"], "completed");
    assert!(result["jobs_found"].as_u64().unwrap() <= 2);
    assert_eq!(result["successful_analyses"], 2);
    assert_eq!(result["failed_analyses"], 0);
    assert_eq!(result["average_score"], 80);

    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert!(!jobs.is_empty());
    for job in &jobs {
        let score = job.match_score.expect("every posting scored");
        assert!((0..=100).contains(&score));
        let analysis = job.ai_analysis.as_ref().expect("analysis stored");
        for key in [
            "matching_score",
            "summary",
            "strengths",
            "gaps",
            "recommendations",
            "reasoning",
        ] {
            assert!(analysis.get(key).is_some(), "missing key {key}");
        }
    }

    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn job_agent_with_zero_findings_completes_in_scraping_stage() {
    let h = harness(
        StubFetcher::new(vec![]),
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(
            h.user_id,
            TaskInstructions::JobAgent(AgentInstructions {
                job_titles: vec!["Unicorn Wrangler".to_string()],
                location: "Remote".to_string(),
                job_required: 2,
                resume_id: h.resume_id,
                ai_model: "deepseek".to_string(),
                task_description: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["jobs_found"], 0);
    assert_eq!(result["stage"], "scraping");
}

#[tokio::test]
async fn job_agent_with_missing_resume_fails_before_scraping() {
    let h = harness(
        StubFetcher::new(cards(&[("Engineer", "Acme", "/job/1")])),
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(
            h.user_id,
            TaskInstructions::JobAgent(AgentInstructions {
                job_titles: vec!["Engineer".to_string()],
                location: "Remote".to_string(),
                job_required: 2,
                resume_id: Uuid::new_v4(),
                ai_model: "deepseek".to_string(),
                task_description: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.other_message.unwrap().contains("resume"));
    // Nothing was scraped.
    assert_eq!(h.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn job_agent_matching_failure_preserves_found_jobs() {
    let h = harness(
        StubFetcher::new(cards(&[
            ("Backend Engineer", "Acme", "/job/1"),
            ("Platform Engineer", "Beta", "/job/2"),
        ])),
        StubScorer::new(ScorerMode::AlwaysFail),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(
            h.user_id,
            TaskInstructions::JobAgent(AgentInstructions {
                job_titles: vec!["Backend Engineer".to_string()],
                location: "Remote".to_string(),
                job_required: 2,
                resume_id: h.resume_id,
                ai_model: "deepseek".to_string(),
                task_description: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["stage"], "matching");
    assert_eq!(result["jobs_found"], 2);

    // Stage-1 postings survive the stage-2 failure.
    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.match_score.is_none()));
}
