//! Engine and scraper pipeline scenarios.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use agent_core::domains::tasks::instructions::{ScraperInstructions, TaskInstructions};
use agent_core::domains::tasks::models::TaskStatus;
use agent_core::domains::tasks::store::{FoundJobFilter, TaskStore};
use agent_core::domains::tasks::EngineConfig;

use common::{assert_valid_history, cards, harness, ScorerMode, StubFetcher, StubScorer};

fn scrape_instructions(titles: &[&str], required: u32) -> TaskInstructions {
    TaskInstructions::SeekScraper(ScraperInstructions {
        job_titles: titles.iter().map(|t| t.to_string()).collect(),
        location: "Sydney NSW".to_string(),
        job_required: required,
        task_description: None,
    })
}

#[tokio::test]
async fn scraper_happy_path_completes_with_deduplicated_jobs() {
    // Four cards, one of them a duplicate URL; three required.
    let fetcher = StubFetcher::new(cards(&[
        ("Data Analyst", "Acme", "/job/1"),
        ("Data Analyst", "Acme", "/job/1?tracking=x"),
        ("Senior Analyst", "Beta", "/job/2"),
        ("BI Analyst", "Gamma", "/job/3"),
    ]));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(h.user_id, scrape_instructions(&["Data Analyst"], 3))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);

    let result = task.execution_result.unwrap();
    assert_eq!(result["jobs_found"], 3);
    assert_eq!(result["jobs_required"], 3);
    assert_eq!(result["completion_rate"], 1.0);
    assert_eq!(result["location"], "Sydney NSW");

    // No two found jobs share a URL.
    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 3);
    let urls: HashSet<_> = jobs.iter().map(|j| j.job_url.clone().unwrap()).collect();
    assert_eq!(urls.len(), 3);

    // Detail fields came from the detail page.
    assert!(jobs.iter().all(|j| j.work_type.as_deref() == Some("Full time")));
    assert!(jobs
        .iter()
        .all(|j| j.source_platform.as_deref() == Some("seek")));

    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn scraper_timestamps_are_monotonic() {
    let fetcher = StubFetcher::new(cards(&[("Analyst", "Acme", "/job/1")]));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(h.user_id, scrape_instructions(&["Analyst"], 1))
        .await
        .unwrap();

    let started_at = task.started_at.expect("started_at set on running");
    let completed_at = task.completed_at.expect("completed_at set on terminal");
    assert!(task.created_at <= started_at);
    assert!(started_at <= completed_at);
}

#[tokio::test]
async fn scraper_with_zero_required_completes_without_fetching() {
    let fetcher = StubFetcher::new(cards(&[("Analyst", "Acme", "/job/1")]));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(h.user_id, scrape_instructions(&["Analyst"], 0))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let result = task.execution_result.unwrap();
    assert_eq!(result["jobs_found"], 0);

    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert!(jobs.is_empty());
    assert_eq!(h.fetcher.fetch_count(), 0);
}

#[tokio::test]
async fn duplicates_across_titles_are_counted_once() {
    let fetcher = StubFetcher::new(cards(&[
        ("Data Analyst", "Acme", "/job/1"),
        ("Insights Analyst", "Beta", "/job/2"),
    ]));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    // Both titles serve the same two cards; dedup keeps two postings.
    let task = h
        .engine
        .execute(
            h.user_id,
            scrape_instructions(&["Data Analyst", "Insights Analyst"], 4),
        )
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert_eq!(jobs.len(), 2);
}

#[tokio::test]
async fn cancelling_a_terminal_task_is_a_noop() {
    let fetcher = StubFetcher::new(cards(&[("Analyst", "Acme", "/job/1")]));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let task = h
        .engine
        .execute(h.user_id, scrape_instructions(&["Analyst"], 1))
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    // Twice, to prove idempotence.
    let first = h.engine.cancel_task(h.user_id, task.id).await.unwrap();
    let second = h.engine.cancel_task(h.user_id, task.id).await.unwrap();
    assert_eq!(first.status, TaskStatus::Completed);
    assert_eq!(second.status, TaskStatus::Completed);

    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn cancellation_mid_scrape_preserves_partial_results() {
    // Slow navigation keeps the run in flight well past the cancel below.
    let fetcher = StubFetcher::new(cards(&[
        ("A", "Acme", "/job/1"),
        ("B", "Beta", "/job/2"),
        ("C", "Gamma", "/job/3"),
        ("D", "Delta", "/job/4"),
        ("E", "Eps", "/job/5"),
        ("F", "Zeta", "/job/6"),
    ]))
    .with_delay(Duration::from_millis(200));
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let (task, handle) = h
        .engine
        .submit(h.user_id, scrape_instructions(&["Analyst"], 6))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    h.engine.cancel_task(h.user_id, task.id).await.unwrap();
    handle.await.unwrap();

    let task = h.engine.store().get_task(h.user_id, task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.completed_at.is_some());

    // Partial counts are recorded and already-inserted postings remain.
    let result = task.execution_result.expect("partial result recorded");
    let jobs = h
        .store
        .list_found_jobs(h.user_id, &FoundJobFilter::for_task(task.id))
        .await
        .unwrap();
    assert_eq!(result["jobs_found"].as_u64().unwrap() as usize, jobs.len());

    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn per_user_cap_queues_excess_tasks() {
    let fetcher = StubFetcher::new(cards(&[("Analyst", "Acme", "/job/1")]))
        .with_delay(Duration::from_millis(150));
    let config = EngineConfig {
        max_active_per_user: 1,
        ..EngineConfig::default()
    };
    let h = harness(fetcher, StubScorer::new(ScorerMode::Fixed(80)), config);

    let (first, first_handle) = h
        .engine
        .submit(h.user_id, scrape_instructions(&["Analyst"], 1))
        .await
        .unwrap();
    let (second, second_handle) = h
        .engine
        .submit(h.user_id, scrape_instructions(&["Analyst"], 1))
        .await
        .unwrap();

    // With a single slot, at most one of the two is running at any moment.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let statuses = [
        h.engine.store().get_task(h.user_id, first.id).await.unwrap().status,
        h.engine.store().get_task(h.user_id, second.id).await.unwrap().status,
    ];
    let running = statuses
        .iter()
        .filter(|s| **s == TaskStatus::Running)
        .count();
    assert!(running <= 1, "cap violated: {statuses:?}");

    first_handle.await.unwrap();
    second_handle.await.unwrap();

    for task_id in [first.id, second.id] {
        let task = h.engine.store().get_task(h.user_id, task_id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_valid_history(&h.store.status_history(task_id));
    }
}

#[tokio::test]
async fn exceeding_the_budget_fails_with_deadline_message() {
    let fetcher = StubFetcher::new(cards(&[
        ("A", "Acme", "/job/1"),
        ("B", "Beta", "/job/2"),
        ("C", "Gamma", "/job/3"),
    ]))
    .with_delay(Duration::from_millis(200));
    let config = EngineConfig {
        scraper_budget: Duration::from_millis(300),
        ..EngineConfig::default()
    };
    let h = harness(fetcher, StubScorer::new(ScorerMode::Fixed(80)), config);

    let task = h
        .engine
        .execute(h.user_id, scrape_instructions(&["Analyst"], 3))
        .await
        .unwrap();

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.other_message.as_deref(), Some("deadline exceeded"));
    assert_valid_history(&h.store.status_history(task.id));
}

#[tokio::test]
async fn validation_failure_creates_no_task() {
    let fetcher = StubFetcher::new(vec![]);
    let h = harness(
        fetcher,
        StubScorer::new(ScorerMode::Fixed(80)),
        EngineConfig::default(),
    );

    let result = h
        .engine
        .execute(h.user_id, scrape_instructions(&["", "  "], 3))
        .await;
    assert!(result.is_err());

    let tasks = h
        .engine
        .store()
        .list_tasks(h.user_id, &Default::default())
        .await
        .unwrap();
    assert!(tasks.is_empty());
}
