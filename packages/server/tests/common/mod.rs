//! Shared test harness: in-memory store, stub page fetcher, stub scorer.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use agent_core::domains::resumes::Resume;
use agent_core::domains::tasks::models::TaskStatus;
use agent_core::domains::tasks::scraper::ScraperConfig;
use agent_core::domains::tasks::store::MemoryTaskStore;
use agent_core::domains::tasks::{EngineConfig, TaskEngine};
use agent_core::kernel::{AnalysisResult, BasePageFetcher, BaseResumeScorer, FetchedPage};

pub const BASE_URL: &str = "https://jobs.example.com";

// ============================================================================
// Stub fetcher
// ============================================================================

/// A result card the stub job board serves on page one.
#[derive(Debug, Clone)]
pub struct StubCard {
    pub title: &'static str,
    pub company: &'static str,
    pub href: &'static str,
}

pub fn cards(entries: &[(&'static str, &'static str, &'static str)]) -> Vec<StubCard> {
    entries
        .iter()
        .map(|(title, company, href)| StubCard {
            title,
            company,
            href,
        })
        .collect()
}

/// Serves a fixed set of result cards on page one of every search, an empty
/// page afterwards, and a canned detail page per posting.
pub struct StubFetcher {
    cards: Vec<StubCard>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl StubFetcher {
    pub fn new(cards: Vec<StubCard>) -> Self {
        Self {
            cards,
            delay: Duration::ZERO,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn search_page(&self) -> String {
        let cards_html: String = self
            .cards
            .iter()
            .map(|card| {
                format!(
                    r#"<article data-automation="normalJob">
                         <a data-automation="jobTitle" href="{}">{}</a>
                         <a data-automation="jobCompany">{}</a>
                         <span data-automation="jobCardLocation">Sydney NSW</span>
                         <span data-automation="jobSalary">$100k</span>
                       </article>"#,
                    card.href, card.title, card.company
                )
            })
            .collect();
        format!("<html><body>{cards_html}</body></html>")
    }

    fn detail_page() -> String {
        r#"<html><body>
             <div data-automation="jobAdDetails">Great role building data pipelines.</div>
             <span data-automation="job-detail-work-type">Full time</span>
           </body></html>"#
            .to_string()
    }
}

#[async_trait]
impl BasePageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let html = if url.contains("/jobs?") {
            if url.contains("page=") {
                "<html><body></body></html>".to_string()
            } else {
                self.search_page()
            }
        } else {
            Self::detail_page()
        };

        Ok(FetchedPage {
            url: url.to_string(),
            status: 200,
            html,
        })
    }
}

// ============================================================================
// Stub scorer
// ============================================================================

pub enum ScorerMode {
    /// Every call succeeds with this score.
    Fixed(i64),
    /// Every call fails as if the provider were down.
    AlwaysFail,
    /// The first `n` calls fail, the rest succeed with the given score.
    FailFirst(usize, i64),
}

pub struct StubScorer {
    mode: ScorerMode,
    calls: AtomicUsize,
}

impl StubScorer {
    pub fn new(mode: ScorerMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
        }
    }

    fn result(score: i64) -> AnalysisResult {
        AnalysisResult {
            matching_score: score,
            summary: "stub analysis".to_string(),
            strengths: vec!["relevant experience".to_string()],
            gaps: vec![],
            recommendations: vec![],
            reasoning: "stubbed".to_string(),
        }
    }
}

#[async_trait]
impl BaseResumeScorer for StubScorer {
    async fn score(
        &self,
        _provider: &str,
        _resume: &serde_json::Value,
        _job: &serde_json::Value,
    ) -> Result<AnalysisResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            ScorerMode::Fixed(score) => Ok(Self::result(*score)),
            ScorerMode::AlwaysFail => Err(anyhow!("provider error: HTTP 500 from upstream")),
            ScorerMode::FailFirst(n, score) => {
                if call < *n {
                    Err(anyhow!("provider error: HTTP 500 from upstream"))
                } else {
                    Ok(Self::result(*score))
                }
            }
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub engine: TaskEngine,
    pub store: Arc<MemoryTaskStore>,
    pub fetcher: Arc<StubFetcher>,
    pub user_id: Uuid,
    pub resume_id: Uuid,
}

pub fn harness(fetcher: StubFetcher, scorer: StubScorer, config: EngineConfig) -> TestHarness {
    let store = Arc::new(MemoryTaskStore::new());
    let fetcher = Arc::new(fetcher);
    let user_id = Uuid::new_v4();

    let resume = Resume::builder()
        .user_id(user_id)
        .name("primary resume")
        .first_name("Ada")
        .last_name("Lovelace")
        .target_role("Backend Engineer")
        .skills(json!(["rust", "sql"]))
        .build();
    let resume_id = resume.id;
    store.insert_resume(resume);

    let scraper_config = ScraperConfig {
        base_url: BASE_URL.to_string(),
        source_platform: "seek".to_string(),
        max_pages_per_title: 3,
    };

    let engine = TaskEngine::new(
        Arc::clone(&store) as Arc<dyn agent_core::domains::tasks::store::TaskStore>,
        Arc::new(scorer),
        Arc::clone(&fetcher) as Arc<dyn BasePageFetcher>,
        scraper_config,
        config,
    );

    TestHarness {
        engine,
        store,
        fetcher,
        user_id,
        resume_id,
    }
}

/// Assert the observed status sequence is a prefix of a valid path through
/// the state machine.
pub fn assert_valid_history(history: &[TaskStatus]) {
    assert!(!history.is_empty(), "task has no status history");
    assert_eq!(history[0], TaskStatus::Pending, "tasks start pending");
    for pair in history.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "illegal transition observed: {} -> {}",
            pair[0],
            pair[1]
        );
    }
}
