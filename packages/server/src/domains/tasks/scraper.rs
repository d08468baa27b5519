//! Job-board scraper pipeline.
//!
//! Walks search result pages for each requested title, opens the detail view
//! per listing, and inserts deduplicated postings through the store gateway
//! in discovery order. Resilience over completeness: a broken listing is
//! skipped, a broken session (three consecutive navigation failures) is
//! fatal to the task.
//!
//! All navigation goes through [`BasePageFetcher`]; pacing and backoff live
//! there. The pipeline checks its cancellation token between listings.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::kernel::BasePageFetcher;

use super::error::WorkerError;
use super::instructions::{ScraperInstructions, ScraperOutcome};
use super::models::NewFoundJob;
use super::store::TaskStore;

/// Navigation failures in a row that mark the session dead.
const MAX_CONSECUTIVE_NAV_FAILURES: u32 = 3;

/// Placeholder for fields the page did not yield.
const MISSING: &str = "N/A";

/// Scraper deployment parameters. Selectors are baked for the target site;
/// the origin is configurable.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub source_platform: String,
    /// Bounded page walk per title, avoids endless pagination.
    pub max_pages_per_title: u32,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.seek.com.au".to_string(),
            source_platform: "seek".to_string(),
            max_pages_per_title: 20,
        }
    }
}

/// Result of one scraper run.
#[derive(Debug, Clone)]
pub struct ScrapeRun {
    pub outcome: ScraperOutcome,
    /// Cancellation was observed; counts are partial.
    pub cancelled: bool,
}

/// Browser-backed harvester for the job board.
pub struct SeekScraper {
    fetcher: Arc<dyn BasePageFetcher>,
    store: Arc<dyn TaskStore>,
    config: ScraperConfig,
}

impl SeekScraper {
    pub fn new(
        fetcher: Arc<dyn BasePageFetcher>,
        store: Arc<dyn TaskStore>,
        config: ScraperConfig,
    ) -> Self {
        Self {
            fetcher,
            store,
            config,
        }
    }

    /// Harvest postings until the target is reached, the result pages are
    /// exhausted, or cancellation is observed.
    pub async fn run(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        instructions: &ScraperInstructions,
        cancel: &CancellationToken,
    ) -> Result<ScrapeRun, WorkerError> {
        let required = instructions.job_required;
        let outcome = |found: u32| {
            ScraperOutcome::new(
                found,
                required,
                instructions.job_titles.clone(),
                instructions.location.clone(),
            )
        };

        if required == 0 {
            return Ok(ScrapeRun {
                outcome: outcome(0),
                cancelled: false,
            });
        }

        let mut session = Session {
            user_id,
            task_id,
            seen_urls: HashSet::new(),
            inserted: 0,
            consecutive_nav_failures: 0,
        };

        // Round-robin allocation: an even share per title, the last title
        // absorbs whatever is still missing.
        let titles = &instructions.job_titles;
        let per_title = (required / titles.len() as u32).max(1);

        for (index, title) in titles.iter().enumerate() {
            let remaining = required - session.inserted;
            if remaining == 0 {
                break;
            }
            let target = if index == titles.len() - 1 {
                remaining
            } else {
                per_title.min(remaining)
            };

            info!(
                title = %title,
                target,
                inserted = session.inserted,
                "scraping title"
            );

            let finished = self
                .harvest_title(&mut session, title, &instructions.location, target, cancel)
                .await?;

            if !finished {
                return Ok(ScrapeRun {
                    outcome: outcome(session.inserted),
                    cancelled: true,
                });
            }
        }

        info!(
            jobs_found = session.inserted,
            jobs_required = required,
            "scraper run finished"
        );

        Ok(ScrapeRun {
            outcome: outcome(session.inserted),
            cancelled: false,
        })
    }

    /// Walk result pages for one title. Returns `false` when cancellation
    /// was observed mid-walk.
    async fn harvest_title(
        &self,
        session: &mut Session,
        title: &str,
        location: &str,
        target: u32,
        cancel: &CancellationToken,
    ) -> Result<bool, WorkerError> {
        let mut inserted_for_title = 0u32;

        for page in 1..=self.config.max_pages_per_title {
            if cancel.is_cancelled() {
                return Ok(false);
            }

            let search_url = build_search_url(&self.config.base_url, title, location, page)?;
            let page_html = match self.navigate(session, &search_url).await? {
                Some(fetched) => {
                    if page_is_blocked(&fetched.url) {
                        warn!(url = %fetched.url, "blocked or captcha page, moving to next title");
                        return Ok(true);
                    }
                    fetched.html
                }
                None => continue,
            };

            let cards = parse_job_cards(&page_html);
            if cards.is_empty() {
                debug!(title = %title, page, "no result cards, title exhausted");
                return Ok(true);
            }

            for card in cards {
                if cancel.is_cancelled() {
                    return Ok(false);
                }
                if inserted_for_title >= target {
                    return Ok(true);
                }

                // Emit listings with gaps, but a card with neither title nor
                // company is noise.
                if card.title == MISSING || card.company == MISSING {
                    continue;
                }

                let job_url = card
                    .href
                    .as_deref()
                    .and_then(|href| normalize_job_url(&self.config.base_url, href));

                if let Some(url) = &job_url {
                    if !session.seen_urls.insert(url.clone()) {
                        debug!(url = %url, "duplicate listing, skipping");
                        continue;
                    }
                }

                let (description, work_type) = match &job_url {
                    Some(url) => self.fetch_detail(session, url).await?,
                    None => (MISSING.to_string(), MISSING.to_string()),
                };

                let posting = NewFoundJob {
                    title: card.title.clone(),
                    company: card.company.clone(),
                    location: Some(card.location.clone()),
                    salary: Some(card.salary.clone()),
                    job_url,
                    work_type: Some(work_type),
                    detailed_description: Some(description),
                    source_platform: Some(self.config.source_platform.clone()),
                };

                let inserted = self
                    .store
                    .insert_found_jobs(session.user_id, session.task_id, &[posting])
                    .await?;

                if inserted > 0 {
                    session.inserted += 1;
                    inserted_for_title += 1;
                    info!(
                        title = %card.title,
                        company = %card.company,
                        total = session.inserted,
                        "saved posting"
                    );
                }
            }

            if inserted_for_title >= target {
                return Ok(true);
            }
        }

        Ok(true)
    }

    /// One navigation with session-death accounting. `Ok(None)` is a failed
    /// navigation that has not yet killed the session.
    async fn navigate(
        &self,
        session: &mut Session,
        url: &str,
    ) -> Result<Option<crate::kernel::FetchedPage>, WorkerError> {
        match self.fetcher.fetch(url).await {
            Ok(page) => {
                session.consecutive_nav_failures = 0;
                Ok(Some(page))
            }
            Err(e) => {
                session.consecutive_nav_failures += 1;
                warn!(
                    url = %url,
                    failures = session.consecutive_nav_failures,
                    error = %e,
                    "navigation failed"
                );
                if session.consecutive_nav_failures >= MAX_CONSECUTIVE_NAV_FAILURES {
                    return Err(WorkerError::UpstreamBrowser(e.to_string()));
                }
                Ok(None)
            }
        }
    }

    /// Open the detail view; a broken detail page degrades to placeholders.
    async fn fetch_detail(
        &self,
        session: &mut Session,
        url: &str,
    ) -> Result<(String, String), WorkerError> {
        match self.navigate(session, url).await? {
            Some(page) => Ok(parse_job_detail(&page.html)),
            None => Ok((MISSING.to_string(), MISSING.to_string())),
        }
    }
}

struct Session {
    user_id: Uuid,
    task_id: Uuid,
    seen_urls: HashSet<String>,
    inserted: u32,
    consecutive_nav_failures: u32,
}

// ============================================================================
// Page parsing
// ============================================================================

#[derive(Debug, Clone)]
struct JobCard {
    title: String,
    company: String,
    location: String,
    salary: String,
    href: Option<String>,
}

/// Search URL for `(title, location)`; `page` beyond 1 adds the page
/// parameter the site paginates on.
fn build_search_url(
    base: &str,
    title: &str,
    location: &str,
    page: u32,
) -> Result<String, WorkerError> {
    let mut url = Url::parse(base)
        .and_then(|u| u.join("/jobs"))
        .map_err(|e| WorkerError::Internal(format!("invalid scraper base URL: {e}")))?;

    url.query_pairs_mut()
        .append_pair("keywords", title)
        .append_pair("where", location);
    if page > 1 {
        url.query_pairs_mut().append_pair("page", &page.to_string());
    }

    Ok(url.to_string())
}

/// Redirects to a block/captcha interstitial abort the title.
fn page_is_blocked(final_url: &str) -> bool {
    let lower = final_url.to_lowercase();
    lower.contains("blocked") || lower.contains("captcha")
}

/// Canonical posting URL: resolved against the origin, tracking params and
/// fragments stripped.
fn normalize_job_url(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    let mut url = base_url.join(href).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

fn select_first<'a>(element: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    for selector_str in selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(found) = element.select(&selector).next() {
                return Some(found);
            }
        }
    }
    None
}

fn text_or_missing(element: Option<ElementRef<'_>>) -> String {
    element
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| MISSING.to_string())
}

/// Extract result cards from a search page.
///
/// Selector cascades cover the site's markup drift; the first card selector
/// that matches anything wins.
fn parse_job_cards(html: &str) -> Vec<JobCard> {
    let document = Html::parse_document(html);

    let card_selectors = [
        r#"article[data-automation="normalJob"]"#,
        r#"article[data-testid="jobCard"]"#,
        r#"div[data-automation="jobListing"]"#,
        "article",
    ];

    let mut cards = Vec::new();
    for selector_str in card_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let matches: Vec<ElementRef<'_>> = document.select(&selector).collect();
        if matches.is_empty() {
            continue;
        }

        for card in matches {
            let title_el = select_first(
                card,
                &[
                    r#"a[data-automation="jobTitle"]"#,
                    "h3 a",
                    r#"a[href*="/job/"]"#,
                ],
            );
            let href = title_el
                .and_then(|el| el.value().attr("href"))
                .map(str::to_string);

            cards.push(JobCard {
                title: text_or_missing(title_el),
                company: text_or_missing(select_first(
                    card,
                    &[
                        r#"a[data-automation="jobCompany"]"#,
                        r#"span[data-automation="jobCompany"]"#,
                    ],
                )),
                location: text_or_missing(select_first(
                    card,
                    &[
                        r#"span[data-automation="jobCardLocation"]"#,
                        r#"a[data-automation="jobLocation"]"#,
                    ],
                )),
                salary: text_or_missing(select_first(
                    card,
                    &[r#"span[data-automation="jobSalary"]"#],
                )),
                href,
            });
        }
        break;
    }

    cards
}

/// Extract `(detailed_description, work_type)` from a detail page.
fn parse_job_detail(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let description_selectors = [
        r#"div[data-automation="jobAdDetails"]"#,
        r#"div[data-automation="jobDescription"]"#,
        r#"div[class*="jobAd"]"#,
    ];
    let mut description = MISSING.to_string();
    for selector_str in description_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                description = text;
                break;
            }
        }
    }

    let work_type_selectors = [
        r#"span[data-automation="job-detail-work-type"] a"#,
        r#"span[data-automation="job-detail-work-type"]"#,
    ];
    let mut work_type = MISSING.to_string();
    for selector_str in work_type_selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                work_type = normalize_work_type(&text);
                break;
            }
        }
    }

    (description, work_type)
}

fn normalize_work_type(raw: &str) -> String {
    let lower = raw.to_lowercase();
    if lower.contains("full time") || lower.contains("full-time") {
        "Full time".to_string()
    } else if lower.contains("part time") || lower.contains("part-time") {
        "Part time".to_string()
    } else if lower.contains("casual") {
        "Casual".to_string()
    } else if lower.contains("contract") {
        "Contract".to_string()
    } else if lower.contains("temporary") {
        "Temporary".to_string()
    } else {
        raw.to_string()
    }
}
