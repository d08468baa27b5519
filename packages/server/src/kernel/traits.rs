// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The scraper and matcher pipelines depend on these seams; production
// implementations live in `kernel::browser` and `kernel::scorer`.

use anyhow::Result;
use async_trait::async_trait;

use super::scorer::AnalysisResult;

// =============================================================================
// Page Fetcher Trait (Infrastructure - browser / HTTP navigation)
// =============================================================================

/// A navigated page: final URL after redirects, HTTP status, rendered HTML.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status: u16,
    pub html: String,
}

#[async_trait]
pub trait BasePageFetcher: Send + Sync {
    /// Navigate to a URL and return the rendered page.
    ///
    /// Implementations own pacing (human-delay jitter) and bounded retry
    /// with backoff on 429/403. An error here is a navigation failure after
    /// retries, not a content problem.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

// =============================================================================
// Resume Scorer Trait (Infrastructure - LLM-backed scoring)
// =============================================================================

#[async_trait]
pub trait BaseResumeScorer: Send + Sync {
    /// Score a resume summary against a job summary with the named provider.
    ///
    /// Malformed model output never surfaces as an error (the parsing cascade
    /// degrades to a defaulted result); `Err` means the provider itself was
    /// unreachable after retry.
    async fn score(
        &self,
        provider: &str,
        resume: &serde_json::Value,
        job: &serde_json::Value,
    ) -> Result<AnalysisResult>;
}
