//! Page fetching: headless Chrome subprocess with an HTTP fallback.
//!
//! The scraper pipeline never talks to the network directly; it goes through
//! [`BasePageFetcher`]. Two implementations:
//!
//! - [`HeadlessChromeFetcher`] launches the configured Chrome binary per
//!   navigation with container-hardening flags and captures the rendered DOM.
//!   One navigation at a time per fetcher; the browser session is exclusive
//!   to its scraper worker.
//! - [`HttpPageFetcher`] is a plain `reqwest` fallback with a browser-like
//!   header set, for deployments without a browser binary (static result
//!   markup only).
//!
//! Both pace navigations with randomized human-delay jitter (200-2000 ms)
//! and retry with exponential backoff on 429/403, max 3 attempts.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{BasePageFetcher, FetchedPage};

/// Realistic desktop user agent shared by both fetchers.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Attempts per navigation before giving up.
const MAX_NAVIGATION_ATTEMPTS: u32 = 3;

/// Randomized pause before each navigation to reduce bot detection.
async fn human_delay() {
    let millis = rand::thread_rng().gen_range(200..=2000);
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

// =============================================================================
// Headless Chrome
// =============================================================================

/// Fetcher backed by a headless Chrome subprocess.
///
/// Each navigation is one short-lived browser process; there is no shared
/// profile and no parallel tabs against the same origin.
pub struct HeadlessChromeFetcher {
    binary: String,
}

impl HeadlessChromeFetcher {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn dump_dom(&self, url: &str) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("--headless=new")
            // Container workarounds: the process runs as non-root inside a
            // container without a usable sandbox or large /dev/shm.
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={DESKTOP_USER_AGENT}"))
            .arg("--window-size=1920,1080")
            // Let scripts settle before the DOM is captured.
            .arg("--virtual-time-budget=10000")
            .arg("--dump-dom")
            .arg(url)
            .output()
            .await
            .context("failed to launch headless Chrome")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Chrome exited with {}: {}", output.status, stderr.trim());
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            anyhow::bail!("Chrome produced an empty DOM for {url}");
        }

        Ok(html)
    }
}

#[async_trait]
impl BasePageFetcher for HeadlessChromeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut last_error = None;

        for attempt in 1..=MAX_NAVIGATION_ATTEMPTS {
            human_delay().await;
            debug!(url = %url, attempt, "navigating with headless Chrome");

            match self.dump_dom(url).await {
                Ok(html) => {
                    return Ok(FetchedPage {
                        url: url.to_string(),
                        status: 200,
                        html,
                    });
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "Chrome navigation failed");
                    last_error = Some(e);
                    if attempt < MAX_NAVIGATION_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("navigation failed")))
    }
}

// =============================================================================
// Plain HTTP
// =============================================================================

/// Fetcher backed by `reqwest` with a browser-like header set.
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .parse()
                .context("invalid Accept header")?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-US,en;q=0.5".parse().context("invalid header")?,
        );
        headers.insert(
            reqwest::header::UPGRADE_INSECURE_REQUESTS,
            "1".parse().context("invalid header")?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(DESKTOP_USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl BasePageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let mut last_error = None;

        for attempt in 1..=MAX_NAVIGATION_ATTEMPTS {
            human_delay().await;
            debug!(url = %url, attempt, "fetching page over HTTP");

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();

                    // Rate limited or blocked: back off and retry.
                    if status.as_u16() == 429 || status.as_u16() == 403 {
                        warn!(url = %url, status = %status, attempt, "throttled by site");
                        last_error = Some(anyhow::anyhow!("HTTP {} for {}", status, url));
                        if attempt < MAX_NAVIGATION_ATTEMPTS {
                            tokio::time::sleep(backoff_delay(attempt)).await;
                        }
                        continue;
                    }

                    if !status.is_success() {
                        anyhow::bail!("HTTP {} for {}", status, url);
                    }

                    let html = response
                        .text()
                        .await
                        .context("Failed to read response body")?;

                    return Ok(FetchedPage {
                        url: final_url,
                        status: status.as_u16(),
                        html,
                    });
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "HTTP navigation failed");
                    last_error = Some(e.into());
                    if attempt < MAX_NAVIGATION_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("navigation failed")))
    }
}

/// Pick the page fetcher for this deployment.
///
/// Uses headless Chrome when a binary is configured, otherwise falls back to
/// plain HTTP fetching.
pub fn create_page_fetcher(chrome_binary: Option<String>) -> Result<Arc<dyn BasePageFetcher>> {
    match chrome_binary {
        Some(binary) => {
            tracing::info!(binary = %binary, "scraper will use headless Chrome");
            Ok(Arc::new(HeadlessChromeFetcher::new(binary)))
        }
        None => {
            tracing::warn!("CHROME_BINARY not set, scraper falls back to plain HTTP fetching");
            Ok(Arc::new(HttpPageFetcher::new()?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn fallback_fetcher_is_constructed_without_chrome() {
        assert!(create_page_fetcher(None).is_ok());
    }
}
