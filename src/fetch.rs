//! HTTP fetching with retries, listing-page indexing and offline snapshots.
//!
//! Each site is read in two phases:
//!
//! 1. **Indexing**: fetch the site's listing pages and collect article links
//!    (resolved against the page URL, filtered by `link_pattern`, capped at
//!    `max_links`).
//! 2. **Fetching**: download every article concurrently, keeping discovery
//!    order. Failed fetches are logged and skipped.
//!
//! # Retry Strategy
//!
//! [`RetryFetch`] wraps any [`FetchAsync`]:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use rand::{Rng, rng};
use regex::Regex;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use sg_news_digest::RawPage;
use sg_news_digest::config::SiteConfig;
use sg_news_digest::feed::{FeedItem, parse_rss};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tokio::fs;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static CANONICAL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"link[rel="canonical"], meta[property="og:url"]"#).unwrap()
});

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
];

/// Anything that can turn a URL into a response body.
pub trait FetchAsync {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// Plain `reqwest` client with a random user agent per request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: StdDuration) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl FetchAsync for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let ua = USER_AGENTS[rng().random_range(0..USER_AGENTS.len())];
        let body = self
            .client
            .get(url)
            .header(USER_AGENT, ua)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), "Fetched");
        Ok(body)
    }
}

/// Adds exponential backoff with jitter to any [`FetchAsync`].
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self
                        .base_delay
                        .saturating_mul(1 << (attempt - 1))
                        .min(self.max_delay);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Collect article links from every listing page of `site`, in page order.
#[instrument(level = "info", skip_all, fields(site = %site.name))]
pub async fn index_site<F: FetchAsync>(fetcher: &F, site: &SiteConfig) -> Vec<String> {
    // Pipeline::new has already compiled this pattern once
    let pattern = site
        .link_pattern
        .as_deref()
        .and_then(|p| Regex::new(p).ok());

    let mut urls = Vec::new();
    for listing in &site.listing_urls {
        match fetcher.fetch(listing).await {
            Ok(html) => {
                let found = extract_links(listing, &html, pattern.as_ref(), site.max_links);
                debug!(%listing, count = found.len(), "Indexed listing page");
                urls.extend(found);
            }
            Err(e) => error!(%listing, error = %e, "Listing fetch failed"),
        }
    }

    let urls: Vec<String> = urls.into_iter().unique().collect();
    info!(count = urls.len(), "Indexed article URLs");
    urls
}

/// Absolute `http(s)` links of `html`, resolved against `base`, deduplicated
/// and capped at `max`.
pub fn extract_links(base: &str, html: &str, pattern: Option<&Regex>, max: usize) -> Vec<String> {
    let Ok(base) = Url::parse(base) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&LINK_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u.to_string()
        })
        .filter(|u| *u != base.as_str())
        .filter(|u| pattern.is_none_or(|p| p.is_match(u)))
        .unique()
        .take(max)
        .collect()
}

/// Fetch `urls` with at most `concurrency` requests in flight, preserving order.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub async fn fetch_pages<F: FetchAsync>(fetcher: &F, urls: Vec<String>, concurrency: usize) -> Vec<RawPage> {
    let pages: Vec<RawPage> = stream::iter(urls)
        .map(|url| async move {
            match fetcher.fetch(&url).await {
                Ok(html) => Some(RawPage::new(url, html)),
                Err(e) => {
                    error!(error = %e, %url, "Article fetch failed");
                    None
                }
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(std::future::ready)
        .collect()
        .await;

    info!(count = pages.len(), "Fetched article pages");
    pages
}

/// Fetch and parse one RSS/Atom feed. Failures are logged and yield nothing.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_feed<F: FetchAsync>(fetcher: &F, url: &str) -> Vec<FeedItem> {
    let xml = match fetcher.fetch(url).await {
        Ok(xml) => xml,
        Err(e) => {
            error!(error = %e, "Feed fetch failed");
            return Vec::new();
        }
    };
    match parse_rss(&xml) {
        Ok(items) => {
            info!(count = items.len(), "Parsed feed");
            items
        }
        Err(e) => {
            warn!(error = %e, "Feed unreadable");
            Vec::new()
        }
    }
}

/// Load every `*.html` file under `dir` as a page, sorted by file name.
///
/// The page URL comes from the snapshot's canonical link or `og:url`, falling
/// back to a `file://` URL of the snapshot itself.
#[instrument(level = "info", skip_all, fields(dir = %dir))]
pub async fn read_snapshot_dir(dir: &str) -> Result<Vec<RawPage>, Box<dyn Error>> {
    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("html")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut pages = Vec::with_capacity(paths.len());
    for path in paths {
        let html = fs::read_to_string(&path).await?;
        let url = canonical_url(&html).unwrap_or_else(|| file_url(&path));
        debug!(path = %path.display(), %url, "Loaded snapshot");
        pages.push(RawPage::new(url, html));
    }
    info!(count = pages.len(), "Loaded snapshots");
    Ok(pages)
}

fn canonical_url(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&CANONICAL_SELECTOR)
        .filter_map(|el| el.value().attr("href").or_else(|| el.value().attr("content")))
        .filter_map(|raw| Url::parse(raw.trim()).ok())
        .map(|u| u.to_string())
        .next()
}

fn file_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| absolute.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const LISTING: &str = r##"<html><body>
        <a href="/singapore/hdb-flats-launch">HDB</a>
        <a href="https://www.example.sg/singapore/bus-fares#comments">Fares</a>
        <a href="/singapore/hdb-flats-launch">HDB again</a>
        <a href="/about-us">About</a>
        <a href="mailto:desk@example.sg">Mail</a>
        <a href="#top">Top</a>
    </body></html>"##;

    #[test]
    fn test_extract_links_resolves_and_dedupes() {
        let links = extract_links("https://www.example.sg/singapore", LISTING, None, 10);
        assert_eq!(
            links,
            vec![
                "https://www.example.sg/singapore/hdb-flats-launch",
                "https://www.example.sg/singapore/bus-fares",
                "https://www.example.sg/about-us",
            ]
        );
    }

    #[test]
    fn test_extract_links_pattern_and_cap() {
        let pattern = Regex::new(r"/singapore/[a-z-]+$").unwrap();
        let links = extract_links("https://www.example.sg/singapore", LISTING, Some(&pattern), 1);
        assert_eq!(links, vec!["https://www.example.sg/singapore/hdb-flats-launch"]);
    }

    #[test]
    fn test_canonical_url() {
        let html = r#"<html><head><link rel="canonical" href="https://www.example.sg/a"></head></html>"#;
        assert_eq!(canonical_url(html).as_deref(), Some("https://www.example.sg/a"));
        assert_eq!(canonical_url("<html></html>"), None);
    }

    /// Fails a fixed number of times before answering.
    struct Flaky {
        failures_left: Cell<usize>,
        calls: Cell<usize>,
    }

    impl FetchAsync for Flaky {
        async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
            self.calls.set(self.calls.get() + 1);
            if self.failures_left.get() > 0 {
                self.failures_left.set(self.failures_left.get() - 1);
                return Err("connection reset".into());
            }
            Ok(format!("<html>{url}</html>"))
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let flaky = Flaky {
            failures_left: Cell::new(2),
            calls: Cell::new(0),
        };
        let retry = RetryFetch::new(flaky, 3, StdDuration::from_millis(1));
        let body = retry.fetch("https://example.sg").await.unwrap();
        assert_eq!(body, "<html>https://example.sg</html>");
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Flaky {
            failures_left: Cell::new(10),
            calls: Cell::new(0),
        };
        let retry = RetryFetch::new(flaky, 2, StdDuration::from_millis(1));
        assert!(retry.fetch("https://example.sg").await.is_err());
        assert_eq!(retry.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_fetch_pages_keeps_order_and_skips_failures() {
        struct OddFails;
        impl FetchAsync for OddFails {
            async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
                if url.ends_with('1') || url.ends_with('3') {
                    Err("404".into())
                } else {
                    Ok(url.to_string())
                }
            }
        }
        let urls = (0..5).map(|i| format!("https://example.sg/{i}")).collect();
        let pages = fetch_pages(&OddFails, urls, 3).await;
        let got: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(got, vec!["https://example.sg/0", "https://example.sg/2", "https://example.sg/4"]);
    }
}
