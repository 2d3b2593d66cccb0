//! # SG News Digest runner
//!
//! Fetches Singapore news sites, runs the extraction pipeline and writes one
//! digest edition as JSON plus a WhatsApp-ready text message.
//!
//! ## Usage
//!
//! ```sh
//! sg_news_digest -c config/sites.yaml -j ./json -m ./messages --history-file ./sent.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Indexing**: collect article links from each site's listing pages
//! 2. **Fetching**: download pages concurrently (or read `--html-dir` snapshots)
//! 3. **Processing**: extract and validate on the blocking pool, then feed
//!    outcomes in discovery order into a single digest builder
//! 4. **Feeds**: RSS items go through the same validate/filter/dedup path
//! 5. **Output**: JSON edition, text message, updated send history

use clap::Parser;
use futures::stream::{self, StreamExt};
use sg_news_digest::pipeline::{AiExtraction, PrecomputedSource};
use sg_news_digest::{DeduplicationIndex, ExtractedBy, Pipeline, PipelineConfig, RawPage};
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod fetch;
mod history;
mod outputs;
mod utils;

use cli::Cli;
use fetch::{HttpFetcher, RetryFetch};
use outputs::{Edition, json, message};
use utils::{ensure_writable_dir, time_of_day, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("sg_news_digest starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    for dir in [&args.json_output_dir, &args.message_output_dir] {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    // ---- Config & pipeline ----
    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(cap) = args.max_per_group {
        config.max_articles_per_group = cap;
    }
    let content_max_len = config.extractor.content_max_len;
    let sites = config.sites.clone();

    let mut pipeline = Pipeline::new(config)?;
    if let Some(path) = &args.ai_results {
        let raw = tokio::fs::read_to_string(path).await?;
        let results: HashMap<String, AiExtraction> = serde_json::from_str(&raw)?;
        info!(path = %path, count = results.len(), "Loaded precomputed AI extractions");
        pipeline = pipeline.with_source(PrecomputedSource::new(results, content_max_len));
    }
    let pipeline = Arc::new(pipeline);

    // ---- History ----
    let mut sent = match &args.history_file {
        Some(path) => history::load(path).await?,
        None => history::SentHistory::default(),
    };
    let index = DeduplicationIndex::with_seen_urls(sent.urls.iter().cloned());

    // ---- Pages ----
    let fetcher = RetryFetch::new(HttpFetcher::new(StdDuration::from_secs(20))?, 3, StdDuration::from_secs(1));
    let pages: Vec<RawPage> = match &args.html_dir {
        Some(dir) => fetch::read_snapshot_dir(dir).await?,
        None => {
            let mut urls = Vec::new();
            for site in &sites {
                urls.extend(fetch::index_site(&fetcher, site).await);
            }
            let before = urls.len();
            urls.retain(|u| !index.contains_url(u));
            info!(total = before, skipped_sent = before - urls.len(), "Article URLs to fetch");
            fetch::fetch_pages(&fetcher, urls, args.concurrency).await
        }
    };

    // ---- Extraction (parallel) & digest (serial) ----
    let total_pages = pages.len();
    info!(total_pages, concurrency = args.concurrency, "Starting page processing");

    let outcomes: Vec<_> = stream::iter(pages)
        .map(|page| {
            let pipeline = Arc::clone(&pipeline);
            async move {
                let url = page.url.clone();
                match tokio::task::spawn_blocking(move || pipeline.process_page(&page)).await {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        error!(%url, error = %e, "Extraction task failed");
                        None
                    }
                }
            }
        })
        .buffered(args.concurrency.max(1))
        .collect()
        .await;

    let mut builder = pipeline.builder(index);
    for outcome in outcomes.into_iter().flatten() {
        builder.record(outcome);
    }

    // ---- Feeds ----
    if args.html_dir.is_none() {
        for site in &sites {
            for feed_url in &site.feeds {
                for item in fetch::fetch_feed(&fetcher, feed_url).await {
                    let candidate = item.into_candidate(content_max_len);
                    let url = candidate.url.clone();
                    let admission = pipeline.offer_candidate(&mut builder, candidate, ExtractedBy::Rss);
                    debug!(%url, ?admission, "Feed item offered");
                }
            }
        }
    }

    let digest = builder.finish();
    info!(
        pages = digest.stats.pages,
        accepted = digest.stats.accepted,
        duplicates = digest.stats.duplicates,
        extraction_failures = digest.stats.extraction_failures,
        rejections = ?digest.stats.rejections,
        "Pipeline finished"
    );

    // ---- Outputs ----
    let accepted_urls: Vec<String> = digest.articles().map(|a| a.url.clone()).collect();
    let edition = Edition::now(time_of_day(), digest);

    if let Err(e) = json::write_edition(&edition, &args.json_output_dir).await {
        error!(error = %e, "Failed to write JSON edition");
        return Err(e);
    }
    match message::write_message(&edition, &args.message_output_dir).await {
        Ok(path) => {
            let preview = message::render(&edition);
            debug!(path = %path.display(), preview = %truncate_for_log(&preview, 300), "Message ready");
        }
        Err(e) => {
            error!(error = %e, "Failed to write message");
            return Err(e);
        }
    }

    if let Some(path) = &args.history_file {
        sent.record(accepted_urls, history::MAX_HISTORY);
        if let Err(e) = history::save(path, &sent).await {
            warn!(error = %e, "Failed to update history; next run may resend stories");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        edition = %edition.time_of_day,
        date = %edition.local_date,
        articles = edition.digest.article_count(),
        "Execution complete"
    );

    Ok(())
}
