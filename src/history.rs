//! URLs already broadcast in earlier runs.
//!
//! Stored as a small JSON file next to the outputs. Loading seeds the run's
//! `DeduplicationIndex`; saving happens only after the outputs were written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Oldest entries are dropped beyond this many URLs.
pub const MAX_HISTORY: usize = 5000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentHistory {
    /// Oldest first.
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SentHistory {
    /// Append unseen URLs in order and keep only the newest `max` entries.
    pub fn record<I, S>(&mut self, urls: I, max: usize)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: HashSet<String> = self.urls.iter().cloned().collect();
        for url in urls {
            let url = url.into();
            if known.insert(url.clone()) {
                self.urls.push(url);
            }
        }
        if self.urls.len() > max {
            let excess = self.urls.len() - max;
            self.urls.drain(..excess);
        }
        self.updated_at = Some(Utc::now());
    }
}

/// Read the history file; a missing file is an empty history.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn load(path: &str) -> Result<SentHistory, Box<dyn Error>> {
    if !Path::new(path).exists() {
        info!("No history file yet");
        return Ok(SentHistory::default());
    }
    let raw = fs::read_to_string(path).await?;
    let history: SentHistory = serde_json::from_str(&raw)?;
    info!(urls = history.urls.len(), "Loaded history");
    Ok(history)
}

#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn save(path: &str, history: &SentHistory) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(history)?;
    fs::write(path, json).await?;
    info!(urls = history.urls.len(), "Saved history");
    Ok(())
}
