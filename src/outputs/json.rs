//! JSON edition files.
//!
//! The file path is `{json_output_dir}/{date}/{time_of_day}.json`; a second
//! run of the same edition overwrites the first.

use super::Edition;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `edition` and write it under a per-date directory.
///
/// Returns the path written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_edition(edition: &Edition, json_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(edition)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(&edition.local_date);
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", edition.time_of_day));
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = edition.digest.article_count(), "Wrote JSON edition");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_news_digest::{Article, Digest, ExtractedBy, GroupBucket, RunStats};

    fn edition() -> Edition {
        let mut bucket = GroupBucket::new("Singapore");
        bucket.articles.push(Article {
            title: "Three new TEL stations to open next year".to_string(),
            url: "https://example.sg/tel".to_string(),
            content: "The LTA said three stations will open.".to_string(),
            summary: "The LTA said three stations will open.".to_string(),
            site: "example".to_string(),
            group: "Singapore".to_string(),
            publish_date: None,
            extracted_by: ExtractedBy::Traditional,
        });
        Edition {
            time_of_day: "morning".to_string(),
            local_date: "2025-03-04".to_string(),
            local_time: "07:30:00".to_string(),
            digest: Digest {
                groups: vec![bucket],
                stats: RunStats::default(),
            },
        }
    }

    #[tokio::test]
    async fn test_write_edition_layout() {
        let dir = std::env::temp_dir().join(format!("sg_digest_json_{}", std::process::id()));
        let path = write_edition(&edition(), &dir.display().to_string()).await.unwrap();
        assert!(path.ends_with("2025-03-04/morning.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["timeOfDay"], "morning");
        assert_eq!(value["groups"][0]["articles"][0]["extractedBy"], "traditional");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
