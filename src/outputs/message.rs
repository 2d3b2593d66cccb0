//! WhatsApp-style text rendering of an edition.
//!
//! WhatsApp understands `*bold*` and `_italic_`; everything else is plain
//! text, so links are pasted bare and the client previews them.

use super::Edition;
use crate::utils::upcase;
use std::error::Error;
use std::fmt::Write;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Render `edition` as a single broadcast message.
pub fn render(edition: &Edition) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "*SG News Digest: {} edition, {}*",
        upcase(&edition.time_of_day),
        edition.local_date
    );

    if edition.digest.article_count() == 0 {
        let _ = writeln!(out, "\n_No new stories this edition._");
        return out;
    }

    let mut n = 0;
    for bucket in &edition.digest.groups {
        let _ = writeln!(out, "\n*{}*", bucket.group);
        for article in &bucket.articles {
            n += 1;
            let _ = writeln!(out, "{n}. *{}*", article.title);
            if !article.summary.is_empty() {
                let _ = writeln!(out, "{}", article.summary);
            }
            let _ = writeln!(out, "{}", article.url);
        }
    }

    let sites: std::collections::BTreeSet<&str> = edition
        .digest
        .groups
        .iter()
        .flat_map(|b| b.sites.iter().map(String::as_str))
        .collect();
    let _ = writeln!(out, "\n_{n} stories from {} sites_", sites.len());
    out
}

/// Write the rendering to `{dir}/{date}_{time_of_day}.txt`.
#[instrument(level = "info", skip_all, fields(message_output_dir = %message_output_dir))]
pub async fn write_message(edition: &Edition, message_output_dir: &str) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(message_output_dir).await?;
    let path = PathBuf::from(message_output_dir)
        .join(format!("{}_{}.txt", edition.local_date, edition.time_of_day));
    fs::write(&path, render(edition)).await?;
    info!(path = %path.display(), "Wrote message");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_news_digest::{Article, Digest, ExtractedBy, GroupBucket, RunStats};

    fn article(n: usize, group: &str, site: &str) -> Article {
        Article {
            title: format!("Story {n}"),
            url: format!("https://{site}.sg/{n}"),
            content: "Body.".to_string(),
            summary: format!("Summary {n}."),
            site: site.to_string(),
            group: group.to_string(),
            publish_date: None,
            extracted_by: ExtractedBy::Traditional,
        }
    }

    fn bucket(group: &str, articles: Vec<Article>) -> GroupBucket {
        let mut b = GroupBucket::new(group);
        for a in articles {
            b.sites.insert(a.site.clone());
            b.articles.push(a);
        }
        b
    }

    fn edition(groups: Vec<GroupBucket>) -> Edition {
        Edition {
            time_of_day: "evening".to_string(),
            local_date: "2025-03-04".to_string(),
            local_time: "18:00:00".to_string(),
            digest: Digest {
                groups,
                stats: RunStats::default(),
            },
        }
    }

    #[test]
    fn test_render_numbers_across_groups() {
        let e = edition(vec![
            bucket("Singapore", vec![article(1, "Singapore", "st"), article(2, "Singapore", "cna")]),
            bucket("Economy", vec![article(3, "Economy", "bt")]),
        ]);
        let text = render(&e);
        assert!(text.starts_with("*SG News Digest: Evening edition, 2025-03-04*\n"));
        assert!(text.contains("\n*Singapore*\n1. *Story 1*\nSummary 1.\nhttps://st.sg/1\n"));
        assert!(text.contains("\n*Economy*\n3. *Story 3*\n"));
        assert!(text.ends_with("_3 stories from 3 sites_\n"));
        // groups keep their order
        assert!(text.find("*Singapore*").unwrap() < text.find("*Economy*").unwrap());
    }

    #[test]
    fn test_render_empty_edition() {
        let text = render(&edition(vec![]));
        assert!(text.contains("_No new stories this edition._"));
    }
}
