//! Command-line interface definitions for the digest runner.
//!
//! Every option can also come from an environment variable, which is how the
//! cron job on the broadcast host configures it.

use clap::Parser;

/// Command-line arguments for `sg_news_digest`.
///
/// # Examples
///
/// ```sh
/// # Fetch live and write both outputs
/// sg_news_digest -c config/sites.yaml -j ./json -m ./messages
///
/// # Re-run over saved pages, no network
/// sg_news_digest -c config/sites.yaml -j ./json -m ./messages --html-dir ./snapshots
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the sites/thresholds YAML file
    #[arg(short, long, env = "SG_DIGEST_CONFIG", default_value = "config/sites.yaml")]
    pub config: String,

    /// Output directory for the JSON digest
    #[arg(short, long, env = "SG_DIGEST_JSON_DIR")]
    pub json_output_dir: String,

    /// Output directory for the WhatsApp-style text message
    #[arg(short, long, env = "SG_DIGEST_MESSAGE_DIR")]
    pub message_output_dir: String,

    /// Read `.html` snapshots from this directory instead of fetching
    #[arg(long, env = "SG_DIGEST_HTML_DIR")]
    pub html_dir: Option<String>,

    /// JSON file of URLs sent in earlier runs; updated after each run
    #[arg(long, env = "SG_DIGEST_HISTORY")]
    pub history_file: Option<String>,

    /// JSON map of URL to precomputed AI extraction (`{title, content}`)
    #[arg(long, env = "SG_DIGEST_AI_RESULTS")]
    pub ai_results: Option<String>,

    /// Override the config's per-group article cap
    #[arg(long)]
    pub max_per_group: Option<usize>,

    /// Pages fetched and extracted at the same time
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "sg_news_digest",
            "--config",
            "sites.yaml",
            "--json-output-dir",
            "./json",
            "--message-output-dir",
            "./messages",
        ]);

        assert_eq!(cli.config, "sites.yaml");
        assert_eq!(cli.json_output_dir, "./json");
        assert_eq!(cli.message_output_dir, "./messages");
        assert_eq!(cli.concurrency, 8);
        assert!(cli.html_dir.is_none());
        assert!(cli.max_per_group.is_none());
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "sg_news_digest",
            "-c",
            "/etc/digest.yaml",
            "-j",
            "/tmp/json",
            "-m",
            "/tmp/messages",
            "--max-per-group",
            "3",
            "--html-dir",
            "/tmp/snapshots",
        ]);

        assert_eq!(cli.config, "/etc/digest.yaml");
        assert_eq!(cli.json_output_dir, "/tmp/json");
        assert_eq!(cli.message_output_dir, "/tmp/messages");
        assert_eq!(cli.max_per_group, Some(3));
        assert_eq!(cli.html_dir.as_deref(), Some("/tmp/snapshots"));
    }
}
