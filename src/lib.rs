//! # SG News Digest
//!
//! Turns raw HTML pages from Singapore news sites into a short, grouped,
//! deduplicated digest suitable for a WhatsApp or email broadcast.
//!
//! ## Pipeline
//!
//! 1. **Extract**: per-site selector tables pull a title and body out of each
//!    page, with a paragraph-scan fallback ([`extract`]).
//! 2. **Validate**: menus, landing pages and thin content are rejected
//!    ([`classify`], [`validate`]).
//! 3. **Filter**: optional include/exclude keywords ([`config::KeywordFilter`]).
//! 4. **Deduplicate**: fingerprints plus title/body similarity against every
//!    article accepted so far ([`dedup`], [`similarity`]).
//! 5. **Group**: articles land in capped group buckets ([`pipeline`]).
//!
//! ## Example
//!
//! ```
//! use sg_news_digest::{Pipeline, PipelineConfig, RawPage};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
//! let page = RawPage::new(
//!     "https://example.sg/transport/tel",
//!     "<html><body><article><h1>Three new TEL stations to open next year</h1>\
//!      <p>The Land Transport Authority said on Friday that three new stations \
//!      will open along the Thomson-East Coast Line next year.</p></article></body></html>",
//! );
//! let digest = pipeline.run([&page]);
//! assert_eq!(digest.article_count(), 1);
//! ```
//!
//! The library does no I/O apart from [`PipelineConfig::load`]; fetching and
//! delivery live in the `sg_news_digest` binary.

pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod similarity;
pub mod text;
pub mod validate;

pub use config::PipelineConfig;
pub use dedup::DeduplicationIndex;
pub use error::{ConfigError, FeedError};
pub use models::{Article, CandidateArticle, Digest, ExtractedBy, GroupBucket, RawPage, RunStats};
pub use pipeline::{Admission, DigestBuilder, PageOutcome, Pipeline};
