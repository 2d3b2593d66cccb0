//! Error types for the digest library.
//!
//! Only programmer and configuration mistakes are errors here. A page that
//! fails to produce an article is an ordinary outcome and is reported through
//! [`crate::pipeline::PageOutcome`] instead.

/// Invalid configuration handed to the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The YAML document did not match the expected shape.
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A CSS selector in a site table failed to parse.
    #[error("site '{site}': invalid selector '{selector}': {reason}")]
    InvalidSelector {
        site: String,
        selector: String,
        reason: String,
    },

    /// A link pattern failed to compile.
    #[error("site '{site}': invalid link pattern '{pattern}': {source}")]
    InvalidPattern {
        site: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A numeric threshold is outside its allowed range.
    #[error("threshold '{name}' out of range: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

/// Failure to read an RSS document.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("malformed feed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("feed contained no <item> elements")]
    Empty,
}
