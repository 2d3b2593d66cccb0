//! Output writers for one digest edition.
//!
//! - [`json`]: the full edition as JSON for the senders and for archiving
//! - [`message`]: a WhatsApp-formatted plain text rendering
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//!
//! message_output_dir/
//! ├── 2025-05-06_morning.txt
//! └── 2025-05-06_evening.txt
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};
use sg_news_digest::Digest;

pub mod json;
pub mod message;

/// A digest stamped with the edition it belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Edition {
    /// `morning`, `afternoon` or `evening`.
    pub time_of_day: String,
    pub local_date: String,
    pub local_time: String,
    #[serde(flatten)]
    pub digest: Digest,
}

impl Edition {
    pub fn now(time_of_day: String, digest: Digest) -> Self {
        let now = Local::now();
        Self {
            time_of_day,
            local_date: now.date_naive().to_string(),
            local_time: now.time().format("%H:%M:%S").to_string(),
            digest,
        }
    }
}
