//! Build a corpus from an MBOX export of the sent-mail folder.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::Result;
use crate::model::item::HistoricalItem;
use crate::parser::{mbox, message};

/// Maximum number of characters kept from each body.
pub const MAX_BODY_CHARS: usize = 1000;

/// Limits applied while extracting.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Keep at most this many messages (newest first).
    pub max_items: usize,
    /// Only keep messages sent within this many days before `now`.
    pub days_back: i64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_items: 50,
            days_back: 30,
        }
    }
}

/// Read sent messages from `mbox_path` and turn them into corpus items.
///
/// Messages are sorted newest first. Undated messages are skipped since they
/// cannot be checked against the `days_back` window. Bodies are cut at the
/// first quoted `From:` line, trimmed and capped at [`MAX_BODY_CHARS`].
pub fn extract_sent(
    mbox_path: &Path,
    options: ExtractOptions,
    now: DateTime<Utc>,
) -> Result<Vec<HistoricalItem>> {
    let cutoff = now - Duration::days(options.days_back);
    let mut dated: Vec<(DateTime<Utc>, HistoricalItem)> = Vec::new();
    let mut skipped = 0usize;

    let total = mbox::for_each_message(mbox_path, &mut |raw| {
        let parsed = message::parse_message(raw);
        match parsed.date {
            Some(date) if date >= cutoff && date <= now => {
                dated.push((
                    date,
                    HistoricalItem {
                        id: parsed.message_id.unwrap_or_default(),
                        subject: parsed.subject,
                        body: own_text(&parsed.text),
                        recipient: parsed.to,
                        sent_at: date.format("%Y-%m-%d %H:%M:%S").to_string(),
                    },
                ));
            }
            Some(_) => {}
            None => skipped += 1,
        }
        true
    })?;

    if skipped > 0 {
        debug!(skipped, "Skipped messages without a parseable date");
    }

    dated.sort_by(|a, b| b.0.cmp(&a.0));
    dated.truncate(options.max_items);

    info!(
        path = %mbox_path.display(),
        scanned = total,
        kept = dated.len(),
        "Extracted sent messages"
    );

    Ok(dated.into_iter().map(|(_, item)| item).collect())
}

/// The part of a reply written by its author: everything before the first
/// quoted `From:` header, trimmed and capped.
fn own_text(body: &str) -> String {
    let own = body.split("From:").next().unwrap_or_default().trim();
    own.chars().take(MAX_BODY_CHARS).collect()
}
