//! Historical (sent) and inbound (unread) message types.

use serde::{Deserialize, Serialize};

/// A previously sent message used to ground generated replies.
///
/// Immutable once loaded. Its position inside the corpus is the join key to
/// its row in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalItem {
    /// Stable identifier. Corpus files written by older tools have none, in
    /// which case the loader assigns the item's position.
    #[serde(default)]
    pub id: String,

    /// Subject line as sent.
    #[serde(default)]
    pub subject: String,

    /// Body text, without quoted replies.
    #[serde(default)]
    pub body: String,

    /// Primary recipient(s) as a display string.
    #[serde(default)]
    pub recipient: String,

    /// Send time as a `YYYY-MM-DD HH:MM:SS` string (free-form on input).
    #[serde(default, alias = "sent_on")]
    pub sent_at: String,
}

impl HistoricalItem {
    /// The text that gets embedded for this item: `subject + " " + body`.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}

/// An unread message waiting for a draft reply.
///
/// Fetched fresh on every poll cycle and never cached across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundItem {
    /// Opaque mail store handle.
    pub id: String,

    /// Decoded subject line.
    pub subject: String,

    /// Bare sender address (`user@domain`).
    pub sender: String,

    /// Plain-text body, capped by the store's `max_body_chars`.
    pub body: String,

    /// Whether the store still considers this message unread.
    pub is_unread: bool,

    /// The `Message-ID` header, used for `In-Reply-To` on the draft.
    pub message_id: Option<String>,
}

impl InboundItem {
    /// The text used as retrieval query: `subject + " " + body`.
    pub fn query_text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}
