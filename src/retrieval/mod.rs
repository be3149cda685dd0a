//! Generation context: which historical items accompany a new message.
//!
//! A [`ContextStrategy`] owns an immutable [`Corpus`](crate::corpus::Corpus)
//! snapshot and turns a query text into a context block for the prompt.
//!
//! - [`VectorContext`]: embed the query and take the k nearest items.
//! - [`RecentContext`]: take the k most recent items, no retrieval.

pub mod recent;
pub mod vector;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::item::HistoricalItem;

pub use recent::RecentContext;
pub use vector::VectorContext;

/// Characters of each historical body shown in the context block.
pub const DEFAULT_EXCERPT_CHARS: usize = 200;

/// Number of historical items placed in the context block.
pub const DEFAULT_K: usize = 5;

/// Produces the context block for a query text.
#[async_trait]
pub trait ContextStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Context for `query_text`. An empty corpus yields an empty string.
    async fn build_context(&self, query_text: &str) -> Result<String>;
}

/// Retrieved items with their distance to the query, nearest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub hits: Vec<(HistoricalItem, f32)>,
}

impl RetrievedContext {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Render every hit with [`render_excerpt`], in rank order.
    pub fn render(&self, excerpt_chars: usize) -> String {
        join_excerpts(
            self.hits
                .iter()
                .map(|(item, _)| render_excerpt(item, excerpt_chars, false)),
        )
    }
}

/// One historical item as it appears in a prompt:
///
/// ```text
/// Subject: <subject>
/// To: <recipient>            (only with `with_recipient`)
/// Message: <first excerpt_chars of body>...
/// ```
pub fn render_excerpt(item: &HistoricalItem, excerpt_chars: usize, with_recipient: bool) -> String {
    let excerpt: String = item.body.chars().take(excerpt_chars).collect();
    if with_recipient {
        format!(
            "Subject: {}\nTo: {}\nMessage: {excerpt}...",
            item.subject, item.recipient
        )
    } else {
        format!("Subject: {}\nMessage: {excerpt}...", item.subject)
    }
}

fn join_excerpts(excerpts: impl Iterator<Item = String>) -> String {
    excerpts.collect::<Vec<_>>().join("\n\n")
}
