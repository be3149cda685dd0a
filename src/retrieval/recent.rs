//! Context from the most recent historical items.

use async_trait::async_trait;

use super::{join_excerpts, render_excerpt, ContextStrategy};
use crate::corpus::Corpus;
use crate::error::Result;

/// The first `k` corpus items, which are the newest for an extracted corpus.
///
/// The query text is ignored.
pub struct RecentContext {
    corpus: Corpus,
    k: usize,
    excerpt_chars: usize,
}

impl RecentContext {
    pub fn new(corpus: Corpus, k: usize, excerpt_chars: usize) -> Self {
        Self {
            corpus,
            k,
            excerpt_chars,
        }
    }
}

#[async_trait]
impl ContextStrategy for RecentContext {
    fn name(&self) -> &str {
        "recent"
    }

    async fn build_context(&self, _query_text: &str) -> Result<String> {
        Ok(join_excerpts(
            self.corpus
                .items()
                .iter()
                .take(self.k)
                .map(|item| render_excerpt(item, self.excerpt_chars, true)),
        ))
    }
}
