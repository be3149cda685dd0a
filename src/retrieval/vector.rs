//! Context from k-nearest-neighbour retrieval over the vector index.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ContextStrategy, RetrievedContext};
use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use crate::error::{DraftError, Result};
use crate::index::VectorIndex;

/// Embeds the query and renders the `k` nearest corpus items.
pub struct VectorContext {
    corpus: Corpus,
    index: VectorIndex,
    provider: Arc<dyn EmbeddingProvider>,
    k: usize,
    excerpt_chars: usize,
}

impl VectorContext {
    /// Bind a corpus to the index built from it.
    ///
    /// Fails with [`DraftError::InvalidIndex`] when the index does not hold
    /// exactly one vector per corpus item, and with
    /// [`DraftError::DimensionMismatch`] when the provider and index disagree.
    pub fn new(
        corpus: Corpus,
        index: VectorIndex,
        provider: Arc<dyn EmbeddingProvider>,
        k: usize,
        excerpt_chars: usize,
    ) -> Result<Self> {
        if index.len() != corpus.len() {
            return Err(DraftError::InvalidIndex {
                path: PathBuf::from("<memory>"),
                reason: format!(
                    "index holds {} vectors but corpus has {} items",
                    index.len(),
                    corpus.len()
                ),
            });
        }
        if index.dimension() != provider.dimension() {
            return Err(DraftError::DimensionMismatch {
                expected: index.dimension(),
                actual: provider.dimension(),
            });
        }
        Ok(Self {
            corpus,
            index,
            provider,
            k,
            excerpt_chars,
        })
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The nearest corpus items to `query_text`, nearest first.
    pub async fn retrieve(&self, query_text: &str) -> Result<RetrievedContext> {
        if self.corpus.is_empty() || self.k == 0 {
            return Ok(RetrievedContext::default());
        }

        let query = self.provider.embed_one(query_text).await?;
        let neighbors = self.index.search(&query, self.k)?;
        debug!(
            query_chars = query_text.chars().count(),
            hits = neighbors.len(),
            nearest = neighbors.first().map(|(_, d)| *d),
            "Retrieved context"
        );

        let hits = neighbors
            .into_iter()
            .filter_map(|(pos, distance)| self.corpus.get(pos).map(|item| (item.clone(), distance)))
            .collect();
        Ok(RetrievedContext { hits })
    }
}

#[async_trait]
impl ContextStrategy for VectorContext {
    fn name(&self) -> &str {
        "vector"
    }

    async fn build_context(&self, query_text: &str) -> Result<String> {
        Ok(self.retrieve(query_text).await?.render(self.excerpt_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::model::item::HistoricalItem;
    use pretty_assertions::assert_eq;

    fn item(subject: &str, body: &str) -> HistoricalItem {
        HistoricalItem {
            id: String::new(),
            subject: subject.into(),
            body: body.into(),
            recipient: "client@example.com".into(),
            sent_at: "2024-01-01".into(),
        }
    }

    async fn context(items: Vec<HistoricalItem>, k: usize) -> VectorContext {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(64));
        let corpus = Corpus::new(items);
        let vectors = provider.embed(&corpus.embedding_texts()).await.unwrap();
        let index = VectorIndex::build(64, &vectors).unwrap();
        VectorContext::new(corpus, index, provider, k, 200).unwrap()
    }

    #[tokio::test]
    async fn test_single_meeting_item_is_retrieved() {
        let ctx = context(vec![item("Meeting", "Let's meet Tuesday at 10am")], 5).await;

        let retrieved = ctx.retrieve("Meeting Can we meet Tuesday?").await.unwrap();
        assert_eq!(retrieved.len(), 1);
        assert_eq!(retrieved.hits[0].0.subject, "Meeting");

        let text = ctx.build_context("Meeting Can we meet Tuesday?").await.unwrap();
        assert_eq!(text, "Subject: Meeting\nMessage: Let's meet Tuesday at 10am...");
    }

    #[tokio::test]
    async fn test_nearest_item_ranks_first() {
        let ctx = context(
            vec![
                item("Invoice", "Please find the invoice attached"),
                item("Meeting", "Let's meet Tuesday at 10am"),
                item("Holiday", "I am out of office next week"),
            ],
            2,
        )
        .await;

        let retrieved = ctx.retrieve("Meeting on Tuesday at 10am?").await.unwrap();
        assert_eq!(retrieved.len(), 2);
        assert_eq!(retrieved.hits[0].0.subject, "Meeting");
        assert!(retrieved.hits[0].1 <= retrieved.hits[1].1);
    }

    #[tokio::test]
    async fn test_empty_corpus_gives_empty_context() {
        let ctx = context(Vec::new(), 5).await;
        assert_eq!(ctx.build_context("Meeting Can we meet?").await.unwrap(), "");
    }

    #[test]
    fn test_rejects_misaligned_index() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(4));
        let index = VectorIndex::build(4, &[vec![0.0; 4]]).unwrap();
        let err = VectorContext::new(Corpus::default(), index, provider, 5, 200)
            .err()
            .unwrap();
        assert!(matches!(err, DraftError::InvalidIndex { .. }));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashingEmbedder::new(8));
        let err = VectorContext::new(Corpus::default(), VectorIndex::new(4), provider, 5, 200)
            .err()
            .unwrap();
        assert!(matches!(err, DraftError::DimensionMismatch { expected: 4, actual: 8 }));
    }
}
