//! Vector index construction, validation against the corpus, and persistence.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::corpus::Corpus;
use crate::embedding::EmbeddingProvider;
use crate::error::{DraftError, Result};
use crate::index::VectorIndex;
use crate::model::item::HistoricalItem;

/// Number of texts sent to the embedding provider per call.
const EMBED_BATCH_SIZE: usize = 32;

/// How [`open_or_build`] obtained the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOrigin {
    /// The persisted index matched the corpus exactly.
    Loaded,
    /// The persisted index covered a prefix of the corpus; the tail was appended.
    Extended { added: usize },
    /// A fresh index was built.
    Built { reason: String },
}

/// Load the index at `index_path` and reconcile it with `corpus`, or build it.
///
/// 1. If `force_rebuild` is false and a persisted index matches the corpus
///    (same embedder, dimension, count and fingerprint), use it.
/// 2. If it covers an unchanged prefix of a grown corpus, embed only the new
///    items and append them.
/// 3. Otherwise embed the whole corpus and build a fresh index.
///
/// Whenever the index changes it is persisted again; a failed write is logged
/// and the in-memory index is still returned.
pub async fn open_or_build(
    index_path: &Path,
    corpus: &Corpus,
    provider: &dyn EmbeddingProvider,
    force_rebuild: bool,
    progress: Option<&(dyn Fn(u64, u64) + Sync)>,
) -> Result<(VectorIndex, IndexOrigin)> {
    let dimension = provider.dimension();

    let reason = if force_rebuild {
        "forced rebuild".to_string()
    } else {
        match VectorIndex::load(index_path) {
            Ok(Some(mut index)) => match reconcile(&index, corpus, provider) {
                Reconcile::Exact => {
                    debug!(
                        path = %index_path.display(),
                        count = index.len(),
                        "Loaded existing vector index"
                    );
                    return Ok((index, IndexOrigin::Loaded));
                }
                Reconcile::Append { from } => {
                    let tail = &corpus.items()[from..];
                    info!(
                        existing = from,
                        added = tail.len(),
                        "Corpus grew, embedding new items"
                    );
                    let vectors = embed_items(tail, provider, progress).await?;
                    index.add(&vectors)?;
                    index.set_fingerprint(fingerprint(provider, corpus.items()));
                    persist_or_warn(&index, index_path);
                    return Ok((index, IndexOrigin::Extended { added: tail.len() }));
                }
                Reconcile::Rebuild(reason) => reason,
            },
            Ok(None) => "no index on disk".to_string(),
            Err(e) => {
                warn!(error = %e, "Unreadable vector index, rebuilding");
                format!("unreadable index: {e}")
            }
        }
    };

    info!(
        path = %index_path.display(),
        items = corpus.len(),
        dimension,
        reason = %reason,
        "Building vector index"
    );

    let vectors = embed_items(corpus.items(), provider, progress).await?;
    let mut index = VectorIndex::build(dimension, &vectors)?;
    index.set_fingerprint(fingerprint(provider, corpus.items()));
    persist_or_warn(&index, index_path);

    Ok((index, IndexOrigin::Built { reason }))
}

/// Outcome of comparing a persisted index with the current corpus.
#[derive(Debug, PartialEq)]
enum Reconcile {
    Exact,
    Append { from: usize },
    Rebuild(String),
}

fn reconcile(index: &VectorIndex, corpus: &Corpus, provider: &dyn EmbeddingProvider) -> Reconcile {
    if index.dimension() != provider.dimension() {
        return Reconcile::Rebuild(format!(
            "dimension changed from {} to {}",
            index.dimension(),
            provider.dimension()
        ));
    }

    let stored = index.len();
    if stored > corpus.len() {
        return Reconcile::Rebuild(format!(
            "index has {stored} vectors but corpus has {} items",
            corpus.len()
        ));
    }

    if index.fingerprint() != fingerprint(provider, &corpus.items()[..stored]) {
        return Reconcile::Rebuild("corpus content changed".to_string());
    }

    if stored == corpus.len() {
        Reconcile::Exact
    } else {
        Reconcile::Append { from: stored }
    }
}

/// SHA-256 over the embedder identity and the embedded text of every item.
pub fn fingerprint(provider: &dyn EmbeddingProvider, items: &[HistoricalItem]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(provider.name().as_bytes());
    hasher.update((provider.dimension() as u64).to_le_bytes());
    for item in items {
        let text = item.embedding_text();
        hasher.update((text.len() as u64).to_le_bytes());
        hasher.update(text.as_bytes());
    }
    hasher.finalize().into()
}

/// Embed items in batches, reporting `(done, total)` after each batch.
async fn embed_items(
    items: &[HistoricalItem],
    provider: &dyn EmbeddingProvider,
    progress: Option<&(dyn Fn(u64, u64) + Sync)>,
) -> Result<Vec<Vec<f32>>> {
    let total = items.len() as u64;
    let mut vectors = Vec::with_capacity(items.len());

    for batch in items.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<String> = batch.iter().map(HistoricalItem::embedding_text).collect();
        let embedded = provider.embed(&texts).await?;
        if embedded.len() != texts.len() {
            return Err(DraftError::Embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                embedded.len()
            )));
        }
        vectors.extend(embedded);
        if let Some(cb) = progress {
            cb(vectors.len() as u64, total);
        }
    }

    Ok(vectors)
}

fn persist_or_warn(index: &VectorIndex, path: &Path) {
    match index.persist(path) {
        Ok(()) => info!(path = %path.display(), vectors = index.len(), "Vector index written"),
        Err(e) => warn!(error = %e, "Could not write vector index; continuing without persistence"),
    }
}

/// Return the size in bytes of the index file (0 if missing).
pub fn index_file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
