//! The historical corpus: an immutable snapshot of previously sent messages.

pub mod extract;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DraftError, Result};
use crate::model::item::HistoricalItem;

/// Ordered, immutable set of historical items.
///
/// Cloning is cheap (shared `Arc`). A new snapshot is only created by an
/// explicit reload; items are never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    items: Arc<[HistoricalItem]>,
}

impl Corpus {
    /// Wrap `items` into a snapshot. Items without an id get their position.
    pub fn new(mut items: Vec<HistoricalItem>) -> Self {
        for (pos, item) in items.iter_mut().enumerate() {
            if item.id.is_empty() {
                item.id = pos.to_string();
            }
        }
        Self {
            items: items.into(),
        }
    }

    /// Load the corpus from a JSON array file. A missing file is an empty corpus.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No corpus file, starting with an empty corpus");
                return Ok(Self::default());
            }
            Err(e) => return Err(DraftError::io(path, e)),
        };

        let items: Vec<HistoricalItem> =
            serde_json::from_str(&contents).map_err(|e| DraftError::InvalidCorpus {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), count = items.len(), "Loaded corpus");
        Ok(Self::new(items))
    }

    /// Write the corpus as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DraftError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&*self.items).map_err(|e| {
            DraftError::InvalidCorpus {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        std::fs::write(path, json).map_err(|e| DraftError::io(path, e))
    }

    /// All items, in corpus order.
    pub fn items(&self) -> &[HistoricalItem] {
        &self.items
    }

    /// Item at `position`.
    pub fn get(&self, position: usize) -> Option<&HistoricalItem> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Texts to embed, one per item, in corpus order.
    pub fn embedding_texts(&self) -> Vec<String> {
        self.items.iter().map(HistoricalItem::embedding_text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let corpus = Corpus::load(&tmp.path().join("sent_emails.json")).unwrap();
        assert!(corpus.is_empty());
    }

    #[test]
    fn test_load_assigns_positional_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent_emails.json");
        std::fs::write(
            &path,
            r#"[{"subject":"A","body":"x"},{"id":"keep","subject":"B","body":"y"}]"#,
        )
        .unwrap();

        let corpus = Corpus::load(&path).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0).unwrap().id, "0");
        assert_eq!(corpus.get(1).unwrap().id, "keep");
    }

    #[test]
    fn test_invalid_json_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sent_emails.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Corpus::load(&path),
            Err(DraftError::InvalidCorpus { .. })
        ));
    }

    #[test]
    fn test_save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("corpus.json");
        let corpus = Corpus::new(vec![HistoricalItem {
            id: String::new(),
            subject: "Meeting".into(),
            body: "Let's meet Tuesday at 10am".into(),
            recipient: "bob@example.com".into(),
            sent_at: "2024-01-01".into(),
        }]);
        corpus.save(&path).unwrap();

        let reloaded = Corpus::load(&path).unwrap();
        assert_eq!(reloaded.items(), corpus.items());
    }
}
