//! In-process mail store.

use std::collections::HashSet;
use std::sync::Mutex;

use super::MailStore;
use crate::error::{DraftError, Result};
use crate::model::draft::DraftRequest;
use crate::model::item::InboundItem;

#[derive(Debug, Default)]
struct Inner {
    /// Messages per folder, newest first.
    folders: Vec<(String, Vec<InboundItem>)>,
    drafts: Vec<DraftRequest>,
    /// Ids whose `mark_read` should fail.
    broken: HashSet<String>,
    /// Recipients whose drafts cannot be saved.
    rejected_recipients: HashSet<String>,
}

/// Mail store held entirely in memory. Ids are unique across folders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end (oldest position) of `folder`.
    pub fn deliver(&self, folder: &str, item: InboundItem) {
        let mut inner = self.lock();
        match inner.folders.iter_mut().find(|(name, _)| name == folder) {
            Some((_, items)) => items.push(item),
            None => inner.folders.push((folder.to_string(), vec![item])),
        }
    }

    /// Make `mark_read` fail for `id`.
    pub fn break_mark_read(&self, id: &str) {
        self.lock().broken.insert(id.to_string());
    }

    /// Make `save_draft` fail for drafts addressed to `recipient`.
    pub fn break_save_draft(&self, recipient: &str) {
        self.lock().rejected_recipients.insert(recipient.to_string());
    }

    /// Drafts saved so far, in save order.
    pub fn drafts(&self) -> Vec<DraftRequest> {
        self.lock().drafts.clone()
    }

    /// Whether `id` is still unread (`None` for unknown ids).
    pub fn is_unread(&self, id: &str) -> Option<bool> {
        self.find(id).map(|item| item.is_unread)
    }

    fn find(&self, id: &str) -> Option<InboundItem> {
        self.lock()
            .folders
            .iter()
            .flat_map(|(_, items)| items.iter())
            .find(|item| item.id == id)
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MailStore for MemoryStore {
    fn list_unread(&self, folder: &str) -> Result<Vec<InboundItem>> {
        Ok(self
            .lock()
            .folders
            .iter()
            .find(|(name, _)| name == folder)
            .map(|(_, items)| items.iter().filter(|i| i.is_unread).cloned().collect())
            .unwrap_or_default())
    }

    fn read(&self, id: &str) -> Result<InboundItem> {
        self.find(id)
            .ok_or_else(|| DraftError::MessageNotFound(id.to_string()))
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.broken.contains(id) {
            return Err(DraftError::MailStore(format!("cannot update '{id}'")));
        }
        let item = inner
            .folders
            .iter_mut()
            .flat_map(|(_, items)| items.iter_mut())
            .find(|item| item.id == id)
            .ok_or_else(|| DraftError::MessageNotFound(id.to_string()))?;
        item.is_unread = false;
        Ok(())
    }

    fn save_draft(&self, draft: &DraftRequest) -> Result<()> {
        let mut inner = self.lock();
        if inner.rejected_recipients.contains(&draft.target_recipient) {
            return Err(DraftError::MailStore(format!(
                "cannot save draft to '{}'",
                draft.target_recipient
            )));
        }
        inner.drafts.push(draft.clone());
        Ok(())
    }
}
