//! Mail store access: listing unread mail, marking it read, saving drafts.
//!
//! The pipeline only talks to the [`MailStore`] trait. [`MaildirStore`] is the
//! on-disk implementation; [`MemoryStore`] keeps everything in process and is
//! used by tests.

pub mod maildir;
pub mod memory;

use crate::error::Result;
use crate::model::draft::DraftRequest;
use crate::model::item::InboundItem;

pub use maildir::MaildirStore;
pub use memory::MemoryStore;

/// Synchronous, individually atomic mail store operations.
pub trait MailStore: Send + Sync {
    /// Unread messages in `folder`, newest first. A missing folder yields an
    /// empty list.
    fn list_unread(&self, folder: &str) -> Result<Vec<InboundItem>>;

    /// Re-read a single message by its store handle.
    fn read(&self, id: &str) -> Result<InboundItem>;

    /// Clear the unread flag of a message and persist the change.
    fn mark_read(&self, id: &str) -> Result<()>;

    /// Create and persist a new draft.
    fn save_draft(&self, draft: &DraftRequest) -> Result<()>;
}
