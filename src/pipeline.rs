//! The per-item draft pipeline.
//!
//! Each unread item moves through
//! `Fetched -> ContextBuilt -> Generated -> DraftWritten -> MarkedProcessed`
//! or stops in one of the [`ItemFailure`] states. An item is marked read if
//! and only if its draft was written; every failure leaves it unread so the
//! next cycle retries it. One item's failure never stops the others.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{DraftError, Result};
use crate::generation::{preview, GenerationClient, GenerationError, PromptTemplate, LOG_PREVIEW_CHARS};
use crate::model::draft::DraftRequest;
use crate::model::item::InboundItem;
use crate::retrieval::ContextStrategy;
use crate::store::MailStore;

/// Terminal failure state of a single item.
#[derive(Error, Debug)]
pub enum ItemFailure {
    #[error("could not re-read message: {0}")]
    FetchFailed(#[source] DraftError),

    #[error("context retrieval failed: {0}")]
    ContextFailed(#[source] DraftError),

    #[error("{0}")]
    GenerationFailed(#[source] GenerationError),

    #[error("could not save draft: {0}")]
    DraftFailed(#[source] DraftError),

    /// The draft exists but the item is still unread.
    #[error("draft saved but message not marked read: {0}")]
    MarkFailed(#[source] DraftError),
}

/// Successful end states of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Draft written and item marked read.
    Processed,
    /// The item was already read or no longer exists.
    Skipped,
}

/// Counts for one pass over a batch of items. Skipped items are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub failed: usize,
}

impl CycleReport {
    pub fn total(&self) -> usize {
        self.processed + self.failed
    }
}

/// Drafts replies for unread mail using injected collaborators.
pub struct DraftPipeline {
    store: Arc<dyn MailStore>,
    context: Box<dyn ContextStrategy>,
    generator: GenerationClient,
    template: PromptTemplate,
    inbox_folder: String,
}

impl DraftPipeline {
    pub fn new(
        store: Arc<dyn MailStore>,
        context: Box<dyn ContextStrategy>,
        generator: GenerationClient,
        template: PromptTemplate,
        inbox_folder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            context,
            generator,
            template,
            inbox_folder: inbox_folder.into(),
        }
    }

    /// List the inbox and process every unread item.
    ///
    /// A listing failure is a cycle-level error; item failures are counted.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let items = self.store.list_unread(&self.inbox_folder)?;
        debug!(folder = %self.inbox_folder, unread = items.len(), "Listed unread messages");
        Ok(self.process_all(&items).await)
    }

    /// Process each item in order, isolating failures.
    pub async fn process_all(&self, items: &[InboundItem]) -> CycleReport {
        let mut report = CycleReport::default();

        for item in items {
            match self.process_item(item).await {
                Ok(ItemOutcome::Processed) => report.processed += 1,
                Ok(ItemOutcome::Skipped) => {}
                Err(e) => {
                    warn!(
                        id = %item.id,
                        subject = %preview(&item.subject, LOG_PREVIEW_CHARS),
                        error = %e,
                        "Message left unread"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.total() > 0 {
            info!(
                processed = report.processed,
                failed = report.failed,
                "Cycle finished"
            );
        }
        report
    }

    /// Run one item through the pipeline.
    pub async fn process_item(&self, item: &InboundItem) -> std::result::Result<ItemOutcome, ItemFailure> {
        // Fetched: the listing may be stale, so check the current state.
        let current = match self.store.read(&item.id) {
            Ok(current) => current,
            Err(DraftError::MessageNotFound(_)) => {
                debug!(id = %item.id, "Message disappeared, skipping");
                return Ok(ItemOutcome::Skipped);
            }
            Err(e) => return Err(ItemFailure::FetchFailed(e)),
        };
        if !current.is_unread {
            debug!(id = %item.id, "Already read, skipping");
            return Ok(ItemOutcome::Skipped);
        }

        info!(
            id = %current.id,
            from = %current.sender,
            subject = %preview(&current.subject, LOG_PREVIEW_CHARS),
            "Drafting reply"
        );

        let context = self
            .context
            .build_context(&current.query_text())
            .await
            .map_err(ItemFailure::ContextFailed)?;

        let reply = self
            .generator
            .generate(&self.template, &current, &context)
            .await
            .map_err(ItemFailure::GenerationFailed)?;

        let draft = DraftRequest::reply_to(&current, reply, &self.template.send_as);
        self.store
            .save_draft(&draft)
            .map_err(ItemFailure::DraftFailed)?;

        self.store
            .mark_read(&current.id)
            .map_err(ItemFailure::MarkFailed)?;

        info!(id = %current.id, to = %draft.target_recipient, "Draft saved, message marked read");
        Ok(ItemOutcome::Processed)
    }
}
