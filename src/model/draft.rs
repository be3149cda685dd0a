//! Draft replies produced by the pipeline.

use super::item::InboundItem;

/// A reply draft to be saved in the mail store. Writing it is terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRequest {
    /// Who the reply goes to (the inbound item's sender).
    pub target_recipient: String,

    /// `RE: <original subject>`.
    pub subject: String,

    /// Generated reply text.
    pub body: String,

    /// Identity the draft is sent as.
    pub send_as: String,

    /// `Message-ID` of the message being answered, if known.
    pub in_reply_to: Option<String>,
}

impl DraftRequest {
    /// Build the reply draft for `item` with the given generated `body`.
    pub fn reply_to(item: &InboundItem, body: String, send_as: &str) -> Self {
        Self {
            target_recipient: item.sender.clone(),
            subject: format!("RE: {}", item.subject),
            body,
            send_as: send_as.to_string(),
            in_reply_to: item.message_id.clone(),
        }
    }
}
