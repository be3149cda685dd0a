//! Prompt layout for reply generation.

use crate::model::item::InboundItem;

/// Marker closing every prompt; the model's reply follows it.
pub const ANSWER_MARKER: &str = "Answer:";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an email assistant. Your task is to write \
professional, personalized replies to new emails based on the context of earlier emails. \
Match the tone and style of the earlier emails.";

pub const DEFAULT_INSTRUCTIONS: &str = "Your reply should be polite, concise and to the point. \
Take into account the tone and content of the new email as well as the style of the earlier emails.";

/// The fixed framing around each reply request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    pub system: String,
    pub instructions: String,
    /// Identity the reply is written as.
    pub send_as: String,
}

impl PromptTemplate {
    /// Template with the default framing for `send_as`.
    pub fn new(send_as: impl Into<String>) -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            send_as: send_as.into(),
        }
    }

    /// Assemble the prompt for `item` with the retrieved `context`.
    ///
    /// An empty context still yields a valid prompt; the context block is
    /// replaced by a note that no earlier emails are available.
    pub fn render(&self, item: &InboundItem, context: &str) -> String {
        let context = if context.trim().is_empty() {
            "(no earlier emails available)"
        } else {
            context
        };

        let mut prompt = String::with_capacity(
            self.system.len() + self.instructions.len() + context.len() + item.body.len() + 256,
        );
        prompt.push_str(&self.system);
        prompt.push_str("\n\nContext of earlier emails:\n\n");
        prompt.push_str(context);
        prompt.push_str("\n\nWrite a reply to this new email:\n\n");
        prompt.push_str(&format!("Subject: {}\n", item.subject));
        prompt.push_str(&format!("From: {}\n", item.sender));
        prompt.push_str(&format!("Message: {}\n\n", item.body));
        prompt.push_str(&self.instructions);
        if !self.send_as.is_empty() {
            prompt.push_str(&format!(
                "\nWrite the reply as if it is sent by {}.",
                self.send_as
            ));
        }
        prompt.push_str("\n\n");
        prompt.push_str(ANSWER_MARKER);
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> InboundItem {
        InboundItem {
            id: "INBOX/1".into(),
            subject: "Invoice".into(),
            sender: "carol@example.com".into(),
            body: "Please resend the invoice.".into(),
            is_unread: true,
            message_id: None,
        }
    }

    #[test]
    fn test_render_layout() {
        let template = PromptTemplate::new("support@example.net");
        let prompt = template.render(&item(), "Subject: Old\nMessage: old text...");

        assert!(prompt.starts_with(DEFAULT_SYSTEM_PROMPT));
        let context_at = prompt.find("Subject: Old").unwrap();
        let subject_at = prompt.find("Subject: Invoice").unwrap();
        assert!(context_at < subject_at);
        assert!(prompt.contains("From: carol@example.com"));
        assert!(prompt.contains("Message: Please resend the invoice."));
        assert!(prompt.contains("sent by support@example.net"));
        assert!(prompt.ends_with(ANSWER_MARKER));
    }

    #[test]
    fn test_render_without_context() {
        let prompt = PromptTemplate::new("").render(&item(), "");
        assert!(prompt.contains("(no earlier emails available)"));
        assert!(!prompt.contains("sent by"));
        assert!(prompt.ends_with(ANSWER_MARKER));
    }
}
