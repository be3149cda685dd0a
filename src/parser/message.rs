//! RFC 5322 message decoding: headers and plain-text body.

use chrono::{DateTime, Utc};
use mail_parser::MessageParser;

/// The fields of a message the pipeline and corpus extraction need.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMessage {
    /// Decoded subject (RFC 2047 resolved).
    pub subject: String,
    /// Bare address of the first `From:` mailbox.
    pub from: String,
    /// Comma-separated `To:` addresses.
    pub to: String,
    /// `Date:` header, if parseable.
    pub date: Option<DateTime<Utc>>,
    /// `Message-ID` in angle brackets, if present.
    pub message_id: Option<String>,
    /// Plain-text body (from `text/plain`, or rendered from `text/html`).
    pub text: String,
}

/// Parse a complete raw message (headers + body).
///
/// A leading MBOX `From ` line is skipped. Messages `mail-parser` rejects
/// fall back to "everything after the first blank line" as body text.
pub fn parse_message(raw_message: &[u8]) -> ParsedMessage {
    let message_bytes = skip_from_line(raw_message);

    let Some(msg) = MessageParser::default().parse(message_bytes) else {
        return ParsedMessage {
            text: extract_body_fallback(message_bytes),
            ..ParsedMessage::default()
        };
    };

    let from = msg
        .from()
        .and_then(|a| a.first())
        .and_then(|a| a.address.as_deref())
        .unwrap_or_default()
        .to_string();

    let to = msg
        .to()
        .map(|addr| match addr.as_list() {
            Some(list) => list
                .iter()
                .filter_map(|a| a.address.as_deref())
                .collect::<Vec<_>>()
                .join(", "),
            None => addr
                .first()
                .and_then(|a| a.address.as_deref())
                .unwrap_or_default()
                .to_string(),
        })
        .unwrap_or_default();

    let date = msg.date().and_then(|d| {
        DateTime::parse_from_rfc3339(&d.to_rfc3339())
            .ok()
            .map(|d| d.with_timezone(&Utc))
    });

    // mail-parser renders an HTML-only body as text here.
    let text = msg
        .body_text(0)
        .map(|s| s.into_owned())
        .unwrap_or_default();

    ParsedMessage {
        subject: msg.subject().unwrap_or_default().to_string(),
        from,
        to,
        date,
        message_id: msg.message_id().map(|id| format!("<{id}>")),
        text,
    }
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Fallback body extraction when `mail-parser` cannot parse the message.
fn extract_body_fallback(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    if let Some(pos) = text.find("\n\n") {
        text[pos + 2..].to_string()
    } else if let Some(pos) = text.find("\r\n\r\n") {
        text[pos + 4..].to_string()
    } else {
        String::new()
    }
}
