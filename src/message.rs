//! Parsed message model
//!
//! A [`Message`] is transient: it exists only for the duration of one
//! search call and is never persisted. Parsing maps a raw RFC 2822 body
//! into the caller-facing shape, filling placeholders for anything the
//! message lacks.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};

/// Maximum snippet length in characters before truncation.
const SNIPPET_LEN: usize = 150;

/// A single mailbox message produced by a search.
///
/// `id` is the sequence number the server assigned for this session;
/// it is unique only within that session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u32,
    pub from: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    /// HTML body if present, else plain text; may be empty.
    pub body: String,
    /// Whitespace-collapsed preview of the plain-text rendering.
    pub snippet: String,
}

/// Parse a raw RFC 2822 message into a [`Message`].
///
/// Header defaults: `from` falls back to `"Unknown"`, `subject` to
/// `"(No Subject)"`, and `date` to the time of parsing.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the raw bytes cannot be decoded as a
/// message at all. Partial messages (missing headers, empty bodies)
/// parse fine and get placeholder values.
pub fn parse_message(id: u32, raw: &[u8]) -> Result<Message> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse(format!("undecodable message body for seq {id}")))?;

    let from = parsed
        .from()
        .and_then(|addrs| addrs.first())
        .map_or_else(|| "Unknown".to_string(), format_address);

    let subject = parsed.subject().unwrap_or("(No Subject)").to_string();

    let date = parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or_else(Utc::now);

    let html = parsed
        .body_html(0)
        .map(|b| b.into_owned())
        .unwrap_or_default();
    let text = parsed
        .body_text(0)
        .map(|b| b.into_owned())
        .unwrap_or_default();

    // HTML wins when present; the snippet always comes from the
    // plain-text rendering (mail-parser converts HTML-only bodies).
    let body = if html.is_empty() { text.clone() } else { html };
    let snippet = make_snippet(&text);

    Ok(Message {
        id,
        from,
        subject,
        date,
        body,
        snippet,
    })
}

/// Render a structured address as `Name <addr>`, falling back to
/// whichever half is present.
fn format_address(addr: &mail_parser::Addr<'_>) -> String {
    match (addr.name(), addr.address()) {
        (Some(name), Some(address)) => format!("{name} <{address}>"),
        (None, Some(address)) => address.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => "Unknown".to_string(),
    }
}

/// Collapse all whitespace runs to single spaces and truncate to
/// [`SNIPPET_LEN`] characters, appending `...` when anything was cut.
fn make_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SNIPPET_LEN {
        collapsed
    } else {
        let truncated: String = collapsed.chars().take(SNIPPET_LEN).collect();
        format!("{truncated}...")
    }
}
