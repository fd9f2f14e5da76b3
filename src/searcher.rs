//! Mailbox search engine
//!
//! Orchestrates one search call end to end: connect, read-only INBOX
//! select, bounded time-windowed search, concurrent per-message
//! fetch+parse, and the final date sort. Each call owns its connection
//! for exactly the duration of the call; there is no pooling, no retry,
//! and no cancellation once a search is underway.

use crate::config::ImapConfig;
use crate::connection::{self, ImapSession};
use crate::error::{Error, Result};
use crate::message::{Message, parse_message};
use chrono::{Duration, NaiveDate, Utc};
use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Upper bound on messages fetched per search. Older matches beyond
/// this cap are silently dropped; the cap bounds memory and parse
/// cost, it is not a completeness guarantee.
const RESULT_CAP: usize = 50;

/// How far back a search looks, in hours.
const SEARCH_WINDOW_HOURS: i64 = 24;

/// Read-only searcher over the shared mailbox.
pub struct MailSearcher {
    config: ImapConfig,
}

impl MailSearcher {
    #[must_use]
    pub const fn new(config: ImapConfig) -> Self {
        Self { config }
    }

    /// Find messages addressed to `target` within the search window.
    ///
    /// Returns at most [`RESULT_CAP`] messages sorted by date
    /// descending. Individual messages that fail to parse are logged
    /// and dropped; the call still succeeds with the rest.
    ///
    /// # Errors
    ///
    /// Returns an error if the target address is malformed for an IMAP
    /// query, or if the connection, EXAMINE, SEARCH, or FETCH fails.
    /// Any such protocol-level failure rejects the whole call with no
    /// partial result.
    pub async fn search_recent(&self, target: &str) -> Result<Vec<Message>> {
        let since = Utc::now() - Duration::hours(SEARCH_WINDOW_HOURS);
        let query = build_query(target, since.date_naive())?;

        let mut session = connection::connect(&self.config).await?;
        let result = run_search(&mut session, &query).await;
        session.logout().await.ok();

        let mut messages = result?;
        messages.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(messages)
    }
}

/// Build the compound search query: recipient AND on/after the lower
/// date bound (IMAP SINCE has calendar-date granularity).
fn build_query(target: &str, since: NaiveDate) -> Result<String> {
    if target.contains(['"', '\\', '\r', '\n']) || target.chars().any(char::is_whitespace) {
        return Err(Error::Validation(format!(
            "Target email contains characters not allowed in a search: {target}"
        )));
    }
    let since_str = since.format("%-d-%b-%Y");
    Ok(format!("TO \"{target}\" SINCE {since_str}"))
}

async fn run_search(session: &mut ImapSession, query: &str) -> Result<Vec<Message>> {
    connection::examine(session, "INBOX").await?;

    let uids = session
        .uid_search(query)
        .await
        .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;

    let mut uid_list: Vec<u32> = uids.into_iter().collect();
    uid_list.sort_unstable();

    if uid_list.is_empty() {
        return Ok(vec![]);
    }

    // UID SEARCH results ascend, so the tail is the newest window.
    let start = uid_list.len().saturating_sub(RESULT_CAP);
    let recent_uids = &uid_list[start..];

    info!(
        "Found {} matches, fetching the most recent {}",
        uid_list.len(),
        recent_uids.len()
    );

    fetch_and_parse(session, recent_uids).await
}

/// Fetch full bodies for the capped UID set and parse them
/// concurrently, one task per message.
///
/// Parse completions are unordered relative to fetch order; the
/// `JoinSet` is both the accumulator and the join barrier, so no
/// completion can be lost and none is observed before the fetch
/// stream has ended.
async fn fetch_and_parse(session: &mut ImapSession, uids: &[u32]) -> Result<Vec<Message>> {
    let uid_set = uids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut parsers: JoinSet<(u32, Result<Message>)> = JoinSet::new();

    {
        let mut fetch_stream = session
            .uid_fetch(&uid_set, "(BODY.PEEK[])")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?;

        while let Some(item) = fetch_stream.next().await {
            let msg = item.map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;
            let seq = msg.message;
            let Some(body) = msg.body() else {
                warn!("No body in fetch response for message {}", seq);
                continue;
            };
            let bytes = body.to_vec();
            parsers.spawn(async move { (seq, parse_message(seq, &bytes)) });
        }
    }

    let mut messages = Vec::with_capacity(parsers.len());
    while let Some(joined) = parsers.join_next().await {
        match joined {
            Ok((_, Ok(message))) => messages.push(message),
            Ok((seq, Err(e))) => warn!("Dropping message {}: {}", seq, e),
            Err(e) => warn!("Parse task failed: {}", e),
        }
    }

    Ok(messages)
}
