//! Search service facade and wire types
//!
//! Composes the pipeline the external web layer calls: access guard,
//! then mailbox search, then verification filtering. The serde shapes
//! here are the stable caller-facing contract; internal errors are
//! mapped to [`ErrorBody`] plus a status code and never leak raw
//! transport detail.

use crate::admin::normalize_email;
use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::filter::VerificationFilter;
use crate::guard::{AccessDecision, AccessGuard};
use crate::message::Message;
use crate::searcher::MailSearcher;
use crate::store::ProtectedEmailStore;
use serde::{Deserialize, Serialize};
use tracing::info;

/// A visitor's search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub target_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

/// Successful search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub messages: Vec<Message>,
    pub security: SecuritySummary,
}

/// What the verification filter did to this batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySummary {
    pub total_scanned: usize,
    pub verification_emails_blocked: usize,
    pub safe_emails_returned: usize,
}

/// Outcome of an access verification call, mirroring the guard's
/// four decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub success: bool,
    pub protected: bool,
    pub locked: bool,
    pub message: String,
    #[serde(skip)]
    status: u16,
}

impl AccessResponse {
    /// HTTP-style status for the caller-facing layer.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status
    }
}

impl From<AccessDecision> for AccessResponse {
    fn from(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Open => Self {
                success: true,
                protected: false,
                locked: false,
                message: "Email is not protected".to_string(),
                status: 200,
            },
            AccessDecision::KeyRequired => Self {
                success: false,
                protected: true,
                locked: true,
                message: "Access key required".to_string(),
                status: 401,
            },
            AccessDecision::InvalidKey => Self {
                success: false,
                protected: true,
                locked: true,
                message: "Invalid access key".to_string(),
                status: 403,
            },
            AccessDecision::Granted => Self {
                success: true,
                protected: true,
                locked: false,
                message: "Access granted".to_string(),
                status: 200,
            },
        }
    }
}

/// Stable error body: `{ "error": "..." }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<&Error> for ErrorBody {
    fn from(e: &Error) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// The composed pipeline: guard, then search, then filter.
pub struct SearchService<S> {
    searcher: MailSearcher,
    guard: AccessGuard<S>,
    filter: VerificationFilter,
}

impl<S: ProtectedEmailStore> SearchService<S> {
    #[must_use]
    pub fn new(config: ImapConfig, store: S) -> Self {
        Self {
            searcher: MailSearcher::new(config),
            guard: AccessGuard::new(store),
            filter: VerificationFilter::default(),
        }
    }

    /// Replace the default verification filter (e.g. an extended
    /// denylist).
    #[must_use]
    pub fn with_filter(mut self, filter: VerificationFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run the full pipeline for one request.
    ///
    /// # Errors
    ///
    /// `Validation` for a missing or malformed target address,
    /// `Unauthorized` when the address is locked and no key was
    /// supplied, `Forbidden` for a wrong key, and transport errors
    /// from the mailbox with no partial result.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.target_email.trim().is_empty() {
            return Err(Error::Validation("Target email is required".into()));
        }
        let target = normalize_email(&request.target_email)?;

        match self.guard.check(&target, request.access_key.as_deref())? {
            AccessDecision::Open | AccessDecision::Granted => {}
            AccessDecision::KeyRequired => {
                return Err(Error::Unauthorized("Access key required".into()));
            }
            AccessDecision::InvalidKey => {
                return Err(Error::Forbidden("Invalid access key".into()));
            }
        }

        let scanned = self.searcher.search_recent(&target).await?;
        let stats = self.filter.stats(&scanned);
        let messages = self.filter.filter(scanned);

        info!(
            "Search for {} scanned {} messages, blocked {}",
            target, stats.total, stats.filtered
        );

        Ok(SearchResponse {
            success: true,
            count: messages.len(),
            messages,
            security: SecuritySummary {
                total_scanned: stats.total,
                verification_emails_blocked: stats.filtered,
                safe_emails_returned: stats.remaining,
            },
        })
    }

    /// Check access without searching. All four guard outcomes map to
    /// an [`AccessResponse`]; only validation and store failures are
    /// errors.
    pub fn verify_access(&self, email: &str, access_key: Option<&str>) -> Result<AccessResponse> {
        if email.trim().is_empty() {
            return Err(Error::Validation("Email is required".into()));
        }
        let email = normalize_email(email)?;
        let decision = self.guard.check(&email, access_key)?;
        Ok(AccessResponse::from(decision))
    }
}
