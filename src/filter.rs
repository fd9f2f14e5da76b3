//! Verification-email filtering
//!
//! Distinguishes "account notification / one-time-code" mail from
//! genuine correspondence using only the subject line. Classification
//! is a case-insensitive substring match against a small denylist of
//! known verification-subject phrases; the denylist is configuration
//! data, injected at construction, so deployments can extend it
//! without touching filter logic.
//!
//! Body scanning (URL patterns, 6-digit codes) was tried and removed:
//! legitimate mail containing 6-digit numbers produced too many false
//! positives.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Subjects matched (case-insensitively) by the default filter.
const DEFAULT_DENYLIST: &[&str] = &["kode verifikasimu", "your verification code"];

/// Subject-denylist filter for verification/OTP emails.
#[derive(Debug, Clone)]
pub struct VerificationFilter {
    /// Lowercased phrases; a subject containing any of them is
    /// classified as a verification email.
    denylist: Vec<String>,
}

impl Default for VerificationFilter {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl VerificationFilter {
    /// Build a filter from an arbitrary denylist. Phrases are
    /// lowercased once here so matching is a plain substring test.
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denylist: denylist
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .collect(),
        }
    }

    /// Whether a subject line belongs to a verification email.
    #[must_use]
    pub fn is_verification(&self, subject: &str) -> bool {
        let lower = subject.to_lowercase();
        let lower = lower.trim();
        self.denylist.iter().any(|phrase| lower.contains(phrase))
    }

    /// Remove verification emails, preserving the relative order of
    /// the survivors. Pure and idempotent: filtering an
    /// already-filtered batch is a no-op.
    #[must_use]
    pub fn filter(&self, messages: Vec<Message>) -> Vec<Message> {
        messages
            .into_iter()
            .filter(|m| !self.is_verification(&m.subject))
            .collect()
    }

    /// How many messages of a batch the filter would remove.
    #[must_use]
    pub fn stats(&self, messages: &[Message]) -> FilterStats {
        let total = messages.len();
        let filtered = messages
            .iter()
            .filter(|m| self.is_verification(&m.subject))
            .count();
        let remaining = total - filtered;

        #[allow(clippy::cast_precision_loss)]
        let rate = if total == 0 {
            0.0
        } else {
            filtered as f64 / total as f64 * 100.0
        };

        FilterStats {
            total,
            filtered,
            remaining,
            filter_rate: (rate * 100.0).round() / 100.0,
        }
    }
}

/// Summary of one filtering pass over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total: usize,
    pub filtered: usize,
    pub remaining: usize,
    /// Percentage removed, rounded to two decimal places.
    pub filter_rate: f64,
}
