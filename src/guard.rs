//! Access guard for protected email addresses
//!
//! Precondition gate for the search engine: callers must obtain a
//! granting [`AccessDecision`] before searching a target address.
//! Addresses are compared case-insensitively; keys byte-for-byte.

use crate::error::Result;
use crate::store::ProtectedEmailStore;

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// No protection record exists, or the record is unlocked.
    Open,
    /// The address is locked and no key was supplied.
    KeyRequired,
    /// The address is locked and the supplied key does not match.
    InvalidKey,
    /// The supplied key matched; the access was recorded.
    Granted,
}

impl AccessDecision {
    /// Whether the caller may proceed to search.
    #[must_use]
    pub const fn granted(self) -> bool {
        matches!(self, Self::Open | Self::Granted)
    }

    /// Whether a protection record gates this address.
    #[must_use]
    pub const fn protected(self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Checks supplied keys against the protected-email store.
pub struct AccessGuard<S> {
    store: S,
}

impl<S: ProtectedEmailStore> AccessGuard<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Decide whether `email` may be searched with `supplied_key`.
    ///
    /// Rules, in order: unknown or unlocked addresses are open;
    /// locked addresses demand a key; a supplied key grants iff it
    /// equals the stored key exactly. A mismatch is a decision
    /// ([`AccessDecision::InvalidKey`]), never an `Err`.
    ///
    /// On a key-verified grant the record's access counter and
    /// last-accessed timestamp are updated.
    ///
    /// # Errors
    ///
    /// Only store failures surface as errors.
    pub fn check(&self, email: &str, supplied_key: Option<&str>) -> Result<AccessDecision> {
        let Some(record) = self.store.find_by_email(email.trim())? else {
            return Ok(AccessDecision::Open);
        };

        if !record.is_locked {
            return Ok(AccessDecision::Open);
        }

        // A blank key counts as no key at all.
        let Some(key) = supplied_key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(AccessDecision::KeyRequired);
        };

        if key == record.access_key {
            self.store.record_access(&record.id)?;
            Ok(AccessDecision::Granted)
        } else {
            Ok(AccessDecision::InvalidKey)
        }
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }
}
