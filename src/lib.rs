//! Recipient-scoped mailbox search with verification filtering
//!
//! Searches a shared IMAP mailbox for messages addressed to one
//! recipient within the last 24 hours, drops verification/OTP emails
//! by subject denylist, and gates protected addresses behind access
//! keys managed through a credential-gated admin surface.
//!
//! The pipeline is [`AccessGuard`] -> [`MailSearcher`] ->
//! [`VerificationFilter`]; [`SearchService`] composes all three for
//! callers that want the whole flow.

mod admin;
mod config;
mod connection;
mod error;
mod filter;
mod guard;
mod message;
mod searcher;
mod service;
mod store;

pub use admin::{
    AdminCredential, AdminDirectory, CredentialVerifier, DirectoryListing, SessionManager,
    SessionTicket, StaticKeyVerifier, generate_access_key, verifier_from_config,
};
pub use config::{AdminConfig, ImapConfig};
pub use error::{Error, Result};
pub use filter::{FilterStats, VerificationFilter};
pub use guard::{AccessDecision, AccessGuard};
pub use message::Message;
pub use searcher::MailSearcher;
pub use service::{
    AccessResponse, ErrorBody, SearchRequest, SearchResponse, SearchService, SecuritySummary,
};
pub use store::{
    AdminSession, JsonFileStore, MemoryStore, ProtectedEmail, ProtectedEmailStore, RegistryStats,
    SessionStore, UpdateOp,
};
