//! Environment-backed configuration
//!
//! Two independent configuration surfaces: the IMAP mailbox the search
//! engine connects to, and the admin secrets gating the protected-email
//! registry. Both read from the process environment (and `.env` via
//! dotenvy), matching how the external web layer deploys the core.

use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// IMAP connection configuration for the shared mailbox.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ImapConfig {
    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `1143`)
    ///
    /// Missing credentials are a configuration error surfaced at call
    /// time; nothing validates the environment at startup.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            host: env::var("IMAP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("IMAP_PORT")
                .unwrap_or_else(|_| "1143".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            username: env::var("IMAP_USERNAME")
                .map_err(|_| Error::Config("IMAP_USERNAME not set".into()))?,
            password: env::var("IMAP_PASSWORD")
                .map_err(|_| Error::Config("IMAP_PASSWORD not set".into()))?,
        })
    }
}

/// Admin-layer configuration: credential secrets and registry location.
///
/// Exactly one admin-auth strategy is active at a time. Setting
/// `ADMIN_SESSION_SECRET` selects signed session tokens; otherwise
/// `ADMIN_KEY` selects static-key comparison.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Shared static admin key (`ADMIN_KEY`).
    pub static_key: Option<String>,
    /// Signing secret for session tokens (`ADMIN_SESSION_SECRET`).
    pub session_secret: Option<String>,
    /// Login password for the session strategy (`ADMIN_PASSWORD`).
    pub password: Option<String>,
    /// Session lifetime in hours (`ADMIN_SESSION_TTL_HOURS`, default 24).
    pub session_ttl_hours: i64,
    /// Path of the JSON registry file (`REGISTRY_PATH`,
    /// default `data/registry.json`).
    pub registry_path: PathBuf,
}

impl AdminConfig {
    /// Load admin configuration from environment variables
    ///
    /// Errors only on malformed values; a completely unset admin
    /// environment is legal until a credential check is attempted.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            static_key: env::var("ADMIN_KEY").ok(),
            session_secret: env::var("ADMIN_SESSION_SECRET").ok(),
            password: env::var("ADMIN_PASSWORD").ok(),
            session_ttl_hours: env::var("ADMIN_SESSION_TTL_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|e| Error::Config(format!("Invalid ADMIN_SESSION_TTL_HOURS: {e}")))?,
            registry_path: env::var("REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/registry.json")),
        })
    }
}
