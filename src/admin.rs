//! Admin credential verification and registry administration
//!
//! Two interchangeable credential strategies sit behind
//! [`CredentialVerifier`]: a static shared-key compare
//! ([`StaticKeyVerifier`]) and signed session tokens backed by a
//! session store ([`SessionManager`]). Which one is active is a
//! deployment choice; [`AdminDirectory`] only sees the trait.

use crate::config::AdminConfig;
use crate::error::{Error, Result};
use crate::store::{
    AdminSession, ProtectedEmail, ProtectedEmailStore, RegistryStats, SessionStore, UpdateOp,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Prefix of generated access keys.
const ACCESS_KEY_PREFIX: &str = "MS";

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generate a fresh opaque access key, e.g. `MS-K3W9XQ2P-A7F4NC81`.
#[must_use]
pub fn generate_access_key() -> String {
    format!(
        "{ACCESS_KEY_PREFIX}-{}-{}",
        random_token(8).to_uppercase(),
        random_token(8).to_uppercase()
    )
}

fn generate_record_id() -> String {
    random_token(16).to_lowercase()
}

/// Normalize and validate an email address for storage or lookup.
pub(crate) fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(Error::Validation("Invalid email address".into()))
    }
}

/// A credential presented by the external admin layer.
#[derive(Debug, Clone)]
pub enum AdminCredential {
    /// The shared static admin key.
    Key(String),
    /// A signed session token issued by [`SessionManager::login`].
    Token(String),
}

/// Verifies an [`AdminCredential`] against one configured strategy.
pub trait CredentialVerifier: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] unless the credential is valid
    /// for this strategy.
    fn verify(&self, credential: &AdminCredential) -> Result<()>;
}

impl<V: CredentialVerifier + ?Sized> CredentialVerifier for Box<V> {
    fn verify(&self, credential: &AdminCredential) -> Result<()> {
        (**self).verify(credential)
    }
}

/// Constant shared-secret strategy.
pub struct StaticKeyVerifier {
    key: String,
}

impl StaticKeyVerifier {
    #[must_use]
    pub const fn new(key: String) -> Self {
        Self { key }
    }
}

impl CredentialVerifier for StaticKeyVerifier {
    fn verify(&self, credential: &AdminCredential) -> Result<()> {
        match credential {
            AdminCredential::Key(key) if *key == self.key => Ok(()),
            _ => Err(Error::Unauthorized("Unauthorized".into())),
        }
    }
}

/// Claims carried by a signed session token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Random per-login value so tokens issued in the same second
    /// still differ.
    jti: String,
}

/// What a successful login hands back to the admin client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTicket {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signed-token strategy: login issues an HS256 token and a stored
/// session; verification requires both the signature and an active,
/// unexpired session record, and touches its activity timestamp.
pub struct SessionManager<S> {
    secret: String,
    password: String,
    ttl: Duration,
    store: S,
}

impl<S: SessionStore> SessionManager<S> {
    /// # Errors
    ///
    /// Returns a configuration error for a non-positive TTL.
    pub fn new(secret: String, password: String, ttl_hours: i64, store: S) -> Result<Self> {
        if ttl_hours <= 0 {
            return Err(Error::Config("Session TTL must be positive".into()));
        }
        Ok(Self {
            secret,
            password,
            ttl: Duration::hours(ttl_hours),
            store,
        })
    }

    /// Authenticate the admin password and open a session.
    ///
    /// # Errors
    ///
    /// `Validation` when the password is empty, `Unauthorized` when it
    /// does not match, `Store` on persistence failure.
    pub fn login(&self, password: &str) -> Result<SessionTicket> {
        if password.is_empty() {
            return Err(Error::Validation("Password is required".into()));
        }
        if password != self.password {
            return Err(Error::Unauthorized("Invalid password".into()));
        }

        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: "admin".to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: random_token(16),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| Error::Store(format!("Failed to sign session token: {e}")))?;

        self.store.insert(AdminSession {
            token: token.clone(),
            username: claims.sub,
            created_at: now,
            expires_at,
            last_activity_at: now,
            is_active: true,
        })?;

        info!("Admin session opened, expires {}", expires_at);
        Ok(SessionTicket { token, expires_at })
    }

    /// Validate a token and refresh the session's activity timestamp.
    ///
    /// # Errors
    ///
    /// `Unauthorized` on a bad signature, an expired token, or a
    /// session that is missing, expired, or logged out.
    pub fn verify_session(&self, token: &str) -> Result<AdminSession> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| Error::Unauthorized("Invalid or expired token".into()))?;

        let session = self
            .store
            .find_active(token)?
            .ok_or_else(|| Error::Unauthorized("Session not found or expired".into()))?;

        self.store.touch(token)?;
        Ok(session)
    }

    /// Invalidate an active session.
    ///
    /// # Errors
    ///
    /// `NotFound` when no active session matches the token.
    pub fn logout(&self, token: &str) -> Result<()> {
        self.store.deactivate(token)
    }
}

impl<S: SessionStore> CredentialVerifier for SessionManager<S> {
    fn verify(&self, credential: &AdminCredential) -> Result<()> {
        match credential {
            AdminCredential::Token(token) => self.verify_session(token).map(|_| ()),
            AdminCredential::Key(_) => Err(Error::Unauthorized("Unauthorized".into())),
        }
    }
}

/// Build the configured strategy over a shared session store.
///
/// A session secret selects [`SessionManager`]; otherwise a static
/// key selects [`StaticKeyVerifier`].
///
/// # Errors
///
/// `Config` when neither strategy is configured, or when the session
/// strategy lacks a login password.
pub fn verifier_from_config<S: SessionStore + 'static>(
    config: &AdminConfig,
    sessions: S,
) -> Result<Box<dyn CredentialVerifier>> {
    if let Some(secret) = &config.session_secret {
        let password = config
            .password
            .clone()
            .ok_or_else(|| Error::Config("ADMIN_PASSWORD not set".into()))?;
        let manager = SessionManager::new(
            secret.clone(),
            password,
            config.session_ttl_hours,
            sessions,
        )?;
        return Ok(Box::new(manager));
    }
    if let Some(key) = &config.static_key {
        return Ok(Box::new(StaticKeyVerifier::new(key.clone())));
    }
    Err(Error::Config(
        "No admin credential configured (set ADMIN_KEY or ADMIN_SESSION_SECRET)".into(),
    ))
}

/// Listing returned to admins: every record plus aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryListing {
    pub emails: Vec<ProtectedEmail>,
    pub stats: RegistryStats,
}

/// Credential-gated CRUD over the protected-email registry.
///
/// Every operation verifies the presented credential before touching
/// the store.
pub struct AdminDirectory<S, V> {
    store: S,
    verifier: V,
}

impl<S: ProtectedEmailStore, V: CredentialVerifier> AdminDirectory<S, V> {
    pub const fn new(store: S, verifier: V) -> Self {
        Self { store, verifier }
    }

    /// Protect a new email address. When no key is supplied one is
    /// generated. New records start locked.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad credential, `Validation` for a
    /// malformed address, `Conflict` when the address (compared
    /// case-insensitively) is already protected.
    pub fn create(
        &self,
        credential: &AdminCredential,
        email: &str,
        access_key: Option<String>,
    ) -> Result<ProtectedEmail> {
        self.verifier.verify(credential)?;
        let email = normalize_email(email)?;

        let access_key = access_key
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(generate_access_key);

        self.store.insert(ProtectedEmail {
            id: generate_record_id(),
            email,
            access_key,
            is_locked: true,
            created_at: Utc::now(),
            last_accessed_at: None,
            access_count: 0,
        })
    }

    /// All records plus total/locked/unlocked counts.
    pub fn list(&self, credential: &AdminCredential) -> Result<DirectoryListing> {
        self.verifier.verify(credential)?;
        Ok(DirectoryListing {
            emails: self.store.list()?,
            stats: self.store.stats()?,
        })
    }

    /// Apply tagged update ops (lock toggle, key rotation) to a record.
    pub fn update(
        &self,
        credential: &AdminCredential,
        id: &str,
        ops: &[UpdateOp],
    ) -> Result<ProtectedEmail> {
        self.verifier.verify(credential)?;
        if id.is_empty() {
            return Err(Error::Validation("Record id is required".into()));
        }
        self.store.update(id, ops)
    }

    /// Remove a record.
    pub fn delete(&self, credential: &AdminCredential, id: &str) -> Result<()> {
        self.verifier.verify(credential)?;
        if id.is_empty() {
            return Err(Error::Validation("Record id is required".into()));
        }
        self.store.delete(id)
    }
}
