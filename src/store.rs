//! Persisted records and pluggable stores
//!
//! Two record families live here: [`ProtectedEmail`] rows gating
//! search access, and [`AdminSession`] rows backing token-based admin
//! auth. Both sit behind small traits so the persistence backend is
//! interchangeable: [`JsonFileStore`] keeps a single JSON document on
//! disk (read-modify-write under a mutex), [`MemoryStore`] is
//! ephemeral and used by tests and embedders.
//!
//! Partial updates are an explicit tagged op set ([`UpdateOp`]),
//! validated before application. There is no merge of arbitrary
//! fields into stored records.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A protected email address and the key that unlocks searching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedEmail {
    pub id: String,
    /// Stored lowercased; lookups are case-insensitive.
    pub email: String,
    pub access_key: String,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_count: u64,
}

/// An admin login session for the token-based auth strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AdminSession {
    /// Whether the session can still authenticate at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// A single validated mutation of a [`ProtectedEmail`] record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "camelCase")]
pub enum UpdateOp {
    SetLocked(bool),
    SetAccessKey(String),
}

impl UpdateOp {
    fn validate(&self) -> Result<()> {
        match self {
            Self::SetLocked(_) => Ok(()),
            Self::SetAccessKey(key) => {
                if key.trim().is_empty() {
                    Err(Error::Validation("Access key must not be empty".into()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Aggregate counts over the protected-email registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub total: usize,
    pub locked: usize,
    pub unlocked: usize,
}

/// CRUD surface over protected-email records.
///
/// Implementations must enforce email uniqueness case-insensitively
/// on insert so concurrent creates cannot produce duplicate records.
pub trait ProtectedEmailStore: Send + Sync {
    fn insert(&self, record: ProtectedEmail) -> Result<ProtectedEmail>;
    fn find_by_email(&self, email: &str) -> Result<Option<ProtectedEmail>>;
    fn find_by_id(&self, id: &str) -> Result<Option<ProtectedEmail>>;
    fn list(&self) -> Result<Vec<ProtectedEmail>>;
    /// Apply a tagged op set to one record. All ops are validated
    /// before any is applied.
    fn update(&self, id: &str, ops: &[UpdateOp]) -> Result<ProtectedEmail>;
    /// Bump `access_count` and stamp `last_accessed_at` after a
    /// successful key-verified access.
    fn record_access(&self, id: &str) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    fn stats(&self) -> Result<RegistryStats>;
}

/// Lifecycle operations over admin sessions.
pub trait SessionStore: Send + Sync {
    fn insert(&self, session: AdminSession) -> Result<()>;
    /// Look up a session that is active and unexpired right now.
    fn find_active(&self, token: &str) -> Result<Option<AdminSession>>;
    /// Stamp `last_activity_at` on an active session.
    fn touch(&self, token: &str) -> Result<()>;
    /// Invalidate an active session; `NotFound` when there is none.
    fn deactivate(&self, token: &str) -> Result<()>;
}

impl<S: ProtectedEmailStore + ?Sized> ProtectedEmailStore for std::sync::Arc<S> {
    fn insert(&self, record: ProtectedEmail) -> Result<ProtectedEmail> {
        (**self).insert(record)
    }
    fn find_by_email(&self, email: &str) -> Result<Option<ProtectedEmail>> {
        (**self).find_by_email(email)
    }
    fn find_by_id(&self, id: &str) -> Result<Option<ProtectedEmail>> {
        (**self).find_by_id(id)
    }
    fn list(&self) -> Result<Vec<ProtectedEmail>> {
        (**self).list()
    }
    fn update(&self, id: &str, ops: &[UpdateOp]) -> Result<ProtectedEmail> {
        (**self).update(id, ops)
    }
    fn record_access(&self, id: &str) -> Result<()> {
        (**self).record_access(id)
    }
    fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id)
    }
    fn stats(&self) -> Result<RegistryStats> {
        (**self).stats()
    }
}

impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    fn insert(&self, session: AdminSession) -> Result<()> {
        (**self).insert(session)
    }
    fn find_active(&self, token: &str) -> Result<Option<AdminSession>> {
        (**self).find_active(token)
    }
    fn touch(&self, token: &str) -> Result<()> {
        (**self).touch(token)
    }
    fn deactivate(&self, token: &str) -> Result<()> {
        (**self).deactivate(token)
    }
}

/// The on-disk / in-memory document holding both record families.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registry {
    #[serde(default)]
    protected_emails: Vec<ProtectedEmail>,
    #[serde(default)]
    admin_sessions: Vec<AdminSession>,
}

impl Registry {
    fn insert_email(&mut self, record: ProtectedEmail) -> Result<ProtectedEmail> {
        if self
            .protected_emails
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(&record.email))
        {
            return Err(Error::Conflict(format!(
                "Email is already protected: {}",
                record.email
            )));
        }
        self.protected_emails.push(record.clone());
        Ok(record)
    }

    fn email_mut(&mut self, id: &str) -> Result<&mut ProtectedEmail> {
        self.protected_emails
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::NotFound(format!("No protected email with id {id}")))
    }

    fn update_email(&mut self, id: &str, ops: &[UpdateOp]) -> Result<ProtectedEmail> {
        for op in ops {
            op.validate()?;
        }
        let record = self.email_mut(id)?;
        for op in ops {
            match op {
                UpdateOp::SetLocked(locked) => record.is_locked = *locked,
                UpdateOp::SetAccessKey(key) => record.access_key = key.clone(),
            }
        }
        Ok(record.clone())
    }

    fn record_access(&mut self, id: &str) -> Result<()> {
        let record = self.email_mut(id)?;
        record.access_count += 1;
        record.last_accessed_at = Some(Utc::now());
        Ok(())
    }

    fn delete_email(&mut self, id: &str) -> Result<()> {
        let before = self.protected_emails.len();
        self.protected_emails.retain(|r| r.id != id);
        if self.protected_emails.len() == before {
            return Err(Error::NotFound(format!("No protected email with id {id}")));
        }
        Ok(())
    }

    fn stats(&self) -> RegistryStats {
        let locked = self.protected_emails.iter().filter(|r| r.is_locked).count();
        RegistryStats {
            total: self.protected_emails.len(),
            locked,
            unlocked: self.protected_emails.len() - locked,
        }
    }

    fn insert_session(&mut self, session: AdminSession) -> Result<()> {
        if self.admin_sessions.iter().any(|s| s.token == session.token) {
            return Err(Error::Conflict("Session token already exists".into()));
        }
        self.admin_sessions.push(session);
        Ok(())
    }

    fn find_active_session(&self, token: &str) -> Option<AdminSession> {
        let now = Utc::now();
        self.admin_sessions
            .iter()
            .find(|s| s.token == token && s.is_live(now))
            .cloned()
    }

    fn active_session_mut(&mut self, token: &str) -> Result<&mut AdminSession> {
        let now = Utc::now();
        self.admin_sessions
            .iter_mut()
            .find(|s| s.token == token && s.is_live(now))
            .ok_or_else(|| Error::NotFound("Session not found".into()))
    }

    fn touch_session(&mut self, token: &str) -> Result<()> {
        self.active_session_mut(token)?.last_activity_at = Utc::now();
        Ok(())
    }

    fn deactivate_session(&mut self, token: &str) -> Result<()> {
        self.active_session_mut(token)?.is_active = false;
        Ok(())
    }
}

/// File-backed store: one JSON document, rewritten atomically-enough
/// for a single process. Every operation is a read-modify-write cycle
/// under the mutex, which is what enforces uniqueness for concurrent
/// creates.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created lazily on the
    /// first write; a missing file reads as an empty registry.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            return Ok(Registry::default());
        }
        let data = fs::read_to_string(&self.path)?;
        serde_json::from_str(&data)
            .map_err(|e| Error::Store(format!("Corrupt registry file {}: {e}", self.path.display())))
    }

    fn save(&self, registry: &Registry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(registry)
            .map_err(|e| Error::Store(format!("Failed to encode registry: {e}")))?;
        fs::write(&self.path, data)?;
        Ok(())
    }

    /// Run `f` over the loaded registry and persist it again if `f`
    /// succeeded. The guard spans the whole cycle.
    fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Store("Registry lock poisoned".into()))?;
        let mut registry = self.load()?;
        let value = f(&mut registry)?;
        self.save(&registry)?;
        Ok(value)
    }

    /// Read-only variant of [`Self::with_registry`].
    fn read_registry<T>(&self, f: impl FnOnce(&Registry) -> T) -> Result<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Store("Registry lock poisoned".into()))?;
        Ok(f(&self.load()?))
    }

    /// The path this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProtectedEmailStore for JsonFileStore {
    fn insert(&self, record: ProtectedEmail) -> Result<ProtectedEmail> {
        self.with_registry(|r| r.insert_email(record))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<ProtectedEmail>> {
        self.read_registry(|r| {
            r.protected_emails
                .iter()
                .find(|p| p.email.eq_ignore_ascii_case(email))
                .cloned()
        })
    }

    fn find_by_id(&self, id: &str) -> Result<Option<ProtectedEmail>> {
        self.read_registry(|r| r.protected_emails.iter().find(|p| p.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<ProtectedEmail>> {
        self.read_registry(|r| r.protected_emails.clone())
    }

    fn update(&self, id: &str, ops: &[UpdateOp]) -> Result<ProtectedEmail> {
        self.with_registry(|r| r.update_email(id, ops))
    }

    fn record_access(&self, id: &str) -> Result<()> {
        self.with_registry(|r| r.record_access(id))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.with_registry(|r| r.delete_email(id))
    }

    fn stats(&self) -> Result<RegistryStats> {
        self.read_registry(Registry::stats)
    }
}

impl SessionStore for JsonFileStore {
    fn insert(&self, session: AdminSession) -> Result<()> {
        self.with_registry(|r| r.insert_session(session))
    }

    fn find_active(&self, token: &str) -> Result<Option<AdminSession>> {
        self.read_registry(|r| r.find_active_session(token))
    }

    fn touch(&self, token: &str) -> Result<()> {
        self.with_registry(|r| r.touch_session(token))
    }

    fn deactivate(&self, token: &str) -> Result<()> {
        self.with_registry(|r| r.deactivate_session(token))
    }
}

/// In-memory store with the same semantics as [`JsonFileStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Registry>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Registry) -> Result<T>) -> Result<T> {
        let mut registry = self
            .inner
            .lock()
            .map_err(|_| Error::Store("Registry lock poisoned".into()))?;
        f(&mut registry)
    }
}

impl ProtectedEmailStore for MemoryStore {
    fn insert(&self, record: ProtectedEmail) -> Result<ProtectedEmail> {
        self.with_inner(|r| r.insert_email(record))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<ProtectedEmail>> {
        self.with_inner(|r| {
            Ok(r.protected_emails
                .iter()
                .find(|p| p.email.eq_ignore_ascii_case(email))
                .cloned())
        })
    }

    fn find_by_id(&self, id: &str) -> Result<Option<ProtectedEmail>> {
        self.with_inner(|r| Ok(r.protected_emails.iter().find(|p| p.id == id).cloned()))
    }

    fn list(&self) -> Result<Vec<ProtectedEmail>> {
        self.with_inner(|r| Ok(r.protected_emails.clone()))
    }

    fn update(&self, id: &str, ops: &[UpdateOp]) -> Result<ProtectedEmail> {
        self.with_inner(|r| r.update_email(id, ops))
    }

    fn record_access(&self, id: &str) -> Result<()> {
        self.with_inner(|r| r.record_access(id))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.with_inner(|r| r.delete_email(id))
    }

    fn stats(&self) -> Result<RegistryStats> {
        self.with_inner(|r| Ok(r.stats()))
    }
}

impl SessionStore for MemoryStore {
    fn insert(&self, session: AdminSession) -> Result<()> {
        self.with_inner(|r| r.insert_session(session))
    }

    fn find_active(&self, token: &str) -> Result<Option<AdminSession>> {
        self.with_inner(|r| Ok(r.find_active_session(token)))
    }

    fn touch(&self, token: &str) -> Result<()> {
        self.with_inner(|r| r.touch_session(token))
    }

    fn deactivate(&self, token: &str) -> Result<()> {
        self.with_inner(|r| r.deactivate_session(token))
    }
}
