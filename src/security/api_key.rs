//! API key issuance and authentication.
//!
//! Keys have the format `ygk_` followed by at least 16 alphanumerics. A key
//! is valid iff it exists in the store and is not past its expiry.
//! Authentication failures carry distinct reasons (missing, malformed,
//! unknown, expired) but never the key material itself.

use crate::security::audit::{AuditLogger, AuditOutcome};
use crate::security::rbac::{AccessControl, Permission, Role};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Prefix for issued keys.
pub const KEY_PREFIX: &str = "ygk_";

/// Minimum alphanumeric length after the prefix.
pub const MIN_KEY_BODY_LEN: usize = 16;

/// An issued API key with its grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    /// Stable key ID (not the secret material).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Assigned role.
    pub role: Role,
    /// Granted permissions (the role's default set at creation).
    pub permissions: HashSet<Permission>,
    /// Creation time, Unix seconds.
    pub created_at: u64,
    /// Last successful authentication, Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<u64>,
    /// Expiry time, Unix seconds; `None` means the key never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl ApiKey {
    /// Whether the key is expired at the given time.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }

    /// Whether the key grants a permission. Admin grants everything.
    #[must_use]
    pub fn grants(&self, permission: Permission) -> bool {
        self.role == Role::Admin || self.permissions.contains(&permission)
    }
}

/// Trait for API key stores.
///
/// Backed in-memory here; a distributed keyed store implements the same
/// trait with atomic per-key read-modify-write.
pub trait ApiKeyStore: Send + Sync {
    /// Stores a key record under its raw key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    fn insert(&self, raw_key: &str, record: ApiKey) -> Result<()>;

    /// Looks up a record by raw key material.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn get(&self, raw_key: &str) -> Result<Option<ApiKey>>;

    /// Records a successful authentication time.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    fn touch(&self, raw_key: &str, timestamp: u64) -> Result<()>;

    /// Revokes a key by its ID. Returns whether a key was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    fn revoke(&self, key_id: &str) -> Result<bool>;

    /// Lists all key records (without raw key material).
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    fn list(&self) -> Result<Vec<ApiKey>>;
}

/// In-memory [`ApiKeyStore`].
#[derive(Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<String, ApiKey>>,
}

impl InMemoryApiKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_err() -> Error {
        Error::Fatal("api key store lock poisoned".to_string())
    }
}

impl ApiKeyStore for InMemoryApiKeyStore {
    fn insert(&self, raw_key: &str, record: ApiKey) -> Result<()> {
        self.keys
            .write()
            .map_err(|_| Self::lock_err())?
            .insert(raw_key.to_string(), record);
        Ok(())
    }

    fn get(&self, raw_key: &str) -> Result<Option<ApiKey>> {
        Ok(self
            .keys
            .read()
            .map_err(|_| Self::lock_err())?
            .get(raw_key)
            .cloned())
    }

    fn touch(&self, raw_key: &str, timestamp: u64) -> Result<()> {
        if let Some(record) = self
            .keys
            .write()
            .map_err(|_| Self::lock_err())?
            .get_mut(raw_key)
        {
            record.last_used_at = Some(timestamp);
        }
        Ok(())
    }

    fn revoke(&self, key_id: &str) -> Result<bool> {
        let mut keys = self.keys.write().map_err(|_| Self::lock_err())?;
        let before = keys.len();
        keys.retain(|_, record| record.id != key_id);
        Ok(keys.len() < before)
    }

    fn list(&self) -> Result<Vec<ApiKey>> {
        let mut records: Vec<ApiKey> = self
            .keys
            .read()
            .map_err(|_| Self::lock_err())?
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

/// Checks the `ygk_` + ≥16 alphanumerics format.
#[must_use]
pub fn is_valid_key_format(raw_key: &str) -> bool {
    raw_key.strip_prefix(KEY_PREFIX).is_some_and(|body| {
        body.len() >= MIN_KEY_BODY_LEN && body.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

/// Issues, authenticates, and authorizes API keys.
pub struct ApiKeyManager {
    store: Arc<dyn ApiKeyStore>,
    access: AccessControl,
    audit: Arc<AuditLogger>,
}

impl ApiKeyManager {
    /// Creates a manager over a key store.
    #[must_use]
    pub fn new(store: Arc<dyn ApiKeyStore>, audit: Arc<AuditLogger>) -> Self {
        Self {
            store,
            access: AccessControl::new(),
            audit,
        }
    }

    /// Creates a new key with the role's default permission set.
    ///
    /// Returns the raw key material (shown once) and the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn create(
        &self,
        name: impl Into<String>,
        role: Role,
        expires_at: Option<u64>,
    ) -> Result<(String, ApiKey)> {
        let raw_key = format!("{KEY_PREFIX}{}", uuid::Uuid::new_v4().simple());
        let record = ApiKey {
            id: format!("key_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            role,
            permissions: self.access.permissions_for(role),
            created_at: crate::current_timestamp(),
            last_used_at: None,
            expires_at,
        };
        self.store.insert(&raw_key, record.clone())?;
        Ok((raw_key, record))
    }

    /// Revokes a key by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails.
    pub fn revoke(&self, key_id: &str) -> Result<bool> {
        self.store.revoke(key_id)
    }

    /// Authenticates raw key material.
    ///
    /// Rejects missing, malformed, unknown, and expired keys with distinct
    /// reasons; updates `last_used_at` on success. The key material never
    /// appears in errors or audit entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] for every rejection.
    pub fn authenticate(&self, raw_key: Option<&str>) -> Result<ApiKey> {
        let Some(raw_key) = raw_key else {
            return Err(self.deny("missing API key"));
        };
        if !is_valid_key_format(raw_key) {
            return Err(self.deny("malformed API key"));
        }
        let Some(record) = self.store.get(raw_key)? else {
            return Err(self.deny("unknown API key"));
        };
        let now = crate::current_timestamp();
        if record.is_expired(now) {
            return Err(self.deny("expired API key"));
        }
        self.store.touch(raw_key, now)?;
        self.audit
            .record(&record.id, "authenticate", AuditOutcome::Success, "");
        Ok(ApiKey {
            last_used_at: Some(now),
            ..record
        })
    }

    /// Checks that an authenticated key grants a permission.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] naming the missing permission.
    pub fn authorize(&self, key: &ApiKey, permission: Permission) -> Result<()> {
        if key.grants(permission) {
            Ok(())
        } else {
            self.audit.record(
                &key.id,
                "authorize",
                AuditOutcome::Denied,
                permission.as_str(),
            );
            Err(Error::PermissionDenied {
                reason: format!("missing permission {}", permission.as_str()),
            })
        }
    }

    fn deny(&self, reason: &str) -> Error {
        self.audit
            .record("anonymous", "authenticate", AuditOutcome::Denied, reason);
        Error::PermissionDenied {
            reason: reason.to_string(),
        }
    }
}
