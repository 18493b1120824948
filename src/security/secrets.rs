//! Secret management.
//!
//! A provider abstraction over wherever deployment secrets live: process
//! environment, an in-memory map (tests), or a vault-style service behind
//! the same trait. Values are carried as [`SecretString`] so they are
//! zeroized on drop and excluded from `Debug` output.

use crate::{Error, Result, current_timestamp};
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for secret providers.
pub trait SecretProvider: Send + Sync {
    /// Returns a secret by key, if present.
    fn get(&self, key: &str) -> Option<SecretString>;

    /// Returns a secret, failing when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the key is not configured.
    fn get_required(&self, key: &str) -> Result<SecretString> {
        self.get(key).ok_or_else(|| Error::NotFound {
            resource: format!("secret '{key}'"),
        })
    }

    /// Lists the configured secret key names (never the values).
    fn list(&self) -> Vec<String>;

    /// Verifies that every required key is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the missing keys.
    fn validate(&self, required: &[String]) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|key| self.get(key).is_none())
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                field: "secrets".to_string(),
                message: format!("missing required secrets: {}", missing.join(", ")),
            })
        }
    }

    /// When the secret was last rotated, as a Unix timestamp.
    fn last_rotated(&self, key: &str) -> Option<u64>;

    /// Whether a secret is older than `max_age_secs`.
    ///
    /// A secret with no recorded rotation time is always due.
    fn needs_rotation(&self, key: &str, max_age_secs: u64) -> bool {
        self.last_rotated(key)
            .is_none_or(|rotated| current_timestamp().saturating_sub(rotated) > max_age_secs)
    }
}

/// Masks a secret value for display: first three and last two characters
/// survive, everything else becomes `*`. Short values are fully masked.
#[must_use]
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "********".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 5))
}

/// Secret provider backed by process environment variables.
///
/// Keys are looked up as `{prefix}{KEY}`; rotation timestamps come from the
/// companion variable `{prefix}{KEY}_LAST_ROTATED` (Unix seconds).
pub struct EnvSecretProvider {
    prefix: String,
}

impl EnvSecretProvider {
    /// Creates a provider with the given prefix (e.g. `YAGOKORO_`).
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase())
    }
}

impl SecretProvider for EnvSecretProvider {
    fn get(&self, key: &str) -> Option<SecretString> {
        std::env::var(self.var_name(key)).ok().map(SecretString::from)
    }

    fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = std::env::vars()
            .filter_map(|(name, _)| {
                name.strip_prefix(&self.prefix)
                    .filter(|rest| !rest.ends_with("_LAST_ROTATED"))
                    .map(ToString::to_string)
            })
            .collect();
        keys.sort();
        keys
    }

    fn last_rotated(&self, key: &str) -> Option<u64> {
        std::env::var(format!("{}_LAST_ROTATED", self.var_name(key)))
            .ok()
            .and_then(|v| v.parse().ok())
    }
}

/// In-memory secret provider for tests and embedded use.
#[derive(Default)]
pub struct InMemorySecretProvider {
    secrets: RwLock<HashMap<String, (SecretString, u64)>>,
}

impl InMemorySecretProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a secret, recording now as its rotation time.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(
                key.into(),
                (SecretString::from(value.into()), current_timestamp()),
            );
        }
    }

    /// Stores a secret with an explicit rotation timestamp.
    pub fn set_rotated_at(&self, key: impl Into<String>, value: impl Into<String>, rotated: u64) {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert(key.into(), (SecretString::from(value.into()), rotated));
        }
    }
}

impl SecretProvider for InMemorySecretProvider {
    fn get(&self, key: &str) -> Option<SecretString> {
        self.secrets
            .read()
            .ok()
            .and_then(|secrets| {
                secrets
                    .get(key)
                    .map(|(v, _)| SecretString::from(v.expose_secret().to_string()))
            })
    }

    fn list(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .secrets
            .read()
            .map(|secrets| secrets.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn last_rotated(&self, key: &str) -> Option<u64> {
        self.secrets
            .read()
            .ok()
            .and_then(|secrets| secrets.get(key).map(|(_, rotated)| *rotated))
    }
}
