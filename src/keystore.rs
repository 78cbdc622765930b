//! Biometric Vault - Key Custodian
//!
//! Owns one access-controlled AES-256 key per key name. Keys are created on
//! first use with [`KeyPolicy::biometric`] and become permanently unusable
//! once the biometric enrollment set changes.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::crypto::{KeyPolicy, SecretKeyHandle};
use crate::error::{BiometricError, BiometricResult};

/// Platform credential store holding biometric-bound keys
pub trait KeyCustodian: Send + Sync {
    /// Return the key for `name`, generating it if absent.
    ///
    /// An existing key that has been invalidated yields `KeyUnavailable`.
    fn get_or_create_key(&self, name: &str) -> BiometricResult<SecretKeyHandle>;

    /// Return the existing key for `name` without creating one
    fn get_key(&self, name: &str) -> BiometricResult<SecretKeyHandle>;

    /// Remove the entry for `name` (no-op when absent)
    fn delete_key(&self, name: &str) -> BiometricResult<()>;

    /// Whether an entry exists for `name`, usable or not
    fn contains_key(&self, name: &str) -> BiometricResult<bool>;
}

struct KeyEntry {
    key: SecretKeyHandle,
    generation: u64,
    invalidated: bool,
}

impl KeyEntry {
    fn is_usable(&self, current_generation: u64) -> bool {
        if self.invalidated {
            return false;
        }
        !(self.key.policy().invalidated_by_biometric_enrollment
            && self.generation != current_generation)
    }
}

struct Inner {
    available: bool,
    enrollment_generation: u64,
    entries: HashMap<String, KeyEntry>,
}

/// In-process key custodian.
///
/// Key material lives only in memory. Platform glue reports enrollment
/// changes through [`SoftwareKeyStore::enrollment_changed`].
pub struct SoftwareKeyStore {
    policy: KeyPolicy,
    inner: RwLock<Inner>,
}

impl SoftwareKeyStore {
    /// Create a custodian generating keys with the biometric policy
    pub fn new() -> Self {
        Self::with_policy(KeyPolicy::biometric())
    }

    /// Create a custodian generating keys with `policy`
    pub fn with_policy(policy: KeyPolicy) -> Self {
        Self {
            policy,
            inner: RwLock::new(Inner {
                available: true,
                enrollment_generation: 0,
                entries: HashMap::new(),
            }),
        }
    }

    /// The biometric enrollment set changed; enrollment-bound keys die
    pub fn enrollment_changed(&self) {
        let mut inner = self.inner.write();
        inner.enrollment_generation += 1;
        log::info!(
            "Biometric enrollment changed (generation {})",
            inner.enrollment_generation
        );
    }

    /// Permanently invalidate a single key
    pub fn invalidate(&self, name: &str) {
        if let Some(entry) = self.inner.write().entries.get_mut(name) {
            entry.invalidated = true;
            log::warn!("Key '{}' permanently invalidated", name);
        }
    }

    /// Simulate the credential store failing to open
    pub fn set_available(&self, available: bool) {
        self.inner.write().available = available;
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SoftwareKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyCustodian for SoftwareKeyStore {
    fn get_or_create_key(&self, name: &str) -> BiometricResult<SecretKeyHandle> {
        let mut inner = self.inner.write();
        if !inner.available {
            return Err(BiometricError::KeyStoreUnavailable);
        }

        let generation = inner.enrollment_generation;
        if let Some(entry) = inner.entries.get(name) {
            return if entry.is_usable(generation) {
                Ok(entry.key.clone())
            } else {
                Err(BiometricError::KeyUnavailable(name.to_string()))
            };
        }

        let key = SecretKeyHandle::generate(self.policy);
        inner.entries.insert(
            name.to_string(),
            KeyEntry {
                key: key.clone(),
                generation,
                invalidated: false,
            },
        );
        log::debug!("Generated {} key '{}'", self.policy.transformation(), name);

        Ok(key)
    }

    fn get_key(&self, name: &str) -> BiometricResult<SecretKeyHandle> {
        let inner = self.inner.read();
        if !inner.available {
            return Err(BiometricError::KeyStoreUnavailable);
        }

        match inner.entries.get(name) {
            Some(entry) if entry.is_usable(inner.enrollment_generation) => Ok(entry.key.clone()),
            _ => Err(BiometricError::KeyUnavailable(name.to_string())),
        }
    }

    fn delete_key(&self, name: &str) -> BiometricResult<()> {
        let mut inner = self.inner.write();
        if !inner.available {
            return Err(BiometricError::KeyStoreUnavailable);
        }
        inner.entries.remove(name);
        Ok(())
    }

    fn contains_key(&self, name: &str) -> BiometricResult<bool> {
        let inner = self.inner.read();
        if !inner.available {
            return Err(BiometricError::KeyStoreUnavailable);
        }
        Ok(inner.entries.contains_key(name))
    }
}
