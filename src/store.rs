//! Biometric Vault - Ciphertext Store
//!
//! Persists at most one [`CiphertextRecord`] per key name, under the
//! namespace `<prefix>_<key name>` and a fixed record key.

use std::sync::Arc;

use crate::crypto::CiphertextRecord;
use crate::error::BiometricResult;
use crate::secure_prefs::PreferenceStore;

/// Default namespace prefix
pub const DEFAULT_PREFS_PREFIX: &str = "biometric_prefs";

/// Default record key inside a namespace
pub const DEFAULT_RECORD_KEY: &str = "ciphertext_wrapper";

/// Namespaced ciphertext persistence
#[derive(Clone)]
pub struct CiphertextStore {
    prefs: Arc<dyn PreferenceStore>,
    prefix: String,
    record_key: String,
}

impl CiphertextStore {
    /// Store using the default prefix and record key
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self::with_layout(prefs, DEFAULT_PREFS_PREFIX, DEFAULT_RECORD_KEY)
    }

    pub fn with_layout(prefs: Arc<dyn PreferenceStore>, prefix: &str, record_key: &str) -> Self {
        Self {
            prefs,
            prefix: prefix.to_string(),
            record_key: record_key.to_string(),
        }
    }

    /// Namespace holding the record for `key_name`
    pub fn namespace(&self, key_name: &str) -> String {
        format!("{}_{}", self.prefix, key_name)
    }

    /// Serialize `record` into the namespace for `key_name`
    pub fn write(&self, key_name: &str, record: &CiphertextRecord) -> BiometricResult<()> {
        let json = serde_json::to_string(record)?;
        self.prefs
            .put(&self.namespace(key_name), &self.record_key, json)
    }

    /// Read the record for `key_name`; an unparseable value reads as absent
    pub fn read(&self, key_name: &str) -> BiometricResult<Option<CiphertextRecord>> {
        let namespace = self.namespace(key_name);
        let Some(json) = self.prefs.get(&namespace, &self.record_key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                log::warn!("Ignoring unreadable record in '{}': {}", namespace, e);
                Ok(None)
            }
        }
    }

    /// Remove the record, then wipe its whole namespace
    pub fn clear(&self, key_name: &str) -> BiometricResult<()> {
        let namespace = self.namespace(key_name);
        self.prefs.remove(&namespace, &self.record_key)?;
        self.prefs.clear(&namespace)
    }
}
