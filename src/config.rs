//! Biometric Vault - Session Configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::authenticator::{AllowedAuthenticators, PromptInfo};
use crate::error::{BiometricError, BiometricResult};
use crate::store::{DEFAULT_PREFS_PREFIX, DEFAULT_RECORD_KEY};

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Namespace prefix for persisted records (`<prefix>_<key name>`)
    pub prefs_prefix: String,
    /// Record key inside each namespace
    pub record_key: String,
    /// Prompt shown for every ceremony
    pub prompt: PromptInfo,
    /// Authenticators accepted for cipher-bound ceremonies
    pub encryption_authenticators: AllowedAuthenticators,
    /// Authenticators accepted for verify-only ceremonies
    pub verification_authenticators: AllowedAuthenticators,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefs_prefix: DEFAULT_PREFS_PREFIX.into(),
            record_key: DEFAULT_RECORD_KEY.into(),
            prompt: PromptInfo::default(),
            encryption_authenticators: AllowedAuthenticators::BiometricStrong,
            verification_authenticators: AllowedAuthenticators::BiometricWeakOrStrong,
        }
    }
}

impl SessionConfig {
    /// Load from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> BiometricResult<Self> {
        let data = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| BiometricError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty-printed JSON
    pub fn save(&self, path: &Path) -> BiometricResult<()> {
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Reject an empty prefix, record key or negative button label
    pub fn validate(&self) -> BiometricResult<()> {
        if self.prefs_prefix.is_empty() {
            return Err(BiometricError::ConfigError("prefs_prefix is empty".into()));
        }
        if self.record_key.is_empty() {
            return Err(BiometricError::ConfigError("record_key is empty".into()));
        }
        if self.prompt.negative_button_text.is_empty() {
            return Err(BiometricError::ConfigError(
                "prompt.negative_button_text is empty".into(),
            ));
        }
        Ok(())
    }

    /// Prompt used for verify-only ceremonies
    pub fn verification_prompt(&self) -> PromptInfo {
        PromptInfo {
            allowed_authenticators: self.verification_authenticators,
            ..self.prompt.clone()
        }
    }

    /// Prompt used for cipher-bound ceremonies
    pub fn encryption_prompt(&self) -> PromptInfo {
        PromptInfo {
            allowed_authenticators: self.encryption_authenticators,
            ..self.prompt.clone()
        }
    }
}
