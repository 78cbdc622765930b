//! Biometric Vault - Error Types

use thiserror::Error;

/// Result type for biometric vault operations
pub type BiometricResult<T> = Result<T, BiometricError>;

/// Biometric vault error types
#[derive(Error, Debug)]
pub enum BiometricError {
    // ═══════════════════════════════════════════════════════════════
    // AUTHENTICATOR ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("No usable biometric authenticator on this device")]
    BiometricsUnavailable,

    #[error("A biometric ceremony is already in progress")]
    CeremonyInProgress,

    // ═══════════════════════════════════════════════════════════════
    // KEY ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Key store could not be opened")]
    KeyStoreUnavailable,

    #[error("Key unavailable or permanently invalidated: {0}")]
    KeyUnavailable(String),

    // ═══════════════════════════════════════════════════════════════
    // CIPHER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Cipher used before user authentication")]
    NotAuthenticated,

    #[error("Cipher initialized for the wrong mode")]
    CipherModeMismatch,

    #[error("Invalid initialization vector length: expected {expected}, got {actual}")]
    InvalidIv { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BiometricError {
    /// Check if this is a security-critical error
    pub fn is_security_critical(&self) -> bool {
        matches!(
            self,
            BiometricError::KeyUnavailable(_)
                | BiometricError::NotAuthenticated
                | BiometricError::DecryptionFailed(_)
        )
    }

    /// Check if the key behind this error has to be recreated before use
    pub fn is_key_invalidation(&self) -> bool {
        matches!(self, BiometricError::KeyUnavailable(_))
    }
}

impl From<serde_json::Error> for BiometricError {
    fn from(e: serde_json::Error) -> Self {
        BiometricError::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = BiometricError::KeyUnavailable("k2".into());
        assert!(err.is_key_invalidation());
        assert!(err.is_security_critical());

        assert!(!BiometricError::BiometricsUnavailable.is_key_invalidation());
        assert!(!BiometricError::StorageError("x".into()).is_security_critical());
    }

    #[test]
    fn test_messages() {
        let err = BiometricError::InvalidIv { expected: 12, actual: 16 };
        assert_eq!(
            err.to_string(),
            "Invalid initialization vector length: expected 12, got 16"
        );
    }
}
