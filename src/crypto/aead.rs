//! Biometric Vault - AEAD Cipher Handles
//!
//! AES-256-GCM cipher sessions bound to a custodian key, and the persisted
//! ciphertext record they produce.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};

use super::keys::{generate_nonce, SecretKeyHandle, NONCE_LEN};
use crate::error::{BiometricError, BiometricResult};

/// Cipher direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

/// Encrypted bytes plus the IV needed to decrypt them.
///
/// Equality and hashing are over the raw byte contents.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiphertextRecord {
    /// Ciphertext with the 16-byte GCM tag appended
    #[serde(with = "b64")]
    ciphertext: Vec<u8>,
    #[serde(with = "b64")]
    initialization_vector: Vec<u8>,
}

impl CiphertextRecord {
    pub fn new(ciphertext: Vec<u8>, initialization_vector: Vec<u8>) -> Self {
        Self {
            ciphertext,
            initialization_vector,
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn initialization_vector(&self) -> &[u8] {
        &self.initialization_vector
    }

    /// Short hex fingerprint of the IV, safe for logs
    pub fn iv_fingerprint(&self) -> String {
        let end = self.initialization_vector.len().min(4);
        hex::encode(&self.initialization_vector[..end])
    }
}

impl fmt::Debug for CiphertextRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CiphertextRecord")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("initialization_vector", &hex::encode(&self.initialization_vector))
            .finish()
    }
}

/// Single-use AES-GCM cipher bound to one key and one IV.
///
/// `finish` takes the handle by value, so a handle can never be reused.
pub struct CipherHandle {
    mode: CipherMode,
    key: SecretKeyHandle,
    iv: [u8; NONCE_LEN],
    authorized: bool,
}

impl CipherHandle {
    /// Initialize for encryption with a fresh random IV
    pub(crate) fn init_encrypt(key: SecretKeyHandle) -> BiometricResult<Self> {
        if !key.policy().can_encrypt {
            return Err(BiometricError::CipherModeMismatch);
        }

        Ok(Self {
            mode: CipherMode::Encrypt,
            key,
            iv: generate_nonce(),
            authorized: false,
        })
    }

    /// Initialize for decryption with the IV stored at encryption time
    pub(crate) fn init_decrypt(key: SecretKeyHandle, iv: &[u8]) -> BiometricResult<Self> {
        if !key.policy().can_decrypt {
            return Err(BiometricError::CipherModeMismatch);
        }

        let iv: [u8; NONCE_LEN] = iv.try_into().map_err(|_| BiometricError::InvalidIv {
            expected: NONCE_LEN,
            actual: iv.len(),
        })?;

        Ok(Self {
            mode: CipherMode::Decrypt,
            key,
            iv,
            authorized: false,
        })
    }

    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Whether a ceremony has unlocked this cipher
    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    /// Called by the gate when the ceremony bound to this cipher succeeds
    pub(crate) fn authorize(&mut self) {
        self.authorized = true;
    }

    /// Run the cipher over `input` and consume it
    pub fn finish(self, input: &[u8]) -> BiometricResult<Vec<u8>> {
        if self.key.policy().user_authentication_required && !self.authorized {
            return Err(BiometricError::NotAuthenticated);
        }

        let nonce = Nonce::from_slice(&self.iv);

        match self.mode {
            CipherMode::Encrypt => {
                let cipher = Aes256Gcm::new_from_slice(self.key.expose())
                    .map_err(|e| BiometricError::EncryptionFailed(e.to_string()))?;
                cipher
                    .encrypt(nonce, input)
                    .map_err(|e| BiometricError::EncryptionFailed(e.to_string()))
            }
            CipherMode::Decrypt => {
                let cipher = Aes256Gcm::new_from_slice(self.key.expose())
                    .map_err(|e| BiometricError::DecryptionFailed(e.to_string()))?;
                cipher
                    .decrypt(nonce, input)
                    .map_err(|_| BiometricError::DecryptionFailed("Authentication failed".into()))
            }
        }
    }
}

impl fmt::Debug for CipherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherHandle")
            .field("mode", &self.mode)
            .field("iv", &hex::encode(self.iv))
            .field("authorized", &self.authorized)
            .finish()
    }
}

mod b64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{KeyPolicy, TAG_LEN};

    fn authorized(mut cipher: CipherHandle) -> CipherHandle {
        cipher.authorize();
        cipher
    }

    #[test]
    fn test_aes_gcm_roundtrip() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let plaintext = b"Top secret server token";

        let enc = authorized(CipherHandle::init_encrypt(key.clone()).unwrap());
        let iv = enc.iv().to_vec();
        let ciphertext = enc.finish(plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

        let dec = authorized(CipherHandle::init_decrypt(key, &iv).unwrap());
        assert_eq!(dec.finish(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_unauthorized_cipher_refuses() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let enc = CipherHandle::init_encrypt(key).unwrap();
        assert!(matches!(
            enc.finish(b"data"),
            Err(BiometricError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let enc = authorized(CipherHandle::init_encrypt(key.clone()).unwrap());
        let iv = enc.iv().to_vec();
        let mut ciphertext = enc.finish(b"payload").unwrap();
        ciphertext[0] ^= 0xff;

        let dec = authorized(CipherHandle::init_decrypt(key, &iv).unwrap());
        assert!(matches!(
            dec.finish(&ciphertext),
            Err(BiometricError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_invalid_iv_length() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let result = CipherHandle::init_decrypt(key, &[0u8; 16]);
        assert!(matches!(
            result,
            Err(BiometricError::InvalidIv { expected: 12, actual: 16 })
        ));
    }

    #[test]
    fn test_fresh_iv_per_cipher() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let a = CipherHandle::init_encrypt(key.clone()).unwrap();
        let b = CipherHandle::init_encrypt(key).unwrap();
        assert_ne!(a.iv(), b.iv());
    }

    #[test]
    fn test_record_equality_is_by_content() {
        let a = CiphertextRecord::new(vec![1, 2, 3], vec![9; 12]);
        let b = CiphertextRecord::new(vec![1, 2, 3], vec![9; 12]);
        let c = CiphertextRecord::new(vec![1, 2, 4], vec![9; 12]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_record_json_shape() {
        let record = CiphertextRecord::new(vec![0xde, 0xad], vec![0u8; 12]);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"ciphertext\":\"3q0=\""));
        assert!(json.contains("\"initializationVector\""));

        let back: CiphertextRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
