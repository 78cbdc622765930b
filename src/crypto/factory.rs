//! Biometric Vault - Cipher Session Factory
//!
//! Builds encrypt/decrypt cipher handles bound to custodian keys.

use std::sync::Arc;

use zeroize::Zeroize;

use super::aead::{CipherHandle, CiphertextRecord};
use crate::error::{BiometricError, BiometricResult};
use crate::keystore::KeyCustodian;

/// Produces mode-specific cipher handles for named keys
#[derive(Clone)]
pub struct CipherFactory {
    custodian: Arc<dyn KeyCustodian>,
}

impl CipherFactory {
    pub fn new(custodian: Arc<dyn KeyCustodian>) -> Self {
        Self { custodian }
    }

    /// Encrypt-mode cipher on a freshly regenerated key.
    ///
    /// Any previous key under `key_name` is deleted first, so ciphertext
    /// written under it can no longer be decrypted.
    pub fn make_encrypt_cipher(&self, key_name: &str) -> BiometricResult<CipherHandle> {
        self.custodian.delete_key(key_name)?;
        let key = self.custodian.get_or_create_key(key_name)?;
        CipherHandle::init_encrypt(key)
    }

    /// Decrypt-mode cipher using the IV stored with the ciphertext
    pub fn make_decrypt_cipher(&self, key_name: &str, iv: &[u8]) -> BiometricResult<CipherHandle> {
        let key = self.custodian.get_key(key_name)?;
        CipherHandle::init_decrypt(key, iv)
    }

    /// Probe whether the key for `key_name` can still initialize a cipher
    pub fn check_key(&self, key_name: &str) -> BiometricResult<()> {
        let key = self.custodian.get_or_create_key(key_name)?;
        CipherHandle::init_encrypt(key).map(|_| ())
    }

    /// Encrypt UTF-8 `plaintext` with an authorized encrypt cipher
    pub fn encrypt_data(&self, plaintext: &str, cipher: CipherHandle) -> BiometricResult<CiphertextRecord> {
        let iv = cipher.iv().to_vec();
        let ciphertext = cipher.finish(plaintext.as_bytes())?;
        Ok(CiphertextRecord::new(ciphertext, iv))
    }

    /// Decrypt to a UTF-8 string, reporting failures
    pub fn try_decrypt_data(&self, ciphertext: &[u8], cipher: CipherHandle) -> BiometricResult<String> {
        let plaintext = cipher.finish(ciphertext)?;
        String::from_utf8(plaintext).map_err(|e| {
            let message = e.to_string();
            e.into_bytes().zeroize();
            BiometricError::DecryptionFailed(message)
        })
    }

    /// Decrypt to a UTF-8 string; any failure yields an empty string
    pub fn decrypt_data(&self, ciphertext: &[u8], cipher: CipherHandle) -> String {
        self.try_decrypt_data(ciphertext, cipher).unwrap_or_else(|e| {
            log::warn!("Decryption failed, returning empty result: {}", e);
            String::new()
        })
    }
}
