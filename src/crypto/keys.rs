//! Biometric Vault - Key Material
//!
//! Opaque AES-256 key handles and the access policy they were generated with.

use std::fmt;
use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use zeroize::Zeroize;

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// Key size in bits
pub const KEY_SIZE_BITS: u16 = 256;

/// Nonce (initialization vector) length for AES-GCM
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Cipher block mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    Gcm,
}

/// Cipher padding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    NoPadding,
}

/// Access policy attached to a key at generation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPolicy {
    pub key_size_bits: u16,
    pub block_mode: BlockMode,
    pub padding: Padding,
    pub can_encrypt: bool,
    pub can_decrypt: bool,
    /// Ciphers built on this key only finish after a successful ceremony
    pub user_authentication_required: bool,
    /// Key becomes permanently unusable when the enrollment set changes
    pub invalidated_by_biometric_enrollment: bool,
}

impl KeyPolicy {
    /// Policy for biometric-bound secrets
    pub fn biometric() -> Self {
        Self {
            key_size_bits: KEY_SIZE_BITS,
            block_mode: BlockMode::Gcm,
            padding: Padding::NoPadding,
            can_encrypt: true,
            can_decrypt: true,
            user_authentication_required: true,
            invalidated_by_biometric_enrollment: true,
        }
    }

    /// Cipher transformation string, e.g. `AES/GCM/NoPadding`
    pub fn transformation(&self) -> &'static str {
        match (self.block_mode, self.padding) {
            (BlockMode::Gcm, Padding::NoPadding) => "AES/GCM/NoPadding",
        }
    }
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::biometric()
    }
}

/// Opaque handle to AES-256 key material.
///
/// Cloning shares the same secret; the bytes are zeroized when the last
/// handle drops. Raw material never leaves the crate.
#[derive(Clone)]
pub struct SecretKeyHandle {
    inner: Arc<Secret<[u8; KEY_LEN]>>,
    policy: KeyPolicy,
}

impl SecretKeyHandle {
    pub(crate) fn new(bytes: [u8; KEY_LEN], policy: KeyPolicy) -> Self {
        Self {
            inner: Arc::new(Secret::new(bytes)),
            policy,
        }
    }

    /// Generate a random key under `policy`
    pub(crate) fn generate(policy: KeyPolicy) -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes, policy);
        bytes.zeroize();
        key
    }

    pub(crate) fn expose(&self) -> &[u8; KEY_LEN] {
        self.inner.expose_secret()
    }

    /// Policy the key was generated with
    pub fn policy(&self) -> &KeyPolicy {
        &self.policy
    }

    /// Whether two handles refer to the same key material
    pub fn same_key(&self, other: &SecretKeyHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SecretKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKeyHandle")
            .field("policy", &self.policy)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random nonce for AES-GCM
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_biometric_policy() {
        let policy = KeyPolicy::biometric();
        assert!(policy.user_authentication_required);
        assert!(policy.invalidated_by_biometric_enrollment);
        assert_eq!(policy.key_size_bits, 256);
        assert_eq!(policy.transformation(), "AES/GCM/NoPadding");
    }

    #[test]
    fn test_debug_redacts_material() {
        let key = SecretKeyHandle::new([0x42; KEY_LEN], KeyPolicy::biometric());
        let dbg = format!("{:?}", key);
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("66"));
    }

    #[test]
    fn test_clone_shares_material() {
        let key = SecretKeyHandle::generate(KeyPolicy::biometric());
        let other = SecretKeyHandle::generate(KeyPolicy::biometric());
        assert!(key.same_key(&key.clone()));
        assert!(!key.same_key(&other));
        assert_ne!(key.expose(), other.expose());
    }
}
