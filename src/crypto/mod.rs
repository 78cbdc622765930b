//! Biometric Vault - Cryptographic Core
//!
//! AES-256-GCM key handles, cipher sessions and the factory binding them to
//! custodian keys.

pub mod keys;
pub mod aead;
pub mod factory;

pub use keys::*;
pub use aead::*;
pub use factory::*;
