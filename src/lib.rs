//! # Biometric Vault
//!
//! Biometric-gated AES-256-GCM secrets.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     SESSION MANAGER                      │
//! │        active key name + cached ciphertext record        │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ KEY         │  │ CIPHER      │  │ BIOMETRIC GATE  │  │
//! │  │ CUSTODIAN   │─►│ FACTORY     │─►│ (one ceremony)  │  │
//! │  └─────────────┘  └─────────────┘  └────────┬────────┘  │
//! │                                             │ success   │
//! │  ┌──────────────────────────────────────────┴────────┐  │
//! │  │   CIPHERTEXT STORE  <prefix>_<key>/ciphertext_…   │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - One AES-256 key per key name, regenerated on every encryption
//! - Keys require user authentication and die on enrollment change
//! - A cipher finishes only after its own ceremony succeeds, and only once
//! - Key material never leaves the custodian; zeroized on drop

pub mod authenticator;
pub mod biometrics;
pub mod callback;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod secure_prefs;
pub mod session;
pub mod store;
pub mod verify;

pub use authenticator::{
    AllowedAuthenticators, AuthErrorCode, AuthEvent, Authenticator, BiometricCapability,
    PromptInfo, SimulatedAuthenticator,
};
pub use biometrics::{BiometricGate, CeremonyOutcome, GateState};
pub use callback::{BiometricVerificationCallback, VerificationOutcome};
pub use config::SessionConfig;
pub use crypto::{CipherFactory, CipherHandle, CiphertextRecord};
pub use error::{BiometricError, BiometricResult};
pub use keystore::{KeyCustodian, SoftwareKeyStore};
pub use secure_prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use session::SessionManager;
pub use store::CiphertextStore;

/// Biometric Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
