//! Biometric Vault - Session Manager
//!
//! Ties the custodian, cipher factory, ciphertext store and biometric gate
//! together. Holds the active key name and the record cached for it.

use std::sync::Arc;

use crate::authenticator::Authenticator;
use crate::biometrics::{run_ceremony, CeremonyOutcome};
use crate::callback::{BiometricVerificationCallback, VerificationOutcome};
use crate::config::SessionConfig;
use crate::crypto::{CipherFactory, CipherHandle, CiphertextRecord};
use crate::error::{BiometricError, BiometricResult};
use crate::keystore::KeyCustodian;
use crate::secure_prefs::PreferenceStore;
use crate::store::CiphertextStore;

/// Active key name and the record loaded for it
#[derive(Debug, Default, Clone)]
struct SessionState {
    active_key: Option<String>,
    record: Option<CiphertextRecord>,
}

/// Biometric-gated encryption session.
///
/// Request methods take `&mut self`: one ceremony at a time per session.
pub struct SessionManager {
    ciphers: CipherFactory,
    store: CiphertextStore,
    authenticator: Arc<dyn Authenticator>,
    config: SessionConfig,
    state: SessionState,
}

impl SessionManager {
    /// Session with the default [`SessionConfig`]
    pub fn new(
        custodian: Arc<dyn KeyCustodian>,
        prefs: Arc<dyn PreferenceStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self::with_config(custodian, prefs, authenticator, SessionConfig::default())
    }

    /// Session persisting under the layout and prompts of `config`
    pub fn with_config(
        custodian: Arc<dyn KeyCustodian>,
        prefs: Arc<dyn PreferenceStore>,
        authenticator: Arc<dyn Authenticator>,
        config: SessionConfig,
    ) -> Self {
        let store = CiphertextStore::with_layout(prefs, &config.prefs_prefix, &config.record_key);

        Self {
            ciphers: CipherFactory::new(custodian),
            store,
            authenticator,
            config,
            state: SessionState::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn active_key(&self) -> Option<&str> {
        self.state.active_key.as_deref()
    }

    pub fn cached_record(&self) -> Option<&CiphertextRecord> {
        self.state.record.as_ref()
    }

    /// Whether a decryption request for the active key would start a ceremony
    pub fn has_record(&self) -> bool {
        self.state.record.is_some()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SESSION STATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Make `key_name` active.
    ///
    /// A different name replaces the cache with a fresh store read. The same
    /// name with nothing cached reads once more; otherwise this is a no-op.
    pub fn set_active_key(&mut self, key_name: &str) -> BiometricResult<()> {
        if self.state.active_key.as_deref() == Some(key_name) {
            if self.state.record.is_none() {
                self.state.record = self.store.read(key_name)?;
            }
            return Ok(());
        }

        self.state.active_key = Some(key_name.to_string());
        self.state.record = None;
        self.state.record = self.store.read(key_name)?;
        log::debug!(
            "Active key '{}' ({})",
            key_name,
            if self.state.record.is_some() { "record loaded" } else { "no record" }
        );
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENCRYPTION
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt `plaintext` under `key_name` behind a biometric ceremony
    pub async fn encrypt(&mut self, key_name: &str, plaintext: &str) -> VerificationOutcome {
        if let Err(e) = self.set_active_key(key_name) {
            return VerificationOutcome::Error(e.to_string());
        }

        let capability = self
            .authenticator
            .can_authenticate(self.config.encryption_authenticators);
        if !capability.is_usable() {
            log::warn!("Encryption for '{}' refused: {:?}", key_name, capability);
            return VerificationOutcome::Error(BiometricError::BiometricsUnavailable.to_string());
        }

        let cipher = match self.ciphers.make_encrypt_cipher(key_name) {
            Ok(cipher) => cipher,
            Err(e) => return VerificationOutcome::Error(e.to_string()),
        };

        let prompt = self.config.encryption_prompt();
        let outcome = run_ceremony(self.authenticator.as_ref(), &prompt, Some(cipher)).await;
        match outcome {
            CeremonyOutcome::Succeeded(Some(cipher)) => {
                match self.encrypt_and_store(key_name, plaintext, cipher) {
                    Ok(()) => VerificationOutcome::Success(None),
                    Err(e) => {
                        log::error!("Storing ciphertext for '{}' failed: {}", key_name, e);
                        VerificationOutcome::Error(e.to_string())
                    }
                }
            }
            CeremonyOutcome::Succeeded(None) => {
                self.discard_record(key_name);
                VerificationOutcome::Error("Authenticated cipher missing".into())
            }
            other => {
                self.discard_record(key_name);
                other.into()
            }
        }
    }

    /// Drop the record for `key_name` after its key was regenerated without a
    /// new ciphertext; the old record can no longer be decrypted.
    fn discard_record(&mut self, key_name: &str) {
        self.state.record = None;
        if let Err(e) = self.store.clear(key_name) {
            log::warn!("Clearing stale record for '{}' failed: {}", key_name, e);
        }
    }

    fn encrypt_and_store(
        &mut self,
        key_name: &str,
        plaintext: &str,
        cipher: CipherHandle,
    ) -> BiometricResult<()> {
        self.store.clear(key_name)?;
        self.state.record = None;

        let record = self.ciphers.encrypt_data(plaintext, cipher)?;
        self.store.write(key_name, &record)?;

        // Read back what was persisted; one retry before giving up
        let mut stored = self.store.read(key_name)?;
        if stored.is_none() {
            log::warn!("Record for '{}' not visible after write, retrying", key_name);
            stored = self.store.read(key_name)?;
        }
        self.state.record = stored;

        log::info!(
            "Stored ciphertext for '{}' (iv {})",
            key_name,
            record.iv_fingerprint()
        );
        Ok(())
    }

    /// Callback form of [`SessionManager::encrypt`]
    pub async fn request_encryption(
        &mut self,
        key_name: &str,
        data: &str,
        callback: &mut dyn BiometricVerificationCallback,
    ) {
        self.encrypt(key_name, data).await.dispatch(callback);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DECRYPTION
    // ═══════════════════════════════════════════════════════════════════════

    /// Decrypt the record stored for `key_name` behind a biometric ceremony.
    ///
    /// Returns `None` without starting a ceremony when nothing is stored. A
    /// ciphertext that fails to decrypt yields `Success(Some(""))`.
    pub async fn decrypt(&mut self, key_name: &str) -> Option<VerificationOutcome> {
        if let Err(e) = self.set_active_key(key_name) {
            return Some(VerificationOutcome::Error(e.to_string()));
        }

        let Some(record) = self.state.record.clone() else {
            log::debug!("No record for '{}', skipping ceremony", key_name);
            return None;
        };

        let cipher = match self
            .ciphers
            .make_decrypt_cipher(key_name, record.initialization_vector())
        {
            Ok(cipher) => cipher,
            Err(e) => {
                log::warn!("Decrypt cipher for '{}' unavailable: {}", key_name, e);
                return Some(VerificationOutcome::Error(e.to_string()));
            }
        };

        let prompt = self.config.encryption_prompt();
        let outcome = match run_ceremony(self.authenticator.as_ref(), &prompt, Some(cipher)).await {
            CeremonyOutcome::Succeeded(Some(cipher)) => VerificationOutcome::Success(Some(
                self.ciphers.decrypt_data(record.ciphertext(), cipher),
            )),
            CeremonyOutcome::Succeeded(None) => {
                VerificationOutcome::Error("Authenticated cipher missing".into())
            }
            other => other.into(),
        };
        Some(outcome)
    }

    /// Callback form of [`SessionManager::decrypt`]; no call when nothing is stored
    pub async fn request_decryption(
        &mut self,
        key_name: &str,
        callback: &mut dyn BiometricVerificationCallback,
    ) {
        if let Some(outcome) = self.decrypt(key_name).await {
            outcome.dispatch(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::{AuthErrorCode, AuthEvent, BiometricCapability, SimulatedAuthenticator};
    use crate::callback::RecordingCallback;
    use crate::keystore::SoftwareKeyStore;
    use crate::secure_prefs::{FilePreferences, MemoryPreferences};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        keys: Arc<SoftwareKeyStore>,
        prefs: Arc<MemoryPreferences>,
        auth: Arc<SimulatedAuthenticator>,
        session: SessionManager,
    }

    /// Memory store whose writes can be switched to fail
    #[derive(Default)]
    struct FlakyPreferences {
        inner: MemoryPreferences,
        fail_puts: AtomicBool,
    }

    impl PreferenceStore for FlakyPreferences {
        fn get(&self, namespace: &str, key: &str) -> BiometricResult<Option<String>> {
            self.inner.get(namespace, key)
        }

        fn put(&self, namespace: &str, key: &str, value: String) -> BiometricResult<()> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(BiometricError::StorageError("disk full".into()));
            }
            self.inner.put(namespace, key, value)
        }

        fn remove(&self, namespace: &str, key: &str) -> BiometricResult<()> {
            self.inner.remove(namespace, key)
        }

        fn clear(&self, namespace: &str) -> BiometricResult<()> {
            self.inner.clear(namespace)
        }
    }

    fn fixture() -> Fixture {
        let keys = Arc::new(SoftwareKeyStore::new());
        let prefs = Arc::new(MemoryPreferences::new());
        let auth = Arc::new(SimulatedAuthenticator::new());
        let session = SessionManager::new(keys.clone(), prefs.clone(), auth.clone());
        Fixture {
            keys,
            prefs,
            auth,
            session,
        }
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let mut fx = fixture();

        fx.auth.push_success();
        assert_eq!(fx.session.encrypt("k1", "secret").await, VerificationOutcome::Success(None));
        assert!(fx.session.has_record());

        fx.auth.push_success();
        assert_eq!(
            fx.session.decrypt("k1").await,
            Some(VerificationOutcome::Success(Some("secret".into())))
        );
        assert_eq!(fx.auth.ceremonies(), 2);
    }

    #[tokio::test]
    async fn test_roundtrip_empty_and_unicode() {
        let mut fx = fixture();
        for plaintext in ["", "zażółć gęślą jaźń 🔐"] {
            fx.auth.push_success();
            fx.session.encrypt("k", plaintext).await;
            fx.auth.push_success();
            assert_eq!(
                fx.session.decrypt("k").await,
                Some(VerificationOutcome::Success(Some(plaintext.into())))
            );
        }
    }

    #[tokio::test]
    async fn test_tampered_ciphertext_decrypts_to_empty() {
        let mut fx = fixture();
        fx.auth.push_success();
        fx.session.encrypt("k1", "secret").await;

        // Corrupt the stored ciphertext behind the session's back
        let store = CiphertextStore::new(fx.prefs.clone());
        let record = store.read("k1").unwrap().unwrap();
        let mut ciphertext = record.ciphertext().to_vec();
        ciphertext[0] ^= 0x80;
        store
            .write("k1", &CiphertextRecord::new(ciphertext, record.initialization_vector().to_vec()))
            .unwrap();

        // Switching away and back forces a reload
        fx.session.set_active_key("other").unwrap();
        fx.auth.push_success();
        assert_eq!(
            fx.session.decrypt("k1").await,
            Some(VerificationOutcome::Success(Some(String::new())))
        );
    }

    #[tokio::test]
    async fn test_decrypt_without_record_is_silent() {
        let mut fx = fixture();
        let mut cb = RecordingCallback::new();

        fx.session.request_decryption("nothing", &mut cb).await;

        assert!(cb.calls.is_empty());
        assert_eq!(fx.auth.ceremonies(), 0);
        assert_eq!(fx.session.active_key(), Some("nothing"));
    }

    #[tokio::test]
    async fn test_reencryption_replaces_record() {
        let mut fx = fixture();

        fx.auth.push_success();
        fx.session.encrypt("k1", "secret").await;
        let first = fx.session.cached_record().cloned().unwrap();

        fx.auth.push_success();
        fx.session.encrypt("k1", "other").await;
        let second = fx.session.cached_record().cloned().unwrap();

        assert_ne!(first, second);
        assert_eq!(fx.prefs.namespace_len("biometric_prefs_k1"), 1);
        let store = CiphertextStore::new(fx.prefs.clone());
        assert_eq!(store.read("k1").unwrap(), Some(second));

        fx.auth.push_success();
        assert_eq!(
            fx.session.decrypt("k1").await,
            Some(VerificationOutcome::Success(Some("other".into())))
        );
    }

    #[tokio::test]
    async fn test_invalidated_key_reports_error() {
        let mut fx = fixture();
        fx.auth.push_success();
        fx.session.encrypt("k2", "secret").await;
        assert!(fx.session.has_record());

        fx.keys.invalidate("k2");

        let mut cb = RecordingCallback::new();
        fx.session.request_decryption("k2", &mut cb).await;
        assert_eq!(cb.calls.len(), 1);
        assert!(matches!(cb.last(), Some(VerificationOutcome::Error(_))));
        assert_eq!(fx.auth.ceremonies(), 1);
    }

    #[tokio::test]
    async fn test_enrollment_change_reports_error() {
        let mut fx = fixture();
        fx.auth.push_success();
        fx.session.encrypt("k", "secret").await;

        fx.keys.enrollment_changed();

        match fx.session.decrypt("k").await {
            Some(VerificationOutcome::Error(message)) => assert!(message.contains("k")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_switching_keys_reloads() {
        let mut fx = fixture();
        fx.auth.push_success();
        fx.session.encrypt("k1", "one").await;

        fx.session.set_active_key("k2").unwrap();
        assert_eq!(fx.session.active_key(), Some("k2"));
        assert!(fx.session.cached_record().is_none());

        // Record written for k2 by someone else shows up on switch
        let store = CiphertextStore::new(fx.prefs.clone());
        let foreign = CiphertextRecord::new(vec![1; 20], vec![2; 12]);
        store.write("k2", &foreign).unwrap();
        fx.session.set_active_key("k1").unwrap();
        fx.session.set_active_key("k2").unwrap();
        assert_eq!(fx.session.cached_record(), Some(&foreign));
    }

    #[tokio::test]
    async fn test_same_key_reloads_only_when_empty() {
        let mut fx = fixture();
        let store = CiphertextStore::new(fx.prefs.clone());

        fx.session.set_active_key("k").unwrap();
        assert!(fx.session.cached_record().is_none());

        let first = CiphertextRecord::new(vec![1; 20], vec![1; 12]);
        store.write("k", &first).unwrap();
        fx.session.set_active_key("k").unwrap();
        assert_eq!(fx.session.cached_record(), Some(&first));

        // Cached and unchanged name: no reload
        let second = CiphertextRecord::new(vec![2; 20], vec![2; 12]);
        store.write("k", &second).unwrap();
        fx.session.set_active_key("k").unwrap();
        assert_eq!(fx.session.cached_record(), Some(&first));
    }

    #[tokio::test]
    async fn test_biometrics_unavailable_fails_fast() {
        let mut fx = fixture();
        fx.auth.set_capability(BiometricCapability::NeedsSetup);

        let mut cb = RecordingCallback::new();
        fx.session.request_encryption("k", "secret", &mut cb).await;

        assert_eq!(
            cb.calls,
            vec![VerificationOutcome::Error(
                BiometricError::BiometricsUnavailable.to_string()
            )]
        );
        assert_eq!(fx.auth.ceremonies(), 0);
        assert!(fx.keys.is_empty());
    }

    #[tokio::test]
    async fn test_failed_then_lockout_is_error() {
        let mut fx = fixture();
        fx.auth.push_script(vec![
            AuthEvent::Failed,
            AuthEvent::error(AuthErrorCode::Lockout),
        ]);

        let outcome = fx.session.encrypt("k", "secret").await;
        assert_eq!(
            outcome,
            VerificationOutcome::Error(AuthErrorCode::Lockout.default_message().into())
        );
        assert!(!fx.session.has_record());
    }

    #[tokio::test]
    async fn test_lockout_is_locked_failure() {
        let mut fx = fixture();
        fx.auth.push_script(vec![AuthEvent::error(AuthErrorCode::LockoutPermanent)]);

        let mut cb = RecordingCallback::new();
        fx.session.request_encryption("k", "secret", &mut cb).await;
        assert_eq!(cb.calls, vec![VerificationOutcome::Failure { is_locked: true }]);
    }

    #[tokio::test]
    async fn test_cancelled_reencryption_discards_old_record() {
        let mut fx = fixture();
        fx.auth.push_success();
        fx.session.encrypt("k", "first").await;
        assert!(fx.session.has_record());

        fx.auth.push_script(vec![AuthEvent::error(AuthErrorCode::NegativeButton)]);
        assert_eq!(
            fx.session.encrypt("k", "second").await,
            VerificationOutcome::Failure { is_locked: false }
        );

        // The key was regenerated, so the old ciphertext is gone too
        assert!(!fx.session.has_record());
        let store = CiphertextStore::new(fx.prefs.clone());
        assert_eq!(store.read("k").unwrap(), None);

        fx.auth.push_success();
        assert_eq!(fx.session.decrypt("k").await, None);
        assert_eq!(fx.auth.ceremonies(), 2);
    }

    #[tokio::test]
    async fn test_failed_store_write_drops_cached_record() {
        let keys = Arc::new(SoftwareKeyStore::new());
        let prefs = Arc::new(FlakyPreferences::default());
        let auth = Arc::new(SimulatedAuthenticator::new());
        let mut session = SessionManager::new(keys, prefs.clone(), auth.clone());

        auth.push_success();
        session.encrypt("k", "first").await;
        assert!(session.has_record());

        prefs.fail_puts.store(true, Ordering::SeqCst);
        auth.push_success();
        assert_eq!(
            session.encrypt("k", "second").await,
            VerificationOutcome::Error(BiometricError::StorageError("disk full".into()).to_string())
        );
        assert!(!session.has_record());

        auth.push_success();
        assert_eq!(session.decrypt("k").await, None);
        assert_eq!(auth.ceremonies(), 2);
    }

    #[tokio::test]
    async fn test_exactly_one_callback_per_ceremony() {
        let mut fx = fixture();
        let scripts = vec![
            vec![AuthEvent::Succeeded, AuthEvent::Succeeded],
            vec![AuthEvent::Failed, AuthEvent::error(AuthErrorCode::Timeout), AuthEvent::Succeeded],
            vec![AuthEvent::error(AuthErrorCode::UserCanceled), AuthEvent::error(AuthErrorCode::Lockout)],
            vec![AuthEvent::Failed],
        ];

        for script in scripts {
            fx.auth.push_script(script);
            let mut cb = RecordingCallback::new();
            fx.session.request_encryption("k", "data", &mut cb).await;
            assert_eq!(cb.calls.len(), 1, "calls: {:?}", cb.calls);
        }
    }

    #[tokio::test]
    async fn test_key_store_unavailable() {
        let mut fx = fixture();
        fx.keys.set_available(false);
        fx.auth.push_success();

        let outcome = fx.session.encrypt("k", "secret").await;
        assert!(matches!(outcome, VerificationOutcome::Error(_)));
        assert_eq!(fx.auth.ceremonies(), 0);
    }

    #[tokio::test]
    async fn test_file_backed_session() {
        let dir = tempfile::tempdir().unwrap();
        let keys = Arc::new(SoftwareKeyStore::new());
        let auth = Arc::new(SimulatedAuthenticator::new());

        {
            let prefs = Arc::new(FilePreferences::open(dir.path()).unwrap());
            let mut session = SessionManager::new(keys.clone(), prefs, auth.clone());
            auth.push_success();
            session.encrypt("token", "abc123").await;
        }

        // New session over the same files and custodian
        let prefs = Arc::new(FilePreferences::open(dir.path()).unwrap());
        let mut session = SessionManager::new(keys, prefs, auth.clone());
        auth.push_success();
        assert_eq!(
            session.decrypt("token").await,
            Some(VerificationOutcome::Success(Some("abc123".into())))
        );
    }
}
