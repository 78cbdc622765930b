//! Biometric Vault - Verify-Only Flow
//!
//! Plain biometric verification with no cipher attached.

use crate::authenticator::{AllowedAuthenticators, Authenticator, PromptInfo};
use crate::biometrics::run_ceremony;
use crate::callback::{BiometricVerificationCallback, VerificationOutcome};

/// Whether `authenticator` can run a ceremony with `allowed` classes
pub fn is_biometrics_available(authenticator: &dyn Authenticator, allowed: AllowedAuthenticators) -> bool {
    authenticator.can_authenticate(allowed).is_usable()
}

/// Run one verify-only ceremony
pub async fn request_verification(
    authenticator: &dyn Authenticator,
    prompt: &PromptInfo,
) -> VerificationOutcome {
    run_ceremony(authenticator, prompt, None).await.into()
}

/// Callback form of [`request_verification`]
pub async fn request_verification_with(
    authenticator: &dyn Authenticator,
    prompt: &PromptInfo,
    callback: &mut dyn BiometricVerificationCallback,
) {
    request_verification(authenticator, prompt)
        .await
        .dispatch(callback);
}
