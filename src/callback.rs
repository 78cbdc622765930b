//! Biometric Vault - Caller-Facing Outcomes
//!
//! Every request resolves to exactly one of three outcomes, delivered either
//! as a returned [`VerificationOutcome`] or through a
//! [`BiometricVerificationCallback`].

use crate::biometrics::CeremonyOutcome;

/// Receives the result of a biometric request
pub trait BiometricVerificationCallback {
    /// Verification completed; `result` carries decrypted data when there is any
    fn on_success(&mut self, result: Option<String>);

    /// Cancelled or rejected; `is_locked` when biometrics are locked out
    fn on_failure(&mut self, is_locked: bool);

    fn on_error(&mut self, message: String);
}

/// Terminal result of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Success(Option<String>),
    Failure { is_locked: bool },
    Error(String),
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success(_))
    }

    /// Hand the outcome to `callback` (exactly one method call)
    pub fn dispatch(self, callback: &mut dyn BiometricVerificationCallback) {
        match self {
            VerificationOutcome::Success(result) => callback.on_success(result),
            VerificationOutcome::Failure { is_locked } => callback.on_failure(is_locked),
            VerificationOutcome::Error(message) => callback.on_error(message),
        }
    }
}

impl From<CeremonyOutcome> for VerificationOutcome {
    /// Ceremony result with any bound cipher discarded
    fn from(outcome: CeremonyOutcome) -> Self {
        match outcome {
            CeremonyOutcome::Succeeded(_) => VerificationOutcome::Success(None),
            CeremonyOutcome::Failed { locked } => VerificationOutcome::Failure { is_locked: locked },
            CeremonyOutcome::Errored(message) => VerificationOutcome::Error(message),
        }
    }
}

/// Callback that records every invocation, for tests and the demo binary
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingCallback {
    pub calls: Vec<VerificationOutcome>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&VerificationOutcome> {
        self.calls.last()
    }
}

impl BiometricVerificationCallback for RecordingCallback {
    fn on_success(&mut self, result: Option<String>) {
        self.calls.push(VerificationOutcome::Success(result));
    }

    fn on_failure(&mut self, is_locked: bool) {
        self.calls.push(VerificationOutcome::Failure { is_locked });
    }

    fn on_error(&mut self, message: String) {
        self.calls.push(VerificationOutcome::Error(message));
    }
}
