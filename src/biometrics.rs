//! Biometric Vault - Biometric Gate
//!
//! State machine for a single authentication ceremony. A ceremony binds an
//! optional pending cipher, consumes platform events, and resolves to exactly
//! one [`CeremonyOutcome`].
//!
//! ```text
//! Idle ─► Presenting ─┬─► Succeeded
//!             ▲       ├─► Cancelled
//!             │       ├─► Locked
//!             │       ├─► HardwareError
//!             └───────┴── FailedAttempt (prompt stays open)
//! ```

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::authenticator::{AuthEvent, Authenticator, PromptInfo};
use crate::crypto::CipherHandle;
use crate::error::BiometricError;

/// Gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Presenting,
    /// Last attempt was not recognized; the prompt is still open
    FailedAttempt,
    Succeeded,
    Cancelled,
    Locked,
    HardwareError,
}

impl GateState {
    /// Prompt is showing and more events are expected
    pub fn is_open(&self) -> bool {
        matches!(self, GateState::Presenting | GateState::FailedAttempt)
    }
}

/// How a ceremony ended
#[derive(Debug)]
pub enum CeremonyOutcome {
    /// Carries the bound cipher, now authorized, if one was attached
    Succeeded(Option<CipherHandle>),
    Failed { locked: bool },
    Errored(String),
}

/// One authentication ceremony
#[derive(Debug)]
pub struct BiometricGate {
    id: Uuid,
    state: GateState,
    failed_attempt: bool,
    cipher: Option<CipherHandle>,
}

impl BiometricGate {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: GateState::Idle,
            failed_attempt: false,
            cipher: None,
        }
    }

    /// Ceremony id used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Whether a biometric was rejected earlier in this ceremony
    pub fn had_failed_attempt(&self) -> bool {
        self.failed_attempt
    }

    /// Enter `Presenting`, binding `cipher` to this ceremony
    pub fn present(&mut self, cipher: Option<CipherHandle>) -> Result<(), BiometricError> {
        if self.state != GateState::Idle {
            return Err(BiometricError::CeremonyInProgress);
        }
        self.cipher = cipher;
        self.state = GateState::Presenting;
        log::debug!("Ceremony {} presenting", self.id);
        Ok(())
    }

    /// Feed one platform event.
    ///
    /// Returns the outcome on the transition into a terminal state and `None`
    /// otherwise, including for every event after the first terminal one.
    pub fn handle(&mut self, event: AuthEvent) -> Option<CeremonyOutcome> {
        if !self.state.is_open() {
            log::debug!("Ceremony {} ignoring {:?} in {:?}", self.id, event, self.state);
            return None;
        }

        let outcome = match event {
            AuthEvent::Failed => {
                self.failed_attempt = true;
                self.state = GateState::FailedAttempt;
                log::debug!("Ceremony {} attempt not recognized", self.id);
                return None;
            }
            AuthEvent::Succeeded => {
                self.state = GateState::Succeeded;
                let cipher = self.cipher.take().map(|mut cipher| {
                    cipher.authorize();
                    cipher
                });
                CeremonyOutcome::Succeeded(cipher)
            }
            AuthEvent::Error { code, message } => {
                if code.is_user_cancel() {
                    self.state = GateState::Cancelled;
                    CeremonyOutcome::Failed { locked: false }
                } else if code.is_lockout() {
                    self.state = GateState::Locked;
                    if self.failed_attempt {
                        CeremonyOutcome::Errored(message)
                    } else {
                        CeremonyOutcome::Failed { locked: true }
                    }
                } else {
                    self.state = GateState::HardwareError;
                    if self.failed_attempt {
                        CeremonyOutcome::Failed { locked: false }
                    } else {
                        CeremonyOutcome::Errored(message)
                    }
                }
            }
        };

        // A cipher not handed out dies with the ceremony
        self.cipher = None;
        log::info!("Ceremony {} resolved as {:?}", self.id, self.state);
        Some(outcome)
    }

    /// The platform dropped the event channel without a terminal event.
    ///
    /// Resolved like any other non-lockout error: a failure after a rejected
    /// attempt, an error otherwise.
    pub fn abandon(&mut self) -> Option<CeremonyOutcome> {
        if !self.state.is_open() {
            return None;
        }
        self.state = GateState::HardwareError;
        self.cipher = None;
        log::warn!("Ceremony {} ended without a result", self.id);
        if self.failed_attempt {
            Some(CeremonyOutcome::Failed { locked: false })
        } else {
            Some(CeremonyOutcome::Errored(
                "Authentication ended without a result".into(),
            ))
        }
    }

    /// Present the prompt through `authenticator` and wait for the outcome
    pub async fn authenticate(
        &mut self,
        authenticator: &dyn Authenticator,
        prompt: &PromptInfo,
        cipher: Option<CipherHandle>,
    ) -> CeremonyOutcome {
        if let Err(e) = self.present(cipher) {
            return CeremonyOutcome::Errored(e.to_string());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        authenticator.authenticate(prompt, tx);

        while let Some(event) = rx.recv().await {
            if let Some(outcome) = self.handle(event) {
                return outcome;
            }
        }

        self.abandon()
            .unwrap_or_else(|| CeremonyOutcome::Errored("Ceremony already closed".into()))
    }
}

impl Default for BiometricGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a fresh ceremony to completion
pub async fn run_ceremony(
    authenticator: &dyn Authenticator,
    prompt: &PromptInfo,
    cipher: Option<CipherHandle>,
) -> CeremonyOutcome {
    BiometricGate::new()
        .authenticate(authenticator, prompt, cipher)
        .await
}
