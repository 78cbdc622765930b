//! Biometric Vault - Platform Authenticator Port
//!
//! The platform owns sensor matching. This module defines what the vault
//! needs from it: a capability query and an asynchronous authenticate call
//! that streams [`AuthEvent`]s into a sink.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{BiometricError, BiometricResult};

/// Authenticator classes a prompt may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedAuthenticators {
    /// Class 3 biometrics, required for keystore-bound ciphers
    BiometricStrong,
    /// Class 2 or class 3 biometrics
    BiometricWeakOrStrong,
}

/// Result of a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricCapability {
    Available,
    /// Hardware present but unusable until the user acts (e.g. enrolls)
    NeedsSetup,
    Unsupported,
}

impl BiometricCapability {
    pub fn is_usable(&self) -> bool {
        matches!(self, BiometricCapability::Available)
    }
}

/// Prompt presentation settings handed to the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptInfo {
    pub title: String,
    pub subtitle: String,
    pub negative_button_text: String,
    pub description: String,
    pub confirmation_required: bool,
    pub allowed_authenticators: AllowedAuthenticators,
}

impl Default for PromptInfo {
    fn default() -> Self {
        Self {
            title: "Biometric authentication".into(),
            subtitle: "Confirm it's you".into(),
            negative_button_text: "Cancel".into(),
            description: "Use your fingerprint or face to continue".into(),
            confirmation_required: false,
            allowed_authenticators: AllowedAuthenticators::BiometricStrong,
        }
    }
}

/// Platform error codes reported while a prompt is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorCode {
    HwUnavailable,
    UnableToProcess,
    Timeout,
    NoSpace,
    Canceled,
    Lockout,
    Vendor,
    LockoutPermanent,
    UserCanceled,
    NoBiometrics,
    HwNotPresent,
    NegativeButton,
    NoDeviceCredential,
    Other(i32),
}

impl AuthErrorCode {
    /// Map a numeric platform error code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::HwUnavailable,
            2 => Self::UnableToProcess,
            3 => Self::Timeout,
            4 => Self::NoSpace,
            5 => Self::Canceled,
            7 => Self::Lockout,
            8 => Self::Vendor,
            9 => Self::LockoutPermanent,
            10 => Self::UserCanceled,
            11 => Self::NoBiometrics,
            12 => Self::HwNotPresent,
            13 => Self::NegativeButton,
            14 => Self::NoDeviceCredential,
            other => Self::Other(other),
        }
    }

    pub fn is_user_cancel(&self) -> bool {
        matches!(self, Self::NegativeButton | Self::UserCanceled)
    }

    pub fn is_lockout(&self) -> bool {
        matches!(self, Self::Lockout | Self::LockoutPermanent)
    }

    /// Message used when the platform supplies none
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::HwUnavailable => "Biometric hardware unavailable",
            Self::UnableToProcess => "Unable to process biometric",
            Self::Timeout => "Biometric operation timed out",
            Self::NoSpace => "Not enough storage to complete the operation",
            Self::Canceled => "Biometric operation canceled",
            Self::Lockout => "Too many attempts. Try again later.",
            Self::Vendor => "Vendor-specific biometric error",
            Self::LockoutPermanent => "Too many attempts. Biometrics disabled.",
            Self::UserCanceled => "Authentication canceled by user",
            Self::NoBiometrics => "No biometrics enrolled",
            Self::HwNotPresent => "No biometric hardware",
            Self::NegativeButton => "Negative button pressed",
            Self::NoDeviceCredential => "No device credential set",
            Self::Other(_) => "Unknown biometric error",
        }
    }
}

/// One event from a running ceremony
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Biometric presented but not recognized; the prompt stays open
    Failed,
    Succeeded,
    Error { code: AuthErrorCode, message: String },
}

impl AuthEvent {
    /// Error event carrying the code's default message
    pub fn error(code: AuthErrorCode) -> Self {
        AuthEvent::Error {
            code,
            message: code.default_message().to_string(),
        }
    }

    /// Parse a comma-separated script such as `fail,fail,success`
    pub fn parse_script(script: &str) -> BiometricResult<Vec<AuthEvent>> {
        script
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                let event = match token {
                    "success" | "ok" => AuthEvent::Succeeded,
                    "fail" | "failed" => AuthEvent::Failed,
                    "cancel" => AuthEvent::error(AuthErrorCode::UserCanceled),
                    "negative" => AuthEvent::error(AuthErrorCode::NegativeButton),
                    "lockout" => AuthEvent::error(AuthErrorCode::Lockout),
                    "lockout-permanent" => AuthEvent::error(AuthErrorCode::LockoutPermanent),
                    "hw-unavailable" => AuthEvent::error(AuthErrorCode::HwUnavailable),
                    "timeout" => AuthEvent::error(AuthErrorCode::Timeout),
                    other => {
                        return Err(BiometricError::ConfigError(format!(
                            "Unknown ceremony event: {}",
                            other
                        )))
                    }
                };
                Ok(event)
            })
            .collect()
    }
}

/// Sending half a platform uses to report ceremony events
pub type AuthEventSink = mpsc::UnboundedSender<AuthEvent>;

/// Platform biometric authenticator
pub trait Authenticator: Send + Sync {
    fn can_authenticate(&self, allowed: AllowedAuthenticators) -> BiometricCapability;

    /// Show the prompt and return immediately; events arrive through `events`
    fn authenticate(&self, prompt: &PromptInfo, events: AuthEventSink);
}

/// Scripted authenticator for demos and tests.
///
/// Each `authenticate` call consumes the next queued script. With nothing
/// queued the ceremony ends with a hardware error.
pub struct SimulatedAuthenticator {
    capability: RwLock<BiometricCapability>,
    scripts: Mutex<VecDeque<Vec<AuthEvent>>>,
    ceremonies: AtomicUsize,
    last_prompt: Mutex<Option<PromptInfo>>,
}

impl SimulatedAuthenticator {
    pub fn new() -> Self {
        Self {
            capability: RwLock::new(BiometricCapability::Available),
            scripts: Mutex::new(VecDeque::new()),
            ceremonies: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn set_capability(&self, capability: BiometricCapability) {
        *self.capability.write() = capability;
    }

    /// Queue the events for the next ceremony
    pub fn push_script(&self, events: Vec<AuthEvent>) {
        self.scripts.lock().push_back(events);
    }

    /// Queue a ceremony that succeeds on the first try
    pub fn push_success(&self) {
        self.push_script(vec![AuthEvent::Succeeded]);
    }

    /// Ceremonies started so far
    pub fn ceremonies(&self) -> usize {
        self.ceremonies.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<PromptInfo> {
        self.last_prompt.lock().clone()
    }
}

impl Default for SimulatedAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

impl Authenticator for SimulatedAuthenticator {
    fn can_authenticate(&self, _allowed: AllowedAuthenticators) -> BiometricCapability {
        *self.capability.read()
    }

    fn authenticate(&self, prompt: &PromptInfo, events: AuthEventSink) {
        self.ceremonies.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.clone());

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| vec![AuthEvent::error(AuthErrorCode::HwUnavailable)]);

        for event in script {
            if events.send(event).is_err() {
                break;
            }
        }
    }
}
