//! # Gate State
//!
//! The register's supervisor PIN prompt. One prompt is open at a time; the
//! gate decides what a PIN or a prompt close means for the pending action.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use mostrador_core::auth::{CloseOutcome, GateState as PromptState};
use mostrador_core::{Approval, AuthorizationGate, CoreResult, CredentialVerifier, ProtectedAction};

#[derive(Debug, Clone, Default)]
pub struct GateState {
    gate: Arc<Mutex<AuthorizationGate>>,
}

impl GateState {
    pub fn new() -> Self {
        GateState::default()
    }

    fn with_gate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut AuthorizationGate) -> R,
    {
        let mut gate = self.gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut gate)
    }

    pub fn request(&self, action: ProtectedAction) -> CoreResult<()> {
        self.with_gate(|gate| gate.request(action))
    }

    pub fn submit(&self, pin: &str, verifier: &dyn CredentialVerifier) -> CoreResult<Approval> {
        self.with_gate(|gate| gate.submit(pin, verifier, Utc::now()))
    }

    pub fn close(&self) -> CloseOutcome {
        self.with_gate(AuthorizationGate::close)
    }

    /// Marks the dispatched action as done.
    pub fn finish(&self) {
        self.with_gate(AuthorizationGate::finish)
    }

    pub fn state(&self) -> PromptState {
        self.with_gate(|gate| gate.state().clone())
    }

    pub fn failed_attempts(&self) -> u32 {
        self.with_gate(|gate| gate.failed_attempts())
    }
}
