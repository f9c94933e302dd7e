//! # Authorization Gate
//!
//! Supervisor sign-off for destructive or irreversible register actions.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      AuthorizationGate                                  │
//! │                                                                         │
//! │            request(action)                 submit(pin) ✓                │
//! │   ┌──────┐ ───────────────► ┌──────────────┐ ──────────► ┌────────────┐ │
//! │   │ IDLE │                  │AWAITING_AUTH │             │ ACTION_    │ │
//! │   └──────┘ ◄─────────────── └──────────────┘             │ DISPATCHED │ │
//! │      ▲        close()        │  ▲                        └─────┬──────┘ │
//! │      │      (cancelled)      │  │ submit(pin) ✗                │        │
//! │      │                       └──┘ (failed_attempts += 1)       │        │
//! │      │                                                         │        │
//! │      └──────────────────────── finish() ───────────────────────┘        │
//! │                                                                         │
//! │   close() while ACTION_DISPATCHED is a no-op: a late dismissal of the   │
//! │   PIN prompt can never revert an action that was already approved.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A successful `submit` yields an [`Approval`]. The fields are private and
//! the only constructor is the gate itself, so an operation that takes an
//! `Approval` by value cannot run without a verified credential, and each
//! approval is spent exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Protected Actions
// =============================================================================

/// Actions that require a supervisor credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum ProtectedAction {
    DeleteCartLine {
        #[serde(rename = "lineKey")]
        line_key: String,
    },
    ClearCart,
    ReprintTicket {
        #[serde(rename = "saleId")]
        sale_id: String,
    },
    ZCut {
        #[serde(rename = "shiftId")]
        shift_id: String,
    },
    ApproveReturn {
        #[serde(rename = "saleId")]
        sale_id: String,
    },
}

impl ProtectedAction {
    /// Short label used in logs and gate errors.
    pub fn label(&self) -> &'static str {
        match self {
            ProtectedAction::DeleteCartLine { .. } => "delete cart line",
            ProtectedAction::ClearCart => "clear cart",
            ProtectedAction::ReprintTicket { .. } => "reprint ticket",
            ProtectedAction::ZCut { .. } => "Z-cut",
            ProtectedAction::ApproveReturn { .. } => "approve return",
        }
    }
}

// =============================================================================
// Credential Verifier
// =============================================================================

/// Checks a supervisor PIN.
///
/// The register ships an argon2 implementation; tests use fixed PINs.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, pin: &str) -> bool;
}

/// Verifier backed by a plain PIN. Test and demo use only.
#[derive(Debug, Clone)]
pub struct StaticPin(pub String);

impl CredentialVerifier for StaticPin {
    fn verify(&self, pin: &str) -> bool {
        self.0 == pin
    }
}

// =============================================================================
// Approval
// =============================================================================

/// Proof that a supervisor approved one specific action.
#[derive(Debug, PartialEq, Eq)]
pub struct Approval {
    action: ProtectedAction,
    granted_at: DateTime<Utc>,
}

impl Approval {
    pub(crate) fn grant(action: ProtectedAction, granted_at: DateTime<Utc>) -> Self {
        Approval { action, granted_at }
    }

    pub fn action(&self) -> &ProtectedAction {
        &self.action
    }

    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Fails unless this approval was granted for `expected`.
    pub fn ensure_covers(&self, expected: &ProtectedAction) -> CoreResult<()> {
        if &self.action != expected {
            return Err(CoreError::unauthorized(format!(
                "approval was granted for {}, not {}",
                self.action.label(),
                expected.label()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Gate
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingAuth(ProtectedAction),
    ActionDispatched(ProtectedAction),
}

impl GateState {
    fn name(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::AwaitingAuth(_) => "awaiting authorization",
            GateState::ActionDispatched(_) => "action dispatched",
        }
    }
}

/// Result of a prompt close event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The prompt was dismissed before a valid PIN: the action is abandoned.
    Cancelled(ProtectedAction),
    /// Nothing pending; the event changes nothing.
    Ignored,
}

#[derive(Debug)]
pub struct AuthorizationGate {
    state: GateState,
    failed_attempts: u32,
}

impl Default for AuthorizationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationGate {
    pub fn new() -> Self {
        AuthorizationGate {
            state: GateState::Idle,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Wrong PINs entered since the gate was created. Not limited.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Opens the PIN prompt for `action`.
    ///
    /// Valid from `Idle` or after a previous action was dispatched; a second
    /// request while a prompt is already open is rejected.
    pub fn request(&mut self, action: ProtectedAction) -> CoreResult<()> {
        if let GateState::AwaitingAuth(pending) = &self.state {
            return Err(CoreError::InvalidGateState {
                current: self.state.name().to_string(),
                operation: format!("request {} while {} is pending", action.label(), pending.label()),
            });
        }
        self.state = GateState::AwaitingAuth(action);
        Ok(())
    }

    /// Checks the PIN for the pending action.
    ///
    /// On success the gate moves to `ActionDispatched` and returns the
    /// approval. On failure the prompt stays open for another attempt.
    pub fn submit(
        &mut self,
        pin: &str,
        verifier: &dyn CredentialVerifier,
        now: DateTime<Utc>,
    ) -> CoreResult<Approval> {
        let action = match &self.state {
            GateState::AwaitingAuth(action) => action.clone(),
            other => {
                return Err(CoreError::InvalidGateState {
                    current: other.name().to_string(),
                    operation: "submit a PIN".to_string(),
                })
            }
        };

        if !verifier.verify(pin) {
            self.failed_attempts += 1;
            return Err(CoreError::unauthorized("invalid supervisor PIN"));
        }

        self.state = GateState::ActionDispatched(action.clone());
        Ok(Approval::grant(action, now))
    }

    /// Handles the prompt being closed (operator dismissal or automatic).
    pub fn close(&mut self) -> CloseOutcome {
        match std::mem::replace(&mut self.state, GateState::Idle) {
            GateState::AwaitingAuth(action) => CloseOutcome::Cancelled(action),
            dispatched @ GateState::ActionDispatched(_) => {
                self.state = dispatched;
                CloseOutcome::Ignored
            }
            GateState::Idle => CloseOutcome::Ignored,
        }
    }

    /// Returns to `Idle` once the dispatched action has run.
    pub fn finish(&mut self) {
        if matches!(self.state, GateState::ActionDispatched(_)) {
            self.state = GateState::Idle;
        }
    }
}

/// Test helper: grants an approval without going through a gate.
#[cfg(test)]
pub(crate) fn approve(action: ProtectedAction) -> Approval {
    Approval::grant(action, Utc::now())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> StaticPin {
        StaticPin("4321".to_string())
    }

    #[test]
    fn test_success_path() {
        let mut gate = AuthorizationGate::new();
        gate.request(ProtectedAction::ClearCart).unwrap();
        assert!(matches!(gate.state(), GateState::AwaitingAuth(_)));

        let approval = gate.submit("4321", &verifier(), Utc::now()).unwrap();
        assert_eq!(approval.action(), &ProtectedAction::ClearCart);
        assert_eq!(
            gate.state(),
            &GateState::ActionDispatched(ProtectedAction::ClearCart)
        );

        gate.finish();
        assert_eq!(gate.state(), &GateState::Idle);
    }

    #[test]
    fn test_close_after_success_is_noop() {
        let mut gate = AuthorizationGate::new();
        let action = ProtectedAction::ZCut {
            shift_id: "shift-1".into(),
        };
        gate.request(action.clone()).unwrap();
        let _approval = gate.submit("4321", &verifier(), Utc::now()).unwrap();

        // automatic dismissal fires right after the success callback
        assert_eq!(gate.close(), CloseOutcome::Ignored);
        assert_eq!(gate.state(), &GateState::ActionDispatched(action));
    }

    #[test]
    fn test_close_while_awaiting_cancels() {
        let mut gate = AuthorizationGate::new();
        gate.request(ProtectedAction::ClearCart).unwrap();
        assert_eq!(
            gate.close(),
            CloseOutcome::Cancelled(ProtectedAction::ClearCart)
        );
        assert_eq!(gate.state(), &GateState::Idle);
        assert_eq!(gate.close(), CloseOutcome::Ignored);
    }

    #[test]
    fn test_wrong_pin_keeps_prompt_open() {
        let mut gate = AuthorizationGate::new();
        gate.request(ProtectedAction::ClearCart).unwrap();

        let err = gate.submit("0000", &verifier(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
        assert_eq!(gate.failed_attempts(), 1);
        assert!(matches!(gate.state(), GateState::AwaitingAuth(_)));

        gate.submit("0000", &verifier(), Utc::now()).unwrap_err();
        assert_eq!(gate.failed_attempts(), 2);
        assert!(gate.submit("4321", &verifier(), Utc::now()).is_ok());
    }

    #[test]
    fn test_submit_without_request_fails() {
        let mut gate = AuthorizationGate::new();
        let err = gate.submit("4321", &verifier(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidGateState { .. }));
    }

    #[test]
    fn test_second_request_while_pending_rejected() {
        let mut gate = AuthorizationGate::new();
        gate.request(ProtectedAction::ClearCart).unwrap();
        assert!(gate
            .request(ProtectedAction::ReprintTicket {
                sale_id: "s1".into()
            })
            .is_err());
    }

    #[test]
    fn test_approval_must_match_action() {
        let approval = approve(ProtectedAction::DeleteCartLine {
            line_key: "p1::unit".into(),
        });
        assert!(approval
            .ensure_covers(&ProtectedAction::DeleteCartLine {
                line_key: "p1::unit".into()
            })
            .is_ok());
        assert!(approval.ensure_covers(&ProtectedAction::ClearCart).is_err());
    }
}
