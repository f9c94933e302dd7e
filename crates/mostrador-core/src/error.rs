//! # Error Types
//!
//! Domain-specific error types for mostrador-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  mostrador-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  mostrador-db errors (separate crate)                                  │
//! │  └── DbError          - Persistence failures                           │
//! │                                                                         │
//! │  terminal errors (app)                                                 │
//! │  └── TerminalError    - adds PartialFailure, rendered as a Notice      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TerminalError → Notice → Operator │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is raised before any state is mutated: a failed
//! operation leaves the cart, ledger, client and sale untouched.

use thiserror::Error;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Error Kind
// =============================================================================

/// Classification used by the terminal to decide how to notify the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or a rule the operator can fix (quantity, limits, amounts).
    Validation,
    /// Wrong or missing supervisor credential.
    Authorization,
    /// Return attempted outside the return window. Not retryable.
    StaleWindow,
    /// Shift already closed (double Z-cut, reprint after closure).
    AlreadyClosed,
    NotFound,
    /// Operation not valid in the current shift/gate state.
    InvalidState,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The chosen variant has no price configured on the product.
    ///
    /// ## When This Occurs
    /// - Pack sale on a product without `packPrice`/`packQuantity`
    /// - Loose sale on a product without `contentUnitPrice`
    /// - Presentation id not present on the product
    #[error("Product {product_id} cannot be sold as {variant}: {reason}")]
    InvalidVariant {
        product_id: String,
        variant: String,
        reason: String,
    },

    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: Quantity, max: i64 },

    /// Credential check failed or the approval does not match the action.
    #[error("Authorization failed: {reason}")]
    Unauthorized { reason: String },

    /// Credit sale without a client attached.
    #[error("A client is required for credit sales")]
    ClientRequired,

    #[error("Credit limit exceeded by {excess}")]
    CreditLimitExceeded { excess: Money },

    #[error("Payment of {amount} exceeds outstanding debt of {debt}")]
    PaymentExceedsDebt { amount: Money, debt: Money },

    #[error("Client {0} has no outstanding balance")]
    NoOutstandingDebt(String),

    #[error("Insufficient payment: total {total}, tendered {tendered}")]
    InsufficientTender { total: Money, tendered: Money },

    #[error("Return window expired for sale {sale_id}: {age_days} days old, window is {window_days} days")]
    ReturnWindowExpired {
        sale_id: String,
        age_days: i64,
        window_days: i64,
    },

    #[error("Cannot return {requested} of {product_id}: only {available} returnable")]
    ReturnExceedsSold {
        product_id: String,
        requested: Quantity,
        available: Quantity,
    },

    #[error("Product {product_id} not found in sale {sale_id}")]
    ItemNotInSale { sale_id: String, product_id: String },

    #[error("Shift {0} is already closed")]
    ShiftAlreadyClosed(String),

    #[error("Sale {sale_id} belongs to closed shift {shift_id} and cannot be reprinted")]
    ReprintOfClosedShift { sale_id: String, shift_id: String },

    #[error("Shift is {current}, expected {expected}")]
    InvalidShiftState { expected: String, current: String },

    #[error("Cash out of {amount} exceeds drawer contents of {available}")]
    DrawerInsufficient { amount: Money, available: Money },

    #[error("Report belongs to shift {report_shift}, not {shift_id}")]
    ReportMismatch { shift_id: String, report_shift: String },

    #[error("Authorization gate is {current}, cannot {operation}")]
    InvalidGateState { current: String, operation: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Maps the error into the operator-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Unauthorized { .. } => ErrorKind::Authorization,
            CoreError::ReturnWindowExpired { .. } => ErrorKind::StaleWindow,
            CoreError::ShiftAlreadyClosed(_) | CoreError::ReprintOfClosedShift { .. } => {
                ErrorKind::AlreadyClosed
            }
            CoreError::LineNotFound(_) | CoreError::ItemNotInSale { .. } => ErrorKind::NotFound,
            CoreError::InvalidShiftState { .. }
            | CoreError::InvalidGateState { .. }
            | CoreError::ReportMismatch { .. } => ErrorKind::InvalidState,
            _ => ErrorKind::Validation,
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        CoreError::Unauthorized {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Countable products only sell in whole units.
    #[error("{field} must be a whole number")]
    MustBeWhole { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::CreditLimitExceeded {
            excess: Money::from_major(50),
        };
        assert_eq!(err.to_string(), "Credit limit exceeded by $50.00");

        let err = ValidationError::Required {
            field: "reason".to_string(),
        };
        assert_eq!(err.to_string(), "reason is required");
    }

    #[test]
    fn test_error_kinds() {
        let stale = CoreError::ReturnWindowExpired {
            sale_id: "s1".into(),
            age_days: 9,
            window_days: 8,
        };
        assert_eq!(stale.kind(), ErrorKind::StaleWindow);
        assert_eq!(
            CoreError::ShiftAlreadyClosed("z1".into()).kind(),
            ErrorKind::AlreadyClosed
        );
        assert_eq!(CoreError::unauthorized("bad pin").kind(), ErrorKind::Authorization);
        assert_eq!(CoreError::ClientRequired.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::MustBePositive {
            field: "amount".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
