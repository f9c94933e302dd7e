//! # Validation Module
//!
//! Input validation for register operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register UI                                                  │
//! │  ├── Basic format checks (empty, numeric input)                        │
//! │  └── Immediate operator feedback                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Terminal controller                                          │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: quantities, amounts, reasons                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledgers (cart, shift, credit, returns)                       │
//! │  └── Business rules that need state (limits, debt, windows)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mostrador_core::money::Money;
//! use mostrador_core::quantity::Quantity;
//! use mostrador_core::validation::{validate_amount, validate_quantity};
//!
//! validate_quantity(Quantity::from_units(5), false).unwrap();
//! assert!(validate_quantity(Quantity::from_thousandths(1500), false).is_err());
//! assert!(validate_amount(Money::zero(), "amount").is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::quantity::Quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest free-text reason accepted on movements and abonos.
pub const MAX_REASON_LENGTH: usize = 200;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Countable products: whole units only
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  Operator enters quantity: 1.5                                         │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(1.5, is_weighable) ← THIS FUNCTION                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"               │
/// │       ├── countable and fractional? → Error: "must be a whole number"  │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"     │
/// │       │                                                                 │
/// │       └── OK → Proceed with add_line                                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: Quantity, weighable: bool) -> ValidationResult<()> {
    if !qty.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if !weighable && !qty.is_whole() {
        return Err(ValidationError::MustBeWhole {
            field: "quantity".to_string(),
        });
    }

    if qty > Quantity::from_units(MAX_ITEM_QUANTITY) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount entered by the operator.
///
/// ## Rules
/// - Must be positive (> 0): cash movements, abonos and refunds
///
/// ## Example
/// ```rust
/// use mostrador_core::money::Money;
/// use mostrador_core::validation::validate_amount;
///
/// assert!(validate_amount(Money::from_cents(1099), "amount").is_ok());
/// assert!(validate_amount(Money::from_cents(-100), "amount").is_err());
/// ```
pub fn validate_amount(amount: Money, field: &str) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (promotional items).
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
///
/// ## Rules
/// - Must be between 0 and 10000 (0% to 100%)
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a free-text reason (cash movement, abono note).
///
/// ## Returns
/// The trimmed reason.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(reason.to_string())
}

/// Validates a supervisor PIN as typed (4 to 8 digits).
pub fn validate_pin(pin: &str) -> ValidationResult<()> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "pin".to_string(),
        });
    }

    if !(4..=8).contains(&pin.len()) || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: "must be 4 to 8 digits".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size before appending a new line.
///
/// ## Rules
/// - Must not exceed MAX_CART_ITEMS (100)
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart lines".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use mostrador_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(Quantity::from_units(1), false).is_ok());
        assert!(validate_quantity(Quantity::from_units(999), false).is_ok());

        assert!(validate_quantity(Quantity::zero(), false).is_err());
        assert!(validate_quantity(Quantity::from_units(-1), false).is_err());
        assert!(validate_quantity(Quantity::from_units(1000), false).is_err());
    }

    #[test]
    fn test_validate_quantity_weighable_allows_decimals() {
        let weighed = Quantity::from_thousandths(1_250);
        assert!(validate_quantity(weighed, true).is_ok());
        assert!(matches!(
            validate_quantity(weighed, false),
            Err(ValidationError::MustBeWhole { .. })
        ));
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::from_cents(1), "amount").is_ok());
        assert!(validate_amount(Money::zero(), "amount").is_err());
        assert!(validate_amount(Money::from_cents(-100), "amount").is_err());
        assert!(validate_price(Money::zero()).is_ok());
        assert!(validate_price(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("  Pago proveedor ").unwrap(), "Pago proveedor");
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_pin() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("").is_err());
        assert!(validate_pin("12a4").is_err());
        assert!(validate_pin("123").is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(99).is_ok());
        assert!(validate_cart_size(100).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }

    #[test]
    fn test_validate_tax_rate_bps() {
        assert!(validate_tax_rate_bps(1600).is_ok());
        assert!(validate_tax_rate_bps(10001).is_err());
    }
}
