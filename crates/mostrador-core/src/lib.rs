//! # mostrador-core: Pure Business Logic for Mostrador POS
//!
//! This crate holds every register rule as pure code with zero I/O: cart
//! pricing, supervisor authorization, shift cuts, credit accounts and
//! returns.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Mostrador POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 mostrador-terminal (controller)                 │   │
//! │  │   cart state ─ shift session actor ─ checkout ─ print sink      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ mostrador-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌───────┐ │   │
//! │  │  │ pricing  │ │   auth   │ │  shift   │ │  credit  │ │returns│ │   │
//! │  │  │ Cart     │ │ Gate     │ │ Ledger   │ │ FIFO     │ │window │ │   │
//! │  │  │ tiers    │ │ Approval │ │ X / Z    │ │ abonos   │ │refund │ │   │
//! │  │  └──────────┘ └──────────┘ └──────────┘ └──────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   money • quantity • types • validation • error                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 mostrador-db (persistence service)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, Client, movements)
//! - [`money`] / [`quantity`] - Integer cents and fixed-point quantities
//! - [`pricing`] - Cart lines, variants, wholesale tiers, totals
//! - [`auth`] - Authorization gate and approvals
//! - [`shift`] - Shift ledger, X/Z reports, cash counts
//! - [`credit`] - Credit limits and abono allocation
//! - [`returns`] - Return validation and refunds
//! - [`validation`] / [`error`] - Input checks and error types
//!
//! ## Example Usage
//!
//! ```rust
//! use mostrador_core::pricing::{Cart, LineVariant};
//! use mostrador_core::{Money, Product, Quantity, TaxRate};
//!
//! let mut product = Product::basic("p1", "Tornillo", Money::from_major(10));
//! product.wholesale_min = Some(Quantity::from_units(5));
//! product.wholesale_price = Some(Money::from_major(8));
//!
//! let mut cart = Cart::new();
//! cart.add_line(&product, Quantity::from_units(5), LineVariant::Unit).unwrap();
//!
//! let totals = cart.compute_totals(TaxRate::STANDARD);
//! assert_eq!(totals.subtotal, Money::from_major(40));
//! assert_eq!(totals.savings, Money::from_major(10));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod credit;
pub mod error;
pub mod money;
pub mod pricing;
pub mod quantity;
pub mod returns;
pub mod shift;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use auth::{Approval, AuthorizationGate, CredentialVerifier, ProtectedAction};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Catches typos at the register (1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Days after a sale during which returns are accepted (inclusive).
pub const RETURN_WINDOW_DAYS: i64 = 8;

/// Overpayment tolerated on an abono before it is rejected.
pub const PAYMENT_TOLERANCE: Money = Money::from_cents(50);
