//! # Cart State
//!
//! Holds the cart being rung up.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  Operator Action          Terminal op             Cart State Change     │
//! │  ───────────────          ───────────             ─────────────────     │
//! │                                                                         │
//! │  Scan code ──────────────► scan() ──────────────► add_line / merge     │
//! │                                                                         │
//! │  Change Quantity ────────► set_quantity() ──────► qty = n (0 → prompt) │
//! │                                                                         │
//! │  Remove (PIN) ───────────► remove_line() ───────► lines.remove(i)      │
//! │                                                                         │
//! │  Clear (PIN) ────────────► clear_cart() ────────► lines.clear()        │
//! │                                                                         │
//! │  Checkout committed ─────► checkout() ──────────► finish_sale()        │
//! │                                                                         │
//! │  NOTE: All operations take the lock briefly and never await inside.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::{Arc, Mutex};

use mostrador_core::pricing::{Cart, CartTotals};
use mostrador_core::TaxRate;

/// Shared cart.
///
/// Cart mutations validate before writing, so a poisoned lock still guards
/// a consistent cart and is recovered.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
}

impl CartState {
    pub fn new() -> Self {
        CartState {
            cart: Arc::new(Mutex::new(Cart::new())),
        }
    }

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let lines = cart_state.with_cart(|cart| cart.line_count());
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&cart)
    }

    /// Executes a function with write access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// cart_state.with_cart_mut(|cart| cart.add_line(&product, qty, LineVariant::Unit))?;
    /// ```
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.cart.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut cart)
    }

    pub fn totals(&self, tax_rate: TaxRate) -> CartTotals {
        self.with_cart(|cart| cart.compute_totals(tax_rate))
    }

    /// Copy of the cart for pricing outside the lock.
    pub fn snapshot(&self) -> Cart {
        self.with_cart(Cart::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::pricing::LineVariant;
    use mostrador_core::{Money, Product, Quantity};

    #[test]
    fn test_cart_state_shared_between_clones() {
        let state = CartState::new();
        let other = state.clone();
        let product = Product::basic("p1", "Tornillo", Money::from_major(10));

        state
            .with_cart_mut(|cart| cart.add_line(&product, Quantity::from_units(2), LineVariant::Unit))
            .unwrap();

        assert_eq!(other.with_cart(|cart| cart.line_count()), 1);
        assert_eq!(other.totals(TaxRate::zero()).subtotal, Money::from_major(20));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let state = CartState::new();
        let product = Product::basic("p1", "Tornillo", Money::from_major(10));
        state
            .with_cart_mut(|cart| cart.add_line(&product, Quantity::from_units(1), LineVariant::Unit))
            .unwrap();

        let snapshot = state.snapshot();
        state.with_cart_mut(|cart| cart.finish_sale());

        assert_eq!(snapshot.line_count(), 1);
        assert!(state.with_cart(|cart| cart.is_empty()));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let state = CartState::new();
        let clone = state.clone();
        let _ = std::thread::spawn(move || {
            clone.with_cart_mut(|_| panic!("operator UI crashed"));
        })
        .join();

        assert!(state.with_cart(|cart| cart.is_empty()));
    }
}
