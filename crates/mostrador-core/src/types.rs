//! # Domain Types
//!
//! Records shared by the cart, the ledgers and the persistence service.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │     Client      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price          │   │  items          │   │  creditLimit    │       │
//! │  │  wholesale*     │   │  paymentMethod  │   │  currentBalance │       │
//! │  │  pack*          │   │  remaining      │   └─────────────────┘       │
//! │  │  presentations  │   │  paymentHistory │                             │
//! │  │  contentPerUnit │   └─────────────────┘                             │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌───────────────────┐                            │
//! │  │  CashMovement   │   │ InventoryMovement │  (kardex, insert-only)     │
//! │  │  IN / OUT       │   │ signed delta      │                            │
//! │  └─────────────────┘   └───────────────────┘                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persisted field names are camelCase; stored tickets and reports written
//! by earlier register versions use the same names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so the 16% IVA rate is 1600 bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// The fixed 16% rate applied at the register.
    pub const STANDARD: TaxRate = TaxRate(1600);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::STANDARD
    }
}

// =============================================================================
// Product
// =============================================================================

/// An alternate sellable bundle of a product (e.g. a 10-pack).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Presentation {
    pub id: String,
    pub name: String,
    /// Base units contained in one presentation.
    pub quantity: i64,
    pub price: Money,
    pub barcode: Option<String>,
}

/// Wholesale tier of a product: `price` applies once the product's group
/// reaches `min` units in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WholesaleRule {
    #[ts(type = "number")]
    pub min: Quantity,
    pub price: Money,
}

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: Option<String>,
    pub short_code: Option<String>,
    #[serde(default)]
    pub barcodes: Vec<String>,

    /// Base unit price.
    pub price: Money,
    pub cost_price: Money,

    #[ts(type = "number")]
    pub stock: Quantity,
    #[ts(type = "number")]
    pub min_stock: Quantity,

    /// Sold by weight/measure: decimal quantities allowed.
    #[serde(default)]
    pub is_weighable: bool,

    pub wholesale_price: Option<Money>,
    #[ts(type = "number | null")]
    pub wholesale_min: Option<Quantity>,
    /// Products sharing a group id pool their quantities for wholesale tiers.
    pub group_id: Option<String>,

    /// Legacy closed-box pricing.
    pub pack_price: Option<Money>,
    pub pack_quantity: Option<i64>,
    pub pack_barcode: Option<String>,

    #[serde(default)]
    pub presentations: Vec<Presentation>,

    /// Pieces inside one base unit, enabling loose-piece sales.
    pub content_per_unit: Option<i64>,
    pub content_unit_price: Option<Money>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Product {
    /// A countable product with only a base price; other fields empty.
    pub fn basic(id: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Product {
            id: id.into(),
            name: name.into(),
            sku: None,
            short_code: None,
            barcodes: Vec::new(),
            price,
            cost_price: Money::zero(),
            stock: Quantity::zero(),
            min_stock: Quantity::zero(),
            is_weighable: false,
            wholesale_price: None,
            wholesale_min: None,
            group_id: None,
            pack_price: None,
            pack_quantity: None,
            pack_barcode: None,
            presentations: Vec::new(),
            content_per_unit: None,
            content_unit_price: None,
            is_active: true,
        }
    }

    /// Returns the wholesale tier when both fields are present.
    pub fn wholesale_rule(&self) -> Option<WholesaleRule> {
        match (self.wholesale_min, self.wholesale_price) {
            (Some(min), Some(price)) if min.is_positive() => Some(WholesaleRule { min, price }),
            _ => None,
        }
    }

    pub fn presentation(&self, presentation_id: &str) -> Option<&Presentation> {
        self.presentations.iter().find(|p| p.id == presentation_id)
    }

    /// True when stock is at or under the minimum threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// True if `code` is one of the product's base-unit identifiers.
    pub fn has_unit_code(&self, code: &str) -> bool {
        self.sku.as_deref() == Some(code)
            || self.short_code.as_deref() == Some(code)
            || self.barcodes.iter().any(|b| b == code)
    }
}

// =============================================================================
// Client
// =============================================================================

/// A customer with a credit account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub credit_limit: Money,
    /// Sum of unpaid balances across the client's credit tickets.
    pub current_balance: Money,
}

impl Client {
    /// Credit still available under the limit (never negative).
    pub fn available_credit(&self) -> Money {
        (self.credit_limit - self.current_balance).non_negative()
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Charged to the client's account.
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Credit => "credit",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Conversion from sold quantity to base stock units: `qty × units ÷ per`.
///
/// A 12-pack is `12/1`; one loose piece of a 12-piece box is `1/12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockFactor {
    pub units: i64,
    pub per: i64,
}

impl StockFactor {
    pub const ONE: StockFactor = StockFactor { units: 1, per: 1 };

    pub fn stock_units(&self, quantity: Quantity) -> Quantity {
        quantity.scale(self.units).divide(self.per.max(1))
    }
}

impl Default for StockFactor {
    fn default() -> Self {
        StockFactor::ONE
    }
}

/// A line of a sale ticket, frozen at the time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    /// `unit`, `legacy_pack`, `loose_unit` or a presentation id.
    pub variant_key: String,
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    /// Effective unit price charged (wholesale tier already applied).
    pub price: Money,
    #[serde(default)]
    #[ts(type = "number")]
    pub returned_quantity: Quantity,
    #[serde(default)]
    pub stock_factor: StockFactor,
}

impl SaleItem {
    pub fn line_total(&self) -> Money {
        self.price.times(self.quantity)
    }

    /// Quantity that may still be returned.
    pub fn returnable(&self) -> Quantity {
        self.quantity - self.returned_quantity
    }
}

/// An abono (or the initial payment) recorded against a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentEntry {
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub amount: Money,
    pub reason: Option<String>,
}

/// A completed sale ticket.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub shift_id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub tax: Money,
    #[serde(default)]
    pub savings: Money,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub amount_tendered: Money,
    pub change: Money,
    pub customer_name: Option<String>,
    pub client_id: Option<String>,
    /// Unpaid amount for credit sales; zero otherwise.
    #[serde(default)]
    pub remaining_balance: Money,
    #[serde(default)]
    pub payment_history: Vec<PaymentEntry>,
    /// Z-cut that closed this sale's shift.
    pub closure_id: Option<String>,
}

impl Sale {
    pub fn is_credit(&self) -> bool {
        self.payment_method == PaymentMethod::Credit
    }

    /// Credit ticket with an unpaid balance.
    pub fn is_open_credit(&self) -> bool {
        self.is_credit() && self.remaining_balance.is_positive()
    }

    /// Finds the line for a product, optionally narrowed to a variant.
    pub fn item_index(&self, product_id: &str, variant_key: Option<&str>) -> Option<usize> {
        self.items.iter().position(|item| {
            item.product_id == product_id
                && variant_key.map_or(true, |key| item.variant_key == key)
        })
    }
}

// =============================================================================
// Movements
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum CashMovementKind {
    In,
    Out,
}

/// Money put into or taken out of the drawer outside of a sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub shift_id: String,
    #[serde(rename = "type")]
    pub kind: CashMovementKind,
    pub amount: Money,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashMovement {
    /// Signed effect on the drawer.
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            CashMovementKind::In => self.amount,
            CashMovementKind::Out => -self.amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InventoryReason {
    Sale,
    Return,
    Adjustment,
}

/// Kardex entry: insert-only history of stock changes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InventoryMovement {
    pub id: String,
    pub product_id: String,
    /// Signed change in base stock units.
    #[ts(type = "number")]
    pub delta: Quantity,
    pub reason: InventoryReason,
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
