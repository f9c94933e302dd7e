//! # Pricing Engine
//!
//! The register cart: variant resolution, line merging and wholesale tiers.
//!
//! ## Variant Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_line(product, qty, variant)                                        │
//! │                                                                         │
//! │  LineVariant          variant key       price              name         │
//! │  ─────────────────    ──────────────    ────────────────   ──────────── │
//! │  Unit                 "unit"            price              Tornillo     │
//! │  Presentation(p)      p.id              p.price            Tornillo (…) │
//! │  LegacyPack           "legacy_pack"     packPrice          CAJA: …      │
//! │  Loose                "loose_unit"      contentUnitPrice   … (Suelto)   │
//! │                                                                         │
//! │  Lines merge only on equal (product id, variant key): a box and loose   │
//! │  units of the same product are always separate lines.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wholesale Tiers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Unit lines are pooled by groupId (product id when ungrouped).          │
//! │                                                                         │
//! │   group "tornillos"  ──►  A: 3 units  +  B: 2 units  =  5               │
//! │                                                                         │
//! │   each Unit line checks ITS OWN wholesaleMin against the group count:   │
//! │     5 >= A.min (5)  →  A priced at A.wholesalePrice                     │
//! │     5 <  B.min (6)  →  B keeps base price, promo "1 more unlocks $X"    │
//! │                                                                         │
//! │  Pack, presentation and loose lines never count toward a group.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `compute_totals` is a pure read: calling it twice on the same cart yields
//! identical totals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::auth::{Approval, ProtectedAction};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{Product, SaleItem, StockFactor, TaxRate, WholesaleRule};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::MAX_ITEM_QUANTITY;

// =============================================================================
// Variants
// =============================================================================

pub const UNIT_KEY: &str = "unit";
pub const LEGACY_PACK_KEY: &str = "legacy_pack";
pub const LOOSE_KEY: &str = "loose_unit";

/// The variant an operator asks for when adding a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "presentationId", rename_all = "snake_case")]
#[ts(export)]
pub enum LineVariant {
    Unit,
    LegacyPack,
    Presentation(String),
    Loose,
}

/// A resolved cart line variant carrying only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum LineKind {
    /// Base unit: the only kind that takes part in wholesale tiers.
    Unit {
        #[serde(rename = "groupKey")]
        group_key: String,
        wholesale: Option<WholesaleRule>,
    },
    LegacyPack {
        #[serde(rename = "packQuantity")]
        pack_quantity: i64,
    },
    Presentation {
        #[serde(rename = "presentationId")]
        presentation_id: String,
        content: i64,
    },
    Loose {
        #[serde(rename = "contentPerUnit")]
        content_per_unit: i64,
    },
}

impl LineKind {
    pub fn variant_key(&self) -> &str {
        match self {
            LineKind::Unit { .. } => UNIT_KEY,
            LineKind::LegacyPack { .. } => LEGACY_PACK_KEY,
            LineKind::Presentation {
                presentation_id, ..
            } => presentation_id,
            LineKind::Loose { .. } => LOOSE_KEY,
        }
    }

    /// Conversion from line quantity to base stock units.
    pub fn stock_factor(&self) -> StockFactor {
        match self {
            LineKind::Unit { .. } => StockFactor::ONE,
            LineKind::LegacyPack { pack_quantity } => StockFactor {
                units: *pack_quantity,
                per: 1,
            },
            LineKind::Presentation { content, .. } => StockFactor {
                units: *content,
                per: 1,
            },
            LineKind::Loose { content_per_unit } => StockFactor {
                units: 1,
                per: *content_per_unit,
            },
        }
    }
}

/// Builds the key identifying a cart line.
///
/// Presentation ids are free text, so they are tagged to stay apart from
/// the built-in variant keys.
pub fn line_key(product_id: &str, kind: &LineKind) -> String {
    match kind {
        LineKind::Presentation {
            presentation_id, ..
        } => format!("{product_id}::presentation:{presentation_id}"),
        other => format!("{product_id}::{}", other.variant_key()),
    }
}

fn invalid_variant(product: &Product, variant: &str, reason: &str) -> CoreError {
    CoreError::InvalidVariant {
        product_id: product.id.clone(),
        variant: variant.to_string(),
        reason: reason.to_string(),
    }
}

/// Resolves price, display name and kind for a requested variant.
fn resolve_variant(
    product: &Product,
    variant: &LineVariant,
) -> CoreResult<(Money, String, LineKind)> {
    match variant {
        LineVariant::Unit => Ok((
            product.price,
            product.name.clone(),
            LineKind::Unit {
                group_key: product
                    .group_id
                    .clone()
                    .unwrap_or_else(|| product.id.clone()),
                wholesale: product.wholesale_rule(),
            },
        )),
        LineVariant::Presentation(id) => {
            let presentation = product
                .presentation(id)
                .ok_or_else(|| invalid_variant(product, id, "unknown presentation"))?;
            if presentation.quantity <= 0 {
                return Err(invalid_variant(product, id, "presentation has no content"));
            }
            Ok((
                presentation.price,
                format!("{} ({})", product.name, presentation.name),
                LineKind::Presentation {
                    presentation_id: presentation.id.clone(),
                    content: presentation.quantity,
                },
            ))
        }
        LineVariant::LegacyPack => match (product.pack_price, product.pack_quantity) {
            (Some(price), Some(qty)) if qty > 0 => Ok((
                price,
                format!("CAJA: {}", product.name),
                LineKind::LegacyPack { pack_quantity: qty },
            )),
            _ => Err(invalid_variant(product, LEGACY_PACK_KEY, "no pack price")),
        },
        LineVariant::Loose => match (product.content_unit_price, product.content_per_unit) {
            (Some(price), Some(content)) if content > 0 => Ok((
                price,
                format!("{} (Suelto)", product.name),
                LineKind::Loose {
                    content_per_unit: content,
                },
            )),
            _ => Err(invalid_variant(product, LOOSE_KEY, "no loose piece price")),
        },
    }
}

/// Maps a scanned or typed code to the variant it identifies.
///
/// Pack and presentation barcodes are checked first since they are more
/// specific than the product's own codes.
pub fn resolve_code(product: &Product, code: &str) -> Option<LineVariant> {
    let code = code.trim();
    if code.is_empty() {
        return None;
    }
    if product.pack_barcode.as_deref() == Some(code) {
        return Some(LineVariant::LegacyPack);
    }
    if let Some(presentation) = product
        .presentations
        .iter()
        .find(|p| p.barcode.as_deref() == Some(code))
    {
        return Some(LineVariant::Presentation(presentation.id.clone()));
    }
    if product.id == code || product.has_unit_code(code) {
        return Some(LineVariant::Unit);
    }
    None
}

// =============================================================================
// Cart Line
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub key: String,
    pub product_id: String,
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    /// Price resolved for the variant, before wholesale tiers.
    pub unit_price: Money,
    pub is_weighable: bool,
    pub kind: LineKind,
}

impl CartLine {
    /// Inventory impact of this line in base units.
    pub fn stock_units(&self) -> Quantity {
        self.kind.stock_factor().stock_units(self.quantity)
    }

    fn allows_decimals(&self) -> bool {
        self.is_weighable && matches!(self.kind, LineKind::Unit { .. })
    }
}

/// Outcome of a quantity edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityChange {
    Updated,
    /// Zero was entered: the line stays until an authorized removal.
    RemovalRequested { line_key: String },
}

// =============================================================================
// Totals
// =============================================================================

/// A cart line priced against the current cart contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PricedLine {
    pub key: String,
    pub product_id: String,
    pub variant_key: String,
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub unit_price: Money,
    pub effective_price: Money,
    pub line_total: Money,
    pub wholesale_applied: bool,
    pub stock_factor: StockFactor,
}

impl PricedLine {
    /// Freezes the priced line into a ticket item.
    pub fn to_sale_item(&self) -> SaleItem {
        SaleItem {
            product_id: self.product_id.clone(),
            variant_key: self.variant_key.clone(),
            name: self.name.clone(),
            quantity: self.quantity,
            price: self.effective_price,
            returned_quantity: Quantity::zero(),
            stock_factor: self.stock_factor,
        }
    }
}

/// "N more items unlock price $X" prompt for a group under its tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PromoOpportunity {
    pub group_id: String,
    #[ts(type = "number")]
    pub missing: Quantity,
    pub new_price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub lines: Vec<PricedLine>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
    pub savings: Money,
    pub promos: Vec<PromoOpportunity>,
}

impl CartTotals {
    pub fn sale_items(&self) -> Vec<SaleItem> {
        self.lines.iter().map(PricedLine::to_sale_item).collect()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The register cart.
///
/// ## Invariants
/// - Lines are unique by `(product id, variant key)`
/// - Quantity is positive; countable lines hold whole units
/// - At most `MAX_CART_ITEMS` lines, each at most `MAX_ITEM_QUANTITY`
/// - Removing a line or clearing the cart needs an [`Approval`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { lines: Vec::new() }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, key: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Adds `quantity` of `product` as `variant`, merging with an existing
    /// line of the same variant. Returns the line key.
    pub fn add_line(
        &mut self,
        product: &Product,
        quantity: Quantity,
        variant: LineVariant,
    ) -> CoreResult<String> {
        let (unit_price, name, kind) = resolve_variant(product, &variant)?;
        let key = line_key(&product.id, &kind);
        let weighable = product.is_weighable && matches!(kind, LineKind::Unit { .. });
        validate_quantity(quantity, weighable)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.key == key) {
            let merged = line.quantity + quantity;
            if merged > Quantity::from_units(MAX_ITEM_QUANTITY) {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = merged;
            return Ok(key);
        }

        validate_cart_size(self.lines.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_ITEMS,
        })?;

        self.lines.push(CartLine {
            key: key.clone(),
            product_id: product.id.clone(),
            name,
            quantity,
            unit_price,
            is_weighable: product.is_weighable,
            kind,
        });
        Ok(key)
    }

    /// Sets a line's quantity. Zero requests removal instead of removing.
    pub fn set_quantity(&mut self, key: &str, quantity: Quantity) -> CoreResult<QuantityChange> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.key == key)
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;

        if quantity.is_zero() {
            return Ok(QuantityChange::RemovalRequested {
                line_key: key.to_string(),
            });
        }

        validate_quantity(quantity, line.allows_decimals())?;
        line.quantity = quantity;
        Ok(QuantityChange::Updated)
    }

    /// Removes a line; the approval must name this line.
    pub fn remove_line(&mut self, key: &str, approval: Approval) -> CoreResult<CartLine> {
        approval.ensure_covers(&ProtectedAction::DeleteCartLine {
            line_key: key.to_string(),
        })?;
        let index = self
            .lines
            .iter()
            .position(|l| l.key == key)
            .ok_or_else(|| CoreError::LineNotFound(key.to_string()))?;
        Ok(self.lines.remove(index))
    }

    /// Empties the cart on operator request.
    pub fn clear(&mut self, approval: Approval) -> CoreResult<()> {
        approval.ensure_covers(&ProtectedAction::ClearCart)?;
        self.lines.clear();
        Ok(())
    }

    /// Empties the cart after its sale has been recorded.
    pub fn finish_sale(&mut self) {
        self.lines.clear();
    }

    /// Prices the cart: wholesale tiers, subtotal, tax, savings and promos.
    pub fn compute_totals(&self, tax_rate: TaxRate) -> CartTotals {
        // group counts in first-appearance order
        let mut group_order: Vec<&str> = Vec::new();
        let mut group_counts: HashMap<&str, Quantity> = HashMap::new();
        for line in &self.lines {
            if let LineKind::Unit { group_key, .. } = &line.kind {
                let count = group_counts.entry(group_key.as_str()).or_insert_with(|| {
                    group_order.push(group_key.as_str());
                    Quantity::zero()
                });
                *count += line.quantity;
            }
        }

        let mut savings = Money::zero();
        let mut priced = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let mut effective = line.unit_price;
            let mut wholesale_applied = false;
            if let LineKind::Unit {
                group_key,
                wholesale: Some(rule),
            } = &line.kind
            {
                let count = group_counts.get(group_key.as_str()).copied().unwrap_or_default();
                if count >= rule.min {
                    effective = rule.price;
                    wholesale_applied = true;
                    savings += (line.unit_price - rule.price).times(line.quantity);
                }
            }
            priced.push(PricedLine {
                key: line.key.clone(),
                product_id: line.product_id.clone(),
                variant_key: line.kind.variant_key().to_string(),
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                effective_price: effective,
                line_total: effective.times(line.quantity),
                wholesale_applied,
                stock_factor: line.kind.stock_factor(),
            });
        }

        let promos = group_order
            .iter()
            .filter_map(|group| {
                let count = group_counts.get(group).copied().unwrap_or_default();
                self.lines
                    .iter()
                    .filter_map(|line| match &line.kind {
                        LineKind::Unit {
                            group_key,
                            wholesale: Some(rule),
                        } if group_key == group && count < rule.min => Some(rule),
                        _ => None,
                    })
                    .min_by_key(|rule| rule.min - count)
                    .map(|rule| PromoOpportunity {
                        group_id: group.to_string(),
                        missing: rule.min - count,
                        new_price: rule.price,
                    })
            })
            .collect();

        let subtotal: Money = priced.iter().map(|l| l.line_total).sum();
        let tax = subtotal.calculate_tax(tax_rate);
        CartTotals {
            lines: priced,
            subtotal,
            tax,
            total: subtotal + tax,
            savings,
            promos,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::approve;
    use crate::types::Presentation;

    fn tornillo() -> Product {
        let mut product = Product::basic("p-tornillo", "Tornillo 1/4", Money::from_major(10));
        product.wholesale_min = Some(Quantity::from_units(5));
        product.wholesale_price = Some(Money::from_major(8));
        product.presentations = vec![Presentation {
            id: "pres-10".into(),
            name: "Bolsa 10".into(),
            quantity: 10,
            price: Money::from_major(90),
            barcode: Some("750100".into()),
        }];
        product.pack_price = Some(Money::from_major(400));
        product.pack_quantity = Some(50);
        product.pack_barcode = Some("750150".into());
        product.content_per_unit = None;
        product
    }

    fn units(n: i64) -> Quantity {
        Quantity::from_units(n)
    }

    #[test]
    fn test_wholesale_tier_unlocks_at_min() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(4), LineVariant::Unit).unwrap();

        let totals = cart.compute_totals(TaxRate::STANDARD);
        assert_eq!(totals.subtotal, Money::from_major(40));
        assert_eq!(totals.savings, Money::zero());
        assert_eq!(
            totals.promos,
            vec![PromoOpportunity {
                group_id: "p-tornillo".into(),
                missing: units(1),
                new_price: Money::from_major(8),
            }]
        );

        cart.add_line(&product, units(1), LineVariant::Unit).unwrap();
        let totals = cart.compute_totals(TaxRate::STANDARD);
        assert_eq!(totals.subtotal, Money::from_major(40));
        assert_eq!(totals.savings, Money::from_major(10));
        assert!(totals.lines[0].wholesale_applied);
        assert!(totals.promos.is_empty());
        assert_eq!(totals.tax, Money::from_cents(640));
        assert_eq!(totals.total, Money::from_cents(4640));
    }

    #[test]
    fn test_wholesale_pools_group_across_products() {
        let mut a = tornillo();
        a.group_id = Some("tornillos".into());
        let mut b = Product::basic("p-b", "Tornillo 3/8", Money::from_major(12));
        b.group_id = Some("tornillos".into());
        b.wholesale_min = Some(units(6));
        b.wholesale_price = Some(Money::from_major(9));

        let mut cart = Cart::new();
        cart.add_line(&a, units(3), LineVariant::Unit).unwrap();
        cart.add_line(&b, units(2), LineVariant::Unit).unwrap();

        let totals = cart.compute_totals(TaxRate::STANDARD);
        // group count 5: A's own min (5) is met, B's (6) is not
        assert!(totals.lines[0].wholesale_applied);
        assert!(!totals.lines[1].wholesale_applied);
        assert_eq!(totals.subtotal, Money::from_major(3 * 8 + 2 * 12));
        assert_eq!(totals.savings, Money::from_major(6));
        assert_eq!(totals.promos.len(), 1);
        assert_eq!(totals.promos[0].missing, units(1));
        assert_eq!(totals.promos[0].new_price, Money::from_major(9));
    }

    #[test]
    fn test_pack_lines_do_not_count_toward_group() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(4), LineVariant::Unit).unwrap();
        cart.add_line(&product, units(1), LineVariant::LegacyPack).unwrap();
        cart.add_line(&product, units(1), LineVariant::Presentation("pres-10".into()))
            .unwrap();

        let totals = cart.compute_totals(TaxRate::STANDARD);
        assert!(!totals.lines[0].wholesale_applied);
        assert_eq!(totals.subtotal, Money::from_major(40 + 400 + 90));
    }

    #[test]
    fn test_variant_isolation() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(2), LineVariant::Unit).unwrap();
        cart.add_line(&product, units(1), LineVariant::Presentation("pres-10".into()))
            .unwrap();

        assert_eq!(cart.line_count(), 2);
        let presentation = cart.line("p-tornillo::presentation:pres-10").unwrap();
        assert_eq!(presentation.name, "Tornillo 1/4 (Bolsa 10)");
        assert_eq!(presentation.unit_price, Money::from_major(90));
        assert_eq!(presentation.stock_units(), units(10));
        assert_eq!(cart.line("p-tornillo::unit").unwrap().quantity, units(2));
    }

    #[test]
    fn test_presentation_named_like_builtin_variant_stays_separate() {
        let mut product = tornillo();
        product.wholesale_min = None;
        product.wholesale_price = None;
        product.presentations[0].id = UNIT_KEY.into();

        let mut cart = Cart::new();
        let unit_key = cart.add_line(&product, units(2), LineVariant::Unit).unwrap();
        let bag_key = cart
            .add_line(&product, units(1), LineVariant::Presentation(UNIT_KEY.into()))
            .unwrap();

        assert_ne!(unit_key, bag_key);
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.line(&unit_key).unwrap().quantity, units(2));
        let bag = cart.line(&bag_key).unwrap();
        assert_eq!(bag.quantity, units(1));
        assert_eq!(bag.unit_price, Money::from_major(90));

        let totals = cart.compute_totals(TaxRate::STANDARD);
        assert_eq!(totals.subtotal, Money::from_major(2 * 10 + 90));
    }

    #[test]
    fn test_same_variant_merges() {
        let product = tornillo();
        let mut cart = Cart::new();
        let first = cart.add_line(&product, units(1), LineVariant::LegacyPack).unwrap();
        let second = cart.add_line(&product, units(2), LineVariant::LegacyPack).unwrap();
        assert_eq!(first, second);
        assert_eq!(cart.line_count(), 1);

        let line = &cart.lines()[0];
        assert_eq!(line.name, "CAJA: Tornillo 1/4");
        assert_eq!(line.quantity, units(3));
        assert_eq!(line.stock_units(), units(150));
    }

    #[test]
    fn test_missing_variant_price_is_explicit_error() {
        let product = tornillo();
        let mut cart = Cart::new();
        let err = cart.add_line(&product, units(1), LineVariant::Loose).unwrap_err();
        assert!(matches!(err, CoreError::InvalidVariant { .. }));

        let err = cart
            .add_line(&product, units(1), LineVariant::Presentation("nope".into()))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidVariant { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_loose_piece_line() {
        let mut product = Product::basic("p-lija", "Lija", Money::from_major(120));
        product.content_per_unit = Some(12);
        product.content_unit_price = Some(Money::from_major(12));

        let mut cart = Cart::new();
        cart.add_line(&product, units(6), LineVariant::Loose).unwrap();
        let line = &cart.lines()[0];
        assert_eq!(line.name, "Lija (Suelto)");
        assert_eq!(line.stock_units(), Quantity::from_thousandths(500));
        assert_eq!(
            cart.compute_totals(TaxRate::STANDARD).subtotal,
            Money::from_major(72)
        );
    }

    #[test]
    fn test_weighable_quantities() {
        let mut cable = Product::basic("p-cable", "Cable calibre 12", Money::from_cents(1999));
        cable.is_weighable = true;
        let clavo = Product::basic("p-clavo", "Clavo", Money::from_major(1));

        let mut cart = Cart::new();
        cart.add_line(&cable, Quantity::from_thousandths(333), LineVariant::Unit)
            .unwrap();
        assert!(cart
            .add_line(&clavo, Quantity::from_thousandths(1500), LineVariant::Unit)
            .is_err());
        assert_eq!(
            cart.compute_totals(TaxRate::zero()).subtotal,
            Money::from_cents(666)
        );
    }

    #[test]
    fn test_quantity_limits() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(999), LineVariant::Unit).unwrap();
        let err = cart.add_line(&product, units(1), LineVariant::Unit).unwrap_err();
        assert!(matches!(err, CoreError::QuantityTooLarge { .. }));
        assert_eq!(cart.lines()[0].quantity, units(999));
    }

    #[test]
    fn test_cart_line_limit() {
        let mut cart = Cart::new();
        for i in 0..crate::MAX_CART_ITEMS {
            let product = Product::basic(format!("p{i}"), "Item", Money::from_major(1));
            cart.add_line(&product, units(1), LineVariant::Unit).unwrap();
        }
        let extra = Product::basic("extra", "Item", Money::from_major(1));
        let err = cart.add_line(&extra, units(1), LineVariant::Unit).unwrap_err();
        assert!(matches!(err, CoreError::CartTooLarge { .. }));
    }

    #[test]
    fn test_set_quantity_zero_requests_removal() {
        let product = tornillo();
        let mut cart = Cart::new();
        let key = cart.add_line(&product, units(2), LineVariant::Unit).unwrap();

        assert_eq!(cart.set_quantity(&key, units(7)).unwrap(), QuantityChange::Updated);
        assert_eq!(cart.line(&key).unwrap().quantity, units(7));

        let change = cart.set_quantity(&key, Quantity::zero()).unwrap();
        assert_eq!(
            change,
            QuantityChange::RemovalRequested {
                line_key: key.clone()
            }
        );
        assert_eq!(cart.line_count(), 1);
        assert!(cart.set_quantity("missing", units(1)).is_err());
    }

    #[test]
    fn test_remove_line_requires_matching_approval() {
        let product = tornillo();
        let mut cart = Cart::new();
        let key = cart.add_line(&product, units(2), LineVariant::Unit).unwrap();

        let wrong = approve(ProtectedAction::ClearCart);
        assert!(cart.remove_line(&key, wrong).is_err());
        assert_eq!(cart.line_count(), 1);

        let approval = approve(ProtectedAction::DeleteCartLine {
            line_key: key.clone(),
        });
        let removed = cart.remove_line(&key, approval).unwrap();
        assert_eq!(removed.product_id, "p-tornillo");
        assert!(cart.is_empty());
    }

    #[test]
    fn test_clear_requires_approval() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(2), LineVariant::Unit).unwrap();

        let wrong = approve(ProtectedAction::ReprintTicket {
            sale_id: "s1".into(),
        });
        assert!(cart.clear(wrong).is_err());
        assert!(!cart.is_empty());

        cart.clear(approve(ProtectedAction::ClearCart)).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_compute_totals_is_pure() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(6), LineVariant::Unit).unwrap();
        cart.add_line(&product, units(1), LineVariant::LegacyPack).unwrap();

        let first = cart.compute_totals(TaxRate::STANDARD);
        let second = cart.compute_totals(TaxRate::STANDARD);
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_code() {
        let mut product = tornillo();
        product.sku = Some("TOR-14".into());
        product.barcodes = vec!["750001".into()];

        assert_eq!(resolve_code(&product, "TOR-14"), Some(LineVariant::Unit));
        assert_eq!(resolve_code(&product, "750001"), Some(LineVariant::Unit));
        assert_eq!(resolve_code(&product, "750150"), Some(LineVariant::LegacyPack));
        assert_eq!(
            resolve_code(&product, "750100"),
            Some(LineVariant::Presentation("pres-10".into()))
        );
        assert_eq!(resolve_code(&product, "999"), None);
    }

    #[test]
    fn test_sale_items_carry_effective_price() {
        let product = tornillo();
        let mut cart = Cart::new();
        cart.add_line(&product, units(5), LineVariant::Unit).unwrap();
        let items = cart.compute_totals(TaxRate::STANDARD).sale_items();
        assert_eq!(items[0].price, Money::from_major(8));
        assert_eq!(items[0].variant_key, "unit");
        assert_eq!(items[0].returned_quantity, Quantity::zero());
    }
}
