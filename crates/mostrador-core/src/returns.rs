//! # Returns Processor
//!
//! Validates and applies product returns against a sale ticket.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  process_return_batch(sale, lines, approval)                            │
//! │       │                                                                 │
//! │       ├── approval names ApproveReturn{sale}?   no → Unauthorized       │
//! │       ├── now − sale.date ≤ window (8 days)?    no → ReturnWindowExpired│
//! │       ├── every line: qty ≤ sold − returned?    no → ReturnExceedsSold  │
//! │       │                                                                 │
//! │       ▼  (all checks passed, nothing mutated before this point)         │
//! │  returnedQuantity += qty on each line                                   │
//! │  refund = Σ qty × original unit price                                   │
//! │       │                                                                 │
//! │       ├── credit ticket: remainingBalance absorbs the refund first      │
//! │       └── rest: cash refund (registered as a drawer cash OUT)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::auth::{Approval, ProtectedAction};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::Sale;
use crate::RETURN_WINDOW_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnPolicy {
    pub window_days: i64,
}

impl Default for ReturnPolicy {
    fn default() -> Self {
        ReturnPolicy {
            window_days: RETURN_WINDOW_DAYS,
        }
    }
}

impl ReturnPolicy {
    /// Fails when the sale is older than the window. The boundary day is
    /// still accepted.
    pub fn ensure_within_window(&self, sale: &Sale, now: DateTime<Utc>) -> CoreResult<()> {
        let age = now - sale.date;
        if age > Duration::days(self.window_days) {
            return Err(CoreError::ReturnWindowExpired {
                sale_id: sale.id.clone(),
                age_days: age.num_days(),
                window_days: self.window_days,
            });
        }
        Ok(())
    }
}

/// One product line the customer brings back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReturnLine {
    pub product_id: String,
    /// Narrows to one variant when the ticket sold several of the product.
    #[serde(default)]
    pub variant_key: Option<String>,
    #[ts(type = "number")]
    pub quantity: Quantity,
}

impl ReturnLine {
    pub fn new(product_id: impl Into<String>, quantity: Quantity) -> Self {
        ReturnLine {
            product_id: product_id.into(),
            variant_key: None,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReturnedLine {
    pub product_id: String,
    pub variant_key: String,
    pub name: String,
    #[ts(type = "number")]
    pub quantity: Quantity,
    pub unit_price: Money,
    pub refund: Money,
    /// Base stock units going back on the shelf.
    #[ts(type = "number")]
    pub stock_units: Quantity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReturnOutcome {
    pub sale_id: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    pub lines: Vec<ReturnedLine>,
    pub refund: Money,
    /// Part of the refund that cancels unpaid credit balance.
    pub credit_note: Money,
    /// Part of the refund paid out of the drawer.
    pub cash_refund: Money,
}

/// Returns a single product.
pub fn process_return(
    sale: &mut Sale,
    product_id: &str,
    quantity: Quantity,
    approval: Approval,
    policy: ReturnPolicy,
    now: DateTime<Utc>,
) -> CoreResult<ReturnOutcome> {
    process_return_batch(
        sale,
        &[ReturnLine::new(product_id, quantity)],
        approval,
        policy,
        now,
    )
}

/// Returns several products at once. Either every line is applied or none.
pub fn process_return_batch(
    sale: &mut Sale,
    lines: &[ReturnLine],
    approval: Approval,
    policy: ReturnPolicy,
    now: DateTime<Utc>,
) -> CoreResult<ReturnOutcome> {
    approval.ensure_covers(&ProtectedAction::ApproveReturn {
        sale_id: sale.id.clone(),
    })?;
    policy.ensure_within_window(sale, now)?;

    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "return lines".to_string(),
        }
        .into());
    }

    // validate everything before touching the ticket
    let mut requested: HashMap<usize, Quantity> = HashMap::new();
    let mut plan = Vec::with_capacity(lines.len());
    for line in lines {
        if !line.quantity.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        let index = sale
            .item_index(&line.product_id, line.variant_key.as_deref())
            .ok_or_else(|| CoreError::ItemNotInSale {
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
            })?;
        let total = requested.entry(index).or_default();
        *total += line.quantity;

        let item = &sale.items[index];
        if *total > item.returnable() {
            return Err(CoreError::ReturnExceedsSold {
                product_id: line.product_id.clone(),
                requested: *total,
                available: item.returnable(),
            });
        }
        plan.push((index, line.quantity));
    }

    let mut returned = Vec::with_capacity(plan.len());
    for (index, quantity) in plan {
        let item = &mut sale.items[index];
        item.returned_quantity += quantity;
        returned.push(ReturnedLine {
            product_id: item.product_id.clone(),
            variant_key: item.variant_key.clone(),
            name: item.name.clone(),
            quantity,
            unit_price: item.price,
            refund: item.price.times(quantity),
            stock_units: item.stock_factor.stock_units(quantity),
        });
    }

    let refund: Money = returned.iter().map(|l| l.refund).sum();
    let credit_note = if sale.is_credit() {
        refund.min(sale.remaining_balance).non_negative()
    } else {
        Money::zero()
    };
    sale.remaining_balance -= credit_note;

    Ok(ReturnOutcome {
        sale_id: sale.id.clone(),
        date: now,
        lines: returned,
        refund,
        credit_note,
        cash_refund: refund - credit_note,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::approve;
    use crate::types::{PaymentMethod, SaleItem, StockFactor};

    fn item(product_id: &str, qty: i64, price: i64) -> SaleItem {
        SaleItem {
            product_id: product_id.into(),
            variant_key: "unit".into(),
            name: product_id.to_uppercase(),
            quantity: Quantity::from_units(qty),
            price: Money::from_major(price),
            returned_quantity: Quantity::zero(),
            stock_factor: StockFactor::ONE,
        }
    }

    fn sale_at(date: DateTime<Utc>) -> Sale {
        Sale {
            id: "sale-1".into(),
            shift_id: "shift-1".into(),
            date,
            items: vec![item("p1", 3, 10), item("p2", 1, 25)],
            subtotal: Money::from_major(55),
            tax: Money::zero(),
            savings: Money::zero(),
            total: Money::from_major(55),
            payment_method: PaymentMethod::Cash,
            amount_tendered: Money::from_major(55),
            change: Money::zero(),
            customer_name: None,
            client_id: None,
            remaining_balance: Money::zero(),
            payment_history: Vec::new(),
            closure_id: None,
        }
    }

    fn approval() -> Approval {
        approve(ProtectedAction::ApproveReturn {
            sale_id: "sale-1".into(),
        })
    }

    fn policy() -> ReturnPolicy {
        ReturnPolicy::default()
    }

    #[test]
    fn test_return_window_boundary() {
        let now = Utc::now();

        let mut old = sale_at(now - Duration::days(9));
        let err = process_return(&mut old, "p1", Quantity::from_units(1), approval(), policy(), now)
            .unwrap_err();
        assert!(matches!(err, CoreError::ReturnWindowExpired { age_days: 9, .. }));
        assert_eq!(old.items[0].returned_quantity, Quantity::zero());

        let mut boundary = sale_at(now - Duration::days(8));
        assert!(
            process_return(&mut boundary, "p1", Quantity::from_units(1), approval(), policy(), now)
                .is_ok()
        );
    }

    #[test]
    fn test_refund_uses_original_price() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        let outcome =
            process_return(&mut sale, "p1", Quantity::from_units(2), approval(), policy(), now)
                .unwrap();
        assert_eq!(outcome.refund, Money::from_major(20));
        assert_eq!(outcome.cash_refund, Money::from_major(20));
        assert_eq!(outcome.lines[0].stock_units, Quantity::from_units(2));
        assert_eq!(sale.items[0].returned_quantity, Quantity::from_units(2));
    }

    #[test]
    fn test_cannot_return_more_than_sold() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        process_return(&mut sale, "p1", Quantity::from_units(2), approval(), policy(), now)
            .unwrap();
        let err =
            process_return(&mut sale, "p1", Quantity::from_units(2), approval(), policy(), now)
                .unwrap_err();
        assert!(matches!(err, CoreError::ReturnExceedsSold { .. }));
        assert_eq!(sale.items[0].returned_quantity, Quantity::from_units(2));
    }

    #[test]
    fn test_batch_is_atomic() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        let lines = vec![
            ReturnLine::new("p1", Quantity::from_units(1)),
            ReturnLine::new("p2", Quantity::from_units(2)),
        ];
        let err = process_return_batch(&mut sale, &lines, approval(), policy(), now).unwrap_err();
        assert!(matches!(err, CoreError::ReturnExceedsSold { .. }));
        assert_eq!(sale.items[0].returned_quantity, Quantity::zero());

        let lines = vec![
            ReturnLine::new("p1", Quantity::from_units(1)),
            ReturnLine::new("p2", Quantity::from_units(1)),
        ];
        let outcome = process_return_batch(&mut sale, &lines, approval(), policy(), now).unwrap();
        assert_eq!(outcome.refund, Money::from_major(35));
    }

    #[test]
    fn test_duplicate_lines_accumulate() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        let lines = vec![
            ReturnLine::new("p1", Quantity::from_units(2)),
            ReturnLine::new("p1", Quantity::from_units(2)),
        ];
        assert!(process_return_batch(&mut sale, &lines, approval(), policy(), now).is_err());
    }

    #[test]
    fn test_unknown_product_rejected() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        let err =
            process_return(&mut sale, "p9", Quantity::from_units(1), approval(), policy(), now)
                .unwrap_err();
        assert!(matches!(err, CoreError::ItemNotInSale { .. }));
    }

    #[test]
    fn test_return_requires_matching_approval() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        let wrong = approve(ProtectedAction::ApproveReturn {
            sale_id: "sale-2".into(),
        });
        let err = process_return(&mut sale, "p1", Quantity::from_units(1), wrong, policy(), now)
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[test]
    fn test_credit_ticket_refund_reduces_balance_first() {
        let now = Utc::now();
        let mut sale = sale_at(now);
        sale.payment_method = PaymentMethod::Credit;
        sale.client_id = Some("c1".into());
        sale.remaining_balance = Money::from_major(15);

        let outcome =
            process_return(&mut sale, "p1", Quantity::from_units(2), approval(), policy(), now)
                .unwrap();
        assert_eq!(outcome.credit_note, Money::from_major(15));
        assert_eq!(outcome.cash_refund, Money::from_major(5));
        assert_eq!(sale.remaining_balance, Money::zero());
    }
}
