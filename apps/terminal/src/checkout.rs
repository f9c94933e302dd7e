//! # Checkout
//!
//! Turning the cart into a sale happens in two phases.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Phases                                 │
//! │                                                                         │
//! │  prepare_checkout (pure)            commit (writes, in order)           │
//! │  ───────────────────────            ─────────────────────────           │
//! │  • price the cart                   1. sale   ─┐ via the shift session │
//! │  • check tender / credit limit      2. ledger ─┘ (one queued command)  │
//! │  • build the Sale                   3. stock per product               │
//! │  • compute stock draws              4. kardex per product              │
//! │                                     5. client balance (credit only)    │
//! │        │                            0. credit limit re-checked against │
//! │        │                               the stored balance              │
//! │        └── drop it to cancel        failure after 1 → PartialFailure   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is written until `commit`. Once the sale is written there is no
//! rollback: a later failure is reported with the steps that did commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use mostrador_core::credit::{authorize_credit_sale, record_credit_sale, CreditAuthorization};
use mostrador_core::pricing::{Cart, CartTotals};
use mostrador_core::{
    Client, CoreError, CoreResult, InventoryMovement, InventoryReason, Money, PaymentMethod,
    Quantity, Sale, TaxRate, ValidationError,
};
use mostrador_db::Database;

use crate::error::{StepLog, TerminalResult};
use crate::session::ShiftHandle;

/// How the customer pays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Tender {
    Cash { tendered: Money },
    Card,
    /// Charged to a client account.
    Credit { client_id: String },
}

impl Tender {
    pub fn payment_method(&self) -> PaymentMethod {
        match self {
            Tender::Cash { .. } => PaymentMethod::Cash,
            Tender::Card => PaymentMethod::Card,
            Tender::Credit { .. } => PaymentMethod::Credit,
        }
    }
}

/// Base units leaving the shelf for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDraw {
    pub product_id: String,
    pub units: Quantity,
}

/// A validated sale waiting to be written.
#[derive(Debug, Clone)]
pub struct PreparedCheckout {
    sale: Sale,
    totals: CartTotals,
    stock: Vec<StockDraw>,
    credit: Option<CreditAuthorization>,
}

impl PreparedCheckout {
    pub fn sale(&self) -> &Sale {
        &self.sale
    }

    pub fn totals(&self) -> &CartTotals {
        &self.totals
    }

    pub fn stock_draws(&self) -> &[StockDraw] {
        &self.stock
    }

    pub fn change(&self) -> Money {
        self.sale.change
    }

    /// Credit check of a credit sale.
    pub fn credit(&self) -> Option<&CreditAuthorization> {
        self.credit.as_ref()
    }
}

/// Validates the cart and tender and builds the sale. Writes nothing.
///
/// `client` is the account named by a credit tender, if it exists.
pub fn prepare_checkout(
    cart: &Cart,
    tax_rate: TaxRate,
    tender: &Tender,
    client: Option<Client>,
    shift_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<PreparedCheckout> {
    if cart.is_empty() {
        return Err(ValidationError::Required {
            field: "cart".to_string(),
        }
        .into());
    }

    let totals = cart.compute_totals(tax_rate);
    let mut sale = Sale {
        id: Uuid::new_v4().to_string(),
        shift_id: shift_id.to_string(),
        date: now,
        items: totals.sale_items(),
        subtotal: totals.subtotal,
        tax: totals.tax,
        savings: totals.savings,
        total: totals.total,
        payment_method: tender.payment_method(),
        amount_tendered: Money::zero(),
        change: Money::zero(),
        customer_name: None,
        client_id: None,
        remaining_balance: Money::zero(),
        payment_history: Vec::new(),
        closure_id: None,
    };

    let mut credit = None;
    match tender {
        Tender::Cash { tendered } => {
            if *tendered < sale.total {
                return Err(CoreError::InsufficientTender {
                    total: sale.total,
                    tendered: *tendered,
                });
            }
            sale.amount_tendered = *tendered;
            sale.change = *tendered - sale.total;
        }
        Tender::Card => {
            sale.amount_tendered = sale.total;
        }
        Tender::Credit { .. } => {
            let mut client = client.ok_or(CoreError::ClientRequired)?;
            credit = Some(record_credit_sale(&mut client, &mut sale)?);
        }
    }

    let stock = stock_draws(&totals);
    Ok(PreparedCheckout {
        sale,
        totals,
        stock,
        credit,
    })
}

/// Sums stock units per product, in cart order.
fn stock_draws(totals: &CartTotals) -> Vec<StockDraw> {
    let mut draws: Vec<StockDraw> = Vec::new();
    for line in &totals.lines {
        let units = line.stock_factor.stock_units(line.quantity);
        match draws.iter_mut().find(|d| d.product_id == line.product_id) {
            Some(draw) => draw.units += units,
            None => draws.push(StockDraw {
                product_id: line.product_id.clone(),
                units,
            }),
        }
    }
    draws
}

/// Writes a prepared checkout. See the module docs for the step order.
pub async fn commit(
    prepared: PreparedCheckout,
    db: &Database,
    session: &ShiftHandle,
    now: DateTime<Utc>,
) -> TerminalResult<Sale> {
    let PreparedCheckout { sale, stock, .. } = prepared;
    let charged_client = sale.client_id.as_deref().filter(|_| sale.is_credit());

    // the account may have moved since prepare
    if let Some(client_id) = charged_client {
        let current = db.clients().require(client_id).await?;
        let authorization = authorize_credit_sale(Some(&current), sale.remaining_balance)?;
        if !authorization.authorized {
            return Err(CoreError::CreditLimitExceeded {
                excess: authorization.excess,
            }
            .into());
        }
    }

    let mut steps = StepLog::new("checkout");

    session.finalize_sale(sale.clone()).await?;
    steps.committed("sale");
    steps.committed("ledger");

    let products = db.products();
    for draw in &stock {
        let step = format!("stock {}", draw.product_id);
        let remaining = products
            .adjust_stock(&draw.product_id, Quantity::zero() - draw.units)
            .await
            .map_err(|e| steps.fail(&step, e))?;
        debug!(product_id = %draw.product_id, sold = %draw.units, remaining = %remaining, "Stock drawn");
        steps.committed(step);
    }

    let movements = db.movements();
    for draw in &stock {
        let step = format!("kardex {}", draw.product_id);
        let entry = InventoryMovement {
            id: Uuid::new_v4().to_string(),
            product_id: draw.product_id.clone(),
            delta: Quantity::zero() - draw.units,
            reason: InventoryReason::Sale,
            reference: Some(sale.id.clone()),
            created_at: now,
        };
        movements
            .insert_inventory(&entry)
            .await
            .map_err(|e| steps.fail(&step, e))?;
        steps.committed(step);
    }

    if let Some(client_id) = charged_client {
        let balance = db
            .clients()
            .adjust_balance(client_id, sale.remaining_balance)
            .await
            .map_err(|e| steps.fail("client balance", e))?;
        debug!(client_id = %client_id, balance = %balance, "Account charged");
        steps.committed("client balance");
    }

    info!(
        sale_id = %sale.id,
        total = %sale.total,
        method = sale.payment_method.as_str(),
        lines = sale.items.len(),
        "Checkout committed"
    );
    Ok(sale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mostrador_core::pricing::LineVariant;
    use mostrador_core::Product;

    fn cart_with(price: i64, qty: i64) -> Cart {
        let mut cart = Cart::new();
        let product = Product::basic("p1", "Cemento", Money::from_major(price));
        cart.add_line(&product, Quantity::from_units(qty), LineVariant::Unit)
            .unwrap();
        cart
    }

    fn client(limit: i64, balance: i64) -> Client {
        Client {
            id: "c1".into(),
            name: "Constructora Álamo".into(),
            phone: None,
            credit_limit: Money::from_major(limit),
            current_balance: Money::from_major(balance),
        }
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = prepare_checkout(
            &Cart::new(),
            TaxRate::zero(),
            &Tender::Card,
            None,
            "s1",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::Required { .. })));
    }

    #[test]
    fn test_cash_change_and_insufficient_tender() {
        let cart = cart_with(100, 2);
        let prepared = prepare_checkout(
            &cart,
            TaxRate::zero(),
            &Tender::Cash {
                tendered: Money::from_major(500),
            },
            None,
            "s1",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(prepared.sale().total, Money::from_major(200));
        assert_eq!(prepared.change(), Money::from_major(300));
        assert_eq!(prepared.sale().shift_id, "s1");

        let err = prepare_checkout(
            &cart,
            TaxRate::zero(),
            &Tender::Cash {
                tendered: Money::from_major(150),
            },
            None,
            "s1",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientTender { .. }));
    }

    #[test]
    fn test_card_is_exact() {
        let prepared = prepare_checkout(
            &cart_with(100, 1),
            TaxRate::STANDARD,
            &Tender::Card,
            None,
            "s1",
            Utc::now(),
        )
        .unwrap();
        let sale = prepared.sale();
        assert_eq!(sale.payment_method, PaymentMethod::Card);
        assert_eq!(sale.total, Money::from_major(116));
        assert_eq!(sale.amount_tendered, sale.total);
        assert_eq!(prepared.change(), Money::zero());
    }

    #[test]
    fn test_credit_checks_limit_without_touching_input() {
        let cart = cart_with(150, 1);
        let prepared = prepare_checkout(
            &cart,
            TaxRate::zero(),
            &Tender::Credit {
                client_id: "c1".into(),
            },
            Some(client(1000, 800)),
            "s1",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(prepared.sale().remaining_balance, Money::from_major(150));
        assert_eq!(prepared.sale().client_id.as_deref(), Some("c1"));
        assert_eq!(
            prepared.credit().map(|c| c.new_balance),
            Some(Money::from_major(950))
        );

        let over = prepare_checkout(
            &cart_with(250, 1),
            TaxRate::zero(),
            &Tender::Credit {
                client_id: "c1".into(),
            },
            Some(client(1000, 800)),
            "s1",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(
            over,
            CoreError::CreditLimitExceeded { excess } if excess == Money::from_major(50)
        ));

        let unknown = prepare_checkout(
            &cart,
            TaxRate::zero(),
            &Tender::Credit {
                client_id: "ghost".into(),
            },
            None,
            "s1",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(unknown, CoreError::ClientRequired));
    }

    #[test]
    fn test_stock_draws_merge_variants() {
        let mut product = Product::basic("clavo", "Clavo 2\"", Money::from_cents(80));
        product.pack_price = Some(Money::from_major(65));
        product.pack_quantity = Some(100);

        let mut cart = Cart::new();
        cart.add_line(&product, Quantity::from_units(30), LineVariant::Unit)
            .unwrap();
        cart.add_line(&product, Quantity::from_units(2), LineVariant::LegacyPack)
            .unwrap();

        let prepared = prepare_checkout(
            &cart,
            TaxRate::zero(),
            &Tender::Card,
            None,
            "s1",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(prepared.sale().items.len(), 2);
        assert_eq!(
            prepared.stock_draws(),
            &[StockDraw {
                product_id: "clavo".into(),
                units: Quantity::from_units(230),
            }]
        );
    }
}
