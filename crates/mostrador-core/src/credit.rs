//! # Credit Ledger
//!
//! Credit-limit checks for sales on account and abono allocation.
//!
//! ## Abono Allocation (FIFO)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client owes:   A $30 (oldest)    B $50                                 │
//! │  Payment:       $40                                                     │
//! │                                                                         │
//! │  budget $40 ──► A: min(40, 30) = 30  → A remaining  0, budget $10       │
//! │  budget $10 ──► B: min(10, 50) = 10  → B remaining 40, budget  $0       │
//! │                                                                         │
//! │  Receipt: [{A, paid 30, remaining 0}, {B, paid 10, remaining 40}]       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tickets are ordered by sale date, then id, so the same ticket set and
//! amount always produce the same allocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Client, PaymentEntry, Sale};
use crate::validation::{validate_amount, validate_reason};
use crate::PAYMENT_TOLERANCE;

/// Credit rules that vary per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditPolicy {
    /// Overpayment still accepted to absorb rounding on the operator side.
    pub tolerance: Money,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        CreditPolicy {
            tolerance: PAYMENT_TOLERANCE,
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreditAuthorization {
    pub authorized: bool,
    pub new_balance: Money,
    /// Amount over the limit; zero when authorized.
    pub excess: Money,
}

/// Checks whether `client` can take `sale_total` on account.
///
/// Fails closed: without a client the sale is never authorized.
pub fn authorize_credit_sale(
    client: Option<&Client>,
    sale_total: Money,
) -> CoreResult<CreditAuthorization> {
    let client = client.ok_or(CoreError::ClientRequired)?;
    let new_balance = client.current_balance + sale_total;
    Ok(CreditAuthorization {
        authorized: new_balance <= client.credit_limit,
        new_balance,
        excess: (new_balance - client.credit_limit).non_negative(),
    })
}

/// Charges a credit sale to the client's account.
///
/// Sets the ticket's remaining balance and raises the client's balance.
/// Nothing is mutated when the limit would be exceeded.
pub fn record_credit_sale(client: &mut Client, sale: &mut Sale) -> CoreResult<CreditAuthorization> {
    if !sale.is_credit() {
        return Err(ValidationError::InvalidFormat {
            field: "paymentMethod".to_string(),
            reason: "only credit sales are charged to an account".to_string(),
        }
        .into());
    }
    let authorization = authorize_credit_sale(Some(client), sale.total)?;
    if !authorization.authorized {
        return Err(CoreError::CreditLimitExceeded {
            excess: authorization.excess,
        });
    }

    sale.client_id = Some(client.id.clone());
    sale.customer_name = Some(client.name.clone());
    sale.remaining_balance = sale.total;
    client.current_balance = authorization.new_balance;
    Ok(authorization)
}

// =============================================================================
// Payments
// =============================================================================

/// One ticket's share of an abono.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Allocation {
    pub ticket_id: String,
    pub paid_amount: Money,
    pub remaining_balance: Money,
}

/// Printed breakdown of an abono.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentReceipt {
    pub client_id: String,
    pub client_name: String,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
    /// Total applied across tickets.
    pub amount: Money,
    pub reason: Option<String>,
    pub allocations: Vec<Allocation>,
    pub balance_before: Money,
    pub balance_after: Money,
}

fn open_tickets<'a>(tickets: &'a [Sale], client_id: &str) -> Vec<&'a Sale> {
    let mut open: Vec<&Sale> = tickets
        .iter()
        .filter(|t| t.client_id.as_deref() == Some(client_id) && t.is_open_credit())
        .collect();
    open.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    open
}

/// Sum of unpaid balances on the client's credit tickets.
pub fn outstanding_debt(tickets: &[Sale], client_id: &str) -> Money {
    open_tickets(tickets, client_id)
        .iter()
        .map(|t| t.remaining_balance)
        .sum()
}

/// Plans how `amount` settles the client's tickets, oldest first.
///
/// Pure: returns the allocation without touching any ticket.
pub fn allocate_payment(
    tickets: &[Sale],
    client_id: &str,
    amount: Money,
    policy: CreditPolicy,
) -> CoreResult<Vec<Allocation>> {
    validate_amount(amount, "payment amount")?;
    let open = open_tickets(tickets, client_id);
    let debt: Money = open.iter().map(|t| t.remaining_balance).sum();
    if debt.is_zero() {
        return Err(CoreError::NoOutstandingDebt(client_id.to_string()));
    }
    if amount > debt + policy.tolerance {
        return Err(CoreError::PaymentExceedsDebt { amount, debt });
    }

    let mut budget = amount;
    let mut allocations = Vec::new();
    for ticket in open {
        if !budget.is_positive() {
            break;
        }
        let paid = budget.min(ticket.remaining_balance);
        budget -= paid;
        allocations.push(Allocation {
            ticket_id: ticket.id.clone(),
            paid_amount: paid,
            remaining_balance: ticket.remaining_balance - paid,
        });
    }
    Ok(allocations)
}

/// Applies an abono: lowers ticket balances, appends payment history and
/// lowers the client's balance by the total applied.
pub fn apply_payment(
    client: &mut Client,
    tickets: &mut [Sale],
    amount: Money,
    reason: Option<&str>,
    policy: CreditPolicy,
    now: DateTime<Utc>,
) -> CoreResult<PaymentReceipt> {
    let reason = match reason.map(str::trim) {
        Some(text) if !text.is_empty() => Some(validate_reason(text)?),
        _ => None,
    };
    let allocations = allocate_payment(tickets, &client.id, amount, policy)?;

    for allocation in &allocations {
        if let Some(ticket) = tickets.iter_mut().find(|t| t.id == allocation.ticket_id) {
            ticket.remaining_balance = allocation.remaining_balance;
            ticket.payment_history.push(PaymentEntry {
                date: now,
                amount: allocation.paid_amount,
                reason: reason.clone(),
            });
        }
    }

    let applied: Money = allocations.iter().map(|a| a.paid_amount).sum();
    let balance_before = client.current_balance;
    client.current_balance = (client.current_balance - applied).non_negative();

    Ok(PaymentReceipt {
        client_id: client.id.clone(),
        client_name: client.name.clone(),
        date: now,
        amount: applied,
        reason,
        allocations,
        balance_before,
        balance_after: client.current_balance,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::Duration;

    fn client(limit: i64, balance: i64) -> Client {
        Client {
            id: "c1".into(),
            name: "Taller Ramírez".into(),
            phone: Some("555-0101".into()),
            credit_limit: Money::from_major(limit),
            current_balance: Money::from_major(balance),
        }
    }

    fn credit_ticket(id: &str, remaining: i64, days_ago: i64) -> Sale {
        credit_ticket_at(id, remaining, Utc::now() - Duration::days(days_ago))
    }

    fn credit_ticket_at(id: &str, remaining: i64, date: DateTime<Utc>) -> Sale {
        let amount = Money::from_major(remaining);
        Sale {
            id: id.into(),
            shift_id: "shift-1".into(),
            date,
            items: Vec::new(),
            subtotal: amount,
            tax: Money::zero(),
            savings: Money::zero(),
            total: amount,
            payment_method: PaymentMethod::Credit,
            amount_tendered: Money::zero(),
            change: Money::zero(),
            customer_name: Some("Taller Ramírez".into()),
            client_id: Some("c1".into()),
            remaining_balance: amount,
            payment_history: Vec::new(),
            closure_id: None,
        }
    }

    #[test]
    fn test_credit_authorization() {
        let c = client(1000, 800);

        let ok = authorize_credit_sale(Some(&c), Money::from_major(150)).unwrap();
        assert!(ok.authorized);
        assert_eq!(ok.new_balance, Money::from_major(950));
        assert_eq!(ok.excess, Money::zero());

        let rejected = authorize_credit_sale(Some(&c), Money::from_major(250)).unwrap();
        assert!(!rejected.authorized);
        assert_eq!(rejected.excess, Money::from_major(50));
    }

    #[test]
    fn test_credit_requires_client() {
        let err = authorize_credit_sale(None, Money::from_major(1)).unwrap_err();
        assert!(matches!(err, CoreError::ClientRequired));
    }

    #[test]
    fn test_record_credit_sale() {
        let mut c = client(1000, 800);
        let mut sale = credit_ticket("t1", 150, 0);
        sale.client_id = None;
        sale.remaining_balance = Money::zero();

        record_credit_sale(&mut c, &mut sale).unwrap();
        assert_eq!(c.current_balance, Money::from_major(950));
        assert_eq!(sale.remaining_balance, Money::from_major(150));
        assert_eq!(sale.client_id.as_deref(), Some("c1"));

        let mut too_big = credit_ticket("t2", 100, 0);
        let err = record_credit_sale(&mut c, &mut too_big).unwrap_err();
        assert!(matches!(err, CoreError::CreditLimitExceeded { .. }));
        assert_eq!(c.current_balance, Money::from_major(950));
    }

    #[test]
    fn test_payment_allocation_fifo() {
        // B listed first but A is older
        let tickets = vec![credit_ticket("B", 50, 1), credit_ticket("A", 30, 5)];
        let plan =
            allocate_payment(&tickets, "c1", Money::from_major(40), CreditPolicy::default())
                .unwrap();
        assert_eq!(
            plan,
            vec![
                Allocation {
                    ticket_id: "A".into(),
                    paid_amount: Money::from_major(30),
                    remaining_balance: Money::zero(),
                },
                Allocation {
                    ticket_id: "B".into(),
                    paid_amount: Money::from_major(10),
                    remaining_balance: Money::from_major(40),
                },
            ]
        );
    }

    #[test]
    fn test_payment_exceeding_debt_rejected() {
        let tickets = vec![credit_ticket("A", 30, 5), credit_ticket("B", 50, 1)];
        let err =
            allocate_payment(&tickets, "c1", Money::from_major(100), CreditPolicy::default())
                .unwrap_err();
        assert!(matches!(err, CoreError::PaymentExceedsDebt { .. }));

        // within tolerance: settles everything
        let plan = allocate_payment(
            &tickets,
            "c1",
            Money::from_cents(8_040),
            CreditPolicy::default(),
        )
        .unwrap();
        let paid: Money = plan.iter().map(|a| a.paid_amount).sum();
        assert_eq!(paid, Money::from_major(80));
    }

    #[test]
    fn test_apply_payment_mutates_tickets_and_client() {
        let mut c = client(1000, 80);
        let mut tickets = vec![credit_ticket("A", 30, 5), credit_ticket("B", 50, 1)];
        let now = Utc::now();

        let receipt = apply_payment(
            &mut c,
            &mut tickets,
            Money::from_major(40),
            Some("Abono semanal"),
            CreditPolicy::default(),
            now,
        )
        .unwrap();

        assert_eq!(receipt.amount, Money::from_major(40));
        assert_eq!(receipt.balance_before, Money::from_major(80));
        assert_eq!(receipt.balance_after, Money::from_major(40));
        assert_eq!(c.current_balance, Money::from_major(40));
        assert_eq!(tickets[0].remaining_balance, Money::zero());
        assert_eq!(tickets[1].remaining_balance, Money::from_major(40));
        assert_eq!(tickets[1].payment_history[0].amount, Money::from_major(10));
        assert_eq!(outstanding_debt(&tickets, "c1"), Money::from_major(40));
    }

    #[test]
    fn test_apply_payment_is_deterministic() {
        let same_day = Utc::now() - Duration::days(3);
        let tickets = vec![
            credit_ticket_at("B", 50, same_day),
            credit_ticket_at("A", 30, same_day),
            credit_ticket_at("C", 20, same_day - Duration::days(6)),
        ];
        let first =
            allocate_payment(&tickets, "c1", Money::from_major(60), CreditPolicy::default())
                .unwrap();
        let mut reversed = tickets.clone();
        reversed.reverse();
        let second =
            allocate_payment(&reversed, "c1", Money::from_major(60), CreditPolicy::default())
                .unwrap();
        assert_eq!(first, second);
        // equal dates fall back to the ticket id
        let order: Vec<&str> = first.iter().map(|a| a.ticket_id.as_str()).collect();
        assert_eq!(order, vec!["C", "A", "B"]);
        assert_eq!(first[2].paid_amount, Money::from_major(10));
    }

    #[test]
    fn test_payment_without_debt_rejected() {
        let mut c = client(1000, 0);
        let mut tickets: Vec<Sale> = Vec::new();
        let err = apply_payment(
            &mut c,
            &mut tickets,
            Money::from_major(10),
            None,
            CreditPolicy::default(),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NoOutstandingDebt(_)));
    }
}
