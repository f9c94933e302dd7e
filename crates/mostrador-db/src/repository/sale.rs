//! # Sale Repository
//!
//! Tickets are written once at checkout and afterwards only patched:
//! credit balances and payment history (abonos), returned quantities, and
//! the closure id stamped by the Z cut.
//!
//! ## Ticket Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert(sale)              closureId = null, shiftId = current         │
//! │       │                                                                 │
//! │       ├── update_balance   remainingBalance + paymentHistory (credit)  │
//! │       ├── update_items     returnedQuantity per item (returns)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mark_closed(shift, z)     closureId = z for every ticket of the shift │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use mostrador_core::{PaymentMethod, Sale};

use super::{from_record, from_records, to_record};
use crate::error::{DbError, DbResult};
use crate::service::{Collection, Filter, PersistenceService, SortOrder};

#[derive(Clone)]
pub struct SaleRepository {
    service: Arc<dyn PersistenceService>,
}

impl SaleRepository {
    pub fn new(service: Arc<dyn PersistenceService>) -> Self {
        SaleRepository { service }
    }

    pub async fn insert(&self, sale: &Sale) -> DbResult<String> {
        debug!(
            id = %sale.id,
            shift = %sale.shift_id,
            total = %sale.total,
            method = %sale.payment_method.as_str(),
            "Inserting sale"
        );
        self.service.insert(Collection::Sales, to_record(sale)?).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        self.service
            .get(Collection::Sales, id)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn require(&self, id: &str) -> DbResult<Sale> {
        self.get(id).await?.ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Tickets of a shift in chronological order.
    pub async fn by_shift(&self, shift_id: &str) -> DbResult<Vec<Sale>> {
        let filter = Filter::new()
            .eq("shiftId", shift_id)
            .order_by("date", SortOrder::Asc);
        from_records(self.service.select(Collection::Sales, &filter).await?)
    }

    /// Credit tickets of a client that still carry a balance, oldest first.
    pub async fn open_credit_tickets(&self, client_id: &str) -> DbResult<Vec<Sale>> {
        let filter = Filter::new()
            .eq("clientId", client_id)
            .eq("paymentMethod", PaymentMethod::Credit.as_str())
            .order_by("date", SortOrder::Asc);
        let sales: Vec<Sale> =
            from_records(self.service.select(Collection::Sales, &filter).await?)?;
        Ok(sales.into_iter().filter(Sale::is_open_credit).collect())
    }

    /// Persists a ticket's balance and payment history after an abono or a
    /// credit note.
    pub async fn update_balance(&self, sale: &Sale) -> DbResult<()> {
        let patch = json!({
            "remainingBalance": sale.remaining_balance,
            "paymentHistory": to_record(&sale.payment_history)?,
        });
        self.service.update(Collection::Sales, &sale.id, patch).await
    }

    /// Persists returned quantities after a return.
    pub async fn update_items(&self, sale: &Sale) -> DbResult<()> {
        let patch = json!({ "items": to_record(&sale.items)? });
        self.service.update(Collection::Sales, &sale.id, patch).await
    }

    /// Stamps every ticket of the shift with the Z closure id.
    pub async fn mark_closed(&self, shift_id: &str, closure_id: &str) -> DbResult<usize> {
        let sales = self.by_shift(shift_id).await?;
        for sale in &sales {
            self.service
                .update(Collection::Sales, &sale.id, json!({ "closureId": closure_id }))
                .await?;
        }
        info!(shift = %shift_id, closure = %closure_id, count = sales.len(), "Tickets closed");
        Ok(sales.len())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
