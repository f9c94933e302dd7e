//! # Movement Repository
//!
//! Insert-only histories: cash in/out of the drawer per shift, and the
//! inventory kardex per product.

use std::sync::Arc;

use tracing::debug;

use mostrador_core::{CashMovement, InventoryMovement};

use super::{from_records, to_record};
use crate::error::DbResult;
use crate::service::{Collection, Filter, PersistenceService, SortOrder};

#[derive(Clone)]
pub struct MovementRepository {
    service: Arc<dyn PersistenceService>,
}

impl MovementRepository {
    pub fn new(service: Arc<dyn PersistenceService>) -> Self {
        MovementRepository { service }
    }

    pub async fn insert_cash(&self, movement: &CashMovement) -> DbResult<String> {
        debug!(
            shift = %movement.shift_id,
            amount = %movement.signed_amount(),
            reason = %movement.reason,
            "Recording cash movement"
        );
        self.service
            .insert(Collection::CashMovements, to_record(movement)?)
            .await
    }

    pub async fn cash_for_shift(&self, shift_id: &str) -> DbResult<Vec<CashMovement>> {
        let filter = Filter::new()
            .eq("shiftId", shift_id)
            .order_by("createdAt", SortOrder::Asc);
        from_records(
            self.service
                .select(Collection::CashMovements, &filter)
                .await?,
        )
    }

    pub async fn insert_inventory(&self, movement: &InventoryMovement) -> DbResult<String> {
        self.service
            .insert(Collection::InventoryMovements, to_record(movement)?)
            .await
    }

    pub async fn inventory_for_product(&self, product_id: &str) -> DbResult<Vec<InventoryMovement>> {
        let filter = Filter::new()
            .eq("productId", product_id)
            .order_by("createdAt", SortOrder::Asc);
        from_records(
            self.service
                .select(Collection::InventoryMovements, &filter)
                .await?,
        )
    }
}
