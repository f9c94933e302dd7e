//! # Shift Repository
//!
//! One record per shift. The Z report is embedded in the record when the
//! shift closes; a register has at most one shift that is not CLOSED.

use std::sync::Arc;

use tracing::{debug, info};

use mostrador_core::shift::{ShiftRecord, ShiftStatus};

use super::{from_record, from_records, to_record};
use crate::error::{DbError, DbResult};
use crate::service::{Collection, Filter, PersistenceService, SortOrder};

#[derive(Clone)]
pub struct ShiftRepository {
    service: Arc<dyn PersistenceService>,
}

impl ShiftRepository {
    pub fn new(service: Arc<dyn PersistenceService>) -> Self {
        ShiftRepository { service }
    }

    pub async fn insert(&self, shift: &ShiftRecord) -> DbResult<String> {
        info!(id = %shift.id, register = %shift.register_id, fund = %shift.initial_fund, "Opening shift");
        self.service
            .insert(Collection::Shifts, to_record(shift)?)
            .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<ShiftRecord>> {
        self.service
            .get(Collection::Shifts, id)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn require(&self, id: &str) -> DbResult<ShiftRecord> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", id))
    }

    /// The register's most recent shift that has not been closed.
    pub async fn open_for_register(&self, register_id: &str) -> DbResult<Option<ShiftRecord>> {
        let filter = Filter::new()
            .eq("registerId", register_id)
            .order_by("openedAt", SortOrder::Desc);
        let shifts: Vec<ShiftRecord> =
            from_records(self.service.select(Collection::Shifts, &filter).await?)?;
        let open = shifts.into_iter().find(|s| s.status != ShiftStatus::Closed);
        debug!(register = %register_id, found = open.is_some(), "Looked up open shift");
        Ok(open)
    }

    /// Persists status, closing time and Z report.
    pub async fn save(&self, shift: &ShiftRecord) -> DbResult<()> {
        self.service
            .update(Collection::Shifts, &shift.id, to_record(shift)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use mostrador_core::Money;

    fn record(id: &str, status: ShiftStatus, offset_hours: i64) -> ShiftRecord {
        ShiftRecord {
            id: id.to_string(),
            register_id: "caja-1".to_string(),
            status,
            opened_at: Utc::now() - Duration::hours(offset_hours),
            initial_fund: Money::from_major(500),
            closed_at: None,
            z_report: None,
        }
    }

    #[tokio::test]
    async fn test_open_for_register() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().shifts();
        assert!(repo.open_for_register("caja-1").await.unwrap().is_none());

        repo.insert(&record("old", ShiftStatus::Closed, 30))
            .await
            .unwrap();
        repo.insert(&record("cur", ShiftStatus::Open, 2))
            .await
            .unwrap();

        let open = repo.open_for_register("caja-1").await.unwrap().unwrap();
        assert_eq!(open.id, "cur");
        assert!(repo.open_for_register("caja-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_closes_shift() {
        let repo = Database::new(DbConfig::in_memory()).await.unwrap().shifts();
        let mut shift = record("s1", ShiftStatus::Open, 1);
        repo.insert(&shift).await.unwrap();

        shift.status = ShiftStatus::Closed;
        shift.closed_at = Some(Utc::now());
        repo.save(&shift).await.unwrap();

        let stored = repo.require("s1").await.unwrap();
        assert_eq!(stored.status, ShiftStatus::Closed);
        assert!(stored.closed_at.is_some());
        assert!(repo.open_for_register("caja-1").await.unwrap().is_none());
    }
}
