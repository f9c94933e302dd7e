//! # Client Repository
//!
//! Credit clients. The balance is denormalized on the client record and
//! patched after every credit sale, abono or credit note.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use mostrador_core::{Client, Money};

use super::{from_record, from_records, to_record};
use crate::error::{DbError, DbResult};
use crate::service::{Collection, Filter, PersistenceService, SortOrder};

#[derive(Clone)]
pub struct ClientRepository {
    service: Arc<dyn PersistenceService>,
}

impl ClientRepository {
    pub fn new(service: Arc<dyn PersistenceService>) -> Self {
        ClientRepository { service }
    }

    pub async fn insert(&self, client: &Client) -> DbResult<String> {
        debug!(id = %client.id, name = %client.name, "Inserting client");
        self.service
            .insert(Collection::Clients, to_record(client)?)
            .await
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Client>> {
        self.service
            .get(Collection::Clients, id)
            .await?
            .map(from_record)
            .transpose()
    }

    pub async fn require(&self, id: &str) -> DbResult<Client> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Client", id))
    }

    /// All clients sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Client>> {
        let filter = Filter::new().order_by("name", SortOrder::Asc);
        from_records(self.service.select(Collection::Clients, &filter).await?)
    }

    /// Moves the stored balance by `delta` and returns the new balance.
    ///
    /// Reads the record at write time, so a concurrent abono or sale is
    /// never overwritten. The balance never drops below zero.
    pub async fn adjust_balance(&self, id: &str, delta: Money) -> DbResult<Money> {
        let client = self.require(id).await?;
        let balance = (client.current_balance + delta).non_negative();
        self.service
            .update(Collection::Clients, id, json!({ "currentBalance": balance }))
            .await?;
        debug!(id = %id, delta = %delta, balance = %balance, "Client balance adjusted");
        Ok(balance)
    }
}
