//! # Persistence Service
//!
//! The storage contract the register depends on: create, read, update and
//! delete over named collections of JSON records.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PersistenceService                                                     │
//! │                                                                         │
//! │  insert(collection, record)      → id   (record["id"] or a new uuid)   │
//! │  update(collection, id, patch)   → ()   (JSON merge-patch, RFC 7396)   │
//! │  select(collection, &Filter)     → [record]                            │
//! │  delete(collection, id)          → ()                                  │
//! │  get(collection, id)             → Option<record>     (provided)       │
//! │                                                                         │
//! │  Every call either acknowledges or fails. Callers never assume a write │
//! │  landed without the Ok.                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The SQLite implementation lives in [`crate::store`]; anything else that
//! can honour the contract (a hosted backend, an in-memory fake) plugs in as
//! `Arc<dyn PersistenceService>`.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DbError, DbResult};

// =============================================================================
// Collections
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Products,
    Sales,
    Clients,
    InventoryMovements,
    CashMovements,
    CalendarEvents,
    ProductFitment,
    Shifts,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Products,
        Collection::Sales,
        Collection::Clients,
        Collection::InventoryMovements,
        Collection::CashMovements,
        Collection::CalendarEvents,
        Collection::ProductFitment,
        Collection::Shifts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Sales => "sales",
            Collection::Clients => "clients",
            Collection::InventoryMovements => "inventory_movements",
            Collection::CashMovements => "cash_movements",
            Collection::CalendarEvents => "calendar_events",
            Collection::ProductFitment => "product_fitment",
            Collection::Shifts => "shifts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Filter
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Equality conditions over top-level record fields, with optional order
/// and limit.
///
/// ## Example
/// ```rust
/// use mostrador_db::{Filter, SortOrder};
///
/// let filter = Filter::new()
///     .eq("clientId", "c1")
///     .eq("paymentMethod", "credit")
///     .order_by("date", SortOrder::Asc)
///     .limit(50);
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
    order_by: Option<(String, SortOrder)>,
    limit: Option<u32>,
}

impl Filter {
    /// Matches every record in the collection.
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn ordering(&self) -> Option<(&str, SortOrder)> {
        self.order_by.as_ref().map(|(f, o)| (f.as_str(), *o))
    }

    pub fn max_rows(&self) -> Option<u32> {
        self.limit
    }

    /// Checks field names before they are spliced into a JSON path.
    pub fn validate(&self) -> DbResult<()> {
        let fields = self
            .conditions
            .iter()
            .map(|(f, _)| f.as_str())
            .chain(self.order_by.iter().map(|(f, _)| f.as_str()));
        for field in fields {
            validate_field(field)?;
        }
        for (field, value) in &self.conditions {
            if value.is_array() || value.is_object() {
                return Err(DbError::InvalidFilter(format!(
                    "{field}: only scalar values can be compared"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_field(field: &str) -> DbResult<()> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::InvalidFilter(format!(
            "field name '{field}' must match [A-Za-z0-9_]"
        )));
    }
    Ok(())
}

// =============================================================================
// Service Trait
// =============================================================================

#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Stores a new record and returns its id.
    async fn insert(&self, collection: Collection, record: Value) -> DbResult<String>;

    /// Merges `patch` into the stored record.
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> DbResult<()>;

    async fn select(&self, collection: Collection, filter: &Filter) -> DbResult<Vec<Value>>;

    async fn delete(&self, collection: Collection, id: &str) -> DbResult<()>;

    async fn get(&self, collection: Collection, id: &str) -> DbResult<Option<Value>> {
        let filter = Filter::new().eq("id", id).limit(1);
        Ok(self.select(collection, &filter).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::InventoryMovements.as_str(), "inventory_movements");
        assert_eq!(Collection::ProductFitment.to_string(), "product_fitment");
        assert_eq!(Collection::ALL.len(), 8);
    }

    #[test]
    fn test_filter_field_names() {
        assert!(Filter::new().eq("shiftId", "s1").validate().is_ok());
        assert!(Filter::new().eq("bad'field", 1).validate().is_err());
        assert!(Filter::new()
            .order_by("date) --", SortOrder::Asc)
            .validate()
            .is_err());
        assert!(Filter::new()
            .eq("items", serde_json::json!([1]))
            .validate()
            .is_err());
    }
}
