//! # Repository Module
//!
//! Typed access to the document collections.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Terminal operation                                                    │
//! │       │                                                                 │
//! │       │  db.sales().open_credit_tickets("c1")                          │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── insert(&sale)                                                     │
//! │  ├── by_shift(shift_id)                                                │
//! │  └── update_balance(&sale)                                             │
//! │       │                                                                 │
//! │       │  Filter + serde_json records                                   │
//! │       ▼                                                                 │
//! │  Arc<dyn PersistenceService>  (SQLite store, or any other backend)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog lookup and stock adjustments
//! - [`SaleRepository`] - Tickets, credit balances, shift closure marks
//! - [`ClientRepository`] - Credit clients
//! - [`MovementRepository`] - Cash and inventory (kardex) movements
//! - [`ShiftRepository`] - Shift rows and Z reports

pub mod client;
pub mod movement;
pub mod product;
pub mod sale;
pub mod shift;

pub use client::ClientRepository;
pub use movement::MovementRepository;
pub use product::ProductRepository;
pub use sale::SaleRepository;
pub use shift::ShiftRepository;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::DbResult;

pub(crate) fn to_record<T: Serialize>(value: &T) -> DbResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub(crate) fn from_record<T: DeserializeOwned>(record: Value) -> DbResult<T> {
    Ok(serde_json::from_value(record)?)
}

pub(crate) fn from_records<T: DeserializeOwned>(records: Vec<Value>) -> DbResult<Vec<T>> {
    records.into_iter().map(from_record).collect()
}
