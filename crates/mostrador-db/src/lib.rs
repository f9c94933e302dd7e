//! # mostrador-db: Persistence Layer for Mostrador POS
//!
//! The register's persistence service: named collections of JSON records
//! stored in a local SQLite file through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mostrador Data Flow                              │
//! │                                                                         │
//! │  Terminal operation (checkout, abono, Z cut)                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  mostrador-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Repositories  │    │ Persistence   │    │  Migrations  │  │   │
//! │  │   │               │───►│ Service       │    │  (embedded)  │  │   │
//! │  │   │ ProductRepo   │    │ (service.rs)  │    │              │  │   │
//! │  │   │ SaleRepo      │    │      │        │    │ 001_documents│  │   │
//! │  │   │ ClientRepo    │    │      ▼        │    │              │  │   │
//! │  │   │ MovementRepo  │    │ SQLite store  │    │              │  │   │
//! │  │   │ ShiftRepo     │    │ (store.rs)    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (data dir)/mostrador.db                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - The `PersistenceService` contract, collections, filters
//! - [`store`] - SQLite implementation of the contract
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Typed repositories over the service
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mostrador_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/mostrador.db")).await?;
//! let tickets = db.sales().open_credit_tickets("client-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use service::{Collection, Filter, PersistenceService, SortOrder};

// Repository re-exports for convenience
pub use repository::{
    ClientRepository, MovementRepository, ProductRepository, SaleRepository, ShiftRepository,
};
