//! # Product Repository
//!
//! Catalog lookups for the scanner and stock adjustments for the kardex.
//!
//! ## Code Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scanner reads "7501035911208"                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. record id         ─► Unit                                          │
//! │  2. sku / shortCode   ─► Unit          (indexed json fields)           │
//! │  3. packBarcode       ─► LegacyPack                                    │
//! │  4. scan active catalog with pricing::resolve_code                     │
//! │     (presentation barcodes, extra unit barcodes)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Some((Product, LineVariant)) or None                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use mostrador_core::pricing::{resolve_code, LineVariant};
use mostrador_core::{Product, Quantity};

use super::{from_record, from_records, to_record};
use crate::error::{DbError, DbResult};
use crate::service::{Collection, Filter, PersistenceService, SortOrder};

/// Repository for catalog records.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// if let Some((product, variant)) = repo.resolve_code("7501035911208").await? {
///     cart.add_line(&product, Quantity::from_units(1), variant)?;
/// }
/// ```
#[derive(Clone)]
pub struct ProductRepository {
    service: Arc<dyn PersistenceService>,
}

impl ProductRepository {
    pub fn new(service: Arc<dyn PersistenceService>) -> Self {
        ProductRepository { service }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        self.service
            .get(Collection::Products, id)
            .await?
            .map(from_record)
            .transpose()
    }

    /// Like [`get`](Self::get), but a missing product is an error.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn insert(&self, product: &Product) -> DbResult<String> {
        debug!(id = %product.id, name = %product.name, "Inserting product");
        self.service
            .insert(Collection::Products, to_record(product)?)
            .await
    }

    /// Active products sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let filter = Filter::new()
            .eq("isActive", true)
            .order_by("name", SortOrder::Asc);
        from_records(self.service.select(Collection::Products, &filter).await?)
    }

    pub async fn count(&self) -> DbResult<usize> {
        Ok(self
            .service
            .select(Collection::Products, &Filter::new())
            .await?
            .len())
    }

    /// Resolves a scanned or typed code to a product and the variant it
    /// stands for. Inactive products never resolve.
    pub async fn resolve_code(&self, code: &str) -> DbResult<Option<(Product, LineVariant)>> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(None);
        }

        if let Some(product) = self.get(code).await? {
            if product.is_active {
                return Ok(Some((product, LineVariant::Unit)));
            }
        }

        for field in ["sku", "shortCode", "packBarcode"] {
            let filter = Filter::new().eq(field, code).eq("isActive", true).limit(1);
            if let Some(record) = self
                .service
                .select(Collection::Products, &filter)
                .await?
                .into_iter()
                .next()
            {
                let product: Product = from_record(record)?;
                if let Some(variant) = resolve_code(&product, code) {
                    debug!(code = %code, product = %product.id, "Code resolved by {}", field);
                    return Ok(Some((product, variant)));
                }
            }
        }

        let found = self
            .list_active()
            .await?
            .into_iter()
            .find_map(|p| resolve_code(&p, code).map(|v| (p, v)));
        if found.is_none() {
            debug!(code = %code, "Code did not resolve");
        }
        Ok(found)
    }

    /// Applies a signed stock delta (base units) and returns the new stock.
    pub async fn adjust_stock(&self, id: &str, delta: Quantity) -> DbResult<Quantity> {
        let product = self.require(id).await?;
        let stock = product.stock + delta;
        self.service
            .update(Collection::Products, id, json!({ "stock": stock }))
            .await?;
        debug!(id = %id, delta = %delta.as_f64(), stock = %stock.as_f64(), "Stock adjusted");
        Ok(stock)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use mostrador_core::types::Presentation;
    use mostrador_core::Money;

    async fn repo() -> ProductRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
    }

    fn cement() -> Product {
        let mut product = Product::basic("p-cem", "Cemento 50kg", Money::from_major(250));
        product.sku = Some("CEM50".to_string());
        product.pack_price = Some(Money::from_major(2300));
        product.pack_quantity = Some(10);
        product.pack_barcode = Some("PACK-CEM".to_string());
        product.presentations.push(Presentation {
            id: "half".to_string(),
            name: "Medio bulto".to_string(),
            quantity: 1,
            price: Money::from_major(130),
            barcode: Some("CEM-HALF".to_string()),
        });
        product
    }

    #[tokio::test]
    async fn test_insert_and_require() {
        let repo = repo().await;
        repo.insert(&cement()).await.unwrap();

        let product = repo.require("p-cem").await.unwrap();
        assert_eq!(product.price, Money::from_major(250));
        assert!(matches!(
            repo.require("missing").await,
            Err(DbError::NotFound { .. })
        ));
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resolve_code_variants() {
        let repo = repo().await;
        repo.insert(&cement()).await.unwrap();

        let (_, variant) = repo.resolve_code("CEM50").await.unwrap().unwrap();
        assert_eq!(variant, LineVariant::Unit);

        let (_, variant) = repo.resolve_code("PACK-CEM").await.unwrap().unwrap();
        assert_eq!(variant, LineVariant::LegacyPack);

        let (_, variant) = repo.resolve_code(" CEM-HALF ").await.unwrap().unwrap();
        assert_eq!(variant, LineVariant::Presentation("half".to_string()));

        assert!(repo.resolve_code("nothing").await.unwrap().is_none());
        assert!(repo.resolve_code("").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_inactive_products_hidden() {
        let repo = repo().await;
        let mut product = cement();
        product.is_active = false;
        repo.insert(&product).await.unwrap();

        assert!(repo.resolve_code("p-cem").await.unwrap().is_none());
        assert!(repo.resolve_code("CEM50").await.unwrap().is_none());
        assert!(repo.list_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_stock() {
        let repo = repo().await;
        let mut product = cement();
        product.stock = Quantity::from_units(20);
        repo.insert(&product).await.unwrap();

        let stock = repo
            .adjust_stock("p-cem", Quantity::from_units(-10))
            .await
            .unwrap();
        assert_eq!(stock, Quantity::from_units(10));
        assert_eq!(
            repo.require("p-cem").await.unwrap().stock,
            Quantity::from_units(10)
        );
    }
}
