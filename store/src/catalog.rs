//! Product catalog store.
//!
//! Plain key-value lookup with no invariants of its own; the transfer
//! engine consumes it as a read-only price oracle.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use walletd_common::{Amount, ProductId};

/// A catalog product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned identifier.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Price in minor currency units.
    pub price: Amount,
    /// Free-form description.
    pub description: String,
}

/// In-memory product catalog.
pub struct ProductStore {
    products: DashMap<ProductId, Product>,
    next_id: AtomicU64,
}

impl ProductStore {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Add a product, assigning its id.
    pub fn insert(&self, name: String, price: Amount, description: String) -> Product {
        let id = ProductId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let product = Product {
            id,
            name,
            price,
            description,
        };
        self.products.insert(id, product.clone());
        info!(product_id = %id, price = %price, "product added");
        product
    }

    /// Look up a product by id.
    pub fn get(&self, id: &ProductId) -> Option<Product> {
        self.products.get(id).map(|p| p.clone())
    }

    /// All products, ordered by id.
    pub fn list(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.products.iter().map(|p| p.clone()).collect();
        products.sort_by_key(|p| p.id);
        products
    }
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}
