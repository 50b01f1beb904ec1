//! Catalog collaborator contract.

use async_trait::async_trait;

use walletd_common::ProductId;
use walletd_store::{Product, ProductStore};

/// Read-only price oracle consumed by the engine for purchases.
///
/// The catalog owns its own data; the engine never writes to it.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Look up a product. `None` means the product does not exist.
    async fn lookup(&self, id: &ProductId) -> Option<Product>;
}

#[async_trait]
impl Catalog for ProductStore {
    async fn lookup(&self, id: &ProductId) -> Option<Product> {
        self.get(id)
    }
}
