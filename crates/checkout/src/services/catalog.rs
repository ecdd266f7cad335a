//! Product catalog trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::ProductId;
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price_usd: Money,
}

/// Trait for product lookups.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, Product>,
    lookups: usize,
    fail_on_get: bool,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogService {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn add_product(&self, id: impl Into<ProductId>, name: impl Into<String>, price_usd: Money) {
        let id = id.into();
        let product = Product {
            id: id.clone(),
            name: name.into(),
            price_usd,
        };
        self.write().products.insert(id, product);
    }

    /// Configures every lookup to fail.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.write().fail_on_get = fail;
    }

    pub fn product_count(&self) -> usize {
        self.read().products.len()
    }

    /// Number of get_product calls received.
    pub fn lookup_count(&self) -> usize {
        self.read().lookups
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryCatalogState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryCatalogState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn get_product(&self, product_id: &ProductId) -> Result<Product, ServiceError> {
        let mut state = self.write();
        state.lookups += 1;
        if state.fail_on_get {
            return Err(ServiceError::Unavailable("catalog unreachable".to_string()));
        }
        state
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("product {product_id}")))
    }
}
