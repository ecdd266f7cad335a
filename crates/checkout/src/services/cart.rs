//! Cart service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::UserId;
use domain::CartItem;

use crate::error::ServiceError;

/// Trait for reading and clearing a user's cart.
#[async_trait]
pub trait CartService: Send + Sync {
    /// Returns the items in the user's cart. An unknown user has an empty cart.
    async fn get_cart(&self, user_id: &UserId) -> Result<Vec<CartItem>, ServiceError>;

    /// Removes every item from the user's cart.
    async fn empty_cart(&self, user_id: &UserId) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartItem>>,
    fail_on_get: bool,
    fail_on_empty: bool,
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates an in-memory cart service with no carts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `item` to the user's cart, merging quantities of the same product.
    ///
    /// Fails, leaving the cart unchanged, if the merged quantity overflows.
    pub fn add_item(&self, user_id: impl Into<UserId>, item: CartItem) -> Result<(), ServiceError> {
        let mut state = self.write();
        let cart = state.carts.entry(user_id.into()).or_default();
        match cart.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.checked_add(item.quantity).ok_or_else(|| {
                    ServiceError::InvalidArgument(format!(
                        "quantity of {} overflows",
                        item.product_id
                    ))
                })?;
            }
            None => cart.push(item),
        }
        Ok(())
    }

    /// Configures get_cart calls to fail.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.write().fail_on_get = fail;
    }

    /// Configures empty_cart calls to fail.
    pub fn set_fail_on_empty(&self, fail: bool) {
        self.write().fail_on_empty = fail;
    }

    /// Returns a copy of the user's cart.
    pub fn cart(&self, user_id: &UserId) -> Vec<CartItem> {
        self.read().carts.get(user_id).cloned().unwrap_or_default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryCartState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryCartState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CartService for InMemoryCartService {
    async fn get_cart(&self, user_id: &UserId) -> Result<Vec<CartItem>, ServiceError> {
        let state = self.read();
        if state.fail_on_get {
            return Err(ServiceError::Unavailable("cart store unreachable".to_string()));
        }
        Ok(state.carts.get(user_id).cloned().unwrap_or_default())
    }

    async fn empty_cart(&self, user_id: &UserId) -> Result<(), ServiceError> {
        let mut state = self.write();
        if state.fail_on_empty {
            return Err(ServiceError::Unavailable("cart store unreachable".to_string()));
        }
        state.carts.remove(user_id);
        Ok(())
    }
}
