//! Shopping cart persisted in the shared store
//!
//! The cart lives under the `cart` key as a JSON array, so every instance
//! sharing the store sees the same items. A cart that fails to parse is
//! treated as empty and overwritten on the next change.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{Storage, StorageError};

/// Storage key holding the cart
pub const CART_KEY: &str = "cart";

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to encode cart: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One product line in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    /// Price of one unit in minor currency units
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, unit_price: i64) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity: 1,
            image: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn subtotal(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }
}

/// Storage-backed cart
pub struct CartStore {
    storage: Arc<dyn Storage>,
}

impl CartStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Returns the persisted items
    pub fn items(&self) -> Vec<CartItem> {
        let raw = match self.storage.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::debug!("Cart unavailable: {}", e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable cart: {}", e);
            Vec::new()
        })
    }

    /// Adds an item, merging quantities with an existing line for the same product
    pub fn add(&self, item: CartItem) -> Result<Vec<CartItem>, CartError> {
        if item.quantity == 0 {
            return Ok(self.items());
        }

        let mut items = self.items();
        match items.iter_mut().find(|i| i.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                existing.unit_price = item.unit_price;
            }
            None => items.push(item),
        }
        self.save(items)
    }

    /// Removes a product line
    pub fn remove(&self, product_id: &str) -> Result<Vec<CartItem>, CartError> {
        let mut items = self.items();
        items.retain(|i| i.product_id != product_id);
        self.save(items)
    }

    /// Sets the quantity of a product line; zero removes it
    pub fn update_quantity(&self, product_id: &str, quantity: u32) -> Result<Vec<CartItem>, CartError> {
        if quantity == 0 {
            return self.remove(product_id);
        }

        let mut items = self.items();
        if let Some(item) = items.iter_mut().find(|i| i.product_id == product_id) {
            item.quantity = quantity;
        }
        self.save(items)
    }

    pub fn clear(&self) -> Result<(), CartError> {
        self.storage.remove(CART_KEY)?;
        Ok(())
    }

    /// Total number of units across all lines
    pub fn count(&self) -> u32 {
        self.items().iter().map(|i| i.quantity).fold(0, u32::saturating_add)
    }

    /// Total price in minor currency units
    pub fn total(&self) -> i64 {
        self.items().iter().map(CartItem::subtotal).fold(0, i64::saturating_add)
    }

    fn save(&self, items: Vec<CartItem>) -> Result<Vec<CartItem>, CartError> {
        if items.is_empty() {
            self.storage.remove(CART_KEY)?;
        } else {
            self.storage.set(CART_KEY, &serde_json::to_string(&items)?)?;
        }
        Ok(items)
    }
}
