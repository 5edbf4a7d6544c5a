//! # Product Registry
//!
//! Current-state table derived from the history ledger: id → owner, info and
//! suspicious flag. Rows are inserted once and only the owner and flag
//! columns ever change.

use super::entities::Product;
use super::value_objects::{Identity, ProductId};
use crate::errors::LedgerError;
use std::collections::HashMap;

/// Keyed store of product rows.
#[derive(Debug, Clone, Default)]
pub struct ProductRegistry {
    products: HashMap<ProductId, Product>,
}

impl ProductRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `id` has been created.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.products.contains_key(id)
    }

    /// Product row for `id`.
    pub fn get(&self, id: &ProductId) -> Result<&Product, LedgerError> {
        self.products
            .get(id)
            .ok_or_else(|| LedgerError::product_not_found(id))
    }

    /// Insert a new row. The engine checks uniqueness first.
    pub(crate) fn insert(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    /// Move `id` to `owner`.
    pub(crate) fn set_owner(&mut self, id: &ProductId, owner: Identity) {
        if let Some(product) = self.products.get_mut(id) {
            product.current_owner = owner;
        }
    }

    /// Mark `id` suspicious. The latest reason replaces any earlier one;
    /// the flag itself is never cleared.
    pub(crate) fn flag(&mut self, id: &ProductId, reason: String) {
        if let Some(product) = self.products.get_mut(id) {
            product.suspicious = true;
            product.suspicious_reason = reason;
        }
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Returns true if no product exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// All rows, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }
}
