//! # Query Facade
//!
//! Read-only projection over committed state. Borrowing the stores
//! immutably means a query can never observe a half-applied transition.

use super::anomaly::{AnomalyDetector, RateStatus};
use super::entities::{
    HistoryRecord, HistoryVerification, Product, ProductView, RoleAssignment, RoleGrant,
};
use super::history::HistoryLedger;
use super::registry::ProductRegistry;
use super::roles::RoleRegistry;
use super::value_objects::{Identity, ProductId, Role, Timestamp};
use crate::errors::LedgerError;

/// Borrowed read view of the ledger.
#[derive(Debug, Clone, Copy)]
pub struct QueryFacade<'a> {
    roles: &'a RoleRegistry,
    products: &'a ProductRegistry,
    history: &'a HistoryLedger,
    detector: &'a AnomalyDetector,
}

impl<'a> QueryFacade<'a> {
    pub(crate) fn new(
        roles: &'a RoleRegistry,
        products: &'a ProductRegistry,
        history: &'a HistoryLedger,
        detector: &'a AnomalyDetector,
    ) -> Self {
        Self {
            roles,
            products,
            history,
            detector,
        }
    }

    // --- roles ---

    /// Role of `identity`, `Role::None` if never granted.
    #[must_use]
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.roles.role_of(identity)
    }

    /// The registry owner.
    #[must_use]
    pub fn registry_owner(&self) -> Identity {
        self.roles.owner()
    }

    #[must_use]
    pub fn members_of(&self, role: Role) -> Vec<Identity> {
        self.roles.members_of(role)
    }

    #[must_use]
    pub fn role_assignments(&self) -> Vec<RoleAssignment> {
        self.roles.assignments()
    }

    /// Grant log entries with `sequence >= from`.
    #[must_use]
    pub fn role_grants(&self, from: u64) -> &'a [RoleGrant] {
        let grants = self.roles.grants();
        let start = usize::try_from(from).map_or(grants.len(), |n| n.min(grants.len()));
        &grants[start..]
    }

    // --- products ---

    /// Product row plus its history length.
    pub fn get_product(&self, product_id: &ProductId) -> Result<ProductView, LedgerError> {
        let product = self.products.get(product_id)?;
        self.view(product)
    }

    pub fn is_product_suspicious(&self, product_id: &ProductId) -> Result<bool, LedgerError> {
        Ok(self.products.get(product_id)?.suspicious)
    }

    /// Latest classification reason, empty if the product was never flagged.
    pub fn suspicious_reason(&self, product_id: &ProductId) -> Result<String, LedgerError> {
        Ok(self.products.get(product_id)?.suspicious_reason.clone())
    }

    /// Every flagged product, ordered by id.
    #[must_use]
    pub fn suspicious_products(&self) -> Vec<ProductView> {
        let mut flagged: Vec<ProductView> = self
            .products
            .iter()
            .filter(|product| product.suspicious)
            .filter_map(|product| self.view(product).ok())
            .collect();
        flagged.sort_by(|a, b| a.id.cmp(&b.id));
        flagged
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    // --- history ---

    pub fn history_length(&self, product_id: &ProductId) -> Result<usize, LedgerError> {
        self.history.len(product_id)
    }

    pub fn history_record(&self, product_id: &ProductId, index: usize) -> Result<HistoryRecord, LedgerError> {
        self.history.get(product_id, index).cloned()
    }

    /// Full history in append order.
    pub fn history(&self, product_id: &ProductId) -> Result<Vec<HistoryRecord>, LedgerError> {
        self.history.records(product_id).map(<[HistoryRecord]>::to_vec)
    }

    pub fn verify_history(&self, product_id: &ProductId) -> Result<HistoryVerification, LedgerError> {
        self.history.verify(product_id)
    }

    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.history.total_records()
    }

    // --- rate limits ---

    /// Where `identity` stands against the admission limits at `now`.
    #[must_use]
    pub fn rate_status(&self, identity: &Identity, now: Timestamp) -> RateStatus {
        self.detector.status(identity, now)
    }

    /// Product rows, in no particular order.
    pub(crate) fn products(&self) -> impl Iterator<Item = &'a Product> {
        self.products.iter()
    }

    fn view(&self, product: &Product) -> Result<ProductView, LedgerError> {
        Ok(ProductView {
            id: product.id.clone(),
            info: product.info.clone(),
            current_owner: product.current_owner,
            history_count: self.history.len(&product.id)?,
            suspicious: product.suspicious,
            suspicious_reason: product.suspicious_reason.clone(),
        })
    }
}
