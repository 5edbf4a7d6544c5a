//! # Driving Ports (API - Inbound)
//!
//! The method surface a UI or request handler uses. Every write carries an
//! explicit [`RequestContext`]; reads never need one except `rate_status`,
//! which is evaluated at a caller-chosen time.

use crate::domain::anomaly::RateStatus;
use crate::domain::entities::{
    HistoryRecord, HistoryVerification, ProductView, RequestContext, RoleAssignment, RoleGrant,
    TransitionReceipt,
};
use crate::domain::value_objects::{Identity, ProductId, Role, RoleCode, Timestamp};
use crate::errors::LedgerError;
use async_trait::async_trait;

/// Custody ledger API.
#[async_trait]
pub trait CustodyLedgerApi: Send + Sync {
    // --- writes ---

    /// Assign a role. Registry owner only.
    async fn grant_role(
        &self,
        ctx: RequestContext,
        identity: Identity,
        role_code: RoleCode,
    ) -> Result<RoleGrant, LedgerError>;

    async fn create_product(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        info: String,
    ) -> Result<TransitionReceipt, LedgerError>;

    async fn transfer_product(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        to: Identity,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError>;

    async fn record_warranty(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError>;

    async fn record_repair(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError>;

    // --- roles ---

    async fn role_of(&self, identity: Identity) -> Role;

    /// The fixed registry administrator.
    async fn registry_owner(&self) -> Identity;

    async fn members_of(&self, role: Role) -> Vec<Identity>;

    async fn role_assignments(&self) -> Vec<RoleAssignment>;

    /// Grant log from `from` onward.
    async fn role_grants(&self, from: u64) -> Vec<RoleGrant>;

    // --- products and history ---

    async fn get_product(&self, product_id: &ProductId) -> Result<ProductView, LedgerError>;

    async fn is_product_suspicious(&self, product_id: &ProductId) -> Result<bool, LedgerError>;

    async fn suspicious_reason(&self, product_id: &ProductId) -> Result<String, LedgerError>;

    async fn history_length(&self, product_id: &ProductId) -> Result<usize, LedgerError>;

    async fn history_record(
        &self,
        product_id: &ProductId,
        index: usize,
    ) -> Result<HistoryRecord, LedgerError>;

    async fn history(&self, product_id: &ProductId) -> Result<Vec<HistoryRecord>, LedgerError>;

    async fn verify_history(&self, product_id: &ProductId)
        -> Result<HistoryVerification, LedgerError>;

    async fn suspicious_products(&self) -> Vec<ProductView>;

    // --- rate limits ---

    async fn rate_status(&self, identity: Identity, now: Timestamp) -> RateStatus;
}
