//! # Domain Entities
//!
//! Products, history records and the request context every write carries.

use super::value_objects::{Hash, Identity, ProductId, RecordKind, Role, Timestamp};
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUEST CONTEXT
// =============================================================================

/// Caller and commit time of a write.
///
/// Both are supplied by the harness that submits the request, never read
/// from ambient state inside the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Submitting identity.
    pub caller: Identity,
    /// Commit time (unix seconds).
    pub now: Timestamp,
}

impl RequestContext {
    /// Build a context.
    #[must_use]
    pub fn new(caller: Identity, now: Timestamp) -> Self {
        Self { caller, now }
    }
}

// =============================================================================
// PRODUCT
// =============================================================================

/// Current-state row for one product.
///
/// `id` and `info` never change. `current_owner` and the suspicious fields
/// are written only by the transition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique key.
    pub id: ProductId,
    /// Free-text descriptor given at creation.
    pub info: String,
    /// Identity currently holding the product.
    pub current_owner: Identity,
    /// Set once any classification rule fires; never cleared.
    pub suspicious: bool,
    /// Latest classification reason, empty while not suspicious.
    pub suspicious_reason: String,
}

impl Product {
    /// A freshly created, unflagged product.
    #[must_use]
    pub fn new(id: ProductId, info: String, owner: Identity) -> Self {
        Self {
            id,
            info,
            current_owner: owner,
            suspicious: false,
            suspicious_reason: String::new(),
        }
    }
}

/// Read model returned by `getProduct`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub info: String,
    pub current_owner: Identity,
    pub history_count: usize,
    pub suspicious: bool,
    pub suspicious_reason: String,
}

// =============================================================================
// HISTORY RECORD
// =============================================================================

/// One immutable entry of a product's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Transition kind.
    pub kind: RecordKind,
    /// Identity that performed the transition.
    pub actor: Identity,
    /// Commit time (unix seconds).
    pub timestamp: Timestamp,
    /// Free-text note (the product info for `Created`).
    pub note: String,
    /// New owner for `Created`/`Transferred`, zero otherwise.
    pub new_owner: Identity,
    /// Position in the product's history.
    pub index: usize,
    /// Hash of the previous record (zero for index 0).
    pub prev_hash: Hash,
    /// Keccak-256 over `prev_hash` and this record's fields.
    pub record_hash: Hash,
}

/// Outcome of an accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub product_id: ProductId,
    pub kind: RecordKind,
    /// Index of the appended record.
    pub index: usize,
    /// Hash of the appended record.
    pub record_hash: Hash,
    /// Owner after the transition.
    pub owner: Identity,
    /// Reason raised by classification during this transition, if any.
    pub flagged: Option<String>,
}

/// Result of re-walking a product's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryVerification {
    pub product_id: ProductId,
    pub length: usize,
    /// Hash of the last record, when the chain is intact.
    pub head: Option<Hash>,
    /// First index whose stored hash or linkage is wrong.
    pub first_invalid: Option<usize>,
}

impl HistoryVerification {
    /// Returns true when every record links and hashes correctly.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.first_invalid.is_none()
    }
}

// =============================================================================
// ROLE GRANTS
// =============================================================================

/// One entry of the append-only role grant log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Position in the grant log.
    pub sequence: u64,
    pub identity: Identity,
    pub role: Role,
    pub granted_at: Timestamp,
}

/// Current role of one identity, as listed for the registry owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub identity: Identity,
    pub role: Role,
}
