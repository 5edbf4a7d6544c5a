//! # Ledger Snapshots
//!
//! JSON export and verified restore of the whole ledger.
//!
//! A snapshot carries the owner, policy, role grant log and every product's
//! full history. Rate-limit state is not exported: it is derived from the
//! history, so restore rebuilds it by replaying all records in commit order
//! (merged across products by timestamp). Product ownership and flags are
//! rebuilt the same way and then compared with the exported values.

use crate::domain::engine::TransitionEngine;
use crate::domain::entities::{HistoryRecord, RoleGrant};
use crate::domain::history::verify_chain;
use crate::domain::invariants::{check_history_starts_with_created, check_single_created};
use crate::domain::policy::{AnomalyPolicy, PolicyError};
use crate::domain::value_objects::{Identity, ProductId, RecordKind, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use thiserror::Error;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Exported product with its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub info: String,
    pub current_owner: Identity,
    pub suspicious: bool,
    pub suspicious_reason: String,
    pub history: Vec<HistoryRecord>,
}

/// Whole-ledger export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub owner: Identity,
    pub policy: AnomalyPolicy,
    pub grants: Vec<RoleGrant>,
    /// Ordered by product id.
    pub products: Vec<ProductSnapshot>,
}

/// Why a snapshot could not be restored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("snapshot belongs to owner {recorded}, configured owner is {configured}")]
    OwnerMismatch {
        configured: Identity,
        recorded: Identity,
    },

    #[error("malformed snapshot: {0}")]
    Serialization(String),

    #[error("grant log out of order: expected sequence {expected}, found {found}")]
    GrantSequence { expected: u64, found: u64 },

    #[error("product {0} appears more than once")]
    DuplicateProduct(ProductId),

    #[error("product {0} must have exactly one Created record, at index 0")]
    MalformedHistory(ProductId),

    #[error("history of {product_id} is broken at index {index}")]
    BrokenChain { product_id: ProductId, index: usize },

    #[error("info of {0} does not match its Created record")]
    InfoMismatch(ProductId),

    #[error("record {index} of {product_id} was written by {actor} while {owner} held it")]
    OwnershipMismatch {
        product_id: ProductId,
        index: usize,
        actor: Identity,
        owner: Identity,
    },

    #[error("exported owner or flag of {0} does not match its history")]
    StateMismatch(ProductId),
}

impl LedgerSnapshot {
    /// Export the committed state of `engine`.
    #[must_use]
    pub fn capture(engine: &TransitionEngine) -> Self {
        let query = engine.query();
        let mut products: Vec<ProductSnapshot> = query
            .products()
            .map(|product| ProductSnapshot {
                id: product.id.clone(),
                info: product.info.clone(),
                current_owner: product.current_owner,
                suspicious: product.suspicious,
                suspicious_reason: product.suspicious_reason.clone(),
                history: query.history(&product.id).unwrap_or_default(),
            })
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            version: SNAPSHOT_VERSION,
            owner: query.registry_owner(),
            policy: engine.policy().clone(),
            grants: query.role_grants(0).to_vec(),
            products,
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }

    /// Rebuild an engine, verifying every history on the way.
    pub fn restore(&self) -> Result<TransitionEngine, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(self.version));
        }
        let mut engine = TransitionEngine::new(self.owner, self.policy.clone())?;

        for (expected, grant) in self.grants.iter().enumerate() {
            let expected = expected as u64;
            if grant.sequence != expected {
                return Err(SnapshotError::GrantSequence {
                    expected,
                    found: grant.sequence,
                });
            }
            engine.replay_grant(grant);
        }

        let mut seen = HashSet::new();
        for product in &self.products {
            if !seen.insert(&product.id) {
                return Err(SnapshotError::DuplicateProduct(product.id.clone()));
            }
            check_product(product)?;
        }

        // Merge per-product histories by timestamp, keeping each product's
        // own order intact.
        let mut cursors = vec![0usize; self.products.len()];
        let mut heap: BinaryHeap<Reverse<(Timestamp, usize)>> = self
            .products
            .iter()
            .enumerate()
            .map(|(i, p)| Reverse((p.history[0].timestamp, i)))
            .collect();

        while let Some(Reverse((_, i))) = heap.pop() {
            let product = &self.products[i];
            let record = &product.history[cursors[i]];
            let replayed = engine.replay_record(&product.id, record);
            if replayed.receipt.record_hash != record.record_hash {
                return Err(SnapshotError::BrokenChain {
                    product_id: product.id.clone(),
                    index: record.index,
                });
            }
            cursors[i] += 1;
            if let Some(next) = product.history.get(cursors[i]) {
                heap.push(Reverse((next.timestamp, i)));
            }
        }

        let query = engine.query();
        for product in &self.products {
            let view = query
                .get_product(&product.id)
                .map_err(|_| SnapshotError::MalformedHistory(product.id.clone()))?;
            if view.current_owner != product.current_owner
                || view.suspicious != product.suspicious
                || view.suspicious_reason != product.suspicious_reason
            {
                return Err(SnapshotError::StateMismatch(product.id.clone()));
            }
        }

        Ok(engine)
    }
}

/// Structural checks on one product's exported history.
fn check_product(product: &ProductSnapshot) -> Result<(), SnapshotError> {
    let records = &product.history;
    if !check_history_starts_with_created(records) || !check_single_created(records) {
        return Err(SnapshotError::MalformedHistory(product.id.clone()));
    }

    let report = verify_chain(&product.id, records);
    if let Some(index) = report.first_invalid {
        return Err(SnapshotError::BrokenChain {
            product_id: product.id.clone(),
            index,
        });
    }

    let created = &records[0];
    if created.note != product.info {
        return Err(SnapshotError::InfoMismatch(product.id.clone()));
    }

    let mut owner = created.new_owner;
    if created.actor != owner {
        return Err(SnapshotError::OwnershipMismatch {
            product_id: product.id.clone(),
            index: 0,
            actor: created.actor,
            owner,
        });
    }
    for record in &records[1..] {
        if record.actor != owner {
            return Err(SnapshotError::OwnershipMismatch {
                product_id: product.id.clone(),
                index: record.index,
                actor: record.actor,
                owner,
            });
        }
        if record.kind == RecordKind::Transferred {
            owner = record.new_owner;
        }
    }
    Ok(())
}
