//! # History Ledger
//!
//! Append-only, per-product sequence of history records.
//!
//! Records are never edited or removed. Each record is chained to its
//! predecessor by hash, so any edit to a stored or exported history is
//! detectable by [`HistoryLedger::verify`].
//!
//! ```text
//! record_hash[i] = keccak256(prev_hash[i] ‖ product_id ‖ i ‖ kind ‖ actor ‖ timestamp ‖ new_owner ‖ note)
//! prev_hash[0]   = 0x00…00
//! prev_hash[i]   = record_hash[i-1]
//! ```

use super::entities::{HistoryRecord, HistoryVerification};
use super::value_objects::{Hash, Identity, ProductId, RecordKind, Timestamp};
use crate::errors::{LedgerError, NotFoundKind};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;

/// Hash linking the first record of every product.
pub const GENESIS_PREV_HASH: Hash = [0u8; 32];

/// Fields of a record before it is positioned and hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
    pub kind: RecordKind,
    pub actor: Identity,
    pub timestamp: Timestamp,
    pub note: String,
    pub new_owner: Identity,
}

/// Compute the chained hash of a record.
#[must_use]
pub fn compute_record_hash(
    product_id: &ProductId,
    index: usize,
    prev_hash: &Hash,
    record: &PendingRecord,
) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(prev_hash);
    // Length prefixes keep variable-size fields unambiguous.
    hasher.update((product_id.as_str().len() as u64).to_be_bytes());
    hasher.update(product_id.as_str().as_bytes());
    hasher.update((index as u64).to_be_bytes());
    hasher.update([record.kind.tag()]);
    hasher.update(record.actor.as_bytes());
    hasher.update(record.timestamp.to_be_bytes());
    hasher.update(record.new_owner.as_bytes());
    hasher.update((record.note.len() as u64).to_be_bytes());
    hasher.update(record.note.as_bytes());
    hasher.finalize().into()
}

/// Append-only store of every product's history.
#[derive(Debug, Clone, Default)]
pub struct HistoryLedger {
    chains: HashMap<ProductId, Vec<HistoryRecord>>,
    total_records: u64,
}

impl HistoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to `product_id`'s history and return it.
    ///
    /// Never fails: the caller has already validated the transition.
    pub fn append(&mut self, product_id: &ProductId, pending: PendingRecord) -> HistoryRecord {
        let chain = self.chains.entry(product_id.clone()).or_default();
        let index = chain.len();
        let prev_hash = chain.last().map_or(GENESIS_PREV_HASH, |r| r.record_hash);
        let record_hash = compute_record_hash(product_id, index, &prev_hash, &pending);

        let record = HistoryRecord {
            kind: pending.kind,
            actor: pending.actor,
            timestamp: pending.timestamp,
            note: pending.note,
            new_owner: pending.new_owner,
            index,
            prev_hash,
            record_hash,
        };
        chain.push(record.clone());
        self.total_records += 1;
        record
    }

    /// Number of records for `product_id`.
    pub fn len(&self, product_id: &ProductId) -> Result<usize, LedgerError> {
        self.records(product_id).map(<[HistoryRecord]>::len)
    }

    /// Record at `index` for `product_id`.
    pub fn get(&self, product_id: &ProductId, index: usize) -> Result<&HistoryRecord, LedgerError> {
        let records = self.records(product_id)?;
        records.get(index).ok_or_else(|| {
            LedgerError::NotFound(NotFoundKind::HistoryIndex {
                product_id: product_id.clone(),
                index,
                length: records.len(),
            })
        })
    }

    /// All records for `product_id`, in append order.
    pub fn records(&self, product_id: &ProductId) -> Result<&[HistoryRecord], LedgerError> {
        self.chains
            .get(product_id)
            .map(Vec::as_slice)
            .ok_or_else(|| LedgerError::product_not_found(product_id))
    }

    /// Most recent record of `kind` for `product_id`, if any.
    #[must_use]
    pub fn last_of_kind(&self, product_id: &ProductId, kind: RecordKind) -> Option<&HistoryRecord> {
        self.chains
            .get(product_id)
            .and_then(|chain| chain.iter().rev().find(|r| r.kind == kind))
    }

    /// Records across all products.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Re-walk the hash chain of `product_id`.
    pub fn verify(&self, product_id: &ProductId) -> Result<HistoryVerification, LedgerError> {
        let records = self.records(product_id)?;
        Ok(verify_chain(product_id, records))
    }
}

/// Check linkage, positions and hashes of a record sequence.
#[must_use]
pub fn verify_chain(product_id: &ProductId, records: &[HistoryRecord]) -> HistoryVerification {
    let mut prev = GENESIS_PREV_HASH;
    for (i, record) in records.iter().enumerate() {
        let pending = PendingRecord {
            kind: record.kind,
            actor: record.actor,
            timestamp: record.timestamp,
            note: record.note.clone(),
            new_owner: record.new_owner,
        };
        let expected = compute_record_hash(product_id, i, &prev, &pending);
        if record.index != i || record.prev_hash != prev || record.record_hash != expected {
            return HistoryVerification {
                product_id: product_id.clone(),
                length: records.len(),
                head: None,
                first_invalid: Some(i),
            };
        }
        prev = record.record_hash;
    }
    HistoryVerification {
        product_id: product_id.clone(),
        length: records.len(),
        head: records.last().map(|r| r.record_hash),
        first_invalid: None,
    }
}
