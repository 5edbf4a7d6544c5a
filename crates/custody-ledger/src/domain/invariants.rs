//! # Domain Invariants
//!
//! Checks that must hold for every committed state. The engine guarantees
//! them by construction; these functions let tests and snapshot restore
//! assert it.

use super::entities::{HistoryRecord, Product, RoleAssignment};
use super::history::verify_chain;
use super::value_objects::{Identity, RecordKind};
use std::collections::HashSet;

/// A product's history is non-empty and begins with its `Created` record.
#[must_use]
pub fn check_history_starts_with_created(records: &[HistoryRecord]) -> bool {
    records
        .first()
        .is_some_and(|record| record.kind == RecordKind::Created)
}

/// `Created` appears only at index 0.
#[must_use]
pub fn check_single_created(records: &[HistoryRecord]) -> bool {
    records
        .iter()
        .skip(1)
        .all(|record| record.kind != RecordKind::Created)
}

/// The current owner equals the `new_owner` of the last owner-setting record.
#[must_use]
pub fn check_owner_matches_history(product: &Product, records: &[HistoryRecord]) -> bool {
    last_owner(records) == Some(product.current_owner)
}

/// Owner implied by a record sequence.
#[must_use]
pub fn last_owner(records: &[HistoryRecord]) -> Option<Identity> {
    records
        .iter()
        .rev()
        .find(|record| record.kind.sets_owner())
        .map(|record| record.new_owner)
}

/// Every record links to its predecessor and hashes correctly.
#[must_use]
pub fn check_chain_intact(product: &Product, records: &[HistoryRecord]) -> bool {
    verify_chain(&product.id, records).is_intact()
}

/// A suspicious product always carries a reason, and only then.
#[must_use]
pub fn check_flag_has_reason(product: &Product) -> bool {
    product.suspicious != product.suspicious_reason.is_empty()
}

/// No identity is listed under two roles.
#[must_use]
pub fn check_role_exclusivity(assignments: &[RoleAssignment]) -> bool {
    let mut seen = HashSet::new();
    assignments.iter().all(|a| seen.insert(a.identity))
}

/// All per-product invariants at once.
#[must_use]
pub fn check_product_invariants(product: &Product, records: &[HistoryRecord]) -> bool {
    check_history_starts_with_created(records)
        && check_single_created(records)
        && check_owner_matches_history(product, records)
        && check_chain_intact(product, records)
        && check_flag_has_reason(product)
}
