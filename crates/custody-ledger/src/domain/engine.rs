//! # Transition Engine
//!
//! The only writer. Owns the role registry, product registry, history ledger
//! and anomaly detector, and applies one transition at a time.
//!
//! ## Transition table
//!
//! | Transition | Caller role | Ownership | Effect |
//! |------------|-------------|-----------|--------|
//! | create | Manufacturer | id must be new | product appears, owner = caller |
//! | transfer | Manufacturer, Dealer (any recipient); Customer (WarrantyCenter only) | caller == owner | owner := to |
//! | warranty | WarrantyCenter | caller == owner | append only |
//! | repair | WarrantyCenter | caller == owner | append only |
//!
//! ## Validation then commit
//!
//! Every check runs against immutable borrows first: (a) existence,
//! (b) role, (c) ownership, (d) admission. Only then does `commit` run, and
//! nothing in `commit` can fail, so a rejected call leaves no trace.

use super::anomaly::AnomalyDetector;
use super::entities::{HistoryRecord, Product, RequestContext, RoleGrant, TransitionReceipt};
use super::history::{HistoryLedger, PendingRecord};
use super::policy::{AnomalyPolicy, PolicyError};
use super::query::QueryFacade;
use super::registry::ProductRegistry;
use super::roles::RoleRegistry;
use super::value_objects::{Identity, ProductId, RecordKind, Role, RoleCode};
use crate::errors::{LedgerError, UnauthorizedReason};
use crate::events::LedgerEventKind;

/// An accepted transition and the notifications it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub receipt: TransitionReceipt,
    pub events: Vec<LedgerEventKind>,
}

/// Single-writer state machine over the custody stores.
#[derive(Debug, Clone)]
pub struct TransitionEngine {
    roles: RoleRegistry,
    products: ProductRegistry,
    history: HistoryLedger,
    detector: AnomalyDetector,
}

impl TransitionEngine {
    /// Create an empty ledger administered by `owner`.
    ///
    /// # Errors
    /// Returns `PolicyError` if `policy` fails validation.
    pub fn new(owner: Identity, policy: AnomalyPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self {
            roles: RoleRegistry::new(owner),
            products: ProductRegistry::new(),
            history: HistoryLedger::new(),
            detector: AnomalyDetector::new(policy),
        })
    }

    /// Read-only view over committed state.
    #[must_use]
    pub fn query(&self) -> QueryFacade<'_> {
        QueryFacade::new(&self.roles, &self.products, &self.history, &self.detector)
    }

    /// The policy in force.
    #[must_use]
    pub fn policy(&self) -> &AnomalyPolicy {
        self.detector.policy()
    }

    /// Enforce `policy` from now on.
    ///
    /// Rate state is rebuilt from committed history under the new windows.
    /// Flags already raised are part of the record and stay.
    ///
    /// # Errors
    /// Returns `PolicyError` if `policy` fails validation; the engine is
    /// left unchanged.
    pub fn retune(&mut self, policy: AnomalyPolicy) -> Result<(), PolicyError> {
        policy.validate()?;
        let mut committed: Vec<(&ProductId, &HistoryRecord)> = self
            .products
            .iter()
            .filter_map(|product| {
                let records = self.history.records(&product.id).ok()?;
                Some(records.iter().map(move |record| (&product.id, record)))
            })
            .flatten()
            .collect();
        committed.sort_by_key(|(_, record)| record.timestamp);

        let mut detector = AnomalyDetector::new(policy);
        for (product_id, record) in committed {
            detector.record(&record.actor, record.kind, product_id, record.timestamp);
        }
        self.detector = detector;
        Ok(())
    }

    // =========================================================================
    // ROLE ADMINISTRATION
    // =========================================================================

    /// Assign `role_code` to `identity`. Only the registry owner may call.
    pub fn grant_role(
        &mut self,
        ctx: &RequestContext,
        identity: Identity,
        role_code: RoleCode,
    ) -> Result<RoleGrant, LedgerError> {
        self.roles.grant(&ctx.caller, identity, role_code, ctx.now)
    }

    // =========================================================================
    // PRODUCT TRANSITIONS
    // =========================================================================

    /// Register a new product owned by the calling manufacturer.
    pub fn create_product(
        &mut self,
        ctx: &RequestContext,
        product_id: ProductId,
        info: String,
    ) -> Result<Transition, LedgerError> {
        if self.products.contains(&product_id) {
            return Err(LedgerError::DuplicateProduct(product_id));
        }
        self.require_role(&ctx.caller, RecordKind::Created, None)?;
        self.detector.admit(&ctx.caller, RecordKind::Created, ctx.now)?;

        self.products
            .insert(Product::new(product_id.clone(), info.clone(), ctx.caller));
        let pending = PendingRecord {
            kind: RecordKind::Created,
            actor: ctx.caller,
            timestamp: ctx.now,
            note: info,
            new_owner: ctx.caller,
        };
        Ok(self.commit(&product_id, pending, Vec::new()))
    }

    /// Move `product_id` from the caller to `to`.
    pub fn transfer_product(
        &mut self,
        ctx: &RequestContext,
        product_id: &ProductId,
        to: Identity,
        note: String,
    ) -> Result<Transition, LedgerError> {
        let pending = PendingRecord {
            kind: RecordKind::Transferred,
            actor: ctx.caller,
            timestamp: ctx.now,
            note,
            new_owner: to,
        };
        self.apply(product_id, pending)
    }

    /// Log a warranty claim against a product the calling center holds.
    pub fn record_warranty(
        &mut self,
        ctx: &RequestContext,
        product_id: &ProductId,
        note: String,
    ) -> Result<Transition, LedgerError> {
        self.apply(product_id, service_record(RecordKind::Warranty, ctx, note))
    }

    /// Log a repair against a product the calling center holds.
    pub fn record_repair(
        &mut self,
        ctx: &RequestContext,
        product_id: &ProductId,
        note: String,
    ) -> Result<Transition, LedgerError> {
        self.apply(product_id, service_record(RecordKind::Repair, ctx, note))
    }

    /// Validate then commit a transition on an existing product.
    fn apply(&mut self, product_id: &ProductId, pending: PendingRecord) -> Result<Transition, LedgerError> {
        let product = self.products.get(product_id)?;

        let recipient = (pending.kind == RecordKind::Transferred).then_some(pending.new_owner);
        self.require_role(&pending.actor, pending.kind, recipient)?;

        if product.current_owner != pending.actor {
            return Err(LedgerError::NotOwner {
                product_id: product_id.clone(),
                caller: pending.actor,
                owner: product.current_owner,
            });
        }

        self.detector
            .admit(&pending.actor, pending.kind, pending.timestamp)?;

        let reasons = self.classify(product_id, &pending);
        Ok(self.commit(product_id, pending, reasons))
    }

    /// Role membership check, including the customer recipient rule.
    fn require_role(
        &self,
        caller: &Identity,
        kind: RecordKind,
        recipient: Option<Identity>,
    ) -> Result<(), LedgerError> {
        let role = self.roles.role_of(caller);
        let allowed = match kind {
            RecordKind::Created => role == Role::Manufacturer,
            RecordKind::Transferred => matches!(role, Role::Manufacturer | Role::Dealer | Role::Customer),
            RecordKind::Warranty | RecordKind::Repair => role == Role::WarrantyCenter,
        };
        if !allowed {
            return Err(LedgerError::Unauthorized {
                reason: UnauthorizedReason::RoleNotAllowed { role, action: kind },
            });
        }

        if let (Role::Customer, Some(recipient)) = (role, recipient) {
            let recipient_role = self.roles.role_of(&recipient);
            if recipient_role != Role::WarrantyCenter {
                return Err(LedgerError::Unauthorized {
                    reason: UnauthorizedReason::RecipientNotAllowed {
                        role,
                        recipient,
                        recipient_role,
                    },
                });
            }
        }
        Ok(())
    }

    /// Classification reasons for a validated transition.
    fn classify(&self, product_id: &ProductId, pending: &PendingRecord) -> Vec<String> {
        match pending.kind {
            RecordKind::Transferred => self
                .products
                .get(product_id)
                .map(|product| {
                    self.detector
                        .classify_transfer(product, &pending.new_owner, pending.timestamp)
                })
                .unwrap_or_default(),
            RecordKind::Warranty => {
                let last_transfer = self
                    .history
                    .last_of_kind(product_id, RecordKind::Transferred)
                    .map(|record| record.timestamp);
                self.detector
                    .classify_warranty(last_transfer, pending.timestamp)
                    .into_iter()
                    .collect()
            }
            RecordKind::Created | RecordKind::Repair => Vec::new(),
        }
    }

    /// Apply a validated transition. Infallible.
    fn commit(&mut self, product_id: &ProductId, pending: PendingRecord, reasons: Vec<String>) -> Transition {
        let kind = pending.kind;
        let actor = pending.actor;
        let now = pending.timestamp;
        let new_owner = pending.new_owner;
        let previous_owner = self
            .products
            .get(product_id)
            .map_or(actor, |product| product.current_owner);

        let record = self.history.append(product_id, pending);
        if kind == RecordKind::Transferred {
            self.products.set_owner(product_id, new_owner);
        }

        let flagged = (!reasons.is_empty()).then(|| reasons.join("; "));
        if let Some(reason) = &flagged {
            self.products.flag(product_id, reason.clone());
        }

        self.detector.record(&actor, kind, product_id, now);

        let owner = self
            .products
            .get(product_id)
            .map_or(new_owner, |product| product.current_owner);

        let mut events = vec![LedgerEventKind::for_record(
            kind,
            product_id.clone(),
            actor,
            previous_owner,
            owner,
        )];
        if let Some(reason) = &flagged {
            events.push(LedgerEventKind::ProductFlagged {
                product_id: product_id.clone(),
                reason: reason.clone(),
            });
        }

        Transition {
            receipt: TransitionReceipt {
                product_id: product_id.clone(),
                kind,
                index: record.index,
                record_hash: record.record_hash,
                owner,
                flagged,
            },
            events,
        }
    }

    // =========================================================================
    // REPLAY
    // =========================================================================

    /// Re-apply a role grant from an exported grant log.
    pub(crate) fn replay_grant(&mut self, grant: &RoleGrant) -> RoleGrant {
        self.roles
            .apply_grant(grant.identity, grant.role, grant.granted_at)
    }

    /// Re-apply an exported history record without admission checks.
    ///
    /// Classification and rate state are re-derived exactly as they were
    /// when the record was first committed, provided records are replayed
    /// in commit order. The caller checks linkage and ownership.
    pub(crate) fn replay_record(&mut self, product_id: &ProductId, record: &HistoryRecord) -> Transition {
        let pending = PendingRecord {
            kind: record.kind,
            actor: record.actor,
            timestamp: record.timestamp,
            note: record.note.clone(),
            new_owner: record.new_owner,
        };
        if record.kind == RecordKind::Created {
            self.products.insert(Product::new(
                product_id.clone(),
                record.note.clone(),
                record.new_owner,
            ));
        }
        let reasons = self.classify(product_id, &pending);
        self.commit(product_id, pending, reasons)
    }
}

fn service_record(kind: RecordKind, ctx: &RequestContext, note: String) -> PendingRecord {
    PendingRecord {
        kind,
        actor: ctx.caller,
        timestamp: ctx.now,
        note,
        new_owner: Identity::ZERO,
    }
}
