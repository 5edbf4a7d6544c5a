//! # Custody Ledger Service
//!
//! Async façade over the [`TransitionEngine`].
//!
//! ## Concurrency
//!
//! The engine sits behind one `tokio::sync::RwLock`:
//! - writes take the write lock, so transitions apply one at a time in the
//!   order the lock is acquired, and events are published before it is
//!   released (feed order equals commit order)
//! - reads share the read lock and only ever see committed state

use crate::adapters::event_feed::InMemoryEventFeed;
use crate::adapters::snapshot::{LedgerSnapshot, SnapshotError};
use crate::config::LedgerConfig;
use crate::domain::anomaly::RateStatus;
use crate::domain::engine::{Transition, TransitionEngine};
use crate::domain::entities::{
    HistoryRecord, HistoryVerification, ProductView, RequestContext, RoleAssignment, RoleGrant,
    TransitionReceipt,
};
use crate::domain::policy::PolicyError;
use crate::domain::value_objects::{Identity, ProductId, RecordKind, Role, RoleCode, Timestamp};
use crate::errors::LedgerError;
use crate::events::{LedgerEvent, LedgerEventKind};
use crate::ports::inbound::CustodyLedgerApi;
use crate::ports::outbound::EventSink;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Counters for the service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Product transitions committed.
    pub transitions_accepted: u64,
    /// Writes rejected (transitions and grants).
    pub requests_rejected: u64,
    /// Committed transitions that flagged their product.
    pub transitions_flagged: u64,
    /// Role grants committed.
    pub roles_granted: u64,
    /// Rejections keyed by error code.
    pub rejected_by_code: BTreeMap<&'static str, u64>,
}

/// The custody ledger service.
pub struct CustodyLedgerService<E: EventSink> {
    engine: Arc<RwLock<TransitionEngine>>,
    events: Arc<E>,
    stats: Arc<RwLock<ServiceStats>>,
}

impl<E: EventSink> CustodyLedgerService<E> {
    /// Create an empty ledger.
    pub fn new(config: LedgerConfig, events: E) -> Result<Self, PolicyError> {
        let engine = TransitionEngine::new(config.owner, config.policy)?;
        Ok(Self::with_engine(engine, events))
    }

    /// Restore a ledger from a snapshot.
    pub fn from_snapshot(snapshot: &LedgerSnapshot, events: E) -> Result<Self, SnapshotError> {
        let engine = snapshot.restore()?;
        info!(
            products = snapshot.products.len(),
            grants = snapshot.grants.len(),
            "Ledger restored from snapshot"
        );
        Ok(Self::with_engine(engine, events))
    }

    /// Restore a ledger from a snapshot, enforcing the configured policy.
    ///
    /// History and grants come from the snapshot; thresholds come from
    /// `config`, so they can be retuned between runs.
    ///
    /// # Errors
    /// - `OwnerMismatch` if `config.owner` differs from the snapshot owner
    /// - `Policy` if the configured policy fails validation
    /// - any verification failure of [`LedgerSnapshot::restore`]
    pub fn restore_configured(
        snapshot: &LedgerSnapshot,
        config: LedgerConfig,
        events: E,
    ) -> Result<Self, SnapshotError> {
        if snapshot.owner != config.owner {
            return Err(SnapshotError::OwnerMismatch {
                configured: config.owner,
                recorded: snapshot.owner,
            });
        }
        let mut engine = snapshot.restore()?;
        if *engine.policy() != config.policy {
            info!("Snapshot policy replaced by configured policy");
            engine.retune(config.policy)?;
        }
        info!(
            products = snapshot.products.len(),
            grants = snapshot.grants.len(),
            "Ledger restored from snapshot"
        );
        Ok(Self::with_engine(engine, events))
    }

    fn with_engine(engine: TransitionEngine, events: E) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            events: Arc::new(events),
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// The notification sink.
    pub fn events(&self) -> &Arc<E> {
        &self.events
    }

    /// Notifications with `sequence >= from`.
    pub async fn events_since(&self, from: u64) -> Vec<LedgerEvent> {
        self.events.replay(from).await
    }

    /// Export the committed state.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(&*self.engine.read().await)
    }

    async fn record_rejection(&self, err: &LedgerError) {
        let mut stats = self.stats.write().await;
        stats.requests_rejected += 1;
        *stats.rejected_by_code.entry(err.code()).or_insert(0) += 1;
    }

    /// Run one product transition under the write lock.
    async fn run_transition<F>(
        &self,
        ctx: RequestContext,
        kind: RecordKind,
        product_id: &ProductId,
        op: F,
    ) -> Result<TransitionReceipt, LedgerError>
    where
        F: FnOnce(&mut TransitionEngine) -> Result<Transition, LedgerError> + Send,
    {
        let mut engine = self.engine.write().await;
        match op(&mut *engine) {
            Ok(Transition { receipt, events }) => {
                for event in events {
                    self.events.publish(ctx.now, event).await;
                }
                drop(engine);

                {
                    let mut stats = self.stats.write().await;
                    stats.transitions_accepted += 1;
                    if receipt.flagged.is_some() {
                        stats.transitions_flagged += 1;
                    }
                }

                info!(
                    product_id = %product_id,
                    caller = %ctx.caller,
                    kind = %kind,
                    index = receipt.index,
                    owner = %receipt.owner,
                    "Transition committed"
                );
                if let Some(reason) = &receipt.flagged {
                    warn!(product_id = %product_id, reason = %reason, "Product flagged as suspicious");
                }
                Ok(receipt)
            }
            Err(err) => {
                drop(engine);
                self.record_rejection(&err).await;
                warn!(
                    product_id = %product_id,
                    caller = %ctx.caller,
                    kind = %kind,
                    code = err.code(),
                    error = %err,
                    "Transition rejected"
                );
                Err(err)
            }
        }
    }
}

/// Create a service with the test configuration and an in-memory feed.
#[must_use]
pub fn create_test_service() -> CustodyLedgerService<InMemoryEventFeed> {
    match CustodyLedgerService::new(LedgerConfig::for_testing(), InMemoryEventFeed::new()) {
        Ok(service) => service,
        Err(_) => unreachable!("default policy is valid"),
    }
}

// =============================================================================
// CustodyLedgerApi Implementation
// =============================================================================

#[async_trait]
impl<E: EventSink> CustodyLedgerApi for CustodyLedgerService<E> {
    #[instrument(skip(self), fields(caller = %ctx.caller, identity = %identity))]
    async fn grant_role(
        &self,
        ctx: RequestContext,
        identity: Identity,
        role_code: RoleCode,
    ) -> Result<RoleGrant, LedgerError> {
        let mut engine = self.engine.write().await;
        match engine.grant_role(&ctx, identity, role_code) {
            Ok(grant) => {
                self.events
                    .publish(
                        ctx.now,
                        LedgerEventKind::RoleGranted {
                            identity,
                            role: grant.role,
                        },
                    )
                    .await;
                drop(engine);
                self.stats.write().await.roles_granted += 1;
                info!(role = %grant.role, sequence = grant.sequence, "Role granted");
                Ok(grant)
            }
            Err(err) => {
                drop(engine);
                self.record_rejection(&err).await;
                warn!(code = err.code(), error = %err, "Role grant rejected");
                Err(err)
            }
        }
    }

    #[instrument(skip(self, info), fields(caller = %ctx.caller))]
    async fn create_product(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        info: String,
    ) -> Result<TransitionReceipt, LedgerError> {
        let id = product_id.clone();
        self.run_transition(ctx, RecordKind::Created, &id, move |engine| {
            engine.create_product(&ctx, product_id, info)
        })
        .await
    }

    #[instrument(skip(self, note), fields(caller = %ctx.caller, to = %to))]
    async fn transfer_product(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        to: Identity,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError> {
        self.run_transition(ctx, RecordKind::Transferred, &product_id, |engine| {
            engine.transfer_product(&ctx, &product_id, to, note)
        })
        .await
    }

    #[instrument(skip(self, note), fields(caller = %ctx.caller))]
    async fn record_warranty(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError> {
        self.run_transition(ctx, RecordKind::Warranty, &product_id, |engine| {
            engine.record_warranty(&ctx, &product_id, note)
        })
        .await
    }

    #[instrument(skip(self, note), fields(caller = %ctx.caller))]
    async fn record_repair(
        &self,
        ctx: RequestContext,
        product_id: ProductId,
        note: String,
    ) -> Result<TransitionReceipt, LedgerError> {
        self.run_transition(ctx, RecordKind::Repair, &product_id, |engine| {
            engine.record_repair(&ctx, &product_id, note)
        })
        .await
    }

    async fn role_of(&self, identity: Identity) -> Role {
        self.engine.read().await.query().role_of(&identity)
    }

    async fn registry_owner(&self) -> Identity {
        self.engine.read().await.query().registry_owner()
    }

    async fn members_of(&self, role: Role) -> Vec<Identity> {
        self.engine.read().await.query().members_of(role)
    }

    async fn role_assignments(&self) -> Vec<RoleAssignment> {
        self.engine.read().await.query().role_assignments()
    }

    async fn role_grants(&self, from: u64) -> Vec<RoleGrant> {
        self.engine.read().await.query().role_grants(from).to_vec()
    }

    async fn get_product(&self, product_id: &ProductId) -> Result<ProductView, LedgerError> {
        debug!(product_id = %product_id, "get_product");
        self.engine.read().await.query().get_product(product_id)
    }

    async fn is_product_suspicious(&self, product_id: &ProductId) -> Result<bool, LedgerError> {
        self.engine.read().await.query().is_product_suspicious(product_id)
    }

    async fn suspicious_reason(&self, product_id: &ProductId) -> Result<String, LedgerError> {
        self.engine.read().await.query().suspicious_reason(product_id)
    }

    async fn history_length(&self, product_id: &ProductId) -> Result<usize, LedgerError> {
        self.engine.read().await.query().history_length(product_id)
    }

    async fn history_record(
        &self,
        product_id: &ProductId,
        index: usize,
    ) -> Result<HistoryRecord, LedgerError> {
        self.engine.read().await.query().history_record(product_id, index)
    }

    async fn history(&self, product_id: &ProductId) -> Result<Vec<HistoryRecord>, LedgerError> {
        debug!(product_id = %product_id, "history");
        self.engine.read().await.query().history(product_id)
    }

    async fn verify_history(
        &self,
        product_id: &ProductId,
    ) -> Result<HistoryVerification, LedgerError> {
        let report = self.engine.read().await.query().verify_history(product_id)?;
        if !report.is_intact() {
            warn!(product_id = %product_id, first_invalid = ?report.first_invalid, "History chain broken");
        }
        Ok(report)
    }

    async fn suspicious_products(&self) -> Vec<ProductView> {
        self.engine.read().await.query().suspicious_products()
    }

    async fn rate_status(&self, identity: Identity, now: Timestamp) -> RateStatus {
        self.engine.read().await.query().rate_status(&identity, now)
    }
}
