//! # Anomaly Detector
//!
//! Stateful rate and pattern tracker consulted by the transition engine.
//!
//! ## Two independent concerns
//!
//! - **Admission** ([`AnomalyDetector::admit`]): hard limits. A failing check
//!   rejects the transition with `ActionTooFrequent` or `RateLimitExceeded`.
//! - **Classification** (`classify_*`): soft flags. The transition commits
//!   and the product is marked suspicious with a reason.
//!
//! Both are read-only. Counters move only through [`AnomalyDetector::record`],
//! which the engine calls after a transition has committed, so a rejected
//! attempt never consumes quota.
//!
//! ## Admission order
//!
//! 1. Action cooldown (`action_cooldown_secs`)
//! 2. Anti-spam cooldown (`anti_spam_cooldown_secs`, skipped for exempt identities)
//! 3. Warranty cap, or short then daily repair cap
//! 4. Activity cap (any kind)

use super::entities::Product;
use super::policy::AnomalyPolicy;
use super::value_objects::{Identity, ProductId, RecordKind, Timestamp};
use crate::errors::{CooldownGuard, LedgerError, RateLimitKind};
use serde::{Deserialize, Serialize};
use shared_types::SlidingWindowCounter;
use std::collections::HashMap;

/// Reason recorded for a transfer to the zero identity.
pub const REASON_VOID_TRANSFER: &str = "Transfer to the zero address";

/// Reason recorded for a transfer to the current owner.
pub const REASON_SELF_TRANSFER: &str = "Transfer to the current owner";

// =============================================================================
// RATE STATE
// =============================================================================

/// Per-identity counters.
#[derive(Debug, Clone)]
struct RateState {
    last_action: Option<Timestamp>,
    actions: SlidingWindowCounter,
    warranties: SlidingWindowCounter,
    repairs: SlidingWindowCounter,
    repairs_daily: SlidingWindowCounter,
    transfers: SlidingWindowCounter,
}

impl RateState {
    fn new(policy: &AnomalyPolicy) -> Self {
        Self {
            last_action: None,
            actions: SlidingWindowCounter::new(policy.activity_window_secs),
            warranties: SlidingWindowCounter::new(policy.warranty_window_secs),
            repairs: SlidingWindowCounter::new(policy.repair_window_secs),
            repairs_daily: SlidingWindowCounter::new(policy.repair_daily_window_secs),
            transfers: SlidingWindowCounter::new(policy.transfer_window_secs),
        }
    }
}

/// Per-product transfer counter for the rapid re-transfer rule.
#[derive(Debug, Clone)]
struct ProductActivity {
    transfers: SlidingWindowCounter,
}

/// Snapshot of one identity's standing against the limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateStatus {
    pub identity: Identity,
    pub last_action_at: Option<Timestamp>,
    /// Earliest time any transition could pass the cooldowns and activity cap.
    /// `None` when one could be admitted now.
    pub next_action_at: Option<Timestamp>,
    /// Earliest time a warranty could also pass the warranty cap.
    pub next_warranty_at: Option<Timestamp>,
    /// Earliest time a repair could also pass both repair caps.
    pub next_repair_at: Option<Timestamp>,
    pub actions_in_window: usize,
    pub warranties_in_window: usize,
    pub repairs_in_window: usize,
    pub repairs_today: usize,
    pub transfers_in_window: usize,
    pub anti_spam_exempt: bool,
}

// =============================================================================
// DETECTOR
// =============================================================================

/// Admission gate and post-hoc classifier.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    policy: AnomalyPolicy,
    identities: HashMap<Identity, RateState>,
    products: HashMap<ProductId, ProductActivity>,
}

impl AnomalyDetector {
    /// Create a detector enforcing `policy`.
    #[must_use]
    pub fn new(policy: AnomalyPolicy) -> Self {
        Self {
            policy,
            identities: HashMap::new(),
            products: HashMap::new(),
        }
    }

    /// The policy in force.
    #[must_use]
    pub fn policy(&self) -> &AnomalyPolicy {
        &self.policy
    }

    /// Decide whether `actor` may perform a `kind` transition at `now`.
    pub fn admit(&self, actor: &Identity, kind: RecordKind, now: Timestamp) -> Result<(), LedgerError> {
        let Some(state) = self.identities.get(actor) else {
            return Ok(());
        };

        self.check_cooldowns(actor, state, now)?;

        match kind {
            RecordKind::Warranty => check_cap(
                &state.warranties,
                RateLimitKind::Warranty,
                self.policy.max_warranties_per_window,
                now,
            )?,
            RecordKind::Repair => {
                check_cap(
                    &state.repairs,
                    RateLimitKind::RepairShort,
                    self.policy.max_repairs_per_window,
                    now,
                )?;
                check_cap(
                    &state.repairs_daily,
                    RateLimitKind::RepairDaily,
                    self.policy.max_repairs_per_day,
                    now,
                )?;
            }
            RecordKind::Created | RecordKind::Transferred => {}
        }

        check_cap(
            &state.actions,
            RateLimitKind::Activity,
            self.policy.max_actions_per_window,
            now,
        )
    }

    fn check_cooldowns(&self, actor: &Identity, state: &RateState, now: Timestamp) -> Result<(), LedgerError> {
        let Some(last) = state.last_action else {
            return Ok(());
        };
        let elapsed = now.saturating_sub(last);

        let cooldown = self.policy.action_cooldown_secs;
        if elapsed < cooldown {
            return Err(LedgerError::ActionTooFrequent {
                guard: CooldownGuard::ActionCooldown,
                required_secs: cooldown,
                retry_at: last.saturating_add(cooldown),
            });
        }

        let anti_spam = self.policy.anti_spam_cooldown_secs;
        if self.policy.anti_spam_applies_to(actor) && elapsed < anti_spam {
            return Err(LedgerError::ActionTooFrequent {
                guard: CooldownGuard::AntiSpam,
                required_secs: anti_spam,
                retry_at: last.saturating_add(anti_spam),
            });
        }
        Ok(())
    }

    /// Classification rules for a transfer of `product` to `to` at `now`.
    ///
    /// Returns every reason that applies, in rule order.
    #[must_use]
    pub fn classify_transfer(&self, product: &Product, to: &Identity, now: Timestamp) -> Vec<String> {
        let mut reasons = Vec::new();

        if to.is_zero() {
            reasons.push(REASON_VOID_TRANSFER.to_string());
        } else if *to == product.current_owner {
            reasons.push(REASON_SELF_TRANSFER.to_string());
        }

        let prior = self
            .products
            .get(&product.id)
            .map_or(0, |activity| activity.transfers.count_at(now));
        let including_this = prior + 1;
        if including_this > self.policy.max_product_transfers_per_window {
            reasons.push(format!(
                "Rapid re-transfer: {} transfers within {}s",
                including_this, self.policy.transfer_window_secs
            ));
        }
        reasons
    }

    /// Premature-warranty rule. `last_transfer_at` is the timestamp of the
    /// product's most recent `Transferred` record.
    #[must_use]
    pub fn classify_warranty(&self, last_transfer_at: Option<Timestamp>, now: Timestamp) -> Option<String> {
        let transferred_at = last_transfer_at?;
        let elapsed = now.saturating_sub(transferred_at);
        (elapsed < self.policy.premature_warranty_secs).then(|| {
            format!(
                "Warranty claimed {}s after transfer (minimum {}s)",
                elapsed, self.policy.premature_warranty_secs
            )
        })
    }

    /// Count a committed transition.
    pub fn record(&mut self, actor: &Identity, kind: RecordKind, product_id: &ProductId, now: Timestamp) {
        let policy = &self.policy;
        let state = self
            .identities
            .entry(*actor)
            .or_insert_with(|| RateState::new(policy));

        state.last_action = Some(state.last_action.map_or(now, |last| last.max(now)));
        state.actions.record(now);

        match kind {
            RecordKind::Warranty => state.warranties.record(now),
            RecordKind::Repair => {
                state.repairs.record(now);
                state.repairs_daily.record(now);
            }
            RecordKind::Transferred => {
                state.transfers.record(now);
                self.products
                    .entry(product_id.clone())
                    .or_insert_with(|| ProductActivity {
                        transfers: SlidingWindowCounter::new(policy.transfer_window_secs),
                    })
                    .transfers
                    .record(now);
            }
            RecordKind::Created => {}
        }
    }

    /// Where `identity` stands against every limit at `now`.
    #[must_use]
    pub fn status(&self, identity: &Identity, now: Timestamp) -> RateStatus {
        let exempt = !self.policy.anti_spam_applies_to(identity);
        let Some(state) = self.identities.get(identity) else {
            return RateStatus {
                identity: *identity,
                last_action_at: None,
                next_action_at: None,
                next_warranty_at: None,
                next_repair_at: None,
                actions_in_window: 0,
                warranties_in_window: 0,
                repairs_in_window: 0,
                repairs_today: 0,
                transfers_in_window: 0,
                anti_spam_exempt: exempt,
            };
        };

        let cooldown = if exempt {
            self.policy.action_cooldown_secs
        } else {
            self.policy
                .action_cooldown_secs
                .max(self.policy.anti_spam_cooldown_secs)
        };
        let cooldown_ready = state.last_action.map(|last| last.saturating_add(cooldown));
        let activity_ready = state
            .actions
            .next_slot_at(now, self.policy.max_actions_per_window);
        let next_action_at = latest(&[cooldown_ready, activity_ready], now);

        let warranty_ready = state
            .warranties
            .next_slot_at(now, self.policy.max_warranties_per_window);
        let repair_ready = state
            .repairs
            .next_slot_at(now, self.policy.max_repairs_per_window);
        let repair_daily_ready = state
            .repairs_daily
            .next_slot_at(now, self.policy.max_repairs_per_day);

        RateStatus {
            identity: *identity,
            last_action_at: state.last_action,
            next_action_at,
            next_warranty_at: latest(&[next_action_at, warranty_ready], now),
            next_repair_at: latest(&[next_action_at, repair_ready, repair_daily_ready], now),
            actions_in_window: state.actions.count_at(now),
            warranties_in_window: state.warranties.count_at(now),
            repairs_in_window: state.repairs.count_at(now),
            repairs_today: state.repairs_daily.count_at(now),
            transfers_in_window: state.transfers.count_at(now),
            anti_spam_exempt: exempt,
        }
    }
}

fn check_cap(
    counter: &SlidingWindowCounter,
    limit: RateLimitKind,
    max: usize,
    now: Timestamp,
) -> Result<(), LedgerError> {
    if !counter.would_exceed(now, max) {
        return Ok(());
    }
    Err(LedgerError::RateLimitExceeded {
        limit,
        max,
        window_secs: counter.window_secs(),
        retry_at: counter.next_slot_at(now, max).unwrap_or(now),
    })
}

/// Latest of the given readiness times, or `None` if all have passed.
fn latest(times: &[Option<Timestamp>], now: Timestamp) -> Option<Timestamp> {
    times.iter().flatten().copied().max().filter(|&t| t > now)
}
