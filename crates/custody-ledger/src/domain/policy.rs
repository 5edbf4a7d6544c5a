//! # Anomaly Policy
//!
//! Every admission limit and classification threshold, as named constants
//! with one validation entry point.
//!
//! ## Admission (hard, the transition is rejected)
//!
//! | Limit | Default |
//! |-------|---------|
//! | Action cooldown | 10 s between any two actions |
//! | Anti-spam cooldown | 30 s between actions, unless exempt |
//! | Warranty cap | 2 per 5 min |
//! | Repair cap | 2 per 5 min, 3 per day |
//! | Activity cap | 20 per hour |
//!
//! ## Classification (soft, the product is flagged)
//!
//! | Rule | Default |
//! |------|---------|
//! | Rapid re-transfer | more than 5 transfers of one product per hour |
//! | Premature warranty | warranty within 1 hour of the last transfer |
//! | Self/void transfer | always |

use super::value_objects::Identity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// DEFAULTS
// =============================================================================

/// Minimum seconds between two actions of one identity.
pub const DEFAULT_ACTION_COOLDOWN_SECS: u64 = 10;

/// Minimum seconds between two actions of a non-exempt identity.
pub const DEFAULT_ANTI_SPAM_COOLDOWN_SECS: u64 = 30;

/// Warranty cap window (5 minutes).
pub const DEFAULT_WARRANTY_WINDOW_SECS: u64 = 300;

/// Warranty transitions allowed per window.
pub const DEFAULT_MAX_WARRANTIES_PER_WINDOW: usize = 2;

/// Short repair cap window (5 minutes).
pub const DEFAULT_REPAIR_WINDOW_SECS: u64 = 300;

/// Repair transitions allowed per short window.
pub const DEFAULT_MAX_REPAIRS_PER_WINDOW: usize = 2;

/// Daily repair cap window.
pub const DEFAULT_REPAIR_DAILY_WINDOW_SECS: u64 = 86_400;

/// Repair transitions allowed per day.
pub const DEFAULT_MAX_REPAIRS_PER_DAY: usize = 3;

/// Activity cap window (1 hour).
pub const DEFAULT_ACTIVITY_WINDOW_SECS: u64 = 3_600;

/// Transitions of any kind allowed per activity window.
pub const DEFAULT_MAX_ACTIONS_PER_WINDOW: usize = 20;

/// Rapid re-transfer window (1 hour).
pub const DEFAULT_TRANSFER_WINDOW_SECS: u64 = 3_600;

/// Transfers of one product per window before it is flagged.
pub const DEFAULT_MAX_PRODUCT_TRANSFERS_PER_WINDOW: usize = 5;

/// A warranty sooner than this after the last transfer is flagged.
pub const DEFAULT_PREMATURE_WARRANTY_SECS: u64 = 3_600;

// =============================================================================
// POLICY
// =============================================================================

/// Tunable thresholds for the anomaly detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyPolicy {
    pub action_cooldown_secs: u64,
    pub anti_spam_cooldown_secs: u64,
    /// Identities the anti-spam cooldown does not apply to.
    pub anti_spam_exempt: BTreeSet<Identity>,
    pub warranty_window_secs: u64,
    pub max_warranties_per_window: usize,
    pub repair_window_secs: u64,
    pub max_repairs_per_window: usize,
    pub repair_daily_window_secs: u64,
    pub max_repairs_per_day: usize,
    pub activity_window_secs: u64,
    pub max_actions_per_window: usize,
    pub transfer_window_secs: u64,
    pub max_product_transfers_per_window: usize,
    pub premature_warranty_secs: u64,
}

impl Default for AnomalyPolicy {
    fn default() -> Self {
        Self {
            action_cooldown_secs: DEFAULT_ACTION_COOLDOWN_SECS,
            anti_spam_cooldown_secs: DEFAULT_ANTI_SPAM_COOLDOWN_SECS,
            anti_spam_exempt: BTreeSet::new(),
            warranty_window_secs: DEFAULT_WARRANTY_WINDOW_SECS,
            max_warranties_per_window: DEFAULT_MAX_WARRANTIES_PER_WINDOW,
            repair_window_secs: DEFAULT_REPAIR_WINDOW_SECS,
            max_repairs_per_window: DEFAULT_MAX_REPAIRS_PER_WINDOW,
            repair_daily_window_secs: DEFAULT_REPAIR_DAILY_WINDOW_SECS,
            max_repairs_per_day: DEFAULT_MAX_REPAIRS_PER_DAY,
            activity_window_secs: DEFAULT_ACTIVITY_WINDOW_SECS,
            max_actions_per_window: DEFAULT_MAX_ACTIONS_PER_WINDOW,
            transfer_window_secs: DEFAULT_TRANSFER_WINDOW_SECS,
            max_product_transfers_per_window: DEFAULT_MAX_PRODUCT_TRANSFERS_PER_WINDOW,
            premature_warranty_secs: DEFAULT_PREMATURE_WARRANTY_SECS,
        }
    }
}

impl AnomalyPolicy {
    /// Policy with both cooldowns disabled. Caps and classification stay
    /// at their defaults. Useful for exercising caps in isolation.
    #[must_use]
    pub fn without_cooldowns() -> Self {
        Self {
            action_cooldown_secs: 0,
            anti_spam_cooldown_secs: 0,
            ..Self::default()
        }
    }

    /// Exempt `identity` from the anti-spam cooldown.
    #[must_use]
    pub fn with_anti_spam_exempt(mut self, identity: Identity) -> Self {
        self.anti_spam_exempt.insert(identity);
        self
    }

    /// Returns true if `identity` is subject to the anti-spam cooldown.
    #[must_use]
    pub fn anti_spam_applies_to(&self, identity: &Identity) -> bool {
        self.anti_spam_cooldown_secs > 0 && !self.anti_spam_exempt.contains(identity)
    }

    /// Check the policy is internally consistent.
    ///
    /// Cooldowns may be zero (disabled). Windows and caps may not.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let windows = [
            ("warranty_window_secs", self.warranty_window_secs),
            ("repair_window_secs", self.repair_window_secs),
            ("repair_daily_window_secs", self.repair_daily_window_secs),
            ("activity_window_secs", self.activity_window_secs),
            ("transfer_window_secs", self.transfer_window_secs),
        ];
        for (name, secs) in windows {
            if secs == 0 {
                return Err(PolicyError::ZeroWindow(name));
            }
        }

        let caps = [
            ("max_warranties_per_window", self.max_warranties_per_window),
            ("max_repairs_per_window", self.max_repairs_per_window),
            ("max_repairs_per_day", self.max_repairs_per_day),
            ("max_actions_per_window", self.max_actions_per_window),
            (
                "max_product_transfers_per_window",
                self.max_product_transfers_per_window,
            ),
        ];
        for (name, max) in caps {
            if max == 0 {
                return Err(PolicyError::ZeroCap(name));
            }
        }

        if self.repair_window_secs > self.repair_daily_window_secs {
            return Err(PolicyError::RepairWindowsInverted {
                short: self.repair_window_secs,
                daily: self.repair_daily_window_secs,
            });
        }
        if self.max_repairs_per_window > self.max_repairs_per_day {
            return Err(PolicyError::RepairCapsInverted {
                short: self.max_repairs_per_window,
                daily: self.max_repairs_per_day,
            });
        }
        Ok(())
    }
}

/// Policy validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{0} must be greater than zero")]
    ZeroWindow(&'static str),

    #[error("{0} must be greater than zero")]
    ZeroCap(&'static str),

    #[error("short repair window ({short}s) is longer than the daily window ({daily}s)")]
    RepairWindowsInverted { short: u64, daily: u64 },

    #[error("short repair cap ({short}) exceeds the daily cap ({daily})")]
    RepairCapsInverted { short: usize, daily: usize },
}
