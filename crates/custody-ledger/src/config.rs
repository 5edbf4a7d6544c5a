//! Ledger configuration from environment variables.
//!
//! Every knob falls back to its default when unset. A value that is set but
//! malformed is an error, never a silent default.

use crate::domain::policy::{AnomalyPolicy, PolicyError};
use crate::domain::value_objects::Identity;
use shared_types::IdentityParseError;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the registry owner.
pub const ENV_OWNER: &str = "CC_OWNER";

/// Environment variable listing anti-spam exempt identities (comma-separated).
pub const ENV_ANTI_SPAM_EXEMPT: &str = "CC_ANTI_SPAM_EXEMPT";

/// Configuration problems.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not a valid number: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} contains an invalid identity {value:?}: {source}")]
    InvalidIdentity {
        var: &'static str,
        value: String,
        source: IdentityParseError,
    },

    #[error("invalid anomaly policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Owner and policy of one ledger instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Registry administrator.
    pub owner: Identity,
    pub policy: AnomalyPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            owner: Identity::ZERO,
            policy: AnomalyPolicy::default(),
        }
    }
}

impl LedgerConfig {
    /// Configuration for tests: default policy, owner `0xa0a0…`.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            owner: Identity::repeat(0xA0),
            policy: AnomalyPolicy::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CC_OWNER`: registry owner identity (default: zero identity)
    /// - `CC_ACTION_COOLDOWN_SECS` (default: 10)
    /// - `CC_ANTI_SPAM_COOLDOWN_SECS` (default: 30)
    /// - `CC_ANTI_SPAM_EXEMPT`: comma-separated identities (default: none)
    /// - `CC_WARRANTY_WINDOW_SECS` / `CC_MAX_WARRANTIES_PER_WINDOW` (default: 300 / 2)
    /// - `CC_REPAIR_WINDOW_SECS` / `CC_MAX_REPAIRS_PER_WINDOW` (default: 300 / 2)
    /// - `CC_REPAIR_DAILY_WINDOW_SECS` / `CC_MAX_REPAIRS_PER_DAY` (default: 86400 / 3)
    /// - `CC_ACTIVITY_WINDOW_SECS` / `CC_MAX_ACTIONS_PER_WINDOW` (default: 3600 / 20)
    /// - `CC_TRANSFER_WINDOW_SECS` / `CC_MAX_PRODUCT_TRANSFERS_PER_WINDOW` (default: 3600 / 5)
    /// - `CC_PREMATURE_WARRANTY_SECS` (default: 3600)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AnomalyPolicy::default();
        let number = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            parse_or(&lookup, var, default)
        };
        let count = |var: &'static str, default: usize| -> Result<usize, ConfigError> {
            parse_or(&lookup, var, default)
        };

        let owner = match lookup(ENV_OWNER) {
            Some(value) => parse_identity(ENV_OWNER, value.trim())?,
            None => Identity::ZERO,
        };

        let anti_spam_exempt = match lookup(ENV_ANTI_SPAM_EXEMPT) {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| parse_identity(ENV_ANTI_SPAM_EXEMPT, item))
                .collect::<Result<_, _>>()?,
            None => defaults.anti_spam_exempt.clone(),
        };

        let policy = AnomalyPolicy {
            action_cooldown_secs: number("CC_ACTION_COOLDOWN_SECS", defaults.action_cooldown_secs)?,
            anti_spam_cooldown_secs: number(
                "CC_ANTI_SPAM_COOLDOWN_SECS",
                defaults.anti_spam_cooldown_secs,
            )?,
            anti_spam_exempt,
            warranty_window_secs: number("CC_WARRANTY_WINDOW_SECS", defaults.warranty_window_secs)?,
            max_warranties_per_window: count(
                "CC_MAX_WARRANTIES_PER_WINDOW",
                defaults.max_warranties_per_window,
            )?,
            repair_window_secs: number("CC_REPAIR_WINDOW_SECS", defaults.repair_window_secs)?,
            max_repairs_per_window: count(
                "CC_MAX_REPAIRS_PER_WINDOW",
                defaults.max_repairs_per_window,
            )?,
            repair_daily_window_secs: number(
                "CC_REPAIR_DAILY_WINDOW_SECS",
                defaults.repair_daily_window_secs,
            )?,
            max_repairs_per_day: count("CC_MAX_REPAIRS_PER_DAY", defaults.max_repairs_per_day)?,
            activity_window_secs: number("CC_ACTIVITY_WINDOW_SECS", defaults.activity_window_secs)?,
            max_actions_per_window: count(
                "CC_MAX_ACTIONS_PER_WINDOW",
                defaults.max_actions_per_window,
            )?,
            transfer_window_secs: number("CC_TRANSFER_WINDOW_SECS", defaults.transfer_window_secs)?,
            max_product_transfers_per_window: count(
                "CC_MAX_PRODUCT_TRANSFERS_PER_WINDOW",
                defaults.max_product_transfers_per_window,
            )?,
            premature_warranty_secs: number(
                "CC_PREMATURE_WARRANTY_SECS",
                defaults.premature_warranty_secs,
            )?,
        };
        policy.validate()?;

        Ok(Self { owner, policy })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        None => Ok(default),
    }
}

fn parse_identity(var: &'static str, value: &str) -> Result<Identity, ConfigError> {
    value
        .parse()
        .map_err(|source| ConfigError::InvalidIdentity {
            var,
            value: value.to_string(),
            source,
        })
}
