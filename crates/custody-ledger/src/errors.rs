//! # Error Types
//!
//! Every rejection a caller can observe from the ledger.
//!
//! The variant set is the stable taxonomy callers pattern-match on:
//! `Unauthorized`, `NotOwner`, `NotFound`, `DuplicateProduct`, `InvalidRole`,
//! `ActionTooFrequent`, `RateLimitExceeded`. [`LedgerError::code`] returns the
//! variant name so a UI never has to parse the message text.
//!
//! All of them are raised before any state is touched.

use crate::domain::value_objects::{ProductId, RecordKind, Role, RoleCode};
use serde::{Deserialize, Serialize};
use shared_types::{Identity, Timestamp};
use thiserror::Error;

// =============================================================================
// LEDGER ERRORS
// =============================================================================

/// Errors returned by ledger operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Caller lacks the role (or registry ownership) the operation needs.
    #[error("{reason}")]
    Unauthorized { reason: UnauthorizedReason },

    /// Caller is not the current owner of the product.
    #[error("You are not the product owner: {product_id} is held by {owner}")]
    NotOwner {
        product_id: ProductId,
        caller: Identity,
        owner: Identity,
    },

    /// Unknown product, or history index out of range.
    #[error("{0}")]
    NotFound(NotFoundKind),

    /// A product with this id already exists.
    #[error("Product already exists: {0}")]
    DuplicateProduct(ProductId),

    /// Role code outside the role enumeration.
    #[error("Invalid role code: {0}")]
    InvalidRole(RoleCode),

    /// Caller acted again before a cooldown elapsed.
    #[error("Action too frequent: {guard} requires {required_secs}s between actions, retry at {retry_at}")]
    ActionTooFrequent {
        guard: CooldownGuard,
        required_secs: u64,
        retry_at: Timestamp,
    },

    /// Caller hit a windowed cap.
    #[error("Rate limit exceeded: at most {max} {limit} per {window_secs}s, retry at {retry_at}")]
    RateLimitExceeded {
        limit: RateLimitKind,
        max: usize,
        window_secs: u64,
        retry_at: Timestamp,
    },
}

impl LedgerError {
    /// Stable machine-readable code (the variant name).
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Unauthorized",
            Self::NotOwner { .. } => "NotOwner",
            Self::NotFound(_) => "NotFound",
            Self::DuplicateProduct(_) => "DuplicateProduct",
            Self::InvalidRole(_) => "InvalidRole",
            Self::ActionTooFrequent { .. } => "ActionTooFrequent",
            Self::RateLimitExceeded { .. } => "RateLimitExceeded",
        }
    }

    /// Returns true if resubmitting later may succeed unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ActionTooFrequent { .. } | Self::RateLimitExceeded { .. }
        )
    }

    /// Earliest time a retry could be admitted, for throttling rejections.
    #[must_use]
    pub fn retry_at(&self) -> Option<Timestamp> {
        match self {
            Self::ActionTooFrequent { retry_at, .. } | Self::RateLimitExceeded { retry_at, .. } => {
                Some(*retry_at)
            }
            _ => None,
        }
    }

    pub(crate) fn product_not_found(product_id: &ProductId) -> Self {
        Self::NotFound(NotFoundKind::Product(product_id.clone()))
    }
}

/// Why an `Unauthorized` rejection happened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnauthorizedReason {
    /// Only the registry owner may grant roles.
    #[error("Only contract owner can grant roles (caller {caller})")]
    NotRegistryOwner { caller: Identity },

    /// Caller's role may not perform this transition.
    #[error("Your role is not allowed: {role} cannot {action}")]
    RoleNotAllowed { role: Role, action: RecordKind },

    /// Caller's role may transfer, but not to this recipient.
    #[error("Your role is not allowed: {role} may not transfer to a {recipient_role} ({recipient})")]
    RecipientNotAllowed {
        role: Role,
        recipient: Identity,
        recipient_role: Role,
    },
}

/// What could not be found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotFoundKind {
    /// No product with this id.
    #[error("Product does not exist: {0}")]
    Product(ProductId),

    /// History index past the end.
    #[error("History record {index} does not exist for {product_id} (length {length})")]
    HistoryIndex {
        product_id: ProductId,
        index: usize,
        length: usize,
    },
}

/// Which cooldown guard rejected an action.
///
/// The two guards are independent and evaluated in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownGuard {
    /// Minimum spacing between any two actions of one identity.
    ActionCooldown,
    /// Longer anti-spam spacing for identities not on the exempt list.
    AntiSpam,
}

impl std::fmt::Display for CooldownGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActionCooldown => write!(f, "action cooldown"),
            Self::AntiSpam => write!(f, "anti-spam cooldown"),
        }
    }
}

/// Which windowed cap rejected an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitKind {
    /// Warranty transitions per short window.
    Warranty,
    /// Repair transitions per short window.
    RepairShort,
    /// Repair transitions per day.
    RepairDaily,
    /// Transitions of any kind per hour.
    Activity,
}

impl std::fmt::Display for RateLimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warranty => write!(f, "warranty claims"),
            Self::RepairShort | Self::RepairDaily => write!(f, "repairs"),
            Self::Activity => write!(f, "actions"),
        }
    }
}
