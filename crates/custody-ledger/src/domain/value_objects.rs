//! # Value Objects
//!
//! Immutable domain primitives for custody tracking.

use serde::{Deserialize, Serialize};
use std::fmt;

pub use shared_types::{Hash, Identity, Timestamp};

/// Numeric role code as it crosses the API. Wider than the enumeration so
/// any submitted integer reaches role validation.
pub type RoleCode = u64;

// =============================================================================
// ROLE
// =============================================================================

/// Participant role in the custody chain.
///
/// An identity holds exactly one role at a time. The numeric codes are part
/// of the external interface (`grantRole(identity, code)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// No role; the default for unknown identities.
    #[default]
    None = 0,
    /// Creates products and ships them to dealers.
    Manufacturer = 1,
    /// Receives from manufacturers, sells to customers.
    Dealer = 2,
    /// Owns the product; may only hand it to a warranty center.
    Customer = 3,
    /// Records warranty and repair work on products it holds.
    WarrantyCenter = 4,
}

impl Role {
    /// All roles in code order.
    pub const ALL: [Role; 5] = [
        Role::None,
        Role::Manufacturer,
        Role::Dealer,
        Role::Customer,
        Role::WarrantyCenter,
    ];

    /// Numeric code of this role.
    #[must_use]
    pub fn code(self) -> RoleCode {
        self as RoleCode
    }

    /// Parse a numeric role code. Returns `None` outside the enumeration.
    #[must_use]
    pub fn from_code(code: RoleCode) -> Option<Role> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index))
            .copied()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::None => "None",
            Role::Manufacturer => "Manufacturer",
            Role::Dealer => "Dealer",
            Role::Customer => "Customer",
            Role::WarrantyCenter => "WarrantyCenter",
        };
        f.write_str(label)
    }
}

// =============================================================================
// RECORD KIND
// =============================================================================

/// Kind of a history record, one per transition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// Product registered by its manufacturer.
    Created,
    /// Ownership moved to `new_owner`.
    Transferred,
    /// Warranty service recorded; no owner change.
    Warranty,
    /// Repair recorded; no owner change.
    Repair,
}

impl RecordKind {
    /// Single-byte tag used when hashing records.
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            RecordKind::Created => 0,
            RecordKind::Transferred => 1,
            RecordKind::Warranty => 2,
            RecordKind::Repair => 3,
        }
    }

    /// Returns true for kinds whose record carries the new owner.
    #[must_use]
    pub fn sets_owner(self) -> bool {
        matches!(self, RecordKind::Created | RecordKind::Transferred)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Created => "Created",
            RecordKind::Transferred => "Transferred",
            RecordKind::Warranty => "Warranty",
            RecordKind::Repair => "Repair",
        };
        f.write_str(label)
    }
}

// =============================================================================
// PRODUCT ID
// =============================================================================

/// Unique, immutable product key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Wrap a product key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
