//! # Ledger Events
//!
//! Notifications emitted after a transition commits. Consumers (UIs, audit
//! tooling) subscribe through [`crate::ports::outbound::EventSink`] instead of
//! polling the registry.
//!
//! Every event carries a feed-wide `sequence`, assigned by the sink, so a
//! subscriber that reconnects can ask for everything after the last sequence
//! it saw.

use crate::domain::value_objects::{Identity, ProductId, RecordKind, Role, Timestamp};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// The registry owner assigned a role.
    RoleGranted { identity: Identity, role: Role },

    /// A manufacturer registered a product.
    ProductCreated {
        product_id: ProductId,
        manufacturer: Identity,
    },

    /// Ownership moved.
    ProductTransferred {
        product_id: ProductId,
        from: Identity,
        to: Identity,
    },

    /// A warranty center logged a warranty claim.
    WarrantyRecorded {
        product_id: ProductId,
        center: Identity,
    },

    /// A warranty center logged a repair.
    RepairRecorded {
        product_id: ProductId,
        center: Identity,
    },

    /// Classification marked the product suspicious.
    ProductFlagged { product_id: ProductId, reason: String },
}

impl LedgerEventKind {
    /// Event for an accepted product transition.
    #[must_use]
    pub fn for_record(
        kind: RecordKind,
        product_id: ProductId,
        actor: Identity,
        previous_owner: Identity,
        new_owner: Identity,
    ) -> Self {
        match kind {
            RecordKind::Created => Self::ProductCreated {
                product_id,
                manufacturer: actor,
            },
            RecordKind::Transferred => Self::ProductTransferred {
                product_id,
                from: previous_owner,
                to: new_owner,
            },
            RecordKind::Warranty => Self::WarrantyRecorded {
                product_id,
                center: actor,
            },
            RecordKind::Repair => Self::RepairRecorded {
                product_id,
                center: actor,
            },
        }
    }

    /// Short name used in logs and metrics labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoleGranted { .. } => "role_granted",
            Self::ProductCreated { .. } => "product_created",
            Self::ProductTransferred { .. } => "product_transferred",
            Self::WarrantyRecorded { .. } => "warranty_recorded",
            Self::RepairRecorded { .. } => "repair_recorded",
            Self::ProductFlagged { .. } => "product_flagged",
        }
    }
}

/// An event as delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the feed, starting at 0.
    pub sequence: u64,
    /// Commit time of the transition that produced it.
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub kind: LedgerEventKind,
}
