//! # IPC Message Payloads
//!
//! Request/response types for driving the ledger over a message channel.
//!
//! Identity lives in the envelope only: `caller` is set by whatever
//! authenticated the submitter, never by the request body.

use crate::adapters::snapshot::LedgerSnapshot;
use crate::domain::anomaly::RateStatus;
use crate::domain::entities::{
    HistoryRecord, HistoryVerification, ProductView, RoleAssignment, RoleGrant, TransitionReceipt,
};
use crate::domain::value_objects::{Identity, ProductId, Role, RoleCode, Timestamp};
use crate::errors::LedgerError;
use crate::events::LedgerEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEnvelope {
    /// Correlation ID for request tracking.
    pub correlation_id: Uuid,
    /// Submitting identity.
    pub caller: Identity,
    /// Commit time. Filled from the handler's clock when absent.
    ///
    /// Cooldowns, rate windows and the premature-warranty rule all read this
    /// value, so only a trusted submitter (a replay harness or the node's own
    /// front end) may set it. Untrusted callers must leave it empty.
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub request: LedgerRequest,
}

/// Ledger operations, named after the method surface a UI calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum LedgerRequest {
    GrantRole {
        identity: Identity,
        role: RoleCode,
    },
    RoleOf {
        identity: Identity,
    },
    OwnerOf,
    MembersOf {
        role: RoleCode,
    },
    RoleAssignments,
    /// Grant log replay; `from = 0` replays from genesis.
    RoleGrants {
        #[serde(default)]
        from: u64,
    },
    CreateProduct {
        id: ProductId,
        info: String,
    },
    TransferProduct {
        id: ProductId,
        to: Identity,
        #[serde(default)]
        note: String,
    },
    WarrantyProduct {
        id: ProductId,
        #[serde(default)]
        note: String,
    },
    RepairProduct {
        id: ProductId,
        #[serde(default)]
        note: String,
    },
    GetProduct {
        id: ProductId,
    },
    IsProductSuspicious {
        id: ProductId,
    },
    GetSuspiciousReason {
        id: ProductId,
    },
    GetProductHistoryLength {
        id: ProductId,
    },
    GetProductHistoryRecord {
        id: ProductId,
        index: usize,
    },
    GetProductHistory {
        id: ProductId,
    },
    VerifyProductHistory {
        id: ProductId,
    },
    SuspiciousProducts,
    /// Rate standing of `identity`, or of the caller when absent.
    RateStatus {
        #[serde(default)]
        identity: Option<Identity>,
    },
    /// Notification feed replay.
    Events {
        #[serde(default)]
        from: u64,
    },
    Snapshot,
}

impl LedgerRequest {
    /// Method name, as it appears on the wire.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::GrantRole { .. } => "grantRole",
            Self::RoleOf { .. } => "roleOf",
            Self::OwnerOf => "ownerOf",
            Self::MembersOf { .. } => "membersOf",
            Self::RoleAssignments => "roleAssignments",
            Self::RoleGrants { .. } => "roleGrants",
            Self::CreateProduct { .. } => "createProduct",
            Self::TransferProduct { .. } => "transferProduct",
            Self::WarrantyProduct { .. } => "warrantyProduct",
            Self::RepairProduct { .. } => "repairProduct",
            Self::GetProduct { .. } => "getProduct",
            Self::IsProductSuspicious { .. } => "isProductSuspicious",
            Self::GetSuspiciousReason { .. } => "getSuspiciousReason",
            Self::GetProductHistoryLength { .. } => "getProductHistoryLength",
            Self::GetProductHistoryRecord { .. } => "getProductHistoryRecord",
            Self::GetProductHistory { .. } => "getProductHistory",
            Self::VerifyProductHistory { .. } => "verifyProductHistory",
            Self::SuspiciousProducts => "suspiciousProducts",
            Self::RateStatus { .. } => "rateStatus",
            Self::Events { .. } => "events",
            Self::Snapshot => "snapshot",
        }
    }

    /// Returns true for requests that change ledger state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::GrantRole { .. }
                | Self::CreateProduct { .. }
                | Self::TransferProduct { .. }
                | Self::WarrantyProduct { .. }
                | Self::RepairProduct { .. }
        )
    }
}

/// Successful result of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LedgerReply {
    Granted(RoleGrant),
    Receipt(TransitionReceipt),
    Role(Role),
    Identity(Identity),
    Identities(Vec<Identity>),
    Assignments(Vec<RoleAssignment>),
    Grants(Vec<RoleGrant>),
    Product(ProductView),
    Flag(bool),
    Reason(String),
    Length(usize),
    Record(HistoryRecord),
    History(Vec<HistoryRecord>),
    Verification(HistoryVerification),
    Products(Vec<ProductView>),
    RateStatus(RateStatus),
    Events(Vec<LedgerEvent>),
    Snapshot(LedgerSnapshot),
}

/// Error body carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable code: a `LedgerError` variant name, or `BadRequest`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Earliest retry time for throttling rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<Timestamp>,
}

impl From<&LedgerError> for ErrorBody {
    fn from(err: &LedgerError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            retry_at: err.retry_at(),
        }
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerResponseEnvelope {
    /// Correlation ID matching the request (nil when the request was unreadable).
    pub correlation_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LedgerReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl LedgerResponseEnvelope {
    #[must_use]
    pub fn ok(correlation_id: Uuid, reply: LedgerReply) -> Self {
        Self {
            correlation_id,
            result: Some(reply),
            error: None,
        }
    }

    #[must_use]
    pub fn rejected(correlation_id: Uuid, err: &LedgerError) -> Self {
        Self {
            correlation_id,
            result: None,
            error: Some(ErrorBody::from(err)),
        }
    }

    /// Response for input that could not be parsed into an envelope.
    #[must_use]
    pub fn bad_request(correlation_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            result: None,
            error: Some(ErrorBody {
                code: "BadRequest".to_string(),
                message: message.into(),
                retry_at: None,
            }),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Error code, if the request failed.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}
