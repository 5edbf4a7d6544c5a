//! # Custody Ledger - Product Custody Chain
//!
//! Tracks products through manufacturer → dealer → customer → warranty
//! center, with an append-only history per product and behavioral checks
//! on every write.
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | RoleRegistry | `domain/roles.rs` | Identity → role, owner-administered, with role index and grant log |
//! | HistoryLedger | `domain/history.rs` | Append-only, hash-chained records per product |
//! | ProductRegistry | `domain/registry.rs` | Current owner and suspicious flag per product |
//! | AnomalyDetector | `domain/anomaly.rs` | Admission limits and soft classification |
//! | TransitionEngine | `domain/engine.rs` | The only writer: validate, then commit |
//! | QueryFacade | `domain/query.rs` | Read-only projections |
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Every product's history starts with one `Created` record | `domain/engine.rs` - `create_product()`, checked by `domain/invariants.rs` |
//! | Records are never edited or removed | `domain/history.rs` - append-only API, hash chain |
//! | Owner equals `new_owner` of the last Created/Transferred record | `domain/engine.rs` - `commit()` |
//! | One role per identity | `domain/roles.rs` - `apply_grant()` |
//! | Rejections change nothing | `domain/engine.rs` - checks before `commit()` |
//! | Flags are never cleared | `domain/registry.rs` - `flag()` |
//!
//! ## Check Order
//!
//! Every transition on an existing product: existence → role → ownership →
//! admission (cooldowns, then caps). `create` checks for a duplicate id first.
//!
//! ## Usage Example
//!
//! ```ignore
//! use custody_ledger::prelude::*;
//!
//! let service = create_test_service();
//! let receipt = service
//!     .create_product(RequestContext::new(maker, now), ProductId::from("P1"), "tv".into())
//!     .await?;
//! ```

// Crate-level lints
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod ipc;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::adapters::{InMemoryEventFeed, LedgerSnapshot, SnapshotError};
    pub use crate::config::{ConfigError, LedgerConfig};
    pub use crate::domain::{
        AnomalyPolicy, HistoryRecord, HistoryVerification, Identity, PolicyError, ProductId,
        ProductView, RateStatus, RecordKind, RequestContext, Role, RoleAssignment, RoleCode,
        RoleGrant, Timestamp, TransitionEngine, TransitionReceipt,
    };
    pub use crate::errors::{
        CooldownGuard, LedgerError, NotFoundKind, RateLimitKind, UnauthorizedReason,
    };
    pub use crate::events::{LedgerEvent, LedgerEventKind};
    pub use crate::ipc::{LedgerEnvelope, LedgerReply, LedgerRequest, LedgerResponseEnvelope, RequestHandler};
    pub use crate::ports::{
        CustodyLedgerApi, EventSink, ManualClock, SystemTimeSource, TimeSource,
    };
    pub use crate::service::{create_test_service, CustodyLedgerService, ServiceStats};
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
