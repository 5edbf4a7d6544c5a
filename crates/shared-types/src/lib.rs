//! # Shared Types Crate
//!
//! Primitive types used across the custody-chain workspace.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identity, hash and timestamp representations
//!   are defined once here and re-exported by the ledger crate.
//! - **Opaque Identity**: an `Identity` is a 20-byte account reference. The
//!   all-zero identity is the "void" transfer destination.
//! - **Deterministic Time**: all windows are expressed in unix seconds supplied
//!   by the caller; nothing in this crate reads the wall clock.

pub mod entities;
pub mod errors;
pub mod rate_limiter;

pub use entities::*;
pub use errors::*;
pub use rate_limiter::SlidingWindowCounter;
