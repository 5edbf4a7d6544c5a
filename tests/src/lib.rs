//! # Custody Chain Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs      # Shared identities and ledger setup
//! ├── exploits/        # Abuse simulations
//! │   ├── spam.rs      # Cooldown and cap evasion
//! │   ├── forgery.rs   # Acting on products or roles you don't hold
//! │   └── tampering.rs # Edited snapshots and histories
//! │
//! └── integration/     # Lifecycle flows through service, handler and node
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cc-tests
//!
//! # By category
//! cargo test -p cc-tests integration::
//! cargo test -p cc-tests exploits::
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod exploits;
pub mod fixtures;
pub mod integration;
