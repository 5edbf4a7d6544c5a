//! # Exploit Simulations
//!
//! Each module plays an abusive caller against a fresh ledger and checks
//! that the attempt is rejected (or flagged) without leaving a trace.

pub mod forgery;
pub mod spam;
pub mod tampering;
