//! # Integration Tests
//!
//! Lifecycle flows across the service, the request handler and the node loop.

pub mod flows;
pub mod node;
