//! # Ports Layer
//!
//! - **Inbound (Driving)**: [`CustodyLedgerApi`], implemented by the service
//! - **Outbound (Driven)**: [`TimeSource`] and [`EventSink`], implemented by adapters

pub mod inbound;
pub mod outbound;

pub use inbound::CustodyLedgerApi;
pub use outbound::{EventSink, ManualClock, SystemTimeSource, TimeSource};
