//! # IPC Module
//!
//! Envelope-based request surface for the ledger: payload types and the
//! handler that dispatches them to the service.

pub mod handler;
pub mod payloads;

pub use handler::RequestHandler;
pub use payloads::{
    ErrorBody, LedgerEnvelope, LedgerReply, LedgerRequest, LedgerResponseEnvelope,
};
