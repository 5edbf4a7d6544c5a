//! # Custody Node
//!
//! Process wrapper around the custody ledger.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize telemetry (logs on stderr, metrics registry)
//! 3. Validate the configuration for production
//! 4. Restore the snapshot, if one is configured and present
//! 5. Serve JSON lines from stdin until end of input or `{"control":"shutdown"}`
//! 6. Write the snapshot back
//!
//! ## Line Protocol
//!
//! Each input line is either a [`custody_ledger::ipc::LedgerEnvelope`] or a
//! control line (`{"control":"metrics"}`, `{"control":"shutdown"}`). Each
//! answered line produces one JSON line on stdout.

pub mod config;
pub mod runtime;

pub use config::{NodeConfig, NodeConfigError, DEFAULT_QUEUE_CAPACITY};
pub use runtime::{
    ControlCommand, ControlReply, InboundLine, MalformedLine, NodeRuntime, RunSummary,
};
