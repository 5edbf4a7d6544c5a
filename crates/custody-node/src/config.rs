//! # Node Configuration
//!
//! Ledger, telemetry and runtime parameters, loaded from the environment.
//!
//! ## Security Requirements
//!
//! - the registry owner MUST NOT be the zero identity in production
//! - the request queue must hold at least one request

use custody_ledger::config::{ConfigError as LedgerConfigError, LedgerConfig};
use custody_telemetry::TelemetryConfig;
use shared_types::Identity;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Default capacity of the request queue between reader and writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Owner and anomaly policy.
    pub ledger: LedgerConfig,
    /// Logging setup.
    pub telemetry: TelemetryConfig,
    /// Requests buffered ahead of the writer.
    pub queue_capacity: usize,
    /// Snapshot loaded at startup (if present) and written at shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            telemetry: TelemetryConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            snapshot_path: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error(transparent)]
    Ledger(#[from] LedgerConfigError),

    #[error("CC_QUEUE_CAPACITY is not a valid number: {0:?}")]
    InvalidQueueCapacity(String),

    #[error(
        "SECURITY VIOLATION: registry owner is the zero identity. \
         Set the CC_OWNER environment variable."
    )]
    InsecureOwner,

    #[error("request queue capacity must be at least 1")]
    EmptyQueue,
}

impl NodeConfig {
    /// Create configuration from environment variables.
    ///
    /// Besides the ledger and telemetry variables:
    /// - `CC_QUEUE_CAPACITY` (default: 1024)
    /// - `CC_SNAPSHOT_PATH` (default: none)
    pub fn from_env() -> Result<Self, NodeConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NodeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ledger = LedgerConfig::from_lookup(&lookup)?;
        let telemetry = TelemetryConfig::from_lookup(&lookup);

        let queue_capacity = match lookup("CC_QUEUE_CAPACITY") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| NodeConfigError::InvalidQueueCapacity(value))?,
            None => DEFAULT_QUEUE_CAPACITY,
        };

        let snapshot_path = lookup("CC_SNAPSHOT_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            ledger,
            telemetry,
            queue_capacity,
            snapshot_path,
        })
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the owner is the zero identity
    /// - the queue capacity is zero
    pub fn validate_for_production(&self) -> Result<(), NodeConfigError> {
        if self.ledger.owner == Identity::ZERO {
            return Err(NodeConfigError::InsecureOwner);
        }
        if self.queue_capacity == 0 {
            return Err(NodeConfigError::EmptyQueue);
        }
        Ok(())
    }
}
