//! # Domain Layer (Inner Hexagon)
//!
//! Pure custody logic: stores, policy, detector and the transition engine.
//! NO I/O, NO async, NO logging. Time and caller arrive in a
//! [`RequestContext`](entities::RequestContext).

pub mod anomaly;
pub mod engine;
pub mod entities;
pub mod history;
pub mod invariants;
pub mod policy;
pub mod query;
pub mod registry;
pub mod roles;
pub mod value_objects;

pub use anomaly::{AnomalyDetector, RateStatus};
pub use engine::{Transition, TransitionEngine};
pub use entities::*;
pub use history::{verify_chain, HistoryLedger};
pub use policy::{AnomalyPolicy, PolicyError};
pub use query::QueryFacade;
pub use registry::ProductRegistry;
pub use roles::RoleRegistry;
pub use value_objects::*;
