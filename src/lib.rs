//! nnha - NameNode HA Coordinator
//!
//! Drives the bring-up of a paired HDFS NameNode: DataNode membership,
//! JournalNode quorum, peer pairing, shared-edits initialization on the
//! leader, standby bootstrap on the follower, automatic-failover
//! configuration, and cluster readiness.
//!
//! # Architecture
//!
//! Every dispatch cycle re-evaluates the complete current view of all
//! relations against the persisted coordination state. Each stage produces
//! a plan of collaborator actions and state mutations; mutations are
//! committed atomically only after all of the plan's actions succeeded, so
//! a failed or interrupted cycle is simply retried.
//!
//! # Features
//!
//! - Flag DAG with cascading invalidation
//! - Fingerprint-based suppression of redundant reconfiguration
//! - Leader-only actions re-checked against the leadership token
//! - Bounded, cancellable peer-reachability wait
//! - Embedded SQLite state store
//! - HTTP API for status and worker readiness

pub mod config;
pub mod error;
pub mod hosts;
pub mod observe;
pub mod state;
pub mod wait;
pub mod service;
pub mod coordinator;
pub mod source;
pub mod api;

#[cfg(test)]
mod testing;

pub use config::CoordinatorConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::CoordinatorConfig;
    pub use crate::error::{Error, Result};
    pub use crate::coordinator::{ClusterStatus, Coordinator, CycleReport, HaPhase, Settings};
    pub use crate::observe::Observations;
    pub use crate::state::{Flag, StateSnapshot, StateStore};
    pub use crate::source::ObservationDocument;
}
