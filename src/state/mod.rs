//! State Management Module
//!
//! Persisted coordination state: the flag DAG, change fingerprints, the
//! slave list, member maps and the host table, all stored in one
//! key-value store.

mod store;
mod snapshot;
pub mod flags;
pub mod fingerprint;

pub use store::{KeyChange, StateStore};
pub use snapshot::{MemberMap, Mutation, StateSnapshot, StateTxn, HOSTS_KEY, SLAVES_KEY};
pub use flags::{Flag, FlagSet};
pub use fingerprint::{Aspect, Fingerprint};
