//! Cluster Status
//!
//! User-visible status derived from persisted flags and the slave count.

use serde::{Deserialize, Serialize};

use crate::state::{Flag, StateSnapshot};

/// Status level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Blocked,
    Waiting,
    Active,
}

impl std::fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusLevel::Blocked => write!(f, "blocked"),
            StatusLevel::Waiting => write!(f, "waiting"),
            StatusLevel::Active => write!(f, "active"),
        }
    }
}

/// Status level with its message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub level: StatusLevel,
    pub message: String,
    pub workers: usize,
}

impl std::fmt::Display for ClusterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.level)
    }
}

impl ClusterStatus {
    fn new(level: StatusLevel, message: impl Into<String>, workers: usize) -> Self {
        Self {
            level,
            message: message.into(),
            workers,
        }
    }

    /// Derive the status from current state.
    ///
    /// `peer_related` is whether the peer relation currently exists.
    pub fn derive(state: &StateSnapshot, peer_related: bool, min_quorum: usize) -> Self {
        let workers = state.slaves.len();

        if !state.has(Flag::Started) {
            return Self::new(StatusLevel::Waiting, "Waiting for NameNode to start", workers);
        }
        if workers == 0 {
            return Self::new(StatusLevel::Blocked, "Waiting for relation to DataNodes", workers);
        }
        if !peer_related {
            return Self::new(StatusLevel::Blocked, "Waiting for relation to peer NameNode", workers);
        }
        if !state.has(Flag::Quorum) {
            return Self::new(
                StatusLevel::Waiting,
                format!("Waiting for {} JournalNodes", min_quorum),
                workers,
            );
        }
        if !state.has(Flag::PeerConfigured) {
            return Self::new(StatusLevel::Waiting, "Waiting for peer NameNode", workers);
        }
        if state.has(Flag::Degraded) {
            return Self::new(StatusLevel::Waiting, "HA degraded", workers);
        }
        if !state.has(Flag::HaInitialized) {
            return Self::new(StatusLevel::Waiting, "Waiting for HA initialization", workers);
        }

        Self::new(
            StatusLevel::Active,
            format!(
                "Ready ({} DataNode{})",
                workers,
                if workers > 1 { "s" } else { "" }
            ),
            workers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(workers: &[&str]) -> StateSnapshot {
        StateSnapshot {
            flags: [
                Flag::Started,
                Flag::Quorum,
                Flag::PeerConfigured,
                Flag::HaInitialized,
            ]
            .into_iter()
            .collect(),
            slaves: workers.iter().map(|w| w.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_active_pluralization() {
        let one = ClusterStatus::derive(&healthy(&["dn-0"]), true, 3);
        assert_eq!(one.level, StatusLevel::Active);
        assert_eq!(one.message, "Ready (1 DataNode)");

        let two = ClusterStatus::derive(&healthy(&["dn-0", "dn-1"]), true, 3);
        assert_eq!(two.message, "Ready (2 DataNodes)");
    }

    #[test]
    fn test_blocked_without_workers_or_peer() {
        let status = ClusterStatus::derive(&healthy(&[]), true, 3);
        assert_eq!(status.level, StatusLevel::Blocked);
        assert_eq!(status.message, "Waiting for relation to DataNodes");

        let status = ClusterStatus::derive(&healthy(&["dn-0"]), false, 3);
        assert_eq!(status.level, StatusLevel::Blocked);
    }

    #[test]
    fn test_waiting_while_degraded() {
        let mut state = healthy(&["dn-0"]);
        state.flags = state.flags.iter().chain([Flag::Degraded]).collect();
        let status = ClusterStatus::derive(&state, true, 3);
        assert_eq!(status.level, StatusLevel::Waiting);
        assert_eq!(status.message, "HA degraded");
    }

    #[test]
    fn test_waiting_for_quorum() {
        let mut state = healthy(&["dn-0"]);
        state.flags.clear(Flag::Quorum);
        let status = ClusterStatus::derive(&state, true, 3);
        assert_eq!(status.message, "Waiting for 3 JournalNodes");
    }
}
