//! Observations
//!
//! Inbound relation data as seen by one dispatch cycle. Observations are
//! level-triggered: each cycle carries the complete current view of every
//! relation, and may repeat the previous cycle's view unchanged.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// Role of a cluster member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// DataNode attached to this NameNode
    Worker,
    /// The other NameNode of the HA pair
    Peer,
    /// JournalNode replica
    Journal,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Worker, Role::Peer, Role::Journal];

    /// Persisted key of this role's member map
    pub fn members_key(&self) -> &'static str {
        match self {
            Role::Worker => "members.worker",
            Role::Peer => "members.peer",
            Role::Journal => "members.journal",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Worker => write!(f, "WORKER"),
            Role::Peer => write!(f, "PEER"),
            Role::Journal => write!(f, "JOURNAL"),
        }
    }
}

/// A member of one of the observed relations. Identity is the name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub name: String,
    pub address: String,
    pub role: Role,
}

impl ClusterMember {
    pub fn new(name: impl Into<String>, address: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            role,
        }
    }
}

/// A node as reported on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddr {
    pub name: String,
    pub address: String,
}

impl NodeAddr {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    pub fn member(&self, role: Role) -> ClusterMember {
        ClusterMember::new(self.name.clone(), self.address.clone(), role)
    }
}

/// Worker relation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerObservation {
    #[serde(default)]
    pub joined_nodes: Vec<NodeAddr>,
    #[serde(default)]
    pub left_nodes: Vec<NodeAddr>,
}

/// Peer NameNode relation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerObservation {
    /// NameNode names known to the peer
    #[serde(default)]
    pub cluster_nodes: Vec<String>,
    /// Credential material published by the peer
    #[serde(default)]
    pub ssh_credential: Option<String>,
    /// Peer's address -> name table, used to resolve `cluster_nodes`
    #[serde(default)]
    pub hosts_table: BTreeMap<String, String>,
    /// Peer reports that the shared edit log was initialized
    #[serde(default)]
    pub journal_init_signal: bool,
}

impl PeerObservation {
    /// Remote NameNodes the peer announced, excluding `local`, with their
    /// addresses when the peer's table resolves them
    pub fn remote_members(&self, local: &str) -> Vec<ClusterMember> {
        self.cluster_nodes
            .iter()
            .filter(|name| name.as_str() != local)
            .filter_map(|name| {
                self.hosts_table
                    .iter()
                    .find(|(_, n)| *n == name)
                    .map(|(addr, _)| ClusterMember::new(name.clone(), addr.clone(), Role::Peer))
            })
            .collect()
    }
}

/// JournalNode relation view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalObservation {
    #[serde(default)]
    pub nodes: Vec<NodeAddr>,
    #[serde(default = "default_journal_port")]
    pub port: u16,
    /// Quorum as reported by the replicas themselves (informational)
    #[serde(default)]
    pub quorum_reached: bool,
    /// Replicas report that the shared edit log was initialized
    #[serde(default)]
    pub initialized: bool,
}

fn default_journal_port() -> u16 {
    8485
}

impl JournalObservation {
    /// Distinct replica names
    pub fn distinct_names(&self) -> BTreeSet<String> {
        self.nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Distinct replicas as members, last address wins
    pub fn members(&self) -> BTreeMap<String, String> {
        self.nodes
            .iter()
            .map(|n| (n.name.clone(), n.address.clone()))
            .collect()
    }
}

/// Complete view of all relations for one dispatch cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observations {
    /// The NameNode daemon is installed
    #[serde(default = "default_installed")]
    pub installed: bool,
    #[serde(default)]
    pub workers: WorkerObservation,
    /// None when the peer relation is absent
    #[serde(default)]
    pub peer: Option<PeerObservation>,
    /// None when the journal relation is absent
    #[serde(default)]
    pub journal: Option<JournalObservation>,
    /// Service registry relation present
    #[serde(default)]
    pub registry_present: bool,
}

fn default_installed() -> bool {
    true
}

impl Default for Observations {
    fn default() -> Self {
        Self {
            installed: true,
            workers: WorkerObservation::default(),
            peer: None,
            journal: None,
            registry_present: false,
        }
    }
}

impl Observations {
    /// An HA pairing was requested by relating a peer NameNode
    pub fn ha_requested(&self) -> bool {
        self.peer.is_some()
    }

    /// JournalNodes, or the peer on their behalf, report that the shared
    /// edit log was initialized
    pub fn journal_initialized(&self) -> bool {
        self.journal.as_ref().map(|j| j.initialized).unwrap_or(false)
            || self.peer.as_ref().map(|p| p.journal_init_signal).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observation_document() {
        let json = r#"{
            "workers": {"joined_nodes": [{"name": "dn-0", "address": "10.0.1.1"}]},
            "peer": {
                "cluster_nodes": ["nn-0", "nn-1"],
                "ssh_credential": "ssh-rsa AAAA nn-1",
                "hosts_table": {"10.0.0.11": "nn-1"}
            },
            "journal": {"nodes": [{"name": "jn-0", "address": "10.0.2.1"}]}
        }"#;

        let obs: Observations = serde_json::from_str(json).unwrap();
        assert!(obs.installed);
        assert_eq!(obs.workers.joined_nodes.len(), 1);
        assert!(obs.workers.left_nodes.is_empty());
        assert!(obs.ha_requested());
        assert_eq!(obs.journal.as_ref().unwrap().port, 8485);
        assert!(!obs.journal_initialized());
    }

    #[test]
    fn test_remote_members_skip_local_and_unresolved() {
        let peer = PeerObservation {
            cluster_nodes: vec!["nn-0".into(), "nn-1".into(), "nn-2".into()],
            hosts_table: [("10.0.0.11".to_string(), "nn-1".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let remote = peer.remote_members("nn-0");
        assert_eq!(remote, vec![ClusterMember::new("nn-1", "10.0.0.11", Role::Peer)]);
    }

    #[test]
    fn test_journal_distinct_names() {
        let journal = JournalObservation {
            nodes: vec![
                NodeAddr::new("jn-0", "10.0.2.1"),
                NodeAddr::new("jn-0", "10.0.2.1"),
                NodeAddr::new("jn-1", "10.0.2.2"),
            ],
            ..Default::default()
        };
        assert_eq!(journal.distinct_names().len(), 2);
    }

    #[test]
    fn test_journal_signal_from_peer() {
        let obs = Observations {
            peer: Some(PeerObservation {
                journal_init_signal: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(obs.journal_initialized());
    }
}
