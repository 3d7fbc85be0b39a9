//! External Collaborators
//!
//! Interfaces to everything outside the coordination core: the NameNode
//! daemon, the leadership and consensus capabilities, peer reachability,
//! the OS resolver, relation transport and status reporting.

mod command;
mod shared;

pub use command::{CommandNameNode, EtcHostsSync, FileRelationBus, LogStatusReporter, TcpProbe};
pub use shared::{SharedConsensus, SharedLeadership};

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::coordinator::ClusterStatus;
use crate::error::Result;
use crate::hosts::HostsTable;

/// Administrative operations on the local NameNode daemon
#[async_trait]
pub trait NameNodeService: Send + Sync {
    async fn configure(&self) -> Result<()>;
    async fn format(&self) -> Result<()>;
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Hot-reload without restart
    async fn reload(&self) -> Result<()>;
    async fn create_dirs(&self) -> Result<()>;
    async fn open_ports(&self) -> Result<()>;
    /// Replace the registered-slaves list
    async fn register_slaves(&self, slaves: &[String]) -> Result<()>;
    async fn configure_journal(&self, nodes: &[String], port: u16) -> Result<()>;
    async fn configure_peers(&self, peers: &[String]) -> Result<()>;
    async fn install_peer_credential(&self, credential: &str) -> Result<()>;
    async fn init_shared_edits(&self) -> Result<()>;
    async fn bootstrap_standby(&self) -> Result<()>;
    async fn configure_consensus(&self, peers: &[String]) -> Result<()>;
    async fn format_failover_state(&self) -> Result<()>;
    async fn restart_dependents(&self) -> Result<()>;
}

/// Read-only "is this node the leader" token
#[async_trait]
pub trait LeadershipOracle: Send + Sync {
    async fn is_leader(&self) -> Result<bool>;
}

/// Consensus-service readiness
#[async_trait]
pub trait ConsensusService: Send + Sync {
    /// Peer addresses once the service is ready, None before
    async fn peers(&self) -> Result<Option<Vec<String>>>;
}

/// Reachability of the peer NameNode
#[async_trait]
pub trait PeerProbe: Send + Sync {
    async fn is_reachable(&self, host: &str, port: u16) -> Result<bool>;
}

/// OS-level name resolution
#[async_trait]
pub trait HostsSync: Send + Sync {
    async fn sync(&self, hosts: &HostsTable) -> Result<()>;
}

/// Outbound relation transport
#[async_trait]
pub trait RelationBus: Send + Sync {
    async fn send_workers(&self, payload: &WorkerPayload) -> Result<()>;
    async fn send_peer(&self, payload: &PeerPayload) -> Result<()>;
    async fn signal_journal_initialized(&self) -> Result<()>;
    async fn register_service(&self, registration: &ServiceRegistration) -> Result<()>;
    async fn unregister_service(&self, name: &str) -> Result<()>;
}

/// Human-readable status sink
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn report(&self, status: &ClusterStatus) -> Result<()>;
}

/// Configuration published to workers while ready
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub spec: BTreeMap<String, String>,
    pub cluster_name: String,
    pub coordinator_names: Vec<String>,
    pub hdfs_port: u16,
    pub webhdfs_port: u16,
    pub ssh_credential: String,
    pub hosts_table: BTreeMap<String, String>,
}

/// Payload sent to every connected worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPayload {
    pub ready: bool,
    #[serde(flatten)]
    pub config: Option<WorkerConfig>,
}

impl WorkerPayload {
    pub fn ready(config: WorkerConfig) -> Self {
        Self {
            ready: true,
            config: Some(config),
        }
    }

    /// Not ready; configuration withheld
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            config: None,
        }
    }
}

/// Payload exchanged with the peer NameNode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPayload {
    pub cluster_nodes: Vec<String>,
    pub ssh_credential: String,
    pub hosts_table: BTreeMap<String, String>,
    pub journal_init_signal: bool,
}

/// Entry in the service registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    pub service_name: String,
    pub hdfs_port: u16,
    pub webhdfs_port: u16,
    pub version: String,
}

/// Name under which the NameNode registers itself
pub const SERVICE_NAME: &str = "hdfs";

/// Bundle of every collaborator the coordinator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub namenode: Arc<dyn NameNodeService>,
    pub leadership: Arc<dyn LeadershipOracle>,
    pub consensus: Arc<dyn ConsensusService>,
    pub probe: Arc<dyn PeerProbe>,
    pub hosts: Arc<dyn HostsSync>,
    pub relations: Arc<dyn RelationBus>,
    pub status: Arc<dyn StatusReporter>,
}
