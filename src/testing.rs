//! Test fakes
//!
//! Recording implementations of every collaborator and a harness wiring
//! them to an in-memory store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{ClusterStatus, Coordinator, Executor, Settings};
use crate::error::{Error, Result};
use crate::hosts::HostsTable;
use crate::observe::{JournalObservation, NodeAddr, PeerObservation};
use crate::service::{
    Collaborators, HostsSync, NameNodeService, PeerPayload, PeerProbe, RelationBus,
    ServiceRegistration, SharedConsensus, SharedLeadership, StatusReporter, WorkerPayload,
};
use crate::state::{StateSnapshot, StateStore};
use crate::wait::WaitPolicy;

/// Settings for `name`; nn-N listens on 10.0.0.1N
pub fn settings(name: &str) -> Settings {
    let index = name
        .rsplit('-')
        .next()
        .and_then(|n| n.parse::<u8>().ok())
        .unwrap_or(0);
    Settings {
        node_name: name.to_string(),
        node_address: format!("10.0.0.{}", 10 + index),
        credential: format!("ssh-rsa AAAA {}", name),
        cluster_name: "hdfs".to_string(),
        hdfs_port: 8020,
        webhdfs_port: 50070,
        hadoop_version: "2.7.1".to_string(),
        min_journal_quorum: 3,
        spec: BTreeMap::new(),
    }
}

/// `count` distinct JournalNodes jn-0.. on the default port
pub fn journal(count: usize) -> JournalObservation {
    JournalObservation {
        nodes: (0..count)
            .map(|i| NodeAddr::new(format!("jn-{}", i), format!("10.0.2.{}", i + 1)))
            .collect(),
        port: 8485,
        quorum_reached: count >= 3,
        initialized: false,
    }
}

/// Peer relation announcing `remote` at `address`
pub fn peer(remote: &str, address: &str) -> PeerObservation {
    PeerObservation {
        cluster_nodes: vec![remote.to_string()],
        ssh_credential: Some(format!("ssh-rsa AAAA {}", remote)),
        hosts_table: [(address.to_string(), remote.to_string())].into_iter().collect(),
        journal_init_signal: false,
    }
}

#[derive(Default)]
pub struct RecordingNameNode {
    calls: Mutex<Vec<String>>,
    failing: Mutex<Option<String>>,
}

impl RecordingNameNode {
    fn record(&self, op: &str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        match self.failing.lock().unwrap().as_deref() {
            Some(failing) if failing == op => Err(Error::service(op, "injected failure")),
            _ => Ok(()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn fail_on(&self, op: &str) {
        *self.failing.lock().unwrap() = Some(op.to_string());
    }

    pub fn heal(&self) {
        *self.failing.lock().unwrap() = None;
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl NameNodeService for RecordingNameNode {
    async fn configure(&self) -> Result<()> {
        self.record("configure")
    }
    async fn format(&self) -> Result<()> {
        self.record("format")
    }
    async fn start(&self) -> Result<()> {
        self.record("start")
    }
    async fn stop(&self) -> Result<()> {
        self.record("stop")
    }
    async fn reload(&self) -> Result<()> {
        self.record("reload")
    }
    async fn create_dirs(&self) -> Result<()> {
        self.record("create_dirs")
    }
    async fn open_ports(&self) -> Result<()> {
        self.record("open_ports")
    }
    async fn register_slaves(&self, _slaves: &[String]) -> Result<()> {
        self.record("register_slaves")
    }
    async fn configure_journal(&self, _nodes: &[String], _port: u16) -> Result<()> {
        self.record("configure_journal")
    }
    async fn configure_peers(&self, _peers: &[String]) -> Result<()> {
        self.record("configure_peers")
    }
    async fn install_peer_credential(&self, _credential: &str) -> Result<()> {
        self.record("install_peer_credential")
    }
    async fn init_shared_edits(&self) -> Result<()> {
        self.record("init_shared_edits")
    }
    async fn bootstrap_standby(&self) -> Result<()> {
        self.record("bootstrap_standby")
    }
    async fn configure_consensus(&self, _peers: &[String]) -> Result<()> {
        self.record("configure_consensus")
    }
    async fn format_failover_state(&self) -> Result<()> {
        self.record("format_failover_state")
    }
    async fn restart_dependents(&self) -> Result<()> {
        self.record("restart_dependents")
    }
}

/// Peer that becomes reachable a fixed time after it was scripted
pub struct ScriptedProbe {
    origin: Mutex<Instant>,
    reachable_after: Mutex<Option<Duration>>,
    polls: AtomicUsize,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self {
            origin: Mutex::new(Instant::now()),
            reachable_after: Mutex::new(Some(Duration::ZERO)),
            polls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProbe {
    pub fn reachable_after(&self, delay: Duration) {
        *self.origin.lock().unwrap() = Instant::now();
        *self.reachable_after.lock().unwrap() = Some(delay);
    }

    pub fn never_reachable(&self) {
        *self.reachable_after.lock().unwrap() = None;
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerProbe for ScriptedProbe {
    async fn is_reachable(&self, _host: &str, _port: u16) -> Result<bool> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let origin = *self.origin.lock().unwrap();
        Ok(match *self.reachable_after.lock().unwrap() {
            Some(delay) => origin.elapsed() >= delay,
            None => false,
        })
    }
}

#[derive(Default)]
pub struct RecordingHosts {
    last: Mutex<Option<HostsTable>>,
    syncs: AtomicUsize,
}

impl RecordingHosts {
    pub fn last(&self) -> Option<HostsTable> {
        self.last.lock().unwrap().clone()
    }

    pub fn syncs(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostsSync for RecordingHosts {
    async fn sync(&self, hosts: &HostsTable) -> Result<()> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(hosts.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingRelations {
    pub workers: Mutex<Vec<WorkerPayload>>,
    pub peer: Mutex<Vec<PeerPayload>>,
    pub journal_signals: AtomicUsize,
    pub registered: Mutex<Option<ServiceRegistration>>,
}

impl RecordingRelations {
    pub fn last_workers(&self) -> Option<WorkerPayload> {
        self.workers.lock().unwrap().last().cloned()
    }

    pub fn last_peer(&self) -> Option<PeerPayload> {
        self.peer.lock().unwrap().last().cloned()
    }

    pub fn journal_signals(&self) -> usize {
        self.journal_signals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelationBus for RecordingRelations {
    async fn send_workers(&self, payload: &WorkerPayload) -> Result<()> {
        self.workers.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn send_peer(&self, payload: &PeerPayload) -> Result<()> {
        self.peer.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn signal_journal_initialized(&self) -> Result<()> {
        self.journal_signals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
        *self.registered.lock().unwrap() = Some(registration.clone());
        Ok(())
    }

    async fn unregister_service(&self, _name: &str) -> Result<()> {
        *self.registered.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    last: Mutex<Option<ClusterStatus>>,
}

impl RecordingStatus {
    pub fn last(&self) -> Option<ClusterStatus> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingStatus {
    async fn report(&self, status: &ClusterStatus) -> Result<()> {
        *self.last.lock().unwrap() = Some(status.clone());
        Ok(())
    }
}

/// One coordinator wired to recording fakes
pub struct Harness {
    pub store: Arc<StateStore>,
    pub namenode: Arc<RecordingNameNode>,
    pub leadership: Arc<SharedLeadership>,
    pub consensus: Arc<SharedConsensus>,
    pub probe: Arc<ScriptedProbe>,
    pub hosts: Arc<RecordingHosts>,
    pub relations: Arc<RecordingRelations>,
    pub status: Arc<RecordingStatus>,
    pub collab: Collaborators,
    pub cancel: CancellationToken,
    pub coordinator: Arc<Coordinator>,
}

impl Harness {
    pub fn new(name: &str, leader: bool) -> Self {
        let store = StateStore::in_memory().expect("in-memory store");
        Self::with_store(name, leader, Arc::new(store))
    }

    /// Fresh fakes on top of an existing store, as after a process restart
    pub fn with_store(name: &str, leader: bool, store: Arc<StateStore>) -> Self {
        let namenode = Arc::new(RecordingNameNode::default());
        let leadership = Arc::new(SharedLeadership::new(leader));
        let consensus = Arc::new(SharedConsensus::default());
        let probe = Arc::new(ScriptedProbe::default());
        let hosts = Arc::new(RecordingHosts::default());
        let relations = Arc::new(RecordingRelations::default());
        let status = Arc::new(RecordingStatus::default());

        let collab = Collaborators {
            namenode: namenode.clone(),
            leadership: leadership.clone(),
            consensus: consensus.clone(),
            probe: probe.clone(),
            hosts: hosts.clone(),
            relations: relations.clone(),
            status: status.clone(),
        };
        let coordinator = Arc::new(Coordinator::new(
            settings(name),
            store.clone(),
            collab.clone(),
            WaitPolicy::default(),
        ));

        Self {
            store,
            namenode,
            leadership,
            consensus,
            probe,
            hosts,
            relations,
            status,
            collab,
            cancel: CancellationToken::new(),
            coordinator,
        }
    }

    pub fn executor(&self) -> Executor<'_> {
        Executor::new(&self.collab, &self.store, WaitPolicy::default(), &self.cancel)
    }

    pub async fn state(&self) -> StateSnapshot {
        StateSnapshot::load(&self.store).await.expect("load state")
    }
}
