//! Plans
//!
//! What one component decided to do in one cycle: an ordered list of
//! collaborator actions interleaved with staged state mutations.

use std::collections::BTreeSet;

use crate::hosts::HostsTable;
use crate::observe::Role;
use crate::service::{PeerPayload, ServiceRegistration, WorkerPayload};
use crate::state::{Aspect, Fingerprint, Flag, MemberMap, Mutation};
use super::status::ClusterStatus;

/// A call to an external collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ConfigureNameNode,
    FormatNameNode,
    StartNameNode,
    StopNameNode,
    ReloadNameNode,
    CreateDirs,
    OpenPorts,
    RegisterSlaves(Vec<String>),
    SyncHosts(HostsTable),
    ConfigureJournal { nodes: Vec<String>, port: u16 },
    ConfigurePeers(Vec<String>),
    InstallPeerCredential(String),
    /// Bounded wait for the peer NameNode's service port
    WaitForPeer { host: String, port: u16 },
    InitSharedEdits,
    SignalJournalInitialized,
    BootstrapStandby,
    ConfigureConsensus(Vec<String>),
    FormatFailoverState,
    RestartDependents,
    PublishWorkers(WorkerPayload),
    PublishPeer(PeerPayload),
    RegisterService(ServiceRegistration),
    UnregisterService(String),
    ReportStatus(ClusterStatus),
}

impl Action {
    /// Actions that mutate shared state and may only run on the leader
    pub fn is_leader_only(&self) -> bool {
        matches!(self, Action::InitSharedEdits | Action::FormatFailoverState)
    }

    /// Short name for logs and reports
    pub fn name(&self) -> &'static str {
        match self {
            Action::ConfigureNameNode => "configure",
            Action::FormatNameNode => "format",
            Action::StartNameNode => "start",
            Action::StopNameNode => "stop",
            Action::ReloadNameNode => "reload",
            Action::CreateDirs => "create-dirs",
            Action::OpenPorts => "open-ports",
            Action::RegisterSlaves(_) => "register-slaves",
            Action::SyncHosts(_) => "sync-hosts",
            Action::ConfigureJournal { .. } => "configure-journal",
            Action::ConfigurePeers(_) => "configure-peers",
            Action::InstallPeerCredential(_) => "install-peer-credential",
            Action::WaitForPeer { .. } => "wait-for-peer",
            Action::InitSharedEdits => "init-shared-edits",
            Action::SignalJournalInitialized => "signal-journal-initialized",
            Action::BootstrapStandby => "bootstrap-standby",
            Action::ConfigureConsensus(_) => "configure-consensus",
            Action::FormatFailoverState => "format-failover-state",
            Action::RestartDependents => "restart-dependents",
            Action::PublishWorkers(_) => "publish-workers",
            Action::PublishPeer(_) => "publish-peer",
            Action::RegisterService(_) => "register-service",
            Action::UnregisterService(_) => "unregister-service",
            Action::ReportStatus(_) => "report-status",
        }
    }
}

/// One step of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Act(Action),
    Commit(Mutation),
}

/// Ordered steps produced by one component
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub component: &'static str,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            steps: Vec::new(),
        }
    }

    pub fn act(&mut self, action: Action) -> &mut Self {
        self.steps.push(Step::Act(action));
        self
    }

    pub fn commit(&mut self, mutation: Mutation) -> &mut Self {
        self.steps.push(Step::Commit(mutation));
        self
    }

    pub fn set_flag(&mut self, flag: Flag) -> &mut Self {
        self.commit(Mutation::SetFlag(flag))
    }

    pub fn clear_flag(&mut self, flag: Flag) -> &mut Self {
        self.commit(Mutation::ClearFlag(flag))
    }

    pub fn put_fingerprint(&mut self, fp: Fingerprint) -> &mut Self {
        self.commit(Mutation::PutFingerprint(fp))
    }

    pub fn drop_fingerprint(&mut self, aspect: Aspect) -> &mut Self {
        self.commit(Mutation::DropFingerprint(aspect))
    }

    pub fn put_slaves(&mut self, slaves: BTreeSet<String>) -> &mut Self {
        self.commit(Mutation::PutSlaves(slaves))
    }

    pub fn put_members(&mut self, role: Role, members: MemberMap) -> &mut Self {
        self.commit(Mutation::PutMembers(role, members))
    }

    pub fn put_hosts(&mut self, hosts: HostsTable) -> &mut Self {
        self.commit(Mutation::PutHosts(hosts))
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Actions in order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.steps.iter().filter_map(|s| match s {
            Step::Act(a) => Some(a),
            Step::Commit(_) => None,
        })
    }

    /// Staged mutations in order
    pub fn mutations(&self) -> impl Iterator<Item = &Mutation> {
        self.steps.iter().filter_map(|s| match s {
            Step::Commit(m) => Some(m),
            Step::Act(_) => None,
        })
    }

    /// Action names in order
    pub fn action_names(&self) -> Vec<&'static str> {
        self.actions().map(Action::name).collect()
    }
}
