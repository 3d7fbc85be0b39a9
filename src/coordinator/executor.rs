//! Plan Executor
//!
//! Performs a plan's actions in order and commits its staged mutations
//! only once every action succeeded.

use std::sync::Arc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::service::{Collaborators, SERVICE_NAME};
use crate::state::{StateStore, StateTxn};
use crate::wait::{wait_until, WaitPolicy};
use super::plan::{Action, Plan, Step};

/// Result of running one plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    /// Nothing to do
    Idle,
    /// All actions performed and mutations committed
    Applied {
        actions: Vec<&'static str>,
        mutations: usize,
    },
    /// The leadership token was false right before a leader-only action;
    /// the rest of the plan was dropped and nothing was committed
    LeadershipLost { before: &'static str },
    /// An action or the commit failed; nothing was committed and the
    /// stage is retried next cycle
    Failed { error: String },
}

/// Runs plans against the collaborators and the store
pub struct Executor<'a> {
    collab: &'a Collaborators,
    store: &'a StateStore,
    wait: WaitPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        collab: &'a Collaborators,
        store: &'a StateStore,
        wait: WaitPolicy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            collab,
            store,
            wait,
            cancel,
        }
    }

    /// Run `plan`, staging its mutations on `txn`
    pub async fn run(&self, plan: Plan, mut txn: StateTxn) -> Result<Outcome> {
        if plan.is_empty() {
            return Ok(Outcome::Idle);
        }

        let Plan { component, steps } = plan;
        let mut performed = Vec::new();
        let mut staged = 0;

        for step in steps {
            match step {
                Step::Act(action) => {
                    if action.is_leader_only() && !self.collab.leadership.is_leader().await? {
                        tracing::warn!(
                            "{}: no longer leader before {}, abandoning plan",
                            component,
                            action.name()
                        );
                        return Ok(Outcome::LeadershipLost {
                            before: action.name(),
                        });
                    }
                    if let Err(e) = self.perform(&action).await {
                        tracing::error!("{}: {} failed: {}", component, action.name(), e);
                        return Err(e);
                    }
                    performed.push(action.name());
                }
                Step::Commit(mutation) => {
                    txn.stage(mutation)?;
                    staged += 1;
                }
            }
        }

        txn.commit(self.store).await?;
        Ok(Outcome::Applied {
            actions: performed,
            mutations: staged,
        })
    }

    async fn perform(&self, action: &Action) -> Result<()> {
        let namenode = &self.collab.namenode;
        let relations = &self.collab.relations;

        match action {
            Action::ConfigureNameNode => namenode.configure().await,
            Action::FormatNameNode => namenode.format().await,
            Action::StartNameNode => namenode.start().await,
            Action::StopNameNode => namenode.stop().await,
            Action::ReloadNameNode => namenode.reload().await,
            Action::CreateDirs => namenode.create_dirs().await,
            Action::OpenPorts => namenode.open_ports().await,
            Action::RegisterSlaves(slaves) => namenode.register_slaves(slaves).await,
            Action::SyncHosts(hosts) => self.collab.hosts.sync(hosts).await,
            Action::ConfigureJournal { nodes, port } => namenode.configure_journal(nodes, *port).await,
            Action::ConfigurePeers(peers) => namenode.configure_peers(peers).await,
            Action::InstallPeerCredential(credential) => {
                namenode.install_peer_credential(credential).await
            }
            Action::WaitForPeer { host, port } => {
                let probe = Arc::clone(&self.collab.probe);
                let what = format!("peer NameNode {}:{}", host, port);
                let waited = wait_until(&what, self.wait, self.cancel, || {
                    let probe = Arc::clone(&probe);
                    let host = host.clone();
                    let port = *port;
                    async move { probe.is_reachable(&host, port).await }
                })
                .await?;
                tracing::info!("Peer NameNode {}:{} reachable after {:?}", host, port, waited);
                Ok(())
            }
            Action::InitSharedEdits => namenode.init_shared_edits().await,
            Action::SignalJournalInitialized => relations.signal_journal_initialized().await,
            Action::BootstrapStandby => namenode.bootstrap_standby().await,
            Action::ConfigureConsensus(peers) => namenode.configure_consensus(peers).await,
            Action::FormatFailoverState => namenode.format_failover_state().await,
            Action::RestartDependents => namenode.restart_dependents().await,
            Action::PublishWorkers(payload) => relations.send_workers(payload).await,
            Action::PublishPeer(payload) => relations.send_peer(payload).await,
            Action::RegisterService(registration) => relations.register_service(registration).await,
            Action::UnregisterService(name) => {
                debug_assert_eq!(name, SERVICE_NAME);
                relations.unregister_service(name).await
            }
            Action::ReportStatus(status) => self.collab.status.report(status).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::state::{Flag, StateSnapshot};
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_empty_plan_is_idle() {
        let h = Harness::new("nn-0", true);
        let txn = StateTxn::load(&h.store).await.unwrap();
        let outcome = h.executor().run(Plan::new("test"), txn).await.unwrap();
        assert_eq!(outcome, Outcome::Idle);
    }

    #[tokio::test]
    async fn test_failure_commits_nothing() {
        let h = Harness::new("nn-0", true);
        h.namenode.fail_on("start");

        let mut plan = Plan::new("test");
        plan.act(Action::ConfigureNameNode)
            .set_flag(Flag::Started)
            .act(Action::StartNameNode);

        let txn = StateTxn::load(&h.store).await.unwrap();
        let err = h.executor().run(plan, txn).await.unwrap_err();
        assert!(matches!(err, Error::Service { .. }));
        assert!(!StateSnapshot::load(&h.store).await.unwrap().has(Flag::Started));
        assert_eq!(h.namenode.calls(), vec!["configure", "start"]);
    }

    #[tokio::test]
    async fn test_leader_only_action_rechecks_token() {
        let h = Harness::new("nn-0", false);

        let mut plan = Plan::new("test");
        plan.act(Action::StopNameNode)
            .act(Action::InitSharedEdits)
            .set_flag(Flag::Quorum)
            .act(Action::StartNameNode);

        let txn = StateTxn::load(&h.store).await.unwrap();
        let outcome = h.executor().run(plan, txn).await.unwrap();
        assert_eq!(outcome, Outcome::LeadershipLost { before: "init-shared-edits" });
        assert_eq!(h.namenode.count("init_shared_edits"), 0);
        assert!(!StateSnapshot::load(&h.store).await.unwrap().has(Flag::Quorum));
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_wait_timeout_leaves_state_untouched() {
        let h = Harness::new("nn-0", true);
        h.probe.never_reachable();

        let mut plan = Plan::new("test");
        plan.set_flag(Flag::Quorum)
            .act(Action::WaitForPeer {
                host: "10.0.0.11".into(),
                port: 8020,
            })
            .clear_flag(Flag::Degraded);

        let txn = StateTxn::load(&h.store).await.unwrap();
        let err = h.executor().run(plan, txn).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(h.store.dump().await.unwrap().is_empty());
    }
}
