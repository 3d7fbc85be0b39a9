//! Readiness Publisher
//!
//! Publishes the cluster configuration to workers while the NameNode is
//! HA-initialized, not degraded, and has at least one worker; otherwise
//! tells workers it is not ready. Also keeps the peer payload, the service registration and
//! the status message current.

use std::collections::BTreeSet;

use crate::observe::{Observations, Role};
use crate::service::{ServiceRegistration, WorkerConfig, WorkerPayload, SERVICE_NAME};
use crate::state::{Flag, StateSnapshot};
use super::pairing::peer_payload;
use super::{Action, ClusterStatus, EvalContext, Plan};

/// Ready means HA-initialized, not degraded, with at least one registered
/// worker
pub fn is_ready(state: &StateSnapshot) -> bool {
    state.has(Flag::HaInitialized) && !state.has(Flag::Degraded) && !state.slaves.is_empty()
}

/// Local NameNode plus every known peer NameNode
fn coordinator_names(ctx: &EvalContext<'_>, state: &StateSnapshot) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = state.members_of(Role::Peer).into_keys().collect();
    names.insert(ctx.settings.node_name.clone());
    names
}

pub fn worker_config(ctx: &EvalContext<'_>, state: &StateSnapshot) -> WorkerConfig {
    let settings = ctx.settings;
    let mut hosts_table = state.hosts.to_map();
    hosts_table.insert(settings.node_address.clone(), settings.node_name.clone());
    WorkerConfig {
        spec: settings.spec.clone(),
        cluster_name: settings.cluster_name.clone(),
        coordinator_names: coordinator_names(ctx, state).into_iter().collect(),
        hdfs_port: settings.hdfs_port,
        webhdfs_port: settings.webhdfs_port,
        ssh_credential: settings.credential.clone(),
        hosts_table,
    }
}

pub fn evaluate(ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("readiness");
    let settings = ctx.settings;

    let ready = is_ready(state);
    if ready && !state.has(Flag::Ready) {
        tracing::info!("NameNode ready with {} DataNode(s)", state.slaves.len());
        plan.set_flag(Flag::Ready);
    } else if !ready && state.has(Flag::Ready) {
        tracing::warn!("NameNode no longer ready");
        plan.clear_flag(Flag::Ready);
    }

    let payload = if ready {
        WorkerPayload::ready(worker_config(ctx, state))
    } else {
        WorkerPayload::not_ready()
    };
    plan.act(Action::PublishWorkers(payload));

    if obs.peer.is_some() && state.has(Flag::Started) {
        let peers = coordinator_names(ctx, state);
        plan.act(Action::PublishPeer(peer_payload(ctx, &peers, state)));
    }

    if obs.registry_present {
        if ready {
            plan.act(Action::RegisterService(ServiceRegistration {
                service_name: SERVICE_NAME.to_string(),
                hdfs_port: settings.hdfs_port,
                webhdfs_port: settings.webhdfs_port,
                version: settings.hadoop_version.clone(),
            }));
        } else {
            plan.act(Action::UnregisterService(SERVICE_NAME.to_string()));
        }
    }

    plan.act(Action::ReportStatus(ClusterStatus::derive(
        state,
        obs.peer.is_some(),
        settings.min_journal_quorum,
    )));
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mutation;
    use crate::testing::{peer, settings};

    fn ready_state() -> StateSnapshot {
        let mut state = StateSnapshot {
            flags: [Flag::Started, Flag::HaInitialized].into_iter().collect(),
            ..Default::default()
        };
        state.slaves.insert("dn-0".into());
        state
            .members
            .insert(Role::Peer, [("nn-1".to_string(), "10.0.0.11".to_string())].into_iter().collect());
        state
    }

    #[test]
    fn test_ready_publishes_config() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let obs = Observations {
            peer: Some(peer("nn-1", "10.0.0.11")),
            registry_present: true,
            ..Default::default()
        };

        let plan = evaluate(&ctx, &obs, &ready_state());
        assert!(plan.mutations().any(|m| m == &Mutation::SetFlag(Flag::Ready)));
        assert_eq!(
            plan.action_names(),
            vec!["publish-workers", "publish-peer", "register-service", "report-status"]
        );

        let Some(Action::PublishWorkers(payload)) = plan.actions().next() else {
            panic!("expected worker payload first");
        };
        assert!(payload.ready);
        let config = payload.config.as_ref().unwrap();
        assert_eq!(config.coordinator_names, vec!["nn-0".to_string(), "nn-1".to_string()]);
        assert_eq!(config.hdfs_port, 8020);
    }

    #[test]
    fn test_not_ready_withholds_config() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let mut state = ready_state();
        state.flags.set(Flag::Ready).unwrap();
        state.slaves.clear();
        let obs = Observations { registry_present: true, ..Default::default() };

        let plan = evaluate(&ctx, &obs, &state);
        assert!(plan.mutations().any(|m| m == &Mutation::ClearFlag(Flag::Ready)));
        assert!(plan.actions().any(|a| a == &Action::PublishWorkers(WorkerPayload::not_ready())));
        assert!(plan.actions().any(|a| a == &Action::UnregisterService("hdfs".into())));
    }

    #[test]
    fn test_degraded_withdraws_readiness() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let mut state = ready_state();
        state.flags.set(Flag::Ready).unwrap();
        state.flags.set(Flag::Degraded).unwrap();
        assert!(!is_ready(&state));

        let obs = Observations { registry_present: true, ..Default::default() };
        let plan = evaluate(&ctx, &obs, &state);
        assert_eq!(plan.mutations().collect::<Vec<_>>(), vec![&Mutation::ClearFlag(Flag::Ready)]);
        assert!(plan.actions().any(|a| a == &Action::PublishWorkers(WorkerPayload::not_ready())));
        assert!(plan.actions().any(|a| a == &Action::UnregisterService("hdfs".into())));
    }

    #[test]
    fn test_ready_flag_not_restaged() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let mut state = ready_state();
        state.flags.set(Flag::Ready).unwrap();

        let plan = evaluate(&ctx, &Observations::default(), &state);
        assert_eq!(plan.mutations().count(), 0);
    }
}
