//! Worker Membership
//!
//! Maintains the registered-slaves set from joined/left notifications.
//! The update is a set operation, so a redelivered notification changes
//! nothing and triggers no collaborator call.

use std::collections::BTreeSet;

use crate::observe::{ClusterMember, Observations, Role};
use crate::state::{Flag, MemberMap, StateSnapshot};
use super::{Action, EvalContext, Plan};

/// `(current ∪ joined) − left`
pub fn next_slaves(
    current: &BTreeSet<String>,
    joined: &[ClusterMember],
    left: &[ClusterMember],
) -> BTreeSet<String> {
    let mut slaves = current.clone();
    slaves.extend(joined.iter().map(|m| m.name.clone()));
    for member in left {
        slaves.remove(&member.name);
    }
    slaves
}

pub fn evaluate(_ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("membership");

    if !state.has(Flag::Started) {
        return plan;
    }

    let joined: Vec<ClusterMember> = obs
        .workers
        .joined_nodes
        .iter()
        .map(|n| n.member(Role::Worker))
        .collect();
    let left: Vec<ClusterMember> = obs
        .workers
        .left_nodes
        .iter()
        .map(|n| n.member(Role::Worker))
        .collect();

    let slaves = next_slaves(&state.slaves, &joined, &left);
    let known = state.members_of(Role::Worker);

    let mut workers: MemberMap = known.clone();
    for member in &joined {
        workers.insert(member.name.clone(), member.address.clone());
    }
    workers.retain(|name, _| slaves.contains(name));

    if slaves == state.slaves && workers == known {
        return plan;
    }

    let mut hosts = state.hosts.clone();
    hosts.merge(joined.iter().filter(|m| slaves.contains(&m.name)));
    hosts.remove(&left);

    tracing::info!(
        "DataNodes changed: {} -> {} registered",
        state.slaves.len(),
        slaves.len()
    );

    plan.act(Action::RegisterSlaves(slaves.iter().cloned().collect()))
        .act(Action::ReloadNameNode);
    if hosts != state.hosts {
        plan.act(Action::SyncHosts(hosts.clone())).put_hosts(hosts);
    }
    plan.put_slaves(slaves.clone()).put_members(Role::Worker, workers);

    if slaves.is_empty() && state.has(Flag::Ready) {
        tracing::warn!("Last DataNode left, revoking readiness");
        plan.clear_flag(Flag::Ready);
    }
    plan
}
