//! Failover Controller
//!
//! Points the NameNode at the consensus service used for automatic
//! failover whenever its peer set changes. The leader formats the
//! failover state; the follower instead schedules a restart of dependent
//! services, which runs once it is bootstrapped and not degraded.

use std::collections::BTreeSet;

use crate::observe::Observations;
use crate::state::{Fingerprint, Flag, StateSnapshot};
use super::{Action, EvalContext, Plan};

pub fn evaluate(ctx: &EvalContext<'_>, _obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("failover");

    let Some(peers) = ctx.consensus.as_ref().filter(|p| !p.is_empty()) else {
        return plan;
    };
    if !state.flags.all(&[Flag::PeerConfigured, Flag::HaInitialized]) {
        tracing::debug!("Consensus service ready but HA not initialized");
        return plan;
    }

    let peers: BTreeSet<String> = peers.iter().cloned().collect();
    let fp = Fingerprint::Consensus { peers: peers.clone() };
    if !state.changed(&fp) {
        return plan;
    }

    tracing::info!("Configuring automatic failover against {} consensus peer(s)", peers.len());
    plan.act(Action::ConfigureConsensus(peers.into_iter().collect()))
        .act(Action::StopNameNode);
    if ctx.is_leader {
        plan.act(Action::FormatFailoverState)
            .set_flag(Flag::FailoverFormatted);
    } else {
        plan.set_flag(Flag::DependentRestartPending);
    }
    plan.act(Action::StartNameNode).put_fingerprint(fp);
    plan
}

/// Restart dependent services once the standby is settled
pub fn evaluate_deferred_restart(_ctx: &EvalContext<'_>, _obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("deferred-restart");

    if state.has(Flag::DependentRestartPending)
        && state.has(Flag::StandbyBootstrapped)
        && !state.has(Flag::Degraded)
    {
        tracing::info!("Restarting dependent services");
        plan.act(Action::RestartDependents)
            .clear_flag(Flag::DependentRestartPending);
    }
    plan
}
