//! Degraded-state Tracker
//!
//! Enters `ha.degraded` as soon as any HA precondition is lost. Leaving the
//! degraded state is owned by the stages that restore the preconditions:
//! a completed peer wait or a completed HA initialization.

use crate::observe::Observations;
use crate::state::{Flag, StateSnapshot};
use super::{EvalContext, Plan};

/// HA preconditions that currently do not hold
pub fn lost_preconditions(obs: &Observations, state: &StateSnapshot) -> Vec<&'static str> {
    let mut lost = Vec::new();
    if !state.has(Flag::Quorum) {
        lost.push("journal quorum");
    }
    if !(state.has(Flag::PeerConfigured) && obs.peer.is_some()) {
        lost.push("peer pairing");
    }
    if obs.ha_requested() && obs.journal.is_none() {
        lost.push("journal relation");
    }
    lost
}

/// Clear `flag` if it or anything built on it is still set
fn invalidate(plan: &mut Plan, state: &StateSnapshot, flag: Flag) {
    if state.has(flag) || flag.dependents().into_iter().any(|d| state.has(d)) {
        plan.clear_flag(flag);
    }
}

pub fn evaluate(_ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("degraded");

    if !state.has(Flag::Started) {
        return plan;
    }

    let lost = lost_preconditions(obs, state);
    if lost.is_empty() {
        return plan;
    }

    if !state.has(Flag::Degraded) {
        tracing::warn!("Entering degraded state: lost {}", lost.join(", "));
        plan.set_flag(Flag::Degraded);
    }

    if obs.journal.is_none() || !state.has(Flag::Quorum) {
        invalidate(&mut plan, state, Flag::Quorum);
    }
    if obs.peer.is_none() {
        invalidate(&mut plan, state, Flag::PeerConfigured);
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mutation;
    use crate::testing::{journal, peer, settings};

    fn healthy() -> StateSnapshot {
        StateSnapshot {
            flags: [
                Flag::Started,
                Flag::Quorum,
                Flag::PeerConfigured,
                Flag::SharedEditsInitialized,
                Flag::HaInitialized,
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        }
    }

    fn related() -> Observations {
        Observations {
            peer: Some(peer("nn-1", "10.0.0.11")),
            journal: Some(journal(3)),
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_pair_is_not_degraded() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        assert!(lost_preconditions(&related(), &healthy()).is_empty());
        assert!(evaluate(&ctx, &related(), &healthy()).is_empty());
    }

    #[test]
    fn test_journal_departure_enters_degraded() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let obs = Observations { journal: None, ..related() };

        let plan = evaluate(&ctx, &obs, &healthy());
        let mutations: Vec<_> = plan.mutations().cloned().collect();
        assert_eq!(
            mutations,
            vec![Mutation::SetFlag(Flag::Degraded), Mutation::ClearFlag(Flag::Quorum)]
        );
    }

    #[test]
    fn test_already_degraded_only_invalidates() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let mut state = healthy();
        state.flags.set(Flag::Degraded).unwrap();
        state.flags.clear(Flag::PeerConfigured);
        let obs = Observations { peer: None, ..related() };

        assert!(evaluate(&ctx, &obs, &state).is_empty());
    }

    #[test]
    fn test_unpaired_peer_is_degraded() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let state = StateSnapshot {
            flags: [Flag::Started, Flag::Quorum].into_iter().collect(),
            ..Default::default()
        };
        let plan = evaluate(&ctx, &related(), &state);
        assert_eq!(plan.mutations().collect::<Vec<_>>(), vec![&Mutation::SetFlag(Flag::Degraded)]);
    }
}
