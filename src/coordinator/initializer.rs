//! HA Initializer
//!
//! Once the pair is configured and the JournalNodes have quorum, the leader
//! initializes the shared edit log and the follower bootstraps its
//! namespace from the leader's. Only the leader may run the shared-edits
//! initialization; the executor re-reads the leadership token right before
//! it and abandons the plan if the token went false.

use serde::Serialize;

use crate::observe::Observations;
use crate::state::{Flag, StateSnapshot};
use super::{Action, EvalContext, Plan};

/// Position of this node in the HA bring-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum HaPhase {
    /// Pairing or quorum not yet in place
    Uninit,
    /// Leader about to initialize shared edits
    LeaderInit,
    /// Follower waiting for the leader's initialization signal
    StandbyWait,
    /// Leader initialized shared edits
    LeaderActive,
    /// Follower about to bootstrap from the leader
    StandbyBootstrap,
    /// HA bring-up finished
    HaReady,
    /// A precondition was lost; `resume` is where bring-up continues
    Degraded { resume: Box<HaPhase> },
}

impl HaPhase {
    /// Derive the phase from persisted flags
    pub fn derive(state: &StateSnapshot, is_leader: bool, journal_initialized: bool) -> Self {
        let base = Self::undegraded(state, is_leader, journal_initialized);
        if state.has(Flag::Degraded) {
            HaPhase::Degraded {
                resume: Box::new(base),
            }
        } else {
            base
        }
    }

    fn undegraded(state: &StateSnapshot, is_leader: bool, journal_initialized: bool) -> Self {
        if state.has(Flag::HaInitialized) {
            return HaPhase::HaReady;
        }
        if !state.flags.all(&[Flag::Started, Flag::PeerConfigured, Flag::Quorum]) {
            return HaPhase::Uninit;
        }
        if state.has(Flag::StandbyBootstrapped) {
            return if is_leader || journal_initialized {
                HaPhase::StandbyBootstrap
            } else {
                HaPhase::StandbyWait
            };
        }
        if is_leader {
            if state.has(Flag::SharedEditsInitialized) {
                HaPhase::LeaderActive
            } else {
                HaPhase::LeaderInit
            }
        } else if journal_initialized {
            HaPhase::StandbyBootstrap
        } else {
            HaPhase::StandbyWait
        }
    }
}

impl std::fmt::Display for HaPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaPhase::Uninit => write!(f, "uninit"),
            HaPhase::LeaderInit => write!(f, "leader-init"),
            HaPhase::StandbyWait => write!(f, "standby-wait"),
            HaPhase::LeaderActive => write!(f, "leader-active"),
            HaPhase::StandbyBootstrap => write!(f, "standby-bootstrap"),
            HaPhase::HaReady => write!(f, "ha-ready"),
            HaPhase::Degraded { resume } => write!(f, "degraded ({})", resume),
        }
    }
}

pub fn evaluate(ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("ha-initializer");

    if !state.flags.all(&[Flag::Started, Flag::PeerConfigured, Flag::Quorum]) {
        tracing::debug!("HA initialization waiting for pairing and journal quorum");
        return plan;
    }

    // A bootstrapped standby that later holds the leadership token keeps
    // its namespace; shared edits are only ever initialized by a node that
    // was never bootstrapped as standby.
    if state.has(Flag::StandbyBootstrapped) {
        if !ctx.is_leader && !obs.journal_initialized() {
            tracing::debug!("Standby waiting for shared edits initialization");
            return plan;
        }
        if state.has(Flag::Degraded) {
            tracing::info!("Standby preconditions restored");
            plan.clear_flag(Flag::Degraded);
        }
        if !state.has(Flag::HaInitialized) {
            plan.set_flag(Flag::HaInitialized);
        }
        return plan;
    }

    if ctx.is_leader {
        if state.has(Flag::SharedEditsInitialized) {
            return plan;
        }
        tracing::info!("Initializing shared edits as leader");
        plan.act(Action::StopNameNode)
            .act(Action::InitSharedEdits)
            .set_flag(Flag::SharedEditsInitialized)
            .act(Action::StartNameNode)
            .act(Action::SignalJournalInitialized)
            .clear_flag(Flag::Degraded)
            .set_flag(Flag::HaInitialized);
        return plan;
    }

    if !obs.journal_initialized() {
        tracing::debug!("Standby waiting for shared edits initialization");
        return plan;
    }

    tracing::info!("Bootstrapping standby from leader");
    plan.act(Action::StopNameNode)
        .act(Action::FormatNameNode)
        .act(Action::BootstrapStandby)
        .act(Action::StartNameNode)
        .set_flag(Flag::StandbyBootstrapped)
        .set_flag(Flag::HaInitialized)
        .clear_flag(Flag::Degraded);
    plan
}
