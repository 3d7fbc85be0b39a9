//! Service startup
//!
//! Configures, formats and starts the NameNode once after installation.
//! Every other stage is a no-op until `namenode.started` is set.

use crate::observe::Observations;
use crate::state::{Flag, StateSnapshot};
use super::{Action, EvalContext, Plan};

pub fn evaluate(_ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("startup");

    if !obs.installed {
        tracing::debug!("NameNode not installed yet");
        return plan;
    }
    if state.has(Flag::Started) {
        return plan;
    }

    tracing::info!("Bringing up NameNode");
    plan.act(Action::ConfigureNameNode)
        .act(Action::FormatNameNode)
        .act(Action::StartNameNode)
        .act(Action::CreateDirs)
        .act(Action::OpenPorts)
        .set_flag(Flag::Started);
    plan
}
