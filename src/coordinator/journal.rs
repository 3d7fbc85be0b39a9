//! Journal Quorum Tracker
//!
//! Tracks whether enough distinct JournalNodes are related, and pushes the
//! shared-edits configuration to the NameNode when the replica set or port
//! changes while quorum holds.

use std::collections::BTreeSet;

use crate::observe::{ClusterMember, Observations, Role};
use crate::state::{Fingerprint, Flag, MemberMap, StateSnapshot};
use super::{Action, EvalContext, Plan};

/// True when `distinct` replicas satisfy the configured minimum
pub fn has_quorum(distinct: usize, min_quorum: usize) -> bool {
    distinct >= min_quorum
}

pub fn evaluate(ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("journal-quorum");
    let known = state.members_of(Role::Journal);

    let Some(journal) = &obs.journal else {
        if state.has(Flag::Quorum) {
            tracing::warn!("JournalNode relation gone, quorum lost");
            plan.clear_flag(Flag::Quorum);
        }
        if !known.is_empty() {
            let mut hosts = state.hosts.clone();
            hosts.remove(&as_members(&known));
            if hosts != state.hosts {
                plan.act(Action::SyncHosts(hosts.clone())).put_hosts(hosts);
            }
            plan.put_members(Role::Journal, MemberMap::new());
        }
        return plan;
    };

    let members = journal.members();
    let min_quorum = ctx.settings.min_journal_quorum;
    let quorum = has_quorum(members.len(), min_quorum);
    if journal.quorum_reached != quorum {
        tracing::debug!(
            "JournalNodes report quorum={} but {} of {} distinct are related",
            journal.quorum_reached,
            members.len(),
            min_quorum
        );
    }

    if members != known {
        let departed: MemberMap = known
            .iter()
            .filter(|(name, _)| !members.contains_key(*name))
            .map(|(n, a)| (n.clone(), a.clone()))
            .collect();
        let mut hosts = state.hosts.clone();
        hosts.remove(&as_members(&departed));
        hosts.merge(&as_members(&members));
        if hosts != state.hosts {
            plan.act(Action::SyncHosts(hosts.clone())).put_hosts(hosts);
        }
        plan.put_members(Role::Journal, members.clone());
    }

    if quorum && !state.has(Flag::Quorum) {
        tracing::info!("JournalNode quorum reached ({}/{})", members.len(), min_quorum);
        plan.set_flag(Flag::Quorum);
    } else if !quorum && state.has(Flag::Quorum) {
        tracing::warn!("JournalNode quorum lost ({}/{})", members.len(), min_quorum);
        plan.clear_flag(Flag::Quorum);
    }

    if quorum && state.has(Flag::Started) {
        let nodes: BTreeSet<String> = members.keys().cloned().collect();
        let fp = Fingerprint::Journal {
            nodes: nodes.clone(),
            port: journal.port,
        };
        if state.changed(&fp) {
            tracing::info!("Configuring shared edits on {} JournalNodes", nodes.len());
            plan.act(Action::ConfigureJournal {
                nodes: nodes.into_iter().collect(),
                port: journal.port,
            })
            .put_fingerprint(fp);
        }
    }

    plan
}

fn as_members(map: &MemberMap) -> Vec<ClusterMember> {
    map.iter()
        .map(|(name, addr)| ClusterMember::new(name.clone(), addr.clone(), Role::Journal))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mutation;
    use crate::testing::{journal, settings};

    fn state(flags: &[Flag]) -> StateSnapshot {
        StateSnapshot {
            flags: flags.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_quorum_threshold() {
        assert!(!has_quorum(2, 3));
        assert!(has_quorum(3, 3));
        assert!(has_quorum(4, 3));
    }

    #[test]
    fn test_reaching_quorum_configures_journal() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let obs = Observations { journal: Some(journal(3)), ..Default::default() };

        let plan = evaluate(&ctx, &obs, &state(&[Flag::Started]));
        assert!(plan.mutations().any(|m| m == &Mutation::SetFlag(Flag::Quorum)));
        assert_eq!(plan.action_names(), vec!["sync-hosts", "configure-journal"]);
    }

    #[test]
    fn test_duplicate_replicas_do_not_count() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let mut two = journal(2);
        two.nodes.push(two.nodes[0].clone());
        let obs = Observations { journal: Some(two), ..Default::default() };

        let plan = evaluate(&ctx, &obs, &state(&[Flag::Started]));
        assert!(!plan.mutations().any(|m| m == &Mutation::SetFlag(Flag::Quorum)));
        assert!(!plan.action_names().contains(&"configure-journal"));
    }

    #[test]
    fn test_drop_below_quorum_clears_flag() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let obs = Observations { journal: Some(journal(2)), ..Default::default() };

        let plan = evaluate(&ctx, &obs, &state(&[Flag::Started, Flag::Quorum]));
        assert!(plan.mutations().any(|m| m == &Mutation::ClearFlag(Flag::Quorum)));
    }

    #[test]
    fn test_relation_departure_clears_quorum() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };

        let plan = evaluate(&ctx, &Observations::default(), &state(&[Flag::Started, Flag::Quorum]));
        assert_eq!(plan.mutations().collect::<Vec<_>>(), vec![&Mutation::ClearFlag(Flag::Quorum)]);
    }

    #[test]
    fn test_port_change_reconfigures() {
        let settings = settings("nn-0");
        let ctx = EvalContext { settings: &settings, is_leader: true, consensus: None };
        let jn = journal(3);
        let mut current = state(&[Flag::Started, Flag::Quorum]);
        current.members.insert(Role::Journal, jn.members());
        current.fingerprints.insert(
            crate::state::Aspect::Journal,
            Fingerprint::Journal { nodes: jn.distinct_names(), port: jn.port },
        );

        let unchanged = Observations { journal: Some(jn.clone()), ..Default::default() };
        assert!(evaluate(&ctx, &unchanged, &current).is_empty());

        let moved = Observations {
            journal: Some(crate::observe::JournalObservation { port: 8486, ..jn }),
            ..Default::default()
        };
        assert_eq!(evaluate(&ctx, &moved, &current).action_names(), vec!["configure-journal"]);
    }
}
