//! Peer Pairing
//!
//! Exchanges the NameNode peer list and SSH credential with the other
//! NameNode of the pair. The first pairing includes a bounded wait for the
//! peer's service port; if it times out nothing is committed and the whole
//! sequence is retried on a later cycle.

use std::collections::BTreeSet;

use crate::observe::{ClusterMember, Observations, Role};
use crate::service::PeerPayload;
use crate::state::{Aspect, Fingerprint, Flag, MemberMap, StateSnapshot};
use super::{Action, EvalContext, Plan};

/// Peer payload describing the pair as currently known. The hosts table
/// includes the local node so the peer can resolve it.
pub fn peer_payload(ctx: &EvalContext<'_>, peers: &BTreeSet<String>, state: &StateSnapshot) -> PeerPayload {
    let mut hosts_table = state.hosts.to_map();
    hosts_table.insert(ctx.settings.node_address.clone(), ctx.settings.node_name.clone());
    PeerPayload {
        cluster_nodes: peers.iter().cloned().collect(),
        ssh_credential: ctx.settings.credential.clone(),
        hosts_table,
        journal_init_signal: state.has(Flag::SharedEditsInitialized),
    }
}

pub fn evaluate(ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
    let mut plan = Plan::new("peer-pairing");
    let known = state.members_of(Role::Peer);

    let Some(peer) = &obs.peer else {
        // Forget the pairing so a returning peer is applied again
        if state.has(Flag::PeerConfigured) {
            tracing::warn!("Peer NameNode relation gone");
            plan.clear_flag(Flag::PeerConfigured);
        }
        for aspect in [Aspect::PeerSet, Aspect::PeerCredential] {
            if state.fingerprints.contains_key(&aspect) {
                plan.drop_fingerprint(aspect);
            }
        }
        if !known.is_empty() {
            let mut hosts = state.hosts.clone();
            hosts.remove(&as_members(&known));
            if hosts != state.hosts {
                plan.act(Action::SyncHosts(hosts.clone())).put_hosts(hosts);
            }
            plan.put_members(Role::Peer, MemberMap::new());
        }
        return plan;
    };

    if !state.has(Flag::Started) {
        tracing::debug!("Peer related before NameNode started");
        return plan;
    }

    let local = &ctx.settings.node_name;
    let remote = peer.remote_members(local);
    let members: MemberMap = remote
        .iter()
        .map(|m| (m.name.clone(), m.address.clone()))
        .collect();

    let mut peers: BTreeSet<String> = peer.cluster_nodes.iter().cloned().collect();
    peers.insert(local.clone());

    let mut hosts = state.hosts.clone();
    if members != known {
        let departed: MemberMap = known
            .iter()
            .filter(|(name, _)| !members.contains_key(*name))
            .map(|(n, a)| (n.clone(), a.clone()))
            .collect();
        hosts.remove(&as_members(&departed));
        hosts.merge(&remote);
    }
    let hosts_changed = hosts != state.hosts;
    if hosts_changed {
        plan.act(Action::SyncHosts(hosts.clone()));
    }

    let set_fp = Fingerprint::PeerSet { peers: peers.clone() };
    if state.changed(&set_fp) {
        tracing::info!("Configuring NameNode pair {:?}", peers);
        let published = StateSnapshot {
            hosts: hosts.clone(),
            ..state.clone()
        };
        plan.act(Action::ConfigurePeers(peers.iter().cloned().collect()))
            .act(Action::PublishPeer(peer_payload(ctx, &peers, &published)))
            .put_fingerprint(set_fp);
    }
    if hosts_changed {
        plan.put_hosts(hosts);
    }
    if members != known {
        plan.put_members(Role::Peer, members);
    }

    let Some(credential) = peer.ssh_credential.as_ref().filter(|c| !c.is_empty()) else {
        return plan;
    };
    let cred_fp = Fingerprint::PeerCredential {
        credential: credential.clone(),
    };
    let first_pairing = !state.has(Flag::PeerConfigured);
    if !first_pairing && !state.changed(&cred_fp) {
        return plan;
    }

    if first_pairing {
        let Some(target) = remote.first() else {
            tracing::debug!("Peer has not announced a resolvable NameNode yet");
            return plan;
        };
        plan.act(Action::InstallPeerCredential(credential.clone()))
            .act(Action::WaitForPeer {
                host: target.address.clone(),
                port: ctx.settings.hdfs_port,
            })
            .put_fingerprint(cred_fp)
            .set_flag(Flag::PeerConfigured)
            .clear_flag(Flag::Degraded);
    } else {
        tracing::info!("Peer credential rotated");
        plan.act(Action::InstallPeerCredential(credential.clone()))
            .put_fingerprint(cred_fp);
    }

    plan
}

fn as_members(map: &MemberMap) -> Vec<ClusterMember> {
    map.iter()
        .map(|(name, addr)| ClusterMember::new(name.clone(), addr.clone(), Role::Peer))
        .collect()
}
