//! State Snapshots
//!
//! A snapshot is the complete coordination state loaded fresh from the
//! store. Handlers evaluate against a snapshot and stage their mutations in
//! a [`StateTxn`], which commits them with a single compare-and-set batch.

use std::collections::{BTreeMap, BTreeSet};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::hosts::HostsTable;
use crate::observe::{ClusterMember, Role};
use crate::state::fingerprint::{Aspect, Fingerprint};
use crate::state::flags::{Flag, FlagSet};
use crate::state::store::{KeyChange, StateStore};

/// Persisted key of the registered-slaves list
pub const SLAVES_KEY: &str = "namenode.slaves";
/// Persisted key of the host resolution table
pub const HOSTS_KEY: &str = "hosts";

/// name -> address of the members of one role
pub type MemberMap = BTreeMap<String, String>;

/// Complete coordination state at one instant
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub flags: FlagSet,
    pub slaves: BTreeSet<String>,
    pub members: BTreeMap<Role, MemberMap>,
    pub hosts: HostsTable,
    pub fingerprints: BTreeMap<Aspect, Fingerprint>,
}

impl StateSnapshot {
    /// Load the current state from the store
    pub async fn load(store: &StateStore) -> Result<Self> {
        let persisted = load_persisted(store).await?;
        decode(&persisted)
    }

    /// Check a flag
    pub fn has(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }

    /// True when `fp` differs from the last applied input of its aspect
    pub fn changed(&self, fp: &Fingerprint) -> bool {
        self.fingerprints.get(&fp.aspect()) != Some(fp)
    }

    /// Members of a role
    pub fn members_of(&self, role: Role) -> MemberMap {
        self.members.get(&role).cloned().unwrap_or_default()
    }

    /// Every known member across all roles
    pub fn all_members(&self) -> Vec<ClusterMember> {
        self.members
            .iter()
            .flat_map(|(role, members)| {
                members
                    .iter()
                    .map(move |(name, addr)| ClusterMember::new(name.clone(), addr.clone(), *role))
            })
            .collect()
    }
}

/// A staged state change
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetFlag(Flag),
    /// Clear with cascade
    ClearFlag(Flag),
    PutFingerprint(Fingerprint),
    DropFingerprint(Aspect),
    PutSlaves(BTreeSet<String>),
    PutMembers(Role, MemberMap),
    PutHosts(HostsTable),
}

/// Staged mutations on top of the persisted state
#[derive(Debug)]
pub struct StateTxn {
    base: StateSnapshot,
    working: StateSnapshot,
    /// Raw values as read from the store, the compare side of the commit
    persisted: BTreeMap<String, Value>,
}

impl StateTxn {
    /// Begin staging on top of the store's current state
    pub async fn load(store: &StateStore) -> Result<Self> {
        let persisted = load_persisted(store).await?;
        let base = decode(&persisted)?;
        Ok(Self {
            working: base.clone(),
            base,
            persisted,
        })
    }

    /// State the transaction started from
    pub fn base(&self) -> &StateSnapshot {
        &self.base
    }

    /// State including everything staged so far
    pub fn working(&self) -> &StateSnapshot {
        &self.working
    }

    /// Stage a mutation. Setting a flag whose prerequisites are unset fails.
    pub fn stage(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::SetFlag(flag) => {
                self.working.flags.set(flag)?;
            }
            Mutation::ClearFlag(flag) => {
                let cleared = self.working.flags.clear(flag);
                if cleared.len() > 1 {
                    tracing::info!("Clearing {} cascaded to {:?}", flag, &cleared[1..]);
                }
            }
            Mutation::PutFingerprint(fp) => {
                self.working.fingerprints.insert(fp.aspect(), fp);
            }
            Mutation::DropFingerprint(aspect) => {
                self.working.fingerprints.remove(&aspect);
            }
            Mutation::PutSlaves(slaves) => {
                self.working.slaves = slaves;
            }
            Mutation::PutMembers(role, members) => {
                if members.is_empty() {
                    self.working.members.remove(&role);
                } else {
                    self.working.members.insert(role, members);
                }
            }
            Mutation::PutHosts(hosts) => {
                self.working.hosts = hosts;
            }
        }
        Ok(())
    }

    /// Keys whose encoded value differs between base and working state
    pub fn changes(&self) -> Result<Vec<KeyChange>> {
        let before = encode(&self.base)?;
        let after = encode(&self.working)?;

        let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
        Ok(keys
            .into_iter()
            .filter(|k| before.get(*k) != after.get(*k))
            .map(|k| KeyChange {
                key: k.clone(),
                expected: self.persisted.get(k).cloned(),
                new: after.get(k).cloned(),
            })
            .collect())
    }

    /// Commit the staged changes. Fails without writing anything if the
    /// store moved since the transaction was loaded.
    pub async fn commit(self, store: &StateStore) -> Result<StateSnapshot> {
        let changes = self.changes()?;
        if !changes.is_empty() {
            tracing::debug!("Committing {} state key(s)", changes.len());
        }
        store.apply_batch(changes).await?;
        Ok(self.working)
    }
}

/// Every key the snapshot is made of
fn state_keys() -> Vec<String> {
    let mut keys: Vec<String> = Flag::ALL.iter().map(|f| f.name().to_string()).collect();
    keys.push(SLAVES_KEY.to_string());
    keys.extend(Role::ALL.iter().map(|r| r.members_key().to_string()));
    keys.push(HOSTS_KEY.to_string());
    keys.extend(Aspect::ALL.iter().map(|a| a.key().to_string()));
    keys
}

async fn load_persisted(store: &StateStore) -> Result<BTreeMap<String, Value>> {
    let mut persisted = BTreeMap::new();
    for key in state_keys() {
        if let Some(value) = store.get_value(&key).await? {
            persisted.insert(key, value);
        }
    }
    Ok(persisted)
}

fn decode(persisted: &BTreeMap<String, Value>) -> Result<StateSnapshot> {
    let mut snapshot = StateSnapshot {
        // Stored flags were validated against the DAG when committed
        flags: Flag::ALL
            .into_iter()
            .filter(|f| persisted.get(f.name()) == Some(&Value::Bool(true)))
            .collect(),
        ..Default::default()
    };

    if let Some(value) = persisted.get(SLAVES_KEY) {
        snapshot.slaves = serde_json::from_value(value.clone())?;
    }

    for role in Role::ALL {
        if let Some(value) = persisted.get(role.members_key()) {
            snapshot.members.insert(role, serde_json::from_value(value.clone())?);
        }
    }

    if let Some(value) = persisted.get(HOSTS_KEY) {
        snapshot.hosts = serde_json::from_value(value.clone())?;
    }

    for aspect in Aspect::ALL {
        if let Some(value) = persisted.get(aspect.key()) {
            snapshot.fingerprints.insert(aspect, serde_json::from_value(value.clone())?);
        }
    }

    Ok(snapshot)
}

/// Key/value form of a snapshot. Flags are written as explicit booleans;
/// empty member maps and dropped fingerprints are absent.
fn encode(snapshot: &StateSnapshot) -> Result<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();

    for flag in Flag::ALL {
        out.insert(flag.name().to_string(), Value::Bool(snapshot.flags.contains(flag)));
    }

    out.insert(SLAVES_KEY.to_string(), serde_json::to_value(&snapshot.slaves)?);

    for (role, members) in &snapshot.members {
        out.insert(role.members_key().to_string(), serde_json::to_value(members)?);
    }

    out.insert(HOSTS_KEY.to_string(), serde_json::to_value(&snapshot.hosts)?);

    for (aspect, fp) in &snapshot.fingerprints {
        out.insert(aspect.key().to_string(), serde_json::to_value(fp)?);
    }

    Ok(out)
}
