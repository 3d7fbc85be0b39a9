//! Host Resolution Table
//!
//! Address to canonical-name mapping assembled from every relation's view
//! of its members. The table is persisted and re-synced to the OS-level
//! resolver on every change.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::observe::ClusterMember;

/// address -> name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostsTable {
    entries: BTreeMap<String, String>,
}

impl HostsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Full recompute from the currently known members
    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a ClusterMember>,
    {
        let mut table = Self::new();
        table.merge(members);
        table
    }

    /// Merge entries for the given members. A member that moved to a new
    /// address loses its old entry.
    pub fn merge<'a, I>(&mut self, members: I)
    where
        I: IntoIterator<Item = &'a ClusterMember>,
    {
        for member in members {
            self.entries.retain(|addr, name| !(name == &member.name && addr != &member.address));
            self.entries.insert(member.address.clone(), member.name.clone());
        }
    }

    /// Remove entries for departed members
    pub fn remove<'a, I>(&mut self, members: I)
    where
        I: IntoIterator<Item = &'a ClusterMember>,
    {
        for member in members {
            self.entries.retain(|_, name| name != &member.name);
        }
    }

    /// Resolve an address
    pub fn name_of(&self, address: &str) -> Option<&str> {
        self.entries.get(address).map(String::as_str)
    }

    /// Reverse lookup of a name
    pub fn address_of(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(addr, _)| addr.as_str())
    }

    /// Iterate over (address, name) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, n)| (a.as_str(), n.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain map view, as published to consumers
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }
}

impl From<BTreeMap<String, String>> for HostsTable {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::Role;

    fn worker(name: &str, address: &str) -> ClusterMember {
        ClusterMember::new(name, address, Role::Worker)
    }

    #[test]
    fn test_merge_and_remove() {
        let mut table = HostsTable::new();
        table.merge(&[worker("dn-0", "10.0.1.1"), worker("dn-1", "10.0.1.2")]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.name_of("10.0.1.2"), Some("dn-1"));

        table.remove(&[worker("dn-0", "10.0.1.1")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.name_of("10.0.1.1"), None);
    }

    #[test]
    fn test_moved_member_drops_stale_address() {
        let mut table = HostsTable::new();
        table.merge(&[worker("dn-0", "10.0.1.1")]);
        table.merge(&[worker("dn-0", "10.0.1.9")]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.address_of("dn-0"), Some("10.0.1.9"));
    }

    #[test]
    fn test_remove_by_name_even_if_address_changed() {
        let mut table = HostsTable::new();
        table.merge(&[worker("dn-0", "10.0.1.1")]);
        table.remove(&[worker("dn-0", "10.0.1.7")]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_incremental_matches_recompute() {
        let a = worker("dn-0", "10.0.1.1");
        let b = worker("dn-1", "10.0.1.2");
        let c = worker("dn-2", "10.0.1.3");

        let mut incremental = HostsTable::new();
        incremental.merge(&[a.clone(), b.clone()]);
        incremental.merge(&[c.clone()]);
        incremental.remove(&[b]);

        assert_eq!(incremental, HostsTable::from_members(&[a, c]));
    }
}
