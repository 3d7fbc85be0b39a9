//! State Flags
//!
//! Named boolean conditions forming a dependency DAG. A flag may only be set
//! once its prerequisites are set; clearing a flag clears every flag that
//! transitively depends on it.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A persisted state flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flag {
    /// NameNode configured, formatted and running
    Started,
    /// At least the minimum number of JournalNodes are present
    Quorum,
    /// Peer NameNode configured and its credential installed
    PeerConfigured,
    /// Shared edit log initialized on the JournalNodes (leader)
    SharedEditsInitialized,
    /// Local storage bootstrapped from the active NameNode (standby)
    StandbyBootstrapped,
    /// HA bring-up completed on this node
    HaInitialized,
    /// A readiness prerequisite is currently unmet
    Degraded,
    /// Failover-controller state formatted in the consensus service
    FailoverFormatted,
    /// A dependent restart is queued until standby bootstrap completes
    DependentRestartPending,
    /// Ready to serve workers
    Ready,
}

impl Flag {
    /// Every flag, in dependency order
    pub const ALL: [Flag; 10] = [
        Flag::Started,
        Flag::Quorum,
        Flag::Degraded,
        Flag::PeerConfigured,
        Flag::SharedEditsInitialized,
        Flag::StandbyBootstrapped,
        Flag::HaInitialized,
        Flag::FailoverFormatted,
        Flag::DependentRestartPending,
        Flag::Ready,
    ];

    /// Persisted key name
    pub fn name(&self) -> &'static str {
        match self {
            Flag::Started => "namenode.started",
            Flag::Quorum => "journalnode.quorum",
            Flag::PeerConfigured => "namenode.peer-configured",
            Flag::SharedEditsInitialized => "namenode.shared-edits-initialized",
            Flag::StandbyBootstrapped => "namenode.standby-bootstrapped",
            Flag::HaInitialized => "namenode.ha-initialized",
            Flag::Degraded => "namenode.degraded",
            Flag::FailoverFormatted => "zookeeper.formatted",
            Flag::DependentRestartPending => "namenode.restart-pending",
            Flag::Ready => "namenode.ready",
        }
    }

    /// Flags that must be set before this one
    pub fn prerequisites(&self) -> &'static [Flag] {
        match self {
            Flag::Started | Flag::Quorum | Flag::Degraded => &[],
            Flag::PeerConfigured => &[Flag::Started],
            Flag::SharedEditsInitialized => &[Flag::Started, Flag::Quorum, Flag::PeerConfigured],
            Flag::StandbyBootstrapped => &[Flag::Started],
            // Quorum or peer loss must not revert a completed bring-up
            Flag::HaInitialized => &[Flag::Started],
            Flag::FailoverFormatted => &[Flag::HaInitialized],
            Flag::DependentRestartPending => &[Flag::HaInitialized],
            Flag::Ready => &[Flag::HaInitialized],
        }
    }

    /// Flags that transitively depend on this one
    pub fn dependents(&self) -> Vec<Flag> {
        let mut found = Vec::new();
        let mut frontier = vec![*self];
        while let Some(current) = frontier.pop() {
            for candidate in Flag::ALL {
                if candidate.prerequisites().contains(&current) && !found.contains(&candidate) {
                    found.push(candidate);
                    frontier.push(candidate);
                }
            }
        }
        found
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The set of currently raised flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet {
    raised: BTreeSet<Flag>,
}

impl FlagSet {
    /// Create an empty flag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a flag is raised
    pub fn contains(&self, flag: Flag) -> bool {
        self.raised.contains(&flag)
    }

    /// Check whether all flags are raised
    pub fn all(&self, flags: &[Flag]) -> bool {
        flags.iter().all(|f| self.contains(*f))
    }

    /// Raise a flag. Returns true if it was not already raised.
    pub fn set(&mut self, flag: Flag) -> Result<bool> {
        let missing: Vec<&'static str> = flag
            .prerequisites()
            .iter()
            .filter(|p| !self.contains(**p))
            .map(|p| p.name())
            .collect();
        if !missing.is_empty() {
            return Err(Error::PrerequisiteMissing {
                flag: flag.name(),
                missing,
            });
        }
        Ok(self.raised.insert(flag))
    }

    /// Clear a flag together with all of its dependents.
    /// Returns every flag that was actually cleared.
    pub fn clear(&mut self, flag: Flag) -> Vec<Flag> {
        let mut cleared = Vec::new();
        if self.raised.remove(&flag) {
            cleared.push(flag);
        }
        for dependent in flag.dependents() {
            if self.raised.remove(&dependent) {
                cleared.push(dependent);
            }
        }
        cleared
    }

    /// Iterate over raised flags
    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.raised.iter().copied()
    }

    /// Number of raised flags
    pub fn len(&self) -> usize {
        self.raised.len()
    }

    /// True when no flag is raised
    pub fn is_empty(&self) -> bool {
        self.raised.is_empty()
    }
}

impl FromIterator<Flag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self {
            raised: iter.into_iter().collect(),
        }
    }
}
