//! Change Fingerprints
//!
//! Snapshots of the last applied input for each reconciled aspect. A
//! configuration step is re-applied only when the freshly observed
//! fingerprint differs by value from the stored one.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};

/// Reconciled aspect a fingerprint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aspect {
    PeerSet,
    PeerCredential,
    Journal,
    Consensus,
}

impl Aspect {
    pub const ALL: [Aspect; 4] = [
        Aspect::PeerSet,
        Aspect::PeerCredential,
        Aspect::Journal,
        Aspect::Consensus,
    ];

    /// Persisted key name
    pub fn key(&self) -> &'static str {
        match self {
            Aspect::PeerSet => "fingerprint.peer-set",
            Aspect::PeerCredential => "fingerprint.peer-credential",
            Aspect::Journal => "fingerprint.journal",
            Aspect::Consensus => "fingerprint.consensus",
        }
    }
}

/// Last applied input of one aspect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "aspect", rename_all = "kebab-case")]
pub enum Fingerprint {
    /// NameNodes forming the HA pair, this node included
    PeerSet { peers: BTreeSet<String> },
    /// Credential material received from the peer
    PeerCredential { credential: String },
    /// JournalNode members and their shared port
    Journal { nodes: BTreeSet<String>, port: u16 },
    /// Consensus-service peer addresses
    Consensus { peers: BTreeSet<String> },
}

impl Fingerprint {
    /// The aspect this fingerprint reconciles
    pub fn aspect(&self) -> Aspect {
        match self {
            Fingerprint::PeerSet { .. } => Aspect::PeerSet,
            Fingerprint::PeerCredential { .. } => Aspect::PeerCredential,
            Fingerprint::Journal { .. } => Aspect::Journal,
            Fingerprint::Consensus { .. } => Aspect::Consensus,
        }
    }
}
