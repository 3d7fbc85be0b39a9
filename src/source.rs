//! Observation Source
//!
//! The hook substrate writes the current view of all relations, plus the
//! leadership token and consensus readiness, to one JSON document. The
//! dispatch loop re-reads it every cycle.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observe::Observations;
use crate::service::{SharedConsensus, SharedLeadership};

/// Observation document as written by the hook substrate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationDocument {
    #[serde(flatten)]
    pub observations: Observations,
    /// Leadership token
    #[serde(default)]
    pub leader: bool,
    /// Consensus-service peers once the service is ready
    #[serde(default)]
    pub consensus_peers: Option<Vec<String>>,
}

impl ObservationDocument {
    /// Read the document, None while it does not exist yet
    pub async fn read(path: &Path) -> Result<Option<Self>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Push the capability values into the in-process oracles
    pub async fn apply(&self, leadership: &SharedLeadership, consensus: &SharedConsensus) {
        leadership.set(self.leader);
        consensus.set(self.consensus_peers.clone()).await;
    }
}
