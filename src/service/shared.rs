//! In-process capability objects
//!
//! The dispatch loop refreshes these from each observation document; tests
//! flip them directly.

use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use super::{ConsensusService, LeadershipOracle};

/// Leadership token held in memory
#[derive(Debug, Default)]
pub struct SharedLeadership {
    leader: AtomicBool,
}

impl SharedLeadership {
    pub fn new(leader: bool) -> Self {
        Self {
            leader: AtomicBool::new(leader),
        }
    }

    pub fn set(&self, leader: bool) {
        let was = self.leader.swap(leader, Ordering::SeqCst);
        if was != leader {
            tracing::info!("Leadership token changed: {} -> {}", was, leader);
        }
    }
}

#[async_trait]
impl LeadershipOracle for SharedLeadership {
    async fn is_leader(&self) -> Result<bool> {
        Ok(self.leader.load(Ordering::SeqCst))
    }
}

/// Consensus-service peers held in memory
#[derive(Debug, Default)]
pub struct SharedConsensus {
    peers: RwLock<Option<Vec<String>>>,
}

impl SharedConsensus {
    pub fn new(peers: Option<Vec<String>>) -> Self {
        Self {
            peers: RwLock::new(peers),
        }
    }

    pub async fn set(&self, peers: Option<Vec<String>>) {
        *self.peers.write().await = peers;
    }
}

#[async_trait]
impl ConsensusService for SharedConsensus {
    async fn peers(&self) -> Result<Option<Vec<String>>> {
        Ok(self.peers.read().await.clone())
    }
}
