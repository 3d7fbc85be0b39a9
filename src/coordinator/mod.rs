//! HA Coordination
//!
//! The coordinator runs one dispatch cycle per batch of observations. A
//! cycle walks the stages in a fixed order; each stage evaluates a fresh
//! snapshot of the persisted state into a [`Plan`], and the executor
//! performs the plan's actions and commits its mutations atomically.
//!
//! Stages are pure functions of (context, observations, snapshot), so a
//! replayed or repeated observation yields an empty plan once the state
//! reflects it.

mod executor;
mod plan;
mod status;
pub mod startup;
pub mod membership;
pub mod journal;
pub mod pairing;
pub mod degraded;
pub mod initializer;
pub mod failover;
pub mod readiness;

pub use executor::{Executor, Outcome};
pub use initializer::HaPhase;
pub use plan::{Action, Plan, Step};
pub use status::{ClusterStatus, StatusLevel};

use std::collections::BTreeMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::observe::Observations;
use crate::service::Collaborators;
use crate::state::{StateSnapshot, StateStore, StateTxn};
use crate::wait::WaitPolicy;

/// Static settings of the local NameNode and its cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub node_name: String,
    pub node_address: String,
    /// SSH credential published to the peer and to workers
    pub credential: String,
    pub cluster_name: String,
    pub hdfs_port: u16,
    pub webhdfs_port: u16,
    pub hadoop_version: String,
    pub min_journal_quorum: usize,
    pub spec: BTreeMap<String, String>,
}

impl Settings {
    pub fn from_config(config: &CoordinatorConfig, credential: String) -> Self {
        Self {
            node_name: config.node.name.clone(),
            node_address: config.node.address.clone(),
            credential,
            cluster_name: config.cluster.name.clone(),
            hdfs_port: config.cluster.hdfs_port,
            webhdfs_port: config.cluster.webhdfs_port,
            hadoop_version: config.cluster.hadoop_version.clone(),
            min_journal_quorum: config.cluster.min_journal_quorum,
            spec: config.cluster.spec.clone(),
        }
    }
}

/// Inputs a stage evaluates besides observations and state
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub settings: &'a Settings,
    /// Leadership token as read at the start of the stage
    pub is_leader: bool,
    /// Consensus-service peers, None until the service is ready
    pub consensus: Option<Vec<String>>,
}

/// Dispatch stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Startup,
    JournalQuorum,
    PeerPairing,
    Degraded,
    Membership,
    HaInitializer,
    Failover,
    DeferredRestart,
    Readiness,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Startup,
        Stage::JournalQuorum,
        Stage::PeerPairing,
        Stage::Degraded,
        Stage::Membership,
        Stage::HaInitializer,
        Stage::Failover,
        Stage::DeferredRestart,
        Stage::Readiness,
    ];

    pub fn evaluate(&self, ctx: &EvalContext<'_>, obs: &Observations, state: &StateSnapshot) -> Plan {
        match self {
            Stage::Startup => startup::evaluate(ctx, obs, state),
            Stage::JournalQuorum => journal::evaluate(ctx, obs, state),
            Stage::PeerPairing => pairing::evaluate(ctx, obs, state),
            Stage::Degraded => degraded::evaluate(ctx, obs, state),
            Stage::Membership => membership::evaluate(ctx, obs, state),
            Stage::HaInitializer => initializer::evaluate(ctx, obs, state),
            Stage::Failover => failover::evaluate(ctx, obs, state),
            Stage::DeferredRestart => failover::evaluate_deferred_restart(ctx, obs, state),
            Stage::Readiness => readiness::evaluate(ctx, obs, state),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Startup => "startup",
            Stage::JournalQuorum => "journal-quorum",
            Stage::PeerPairing => "peer-pairing",
            Stage::Degraded => "degraded",
            Stage::Membership => "membership",
            Stage::HaInitializer => "ha-initializer",
            Stage::Failover => "failover",
            Stage::DeferredRestart => "deferred-restart",
            Stage::Readiness => "readiness",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of one stage in a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Summary of one dispatch cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub completed_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub phase: HaPhase,
    pub status: ClusterStatus,
    pub state: StateSnapshot,
}

impl CycleReport {
    /// Stages that performed at least one action
    pub fn active_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|s| matches!(&s.outcome, Outcome::Applied { actions, .. } if !actions.is_empty()))
            .map(|s| s.stage)
            .collect()
    }

    /// Stages that failed in this cycle
    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Failed { .. }))
            .map(|s| s.stage)
            .collect()
    }

    /// All actions performed in this cycle, in order
    pub fn actions(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .flat_map(|s| match &s.outcome {
                Outcome::Applied { actions, .. } => actions.clone(),
                _ => Vec::new(),
            })
            .collect()
    }
}

/// NameNode HA coordinator
pub struct Coordinator {
    settings: Settings,
    store: Arc<StateStore>,
    collab: Collaborators,
    wait: WaitPolicy,
    cancel: CancellationToken,
    last_report: RwLock<Option<CycleReport>>,
}

impl Coordinator {
    pub fn new(settings: Settings, store: Arc<StateStore>, collab: Collaborators, wait: WaitPolicy) -> Self {
        Self {
            settings,
            store,
            collab,
            wait,
            cancel: CancellationToken::new(),
            last_report: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Token that aborts in-flight waits when cancelled
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Report of the most recent completed cycle
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run one dispatch cycle.
    ///
    /// A failing stage commits nothing and is retried from scratch on the
    /// next cycle; the remaining stages still run. The report is recorded
    /// either way, and the first stage error is returned once every stage
    /// ran. Cancellation stops the cycle immediately.
    pub async fn dispatch(&self, obs: &Observations) -> Result<CycleReport> {
        let executor = Executor::new(&self.collab, &self.store, self.wait, &self.cancel);
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        let mut first_error = None;

        for stage in Stage::ALL {
            let txn = StateTxn::load(&self.store).await?;
            let ctx = EvalContext {
                settings: &self.settings,
                is_leader: self.collab.leadership.is_leader().await?,
                consensus: self.collab.consensus.peers().await?,
            };

            let plan = stage.evaluate(&ctx, obs, txn.base());
            if !plan.is_empty() {
                tracing::debug!("{} stage planned {:?}", stage, plan.action_names());
            }

            let outcome = match executor.run(plan, txn).await {
                Ok(outcome) => outcome,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!("{} stage failed, retrying next cycle: {}", stage, e);
                    let outcome = Outcome::Failed { error: e.to_string() };
                    first_error.get_or_insert(e);
                    outcome
                }
            };
            stages.push(StageReport { stage, outcome });
        }

        let state = StateSnapshot::load(&self.store).await?;
        let is_leader = self.collab.leadership.is_leader().await?;
        let report = CycleReport {
            completed_at: Utc::now(),
            stages,
            phase: HaPhase::derive(&state, is_leader, obs.journal_initialized()),
            status: ClusterStatus::derive(&state, obs.peer.is_some(), self.settings.min_journal_quorum),
            state,
        };

        *self.last_report.write().await = Some(report.clone());
        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
