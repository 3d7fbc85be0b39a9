//! nnha Configuration
//!
//! This module provides configuration structures for the NameNode HA
//! coordinator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Local node identity
    pub node: NodeConfig,

    /// Cluster-wide settings shared with consumers
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Bounded peer-reachability wait
    #[serde(default)]
    pub wait: WaitConfig,

    /// Dispatch loop configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// NameNode operation commands
    #[serde(default)]
    pub commands: CommandsConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Canonical host name of this NameNode
    pub name: String,

    /// Address other nodes reach this NameNode on
    pub address: String,

    /// Data directory for persisted coordination state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File holding the SSH credential published to the peer and workers
    #[serde(default)]
    pub credential_file: Option<PathBuf>,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name published to workers
    #[serde(default = "default_cluster_name")]
    pub name: String,

    /// NameNode RPC port
    #[serde(default = "default_hdfs_port")]
    pub hdfs_port: u16,

    /// NameNode web port
    #[serde(default = "default_webhdfs_port")]
    pub webhdfs_port: u16,

    /// Hadoop version advertised to the service registry
    #[serde(default = "default_hadoop_version")]
    pub hadoop_version: String,

    /// Minimum distinct JournalNodes before HA initialization may proceed
    #[serde(default = "default_min_journal_quorum")]
    pub min_journal_quorum: usize,

    /// Distribution spec forwarded to workers
    #[serde(default)]
    pub spec: BTreeMap<String, String>,
}

/// Peer-reachability wait configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Poll interval in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Deadline in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

/// Dispatch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Interval between evaluation cycles in milliseconds
    #[serde(default = "default_dispatch_interval_ms")]
    pub interval_ms: u64,

    /// Observation document written by the hook substrate
    #[serde(default = "default_observations_path")]
    pub observations: PathBuf,

    /// Directory receiving outbound relation payloads
    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    /// Hosts file holding the managed resolution block
    #[serde(default = "default_hosts_file")]
    pub hosts_file: PathBuf,
}

/// Shell commands backing each NameNode operation.
///
/// A missing entry turns the operation into a logged no-op.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandsConfig {
    pub configure: Option<String>,
    pub format: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub reload: Option<String>,
    pub create_dirs: Option<String>,
    pub open_ports: Option<String>,
    pub register_slaves: Option<String>,
    pub configure_journal: Option<String>,
    pub configure_peers: Option<String>,
    pub install_credential: Option<String>,
    pub init_shared_edits: Option<String>,
    pub bootstrap_standby: Option<String>,
    pub configure_consensus: Option<String>,
    pub format_failover: Option<String>,
    pub restart_dependents: Option<String>,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/nnha")
}

fn default_cluster_name() -> String {
    "hdfs".to_string()
}

fn default_hdfs_port() -> u16 {
    8020
}

fn default_webhdfs_port() -> u16 {
    50070
}

fn default_hadoop_version() -> String {
    "2.7.1".to_string()
}

fn default_min_journal_quorum() -> usize {
    3
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_deadline_secs() -> u64 {
    120
}

fn default_dispatch_interval_ms() -> u64 {
    1000
}

fn default_observations_path() -> PathBuf {
    PathBuf::from("/var/lib/nnha/observations.json")
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("/var/lib/nnha/outbox")
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:8090".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            hdfs_port: default_hdfs_port(),
            webhdfs_port: default_webhdfs_port(),
            hadoop_version: default_hadoop_version(),
            min_journal_quorum: default_min_journal_quorum(),
            spec: BTreeMap::new(),
        }
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_dispatch_interval_ms(),
            observations: default_observations_path(),
            outbox_dir: default_outbox_dir(),
            hosts_file: default_hosts_file(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: CoordinatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.name.is_empty() {
            return Err(crate::Error::Config("node.name cannot be empty".into()));
        }

        if self.node.address.is_empty() {
            return Err(crate::Error::Config("node.address cannot be empty".into()));
        }

        if self.cluster.min_journal_quorum == 0 {
            return Err(crate::Error::Config(
                "cluster.min_journal_quorum must be at least 1".into(),
            ));
        }

        if self.wait.poll_interval_secs == 0 || self.wait.poll_interval_secs > self.wait.deadline_secs {
            return Err(crate::Error::Config(
                "wait.poll_interval_secs must be between 1 and wait.deadline_secs".into(),
            ));
        }

        Ok(())
    }

    /// Get the state directory path
    pub fn state_dir(&self) -> PathBuf {
        self.node.data_dir.join("state")
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.wait.poll_interval_secs)
    }

    /// Get wait deadline as Duration
    pub fn wait_deadline(&self) -> Duration {
        Duration::from_secs(self.wait.deadline_secs)
    }

    /// Get dispatch interval as Duration
    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch.interval_ms)
    }

    /// Read the local SSH credential, empty when none is configured
    pub fn load_credential(&self) -> crate::Result<String> {
        match &self.node.credential_file {
            Some(path) => Ok(std::fs::read_to_string(path)?.trim().to_string()),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[node]
name = "nn-0"
address = "10.0.0.10"
data_dir = "/var/lib/nnha"

[cluster]
name = "analytics"
hdfs_port = 8020

[cluster.spec]
vendor = "apache"
hadoop = "2.7.1"

[commands]
stop = "systemctl stop hadoop-hdfs-namenode"
start = "systemctl start hadoop-hdfs-namenode"
"#;

        let config = CoordinatorConfig::from_str(toml).unwrap();
        assert_eq!(config.node.name, "nn-0");
        assert_eq!(config.cluster.name, "analytics");
        assert_eq!(config.cluster.min_journal_quorum, 3);
        assert_eq!(config.cluster.spec.get("vendor").map(String::as_str), Some("apache"));
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.wait_deadline(), Duration::from_secs(120));
        assert!(config.commands.reload.is_none());
    }

    #[test]
    fn test_rejects_inverted_wait() {
        let toml = r#"
[node]
name = "nn-0"
address = "10.0.0.10"

[wait]
poll_interval_secs = 30
deadline_secs = 10
"#;
        assert!(matches!(
            CoordinatorConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_empty_name() {
        let toml = r#"
[node]
name = ""
address = "10.0.0.10"
"#;
        assert!(CoordinatorConfig::from_str(toml).is_err());
    }
}
