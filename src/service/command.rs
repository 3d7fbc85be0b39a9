//! Daemon-side collaborators
//!
//! Concrete implementations used by the `nnha` binary: shell commands for
//! NameNode operations, TCP reachability, a managed block in the hosts
//! file, and JSON documents in an outbox directory for relation data.

use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;

use crate::config::CommandsConfig;
use crate::coordinator::{ClusterStatus, StatusLevel};
use crate::error::{Error, Result};
use crate::hosts::HostsTable;
use super::{
    HostsSync, NameNodeService, PeerPayload, PeerProbe, RelationBus, ServiceRegistration,
    StatusReporter, WorkerPayload,
};

/// NameNode operations backed by configured shell commands.
///
/// Arguments travel in `NNHA_*` environment variables.
pub struct CommandNameNode {
    commands: CommandsConfig,
}

impl CommandNameNode {
    pub fn new(commands: CommandsConfig) -> Self {
        Self { commands }
    }

    async fn run(&self, operation: &str, command: &Option<String>, env: &[(&str, String)]) -> Result<()> {
        let Some(command) = command else {
            tracing::debug!("No command configured for '{}', skipping", operation);
            return Ok(());
        };

        tracing::info!("Running {}: {}", operation, command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .status()
            .await
            .map_err(|e| Error::service(operation, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::service(operation, format!("command exited with {}", status)))
        }
    }
}

#[async_trait]
impl NameNodeService for CommandNameNode {
    async fn configure(&self) -> Result<()> {
        self.run("configure", &self.commands.configure, &[]).await
    }

    async fn format(&self) -> Result<()> {
        self.run("format", &self.commands.format, &[]).await
    }

    async fn start(&self) -> Result<()> {
        self.run("start", &self.commands.start, &[]).await
    }

    async fn stop(&self) -> Result<()> {
        self.run("stop", &self.commands.stop, &[]).await
    }

    async fn reload(&self) -> Result<()> {
        self.run("reload", &self.commands.reload, &[]).await
    }

    async fn create_dirs(&self) -> Result<()> {
        self.run("create_dirs", &self.commands.create_dirs, &[]).await
    }

    async fn open_ports(&self) -> Result<()> {
        self.run("open_ports", &self.commands.open_ports, &[]).await
    }

    async fn register_slaves(&self, slaves: &[String]) -> Result<()> {
        let env = [("NNHA_SLAVES", slaves.join(","))];
        self.run("register_slaves", &self.commands.register_slaves, &env).await
    }

    async fn configure_journal(&self, nodes: &[String], port: u16) -> Result<()> {
        let env = [
            ("NNHA_JOURNAL_NODES", nodes.join(",")),
            ("NNHA_JOURNAL_PORT", port.to_string()),
        ];
        self.run("configure_journal", &self.commands.configure_journal, &env).await
    }

    async fn configure_peers(&self, peers: &[String]) -> Result<()> {
        let env = [("NNHA_PEERS", peers.join(","))];
        self.run("configure_peers", &self.commands.configure_peers, &env).await
    }

    async fn install_peer_credential(&self, credential: &str) -> Result<()> {
        let env = [("NNHA_PEER_CREDENTIAL", credential.to_string())];
        self.run("install_credential", &self.commands.install_credential, &env).await
    }

    async fn init_shared_edits(&self) -> Result<()> {
        self.run("init_shared_edits", &self.commands.init_shared_edits, &[]).await
    }

    async fn bootstrap_standby(&self) -> Result<()> {
        self.run("bootstrap_standby", &self.commands.bootstrap_standby, &[]).await
    }

    async fn configure_consensus(&self, peers: &[String]) -> Result<()> {
        let env = [("NNHA_CONSENSUS_PEERS", peers.join(","))];
        self.run("configure_consensus", &self.commands.configure_consensus, &env).await
    }

    async fn format_failover_state(&self) -> Result<()> {
        self.run("format_failover", &self.commands.format_failover, &[]).await
    }

    async fn restart_dependents(&self) -> Result<()> {
        self.run("restart_dependents", &self.commands.restart_dependents, &[]).await
    }
}

/// Peer reachability via a TCP connect
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PeerProbe for TcpProbe {
    async fn is_reachable(&self, host: &str, port: u16) -> Result<bool> {
        let target = format!("{}:{}", host, port);
        match tokio::time::timeout(self.connect_timeout, tokio::net::TcpStream::connect(&target)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                tracing::trace!("{} not reachable yet: {}", target, e);
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }
}

const HOSTS_BEGIN: &str = "# BEGIN nnha managed hosts";
const HOSTS_END: &str = "# END nnha managed hosts";

/// Keeps a managed block inside a hosts file in sync with the table
pub struct EtcHostsSync {
    path: PathBuf,
}

impl EtcHostsSync {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Replace the managed block of `existing` with `hosts`
    fn render(existing: &str, hosts: &HostsTable) -> String {
        let mut out = String::new();
        let mut inside = false;
        for line in existing.lines() {
            if line.trim() == HOSTS_BEGIN {
                inside = true;
                continue;
            }
            if line.trim() == HOSTS_END {
                inside = false;
                continue;
            }
            if !inside {
                out.push_str(line);
                out.push('\n');
            }
        }

        out.push_str(HOSTS_BEGIN);
        out.push('\n');
        for (address, name) in hosts.iter() {
            out.push_str(&format!("{} {}\n", address, name));
        }
        out.push_str(HOSTS_END);
        out.push('\n');
        out
    }
}

#[async_trait]
impl HostsSync for EtcHostsSync {
    async fn sync(&self, hosts: &HostsTable) -> Result<()> {
        let existing = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        tokio::fs::write(&self.path, Self::render(&existing, hosts)).await?;
        tracing::debug!("Synced {} host entries to {:?}", hosts.len(), self.path);
        Ok(())
    }
}

/// Writes outbound relation data as JSON documents for the hook substrate
pub struct FileRelationBus {
    outbox: PathBuf,
}

impl FileRelationBus {
    pub fn new(outbox: PathBuf) -> Self {
        Self { outbox }
    }

    async fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.outbox).await?;
        let body = serde_json::to_vec_pretty(value)?;
        let tmp = self.outbox.join(format!("{}.json.tmp", name));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, self.outbox.join(format!("{}.json", name))).await?;
        Ok(())
    }
}

#[async_trait]
impl RelationBus for FileRelationBus {
    async fn send_workers(&self, payload: &WorkerPayload) -> Result<()> {
        self.write("workers", payload).await
    }

    async fn send_peer(&self, payload: &PeerPayload) -> Result<()> {
        self.write("peer", payload).await
    }

    async fn signal_journal_initialized(&self) -> Result<()> {
        self.write("journal", &serde_json::json!({ "initialized": true })).await
    }

    async fn register_service(&self, registration: &ServiceRegistration) -> Result<()> {
        self.write(&format!("registry-{}", registration.service_name), registration).await
    }

    async fn unregister_service(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.outbox.join(format!("registry-{}.json", name))).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reports status through the log, once per change
#[derive(Debug, Default)]
pub struct LogStatusReporter {
    last: tokio::sync::Mutex<Option<ClusterStatus>>,
}

#[async_trait]
impl StatusReporter for LogStatusReporter {
    async fn report(&self, status: &ClusterStatus) -> Result<()> {
        let mut last = self.last.lock().await;
        if last.as_ref() == Some(status) {
            return Ok(());
        }
        *last = Some(status.clone());

        match status.level {
            StatusLevel::Active => tracing::info!("Status: {}", status),
            StatusLevel::Waiting | StatusLevel::Blocked => tracing::warn!("Status: {}", status),
        }
        Ok(())
    }
}
