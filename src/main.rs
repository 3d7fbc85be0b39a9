//! nnha - NameNode HA Coordinator
//!
//! Drives a paired HDFS NameNode from unordered, re-deliverable
//! observations of its relations to a safe HA configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nnha::api::HttpServer;
use nnha::config::CoordinatorConfig;
use nnha::coordinator::{Coordinator, Settings};
use nnha::error::{Error, Result};
use nnha::service::{
    Collaborators, CommandNameNode, EtcHostsSync, FileRelationBus, LogStatusReporter,
    SharedConsensus, SharedLeadership, TcpProbe,
};
use nnha::source::ObservationDocument;
use nnha::state::{StateSnapshot, StateStore};
use nnha::wait::WaitPolicy;

/// nnha - NameNode HA Coordinator
#[derive(Parser)]
#[command(name = "nnha")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "nnha.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the coordinator daemon
    Start,

    /// Run a single dispatch cycle and print the report
    Once {
        /// Observation document (defaults to dispatch.observations)
        #[arg(short, long)]
        observations: Option<PathBuf>,
    },

    /// Check coordinator status
    Status {
        /// Coordinator address to query (defaults to localhost)
        #[arg(short, long, default_value = "localhost:8090")]
        address: String,
    },

    /// Print the persisted coordination state
    Flags,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "nnha.toml")]
        output: PathBuf,

        /// NameNode name
        #[arg(long, default_value = "nn-0")]
        node_name: String,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Start => {
            run_start(cli.config).await
        }
        Commands::Once { observations } => {
            run_once(cli.config, observations).await
        }
        Commands::Status { address } => {
            run_status(address).await
        }
        Commands::Flags => {
            run_flags(cli.config).await
        }
        Commands::Init { output, node_name } => {
            run_init(output, node_name)
        }
        Commands::Validate => {
            run_validate(cli.config)
        }
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Coordinator wired to the daemon collaborators, plus the capability
/// objects the dispatch loop refreshes
struct Runtime {
    coordinator: Arc<Coordinator>,
    leadership: Arc<SharedLeadership>,
    consensus: Arc<SharedConsensus>,
}

impl Runtime {
    fn build(config: &CoordinatorConfig) -> Result<Self> {
        if let Err(e) = std::fs::create_dir_all(config.state_dir()) {
            tracing::error!("Failed to create state directory {:?}: {}", config.state_dir(), e);
            return Err(e.into());
        }

        let store = match StateStore::open(config.state_dir()) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                tracing::error!("Failed to open state store: {}", e);
                return Err(e);
            }
        };

        let credential = config.load_credential()?;
        let leadership = Arc::new(SharedLeadership::default());
        let consensus = Arc::new(SharedConsensus::default());

        let collab = Collaborators {
            namenode: Arc::new(CommandNameNode::new(config.commands.clone())),
            leadership: leadership.clone(),
            consensus: consensus.clone(),
            probe: Arc::new(TcpProbe::default()),
            hosts: Arc::new(EtcHostsSync::new(config.dispatch.hosts_file.clone())),
            relations: Arc::new(FileRelationBus::new(config.dispatch.outbox_dir.clone())),
            status: Arc::new(LogStatusReporter::default()),
        };

        let wait = WaitPolicy {
            poll_interval: config.poll_interval(),
            deadline: config.wait_deadline(),
        };

        let coordinator = Arc::new(Coordinator::new(
            Settings::from_config(config, credential),
            store,
            collab,
            wait,
        ));

        Ok(Self {
            coordinator,
            leadership,
            consensus,
        })
    }

    /// Run one cycle against the document at `path`
    async fn cycle(&self, path: &Path) -> Result<()> {
        let Some(doc) = ObservationDocument::read(path).await? else {
            tracing::debug!("No observations at {:?} yet", path);
            return Ok(());
        };

        doc.apply(&self.leadership, &self.consensus).await;
        let report = self.coordinator.dispatch(&doc.observations).await?;

        let actions = report.actions();
        if !actions.is_empty() {
            tracing::info!("Cycle applied {:?}, status: {}", actions, report.status.message);
        }
        Ok(())
    }
}

/// Start the coordinator daemon
async fn run_start(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting nnha coordinator...");

    // Load configuration
    let config = match CoordinatorConfig::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e);
        }
    };
    tracing::info!("Loaded configuration for NameNode: {}", config.node.name);

    let runtime = Runtime::build(&config)?;
    let cancel = runtime.coordinator.cancellation();

    let http_server = HttpServer::new(
        config.api.clone(),
        Arc::clone(&runtime.coordinator),
        runtime.leadership.clone(),
    );
    let http_server_handle = tokio::spawn(async move {
        if let Err(e) = http_server.start().await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            shutdown.cancel();
        }
    });

    tracing::info!(
        "Dispatch loop started, reading {:?} every {:?}",
        config.dispatch.observations,
        config.dispatch_interval()
    );
    let mut ticker = tokio::time::interval(config.dispatch_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        match runtime.cycle(&config.dispatch.observations).await {
            Ok(()) => {}
            Err(Error::Cancelled) => break,
            Err(e) if e.is_retryable() => {
                tracing::warn!("Dispatch cycle aborted, retrying: {}", e);
            }
            Err(e) => {
                tracing::error!("Dispatch cycle failed: {}", e);
            }
        }
    }

    // Cleanup
    http_server_handle.abort();

    tracing::info!("nnha shutdown complete");
    Ok(())
}

/// Run a single dispatch cycle
async fn run_once(config_path: PathBuf, observations: Option<PathBuf>) -> Result<()> {
    let config = CoordinatorConfig::from_file(&config_path)?;
    let path = observations.unwrap_or_else(|| config.dispatch.observations.clone());

    let Some(doc) = ObservationDocument::read(&path).await? else {
        eprintln!("No observation document at {}", path.display());
        return Err(Error::Config(format!("missing observations: {}", path.display())));
    };

    let runtime = Runtime::build(&config)?;
    doc.apply(&runtime.leadership, &runtime.consensus).await;
    let report = runtime.coordinator.dispatch(&doc.observations).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Check coordinator status
async fn run_status(address: String) -> Result<()> {
    let url = format!("http://{}/status", address);

    match reqwest::get(&url).await {
        Ok(response) => {
            let status: serde_json::Value = response.json().await
                .map_err(|e| Error::Network(e.to_string()))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to get status: {}", e);
            Err(Error::Network(e.to_string()))
        }
    }
}

/// Print the persisted state
async fn run_flags(config_path: PathBuf) -> Result<()> {
    let config = CoordinatorConfig::from_file(&config_path)?;
    let store = StateStore::open(config.state_dir())?;
    let state = StateSnapshot::load(&store).await?;

    println!("nnha State ({})", config.node.name);
    println!("==========================");
    println!();
    if state.flags.is_empty() {
        println!("Flags:            (none)");
    } else {
        for flag in state.flags.iter() {
            println!("  [x] {}", flag.name());
        }
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}

/// Initialize configuration file
fn run_init(output: PathBuf, node_name: String) -> Result<()> {
    let config_content = format!(r#"# nnha Configuration
# Generated configuration file

[node]
name = "{node_name}"
address = "10.0.0.10"
data_dir = "/var/lib/nnha/{node_name}"
# credential_file = "/home/hdfs/.ssh/id_rsa.pub"

[cluster]
name = "hdfs"
hdfs_port = 8020
webhdfs_port = 50070
hadoop_version = "2.7.1"
min_journal_quorum = 3

[cluster.spec]
vendor = "apache"

[wait]
poll_interval_secs = 2
deadline_secs = 120

[dispatch]
interval_ms = 1000
observations = "/var/lib/nnha/observations.json"
outbox_dir = "/var/lib/nnha/outbox"
hosts_file = "/etc/hosts"

[commands]
# start = "systemctl start hadoop-hdfs-namenode"
# stop = "systemctl stop hadoop-hdfs-namenode"
# init_shared_edits = "hdfs namenode -initializeSharedEdits -nonInteractive"
# bootstrap_standby = "hdfs namenode -bootstrapStandby -nonInteractive"
# format_failover = "hdfs zkfc -formatZK -nonInteractive"

[api]
enabled = true
bind_address = "0.0.0.0:8090"
cors_enabled = false

[logging]
level = "info"
"#);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure the NameNode commands and cluster settings.");
    println!("Then start with: nnha start --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match CoordinatorConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  NameNode: {} ({})", config.node.name, config.node.address);
            println!("  Cluster: {}", config.cluster.name);
            println!("  Ports: hdfs={} webhdfs={}", config.cluster.hdfs_port, config.cluster.webhdfs_port);
            println!("  Journal Quorum: {}", config.cluster.min_journal_quorum);
            println!("  Peer Wait: every {:?} up to {:?}", config.poll_interval(), config.wait_deadline());
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}
