//! CLI for quorumkv clusters

use clap::{Parser, Subcommand};
use quorumkv::client::{probe_replication_window, KvClient};
use rand::seq::SliceRandom;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "quorumkv")]
#[command(about = "quorumkv replicated key-value store CLI")]
#[command(version = quorumkv::BUILD_INFO)]
struct Cli {
    /// Node URLs (comma-separated). `set` picks one at random.
    #[arg(long, value_delimiter = ',', default_value = "http://localhost:8080")]
    nodes: Vec<String>,

    /// Request timeout in ms
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a value
    Set {
        key: String,
        value: String,
    },

    /// Read a value through the node's read quorum
    Get {
        key: String,
    },

    /// Read a node's own copy, bypassing the quorum
    LocalRead {
        key: String,
    },

    /// Show the health of every node
    Health,

    /// Write through the first node while polling the others
    Probe {
        /// Key (random if omitted)
        #[arg(long)]
        key: Option<String>,

        #[arg(long, default_value = "probe-value")]
        value: String,

        /// Observation window in ms
        #[arg(long, default_value = "3000")]
        window_ms: u64,

        /// Poll interval in ms
        #[arg(long, default_value = "50")]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let timeout = Duration::from_millis(cli.timeout_ms);
    let clients = cli
        .nodes
        .iter()
        .map(|url| KvClient::with_timeout(url.clone(), timeout))
        .collect::<quorumkv::Result<Vec<_>>>()?;
    let first = clients
        .first()
        .ok_or_else(|| anyhow::anyhow!("at least one node URL is required"))?;

    match cli.command {
        Commands::Set { key, value } => {
            let node = clients.choose(&mut rand::thread_rng()).unwrap_or(first);
            let ack = node.set(&key, &value).await?;
            println!(
                "OK version={} coordinator={} ({})",
                ack.version,
                ack.coordinator,
                node.base_url()
            );
        }

        Commands::Get { key } => match first.get(&key).await? {
            Some(found) => println!("{} (version {}, node {})", found.value, found.version, found.node),
            None => println!("(not found)"),
        },

        Commands::LocalRead { key } => {
            for node in &clients {
                match node.local_read(&key).await {
                    Ok(Some(found)) => println!(
                        "{}: {} (version {})",
                        found.node, found.value, found.version
                    ),
                    Ok(None) => println!("{}: (not found)", node.base_url()),
                    Err(e) => println!("{}: error: {}", node.base_url(), e),
                }
            }
        }

        Commands::Health => {
            for node in &clients {
                match node.health().await {
                    Ok(h) => println!(
                        "{}: {} role={} topology={} ({})",
                        h.node_id,
                        h.status,
                        h.role,
                        h.topology,
                        node.base_url()
                    ),
                    Err(e) => println!("{}: unreachable: {}", node.base_url(), e),
                }
            }
        }

        Commands::Probe {
            key,
            value,
            window_ms,
            interval_ms,
        } => {
            let key = key.unwrap_or_else(|| format!("probe-{}", uuid::Uuid::new_v4()));
            let report = probe_replication_window(
                first,
                &clients[1..],
                &key,
                &value,
                Duration::from_millis(window_ms),
                Duration::from_millis(interval_ms),
            )
            .await?;

            println!("Probe report for {}:", key);
            println!("  Version: {}", report.version);
            println!("  Write latency: {} ms", report.write_latency_ms);
            println!("  Observations: {}", report.observations);
            println!("  Stale: {}", report.stale);
            println!("  Errors: {}", report.errors);
            for (node, stale) in &report.stale_by_node {
                println!("    {}: {} stale", node, stale);
            }
        }
    }

    Ok(())
}
