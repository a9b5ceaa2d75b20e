//! Node binary

use clap::{Parser, Subcommand};
use quorumkv::common::{Config, NodeRole};
use quorumkv::NodeServer;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quorumkv-node")]
#[command(about = "quorumkv replica node with tunable W/R quorums")]
#[command(version = quorumkv::BUILD_INFO)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a node
    ///
    /// Settings come from QUORUMKV_CONFIG and QUORUMKV_* first; flags override them.
    Serve {
        /// Node ID
        #[arg(long)]
        id: Option<String>,

        /// Bind address for HTTP
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// leader, follower or peer (leaderless)
        #[arg(long)]
        role: Option<NodeRole>,

        /// Peer base URLs (comma-separated, order is replication order)
        #[arg(long, value_delimiter = ',')]
        peers: Option<Vec<String>>,

        /// Write quorum (W)
        #[arg(long)]
        write_quorum: Option<usize>,

        /// Read quorum (R)
        #[arg(long)]
        read_quorum: Option<usize>,

        /// Replicate in the background when W=1
        #[arg(long)]
        background_fanout: Option<bool>,

        /// Delay before each replication call, in ms
        #[arg(long)]
        network_delay_ms: Option<u64>,

        /// Delay before applying a replicated write, in ms
        #[arg(long)]
        apply_delay_ms: Option<u64>,

        /// Delay before serving a local read, in ms
        #[arg(long)]
        read_delay_ms: Option<u64>,

        /// Per peer call timeout, in ms
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            id,
            bind,
            role,
            peers,
            write_quorum,
            read_quorum,
            background_fanout,
            network_delay_ms,
            apply_delay_ms,
            read_delay_ms,
            timeout_ms,
        } => {
            let mut config = Config::load()?;

            if let Some(id) = id {
                config.node_id = id;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(role) = role {
                config.role = role;
            }
            if let Some(peers) = peers {
                config.peers = peers;
            }
            if let Some(w) = write_quorum {
                config.write_quorum = w;
            }
            if let Some(r) = read_quorum {
                config.read_quorum = r;
            }
            if background_fanout.is_some() {
                config.background_fanout = background_fanout;
            }
            if let Some(ms) = network_delay_ms {
                config.latency.network_delay_ms = ms;
            }
            if let Some(ms) = apply_delay_ms {
                config.latency.apply_delay_ms = ms;
            }
            if let Some(ms) = read_delay_ms {
                config.latency.read_delay_ms = ms;
            }
            if let Some(ms) = timeout_ms {
                config.request_timeout_ms = ms;
            }

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| config.log_level.as_str().into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let server = NodeServer::new(config)?;
            server.serve().await?;
        }
    }

    Ok(())
}
