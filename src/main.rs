use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cortex::cli;
use cortex::config::CortexConfig;
use cortex::memory::types::Sector;
use cortex::memory::{AddRequest, Engine, QueryRequest};
use cortex::server;

#[derive(Parser)]
#[command(name = "cortex", version, about = "Brain-inspired memory engine for AI agents")]
struct Cli {
    /// Config file (defaults to ~/.cortex/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the server (MCP over stdio, or REST + MCP over HTTP)
    Serve {
        /// Transport: stdio or http (overrides config)
        #[arg(long)]
        transport: Option<String>,
        /// Port for the http transport (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Store a new memory
    Add {
        content: String,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Force the primary sector instead of classifying
        #[arg(long)]
        sector: Option<Sector>,
        /// Initial salience (0.0-1.0)
        #[arg(long)]
        salience: Option<f64>,
    },
    /// Search memories by similarity
    Query {
        query: String,
        /// Maximum number of results
        #[arg(short, long)]
        k: Option<usize>,
        /// Only match memories in this sector
        #[arg(long)]
        sector: Option<Sector>,
        /// Only match memories with one of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Drop results scoring below this value
        #[arg(long)]
        min_score: Option<f64>,
        /// Follow waypoint links from the direct hits
        #[arg(long)]
        graph: bool,
        /// Maximum hops with --graph
        #[arg(long)]
        depth: Option<usize>,
    },
    /// Show one memory in full
    Get { id: String },
    /// List memories, newest first
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        sector: Option<Sector>,
    },
    /// Raise a memory's salience
    Reinforce {
        id: String,
        #[arg(long, default_value_t = cortex::api::DEFAULT_REINFORCE_BOOST)]
        boost: f64,
    },
    /// Permanently delete a memory
    Delete { id: String },
    /// Per-sector statistics
    Sectors,
    /// Run database diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CortexConfig::load_from(path)?,
        None => CortexConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    match cli.command {
        Command::Serve { transport, port } => {
            if let Some(transport) = transport {
                config.server.transport = transport;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await?;
        }
        Command::Doctor => {
            tokio::task::spawn_blocking(move || cli::doctor::doctor(&config)).await??;
        }
        command => {
            let engine = server::open_engine(config).await?;
            tokio::task::spawn_blocking(move || run_command(&engine, command, json)).await??;
        }
    }

    Ok(())
}

/// Engine-backed commands. Runs on the blocking pool.
fn run_command(engine: &Engine, command: Command, json: bool) -> Result<()> {
    match command {
        Command::Add {
            content,
            tags,
            sector,
            salience,
        } => {
            let mut request = AddRequest::new(content);
            request.tags = tags;
            request.salience = salience;
            if let Some(sector) = sector {
                request
                    .metadata
                    .insert("sector".into(), sector.as_str().into());
            }
            cli::add::add(engine, request, json)
        }
        Command::Query {
            query,
            k,
            sector,
            tags,
            min_score,
            graph,
            depth,
        } => {
            let request = QueryRequest {
                query,
                k,
                sector,
                tags,
                min_score,
                use_graph: graph,
                depth,
            };
            cli::query::query(engine, &request, json)
        }
        Command::Get { id } => cli::get::get(engine, &id, json),
        Command::List {
            limit,
            offset,
            sector,
        } => cli::list::list(engine, limit, offset, sector, json),
        Command::Reinforce { id, boost } => cli::reinforce::reinforce(engine, &id, boost),
        Command::Delete { id } => cli::delete::delete(engine, &id),
        Command::Sectors => cli::sectors::sectors(engine, json),
        Command::Serve { .. } | Command::Doctor => {
            anyhow::bail!("serve and doctor do not run against an opened engine")
        }
    }
}
