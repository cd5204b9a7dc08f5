//! ShardKV - A Sharded In-Memory Key-Value Server
//!
//! This is the main entry point for the ShardKV server.
//! It sets up logging, the storage engine and the TCP listener, then hands
//! every accepted connection to its own task.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use shardkv::commands::Executor;
use shardkv::connection::{
    handle_connection, ConnectionConfig, ConnectionStats, DEFAULT_MAX_BUFFER_SIZE,
};
use shardkv::protocol::DecoderLimits;
use shardkv::storage::{MemoryStorage, ShardedStorage, Storage, DEFAULT_SHARDS};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Which storage engine backs the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// One map behind a single reader/writer lock
    Single,
    /// Fixed table of independently locked shards
    Sharded,
}

/// ShardKV Server
#[derive(Parser, Debug)]
#[command(name = "shardkv")]
#[command(about = "Sharded in-memory key-value server speaking RESP")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = shardkv::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shardkv::DEFAULT_PORT)]
    port: u16,

    /// Storage engine
    #[arg(short, long, value_enum, default_value_t = EngineKind::Sharded)]
    engine: EngineKind,

    /// Number of shards for the sharded engine (at least 1)
    #[arg(short, long, default_value_t = DEFAULT_SHARDS)]
    shards: usize,

    /// Largest amount of undecoded input buffered per client, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BUFFER_SIZE)]
    max_buffer: usize,
}

impl Args {
    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn build_storage(&self) -> Arc<dyn Storage> {
        match self.engine {
            EngineKind::Single => Arc::new(MemoryStorage::new()),
            EngineKind::Sharded => Arc::new(ShardedStorage::with_shards(self.shards)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up logging; RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    info!(version = shardkv::VERSION, "ShardKV starting");

    // Create the storage engine (shared across all connections)
    let storage = args.build_storage();
    match args.engine {
        EngineKind::Single => info!("Storage engine initialized with a single lock"),
        EngineKind::Sharded => info!(
            shards = args.shards.max(1),
            "Storage engine initialized with sharded locks"
        ),
    }

    let executor = Executor::new(storage);
    let config = ConnectionConfig {
        limits: DecoderLimits::default(),
        max_buffer_size: args.max_buffer,
    };

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(args.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", args.bind_address()))?;
    info!("Listening on {}", args.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = accept_loop(listener, executor, config, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    executor: Executor,
    config: ConnectionConfig,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    error!(client = %addr, "Failed to set TCP_NODELAY: {}", e);
                }

                let executor = executor.clone();
                let stats = Arc::clone(&stats);

                // Spawn a task to handle this connection
                tokio::spawn(async move {
                    handle_connection(stream, addr, executor, config, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
