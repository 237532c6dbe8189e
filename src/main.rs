//! respkv server
//!
//! Sets up configuration and logging, creates the keyspace, and accepts
//! connections until Ctrl+C.

use clap::Parser;
use respkv::commands::CommandHandler;
use respkv::config::ServerConfig;
use respkv::connection::{handle_connection, ConnectionLimits, ConnectionStats};
use respkv::storage::{ExpirySweeper, Keyspace};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = respkv::VERSION, "Starting respkv");

    // Shared across all connections for the life of the process
    let keyspace = Arc::new(Keyspace::new());

    let _sweeper = config
        .expiry()
        .map(|expiry| ExpirySweeper::start(Arc::clone(&keyspace), expiry));

    let stats = Arc::new(ConnectionStats::new());
    let limits = ConnectionLimits {
        max_buffer_size: config.max_buffer_size,
        max_depth: config.depth_limit(),
    };

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening");

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, Arc::clone(&keyspace), Arc::clone(&stats), limits) => {}
        _ = shutdown => {}
    }

    info!(
        keys = keyspace.len(),
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    keyspace: Arc<Keyspace>,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = CommandHandler::new(Arc::clone(&keyspace));
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(stream, addr, handler, stats, limits));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
