//! ioservice Server Binary
//!
//! Starts the TCP server for ioservice.

use clap::Parser;
use ioservice::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// ioservice Server
#[derive(Parser, Debug)]
#[command(name = "ioservice-server")]
#[command(about = "Typed command/reply server over persistent TCP connections")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Per-connection read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    read_timeout_ms: u64,

    /// Per-connection write timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    write_timeout_ms: u64,

    /// Delay each reply by the lag the client sent with START
    #[arg(long)]
    simulate_lag: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ioservice=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ioservice Server v{}", ioservice::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .simulate_lag(args.simulate_lag)
        .build();

    let mut server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
