//! Parley chat relay server
//!
//! A plain-TCP relay: clients log in with a unique username, join one
//! channel at a time, and exchange JSON-envelope messages fanned out to
//! the other members of their channel.
//!
//! Usage:
//!   cargo run                        # Listen on 127.0.0.1:9000
//!   cargo run -- --port 9100         # Listen on a specific port

use std::env;

use parley::{RelayConfig, RelayServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "help" || a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = RelayConfig::default();
    if let Some(addr) = parse_flag(&args, "--addr") {
        config.bind_addr = addr.parse()?;
    }
    if let Some(port) = parse_flag(&args, "--port") {
        config.bind_addr.set_port(port.parse()?);
    }
    if let Some(max) = parse_flag(&args, "--max-conn") {
        config.max_connections = max.parse()?;
    }

    info!("Starting chat relay server...");
    info!("Configuration:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Default channels: {:?}", config.default_channels);
    info!("  - Max connections: {}", config.max_connections);

    let server = RelayServer::bind(config).await?;

    // Serves until the process is killed
    if let Err(e) = server.serve().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn print_usage() {
    println!("Parley - TCP Chat Relay Server");
    println!();
    println!("USAGE:");
    println!("    cargo run -- [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --addr <ADDR>       Address to bind (default: 127.0.0.1:9000)");
    println!("    --port <PORT>       Port to listen on (default: 9000)");
    println!("    --max-conn <NUM>    Maximum connections (default: 1000)");
    println!();
    println!("PROTOCOL:");
    println!("    Length-prefixed JSON envelopes over TCP. The server opens every");
    println!("    connection with a login request; once a unique username is");
    println!("    accepted the client may join channels and exchange messages.");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run");
    println!("    cargo run -- --port 9100");
    println!("    RUST_LOG=debug cargo run");
}

fn parse_flag<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
