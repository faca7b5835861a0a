//! Relay server implementation
//!
//! This module provides the TCP accept loop and the shared state behind
//! it:
//!
//! - **Registry**: live connections, the source of truth for membership
//! - **Channel directory**: known channels and their lifecycle
//! - **Session**: per-connection protocol state machine
//! - **Router**: message fan-out to channel members
//!
//! The registry and directory are always updated jointly, so they live
//! together in [`World`] behind a single lock. Each inbound event is
//! handled to completion under that lock; socket writes go through
//! per-connection mpsc sinks and never happen while it is held.

pub mod channels;
pub mod registry;
pub mod router;
pub mod session;

pub use channels::ChannelDirectory;
pub use registry::{ConnId, Connection, Registry};
pub use session::Session;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{RelayError, Result};
use crate::protocol::codec;
use crate::protocol::frame::FrameCodec;
use crate::protocol::messages::ServerEvent;
use crate::RelayConfig;

/// Registry and channel directory, guarded together
#[derive(Debug)]
pub struct World {
    pub registry: Registry,
    pub directory: ChannelDirectory,
}

impl World {
    /// Create a world seeded with the given default channels
    pub fn new(default_channels: Vec<String>) -> Self {
        Self {
            registry: Registry::new(),
            directory: ChannelDirectory::new(default_channels),
        }
    }
}

/// Shared server state
#[derive(Debug)]
struct ServerState {
    world: Mutex<World>,
    config: RelayConfig,
}

/// TCP-based chat relay server
pub struct RelayServer {
    state: Arc<ServerState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bind the listener and prepare the shared state
    pub async fn bind(config: RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| RelayError::network(format!("Failed to bind {}: {}", config.bind_addr, e)))?;

        let state = Arc::new(ServerState {
            world: Mutex::new(World::new(config.default_channels.clone())),
            config,
        });

        Ok(Self { state, listener })
    }

    /// The address the server is actually listening on
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until the process exits
    pub async fn serve(self) -> Result<()> {
        info!("Relay server listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        handle_connection(state, stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Serve one client connection from accept to cleanup
async fn handle_connection(state: Arc<ServerState>, stream: TcpStream, addr: SocketAddr) {
    debug!("New connection from {}", addr);

    let (mut reader, mut writer) = stream.into_split();
    let (sink, mut outbound) = mpsc::unbounded_channel::<Bytes>();

    // Writer task: drains the sink so a slow socket never blocks the
    // event path. Exits when every sender (registry included) is gone.
    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = writer.write_all(&frame).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
    });

    // Register and open the login handshake
    let session = {
        let mut world = state.world.lock().await;
        if world.registry.len() >= state.config.max_connections {
            warn!(
                "Rejecting connection from {}: maximum connections reached ({})",
                addr, state.config.max_connections
            );
            // Tell the client apart from a network fault before closing
            let _ = sink.send(codec::encode(&ServerEvent::error(
                "connection",
                "Server is full.",
            )));
            return;
        }
        let conn_id = world.registry.register(addr, sink);
        let session = Session::new(conn_id);
        session.on_connect(&mut world);
        session
    };

    // Reader loop: frame the byte stream and feed complete payloads to
    // the session, one at a time, each handled to completion under the
    // world lock.
    let mut codec = FrameCodec::new();
    let mut buf = vec![0u8; 4096];

    'read: loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Connection from {} closed by peer", addr);
                break;
            }
            Ok(n) => {
                codec.feed(&buf[..n]);
                loop {
                    match codec.decode_next() {
                        Ok(Some(frame)) => {
                            let mut world = state.world.lock().await;
                            session.on_payload(&mut world, &frame.payload);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            // Framing desync is unrecoverable for this
                            // connection; envelope-level errors are not
                            // and were already answered by the session.
                            warn!("Frame decode error from {}: {}", addr, e);
                            break 'read;
                        }
                    }
                }
            }
            Err(e) => {
                debug!("Read from {} failed: {}", addr, e);
                break;
            }
        }
    }

    let mut world = state.world.lock().await;
    session.on_disconnect(&mut world);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::FRAME_HEADER_SIZE;
    use serde_json::{json, Value};
    use tokio::net::TcpStream;

    async fn write_envelope(stream: &mut TcpStream, envelope: Value) {
        let body = envelope.to_string().into_bytes();
        let mut frame = (body.len() as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&body);
        stream.write_all(&frame).await.unwrap();
    }

    async fn read_envelope(stream: &mut TcpStream) -> Value {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let len = u32::from_be_bytes(header) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_login_over_tcp() {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = RelayServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Server opens with a login request
        let request = read_envelope(&mut client).await;
        assert_eq!(request["type"], "request");
        assert_eq!(request["data"]["request"], "login");

        write_envelope(
            &mut client,
            json!({
                "type": "command",
                "data": { "command": "login", "parameters": { "username": "alice" } }
            }),
        )
        .await;

        let session = read_envelope(&mut client).await;
        assert_eq!(session["type"], "session");
        assert_eq!(session["data"]["status"], true);
        assert_eq!(session["data"]["channels"], json!(["general", "python"]));
    }

    #[tokio::test]
    async fn test_full_server_rejects_with_an_envelope() {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections: 1,
            ..Default::default()
        };
        let server = RelayServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut first = TcpStream::connect(addr).await.unwrap();
        read_envelope(&mut first).await; // login request: the only slot is taken

        let mut second = TcpStream::connect(addr).await.unwrap();
        let envelope = read_envelope(&mut second).await;
        assert_eq!(envelope["type"], "error");
        assert_eq!(envelope["data"]["error_type"], "connection");
        assert_eq!(envelope["data"]["message"], "Server is full.");

        // The rejected connection is then closed by the server
        let mut byte = [0u8; 1];
        assert_eq!(second.read(&mut byte).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_join_and_relay_over_tcp() {
        let config = RelayConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = RelayServer::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());

        let mut alice = TcpStream::connect(addr).await.unwrap();
        read_envelope(&mut alice).await; // login request
        write_envelope(
            &mut alice,
            json!({
                "type": "command",
                "data": { "command": "login", "parameters": { "username": "alice" } }
            }),
        )
        .await;
        read_envelope(&mut alice).await; // session
        write_envelope(
            &mut alice,
            json!({
                "type": "command",
                "data": { "command": "join", "parameters": { "channel": "general" } }
            }),
        )
        .await;
        let joined = read_envelope(&mut alice).await;
        assert_eq!(joined["data"]["event_type"], "user_joined");
        assert_eq!(
            joined["data"]["parameters"]["current_users"],
            json!(["alice"])
        );

        let mut bob = TcpStream::connect(addr).await.unwrap();
        read_envelope(&mut bob).await;
        write_envelope(
            &mut bob,
            json!({
                "type": "command",
                "data": { "command": "login", "parameters": { "username": "bob" } }
            }),
        )
        .await;
        read_envelope(&mut bob).await;
        write_envelope(
            &mut bob,
            json!({
                "type": "command",
                "data": { "command": "join", "parameters": { "channel": "general" } }
            }),
        )
        .await;
        read_envelope(&mut bob).await; // bob's own user_joined
        read_envelope(&mut alice).await; // alice sees bob join

        write_envelope(
            &mut bob,
            json!({ "type": "message", "data": { "message": "hi" } }),
        )
        .await;
        let relayed = read_envelope(&mut alice).await;
        assert_eq!(relayed["type"], "message");
        assert_eq!(relayed["data"]["username"], "bob");
        assert_eq!(relayed["data"]["message"], "hi");
    }
}
