//! Per-connection protocol state machine
//!
//! A session interprets decoded client events against the shared world
//! (registry + channel directory) and produces outbound envelopes. Every
//! handler runs to completion under the world lock, so no two sessions
//! ever interleave their state mutations.
//!
//! States:
//!
//! ```text
//! Unauthenticated --login--> Idle --join--> InChannel
//!                                  <--leave--
//! ```
//!
//! The state is read off the connection's own fields (username and
//! channel), which are the authoritative record; the enum exists so the
//! dispatch below can match on (state, event) pairs exhaustively.

use tracing::{debug, info, warn};

use crate::protocol::codec;
use crate::protocol::frame::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
use crate::protocol::messages::{ClientEvent, ServerEvent};

use super::registry::ConnId;
use super::{router, World};

/// Login rejection and rename conflict reason
const USERNAME_TAKEN: &str = "Username is already taken";

/// Where a connection stands in the protocol handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// No username yet; only `login` is meaningful
    Unauthenticated,
    /// Logged in, not in any channel
    Idle,
    /// Logged in and member of a channel
    InChannel,
}

/// Protocol handler for one connection
#[derive(Debug)]
pub struct Session {
    conn_id: ConnId,
}

impl Session {
    /// Create a handler for the given registered connection
    pub fn new(conn_id: ConnId) -> Self {
        Self { conn_id }
    }

    /// Connection accepted: open the login handshake
    pub fn on_connect(&self, world: &mut World) {
        if let Some(conn) = world.registry.get(self.conn_id) {
            info!("New session {} from {}", conn.session, conn.addr);
            conn.send(&ServerEvent::LoginRequest);
        }
    }

    /// One framed payload arrived: decode and dispatch.
    ///
    /// A payload that fails to decode is a no-op apart from a diagnostic
    /// error reply; the connection stays open.
    pub fn on_payload(&self, world: &mut World, payload: &[u8]) {
        match codec::decode(payload) {
            Ok(event) => self.on_event(world, event),
            Err(err) => {
                warn!("Undecodable payload on connection {}: {}", self.conn_id, err);
                self.reply_error(world, "protocol", err.to_string());
            }
        }
    }

    /// Dispatch a decoded event against the current state
    pub fn on_event(&self, world: &mut World, event: ClientEvent) {
        use ClientEvent::*;
        use SessionState::*;

        match (self.state(world), event) {
            (Unauthenticated, Login { username }) => self.login(world, username),
            (_, Login { .. }) => {
                self.reply_error(world, "login", "You are already logged in.")
            }

            // Before login, chat is dropped silently; commands get told off
            (Unauthenticated, Chat { .. }) => {
                debug!("Dropping message from unauthenticated connection {}", self.conn_id);
            }
            (Unauthenticated, event) => {
                self.reply_error(world, event.kind(), "You must log in first.")
            }

            (_, Join { channel }) => self.join(world, channel),

            (InChannel, Leave) => self.leave(world),
            (_, Leave) => self.reply_error(world, "leave", "You are not in a channel."),

            (_, ChannelList) => self.channel_list(world),
            (_, Rename { username }) => self.rename(world, username),

            (InChannel, Chat { message }) => self.chat(world, message),
            (_, Chat { .. }) => {
                self.reply_error(world, "message", "You are not in a channel.")
            }
        }
    }

    /// Transport closed: implicit leave, then removal from the registry
    pub fn on_disconnect(&self, world: &mut World) {
        let (channel, username) = match world.registry.get_mut(self.conn_id) {
            Some(conn) => (conn.channel.take(), conn.username.clone()),
            None => return,
        };

        if let Some(old) = channel {
            self.depart(world, &old, username.as_deref().unwrap_or_default());
        }

        if let Some(conn) = world.registry.unregister(self.conn_id) {
            info!("Session {} from {} closed", conn.session, conn.addr);
        }
    }

    fn state(&self, world: &World) -> SessionState {
        match world.registry.get(self.conn_id) {
            Some(conn) if conn.username.is_none() => SessionState::Unauthenticated,
            Some(conn) if conn.channel.is_none() => SessionState::Idle,
            Some(_) => SessionState::InChannel,
            // Already unregistered; treat anything further as pre-login
            None => SessionState::Unauthenticated,
        }
    }

    fn login(&self, world: &mut World, username: String) {
        if !world.registry.is_username_available(&username) {
            info!("Login rejected on connection {}: {} taken", self.conn_id, username);
            if let Some(conn) = world.registry.get(self.conn_id) {
                conn.send(&ServerEvent::SessionRejected {
                    reason: USERNAME_TAKEN.to_string(),
                });
            }
            return;
        }

        let channels = world.directory.list();
        if let Some(conn) = world.registry.get_mut(self.conn_id) {
            conn.username = Some(username.clone());
            info!("User {} logged in from {}", username, conn.addr);
            conn.send(&ServerEvent::SessionAccepted { channels });
        }
    }

    fn join(&self, world: &mut World, channel: String) {
        let Some(conn) = world.registry.get(self.conn_id) else {
            return;
        };
        if conn.channel.as_deref() == Some(channel.as_str()) {
            conn.send(&ServerEvent::error(
                "join",
                "You have already joined the channel.",
            ));
            return;
        }
        let Some(username) = conn.username.clone() else {
            return;
        };
        let previous = conn.channel.clone();

        world.directory.ensure_exists(&channel);
        if let Some(conn) = world.registry.get_mut(self.conn_id) {
            conn.channel = Some(channel.clone());
        }

        // Switching channels departs the old one first
        if let Some(old) = previous {
            self.depart(world, &old, &username);
        }

        let current_users = world.registry.usernames_in(Some(&channel));
        router::broadcast(
            &world.registry,
            Some(&channel),
            None,
            &ServerEvent::UserJoined {
                channel: channel.clone(),
                username: username.clone(),
                current_users,
            },
        );
        info!("User {} joined channel {}", username, channel);
    }

    fn leave(&self, world: &mut World) {
        let (old, username) = match world.registry.get(self.conn_id) {
            Some(conn) => match (conn.channel.clone(), conn.username.clone()) {
                (Some(old), Some(username)) => (old, username),
                _ => return,
            },
            None => return,
        };

        // Cleared before notifying, so the leaver is not a recipient
        if let Some(conn) = world.registry.get_mut(self.conn_id) {
            conn.channel = None;
        }

        self.depart(world, &old, &username);

        // The leaver gets a fresh channel list to rebuild its view from
        let channels = world.directory.list();
        if let Some(conn) = world.registry.get(self.conn_id) {
            conn.send(&ServerEvent::ChannelList { channels });
        }
    }

    /// Shared tail of leave, channel switch, and disconnect. Assumes the
    /// departing connection no longer has `channel` pointing at `old`.
    fn depart(&self, world: &mut World, old: &str, username: &str) {
        let remaining = world.registry.usernames_in(Some(old));
        if remaining.is_empty() {
            world.directory.remove_if_empty(old, &world.registry);
        } else {
            router::broadcast(
                &world.registry,
                Some(old),
                None,
                &ServerEvent::UserLeft {
                    channel: old.to_string(),
                    username: username.to_string(),
                    current_users: remaining,
                },
            );
        }
        info!("User {} left channel {}", username, old);
    }

    fn channel_list(&self, world: &mut World) {
        let channels = world.directory.list();
        if let Some(conn) = world.registry.get(self.conn_id) {
            conn.send(&ServerEvent::ChannelList { channels });
        }
    }

    fn rename(&self, world: &mut World, new_username: String) {
        if !world.registry.is_username_available(&new_username) {
            self.reply_error(world, "rename", USERNAME_TAKEN);
            return;
        }

        let (old_username, channel) = match world.registry.get(self.conn_id) {
            Some(conn) => match (conn.username.clone(), conn.channel.clone()) {
                (Some(old), channel) => (old, channel),
                _ => return,
            },
            None => return,
        };

        if let Some(conn) = world.registry.get_mut(self.conn_id) {
            conn.username = Some(new_username.clone());
        }

        let event = ServerEvent::UserRenamed {
            old_username: old_username.clone(),
            new_username: new_username.clone(),
        };

        match channel {
            Some(chan) => {
                router::broadcast(&world.registry, Some(&chan), None, &event);
            }
            None => {
                if let Some(conn) = world.registry.get(self.conn_id) {
                    conn.send(&event);
                }
            }
        }
        info!("User {} renamed to {}", old_username, new_username);
    }

    fn chat(&self, world: &mut World, message: String) {
        let Some(conn) = world.registry.get(self.conn_id) else {
            return;
        };
        let (Some(username), Some(channel)) = (conn.username.clone(), conn.channel.clone())
        else {
            return;
        };

        let frame = codec::encode(&ServerEvent::Relay {
            username: username.clone(),
            message,
        });
        // Relaying adds the sender's name to the envelope, so a message
        // near the frame cap can outgrow it on the way out
        if frame.len() > FRAME_HEADER_SIZE + MAX_FRAME_SIZE {
            self.reply_error(world, "message", "Message is too long.");
            return;
        }

        // The sender renders its own message locally; never echo it back
        router::broadcast_frame(&world.registry, Some(&channel), Some(&username), frame);
    }

    fn reply_error(&self, world: &World, error_type: &str, message: impl Into<String>) {
        if let Some(conn) = world.registry.get(self.conn_id) {
            conn.send(&ServerEvent::error(error_type, message));
        }
    }
}
