//! Message fan-out
//!
//! One payload, one channel, many recipients. The payload is encoded once
//! and the resulting frame is queued on each member's sink; a recipient
//! whose sink is closed is skipped by its own `send_frame`, so one dead
//! socket never blocks or aborts delivery to the rest.

use bytes::Bytes;

use crate::protocol::codec;
use crate::protocol::messages::ServerEvent;

use super::registry::Registry;

/// Deliver an event to every member of `channel`, skipping the connection
/// whose username equals `exclude`. Returns the number of recipients.
pub fn broadcast(
    registry: &Registry,
    channel: Option<&str>,
    exclude: Option<&str>,
    event: &ServerEvent,
) -> usize {
    broadcast_frame(registry, channel, exclude, codec::encode(event))
}

/// Deliver an already-encoded frame to every member of `channel`, skipping
/// the connection whose username equals `exclude`
pub fn broadcast_frame(
    registry: &Registry,
    channel: Option<&str>,
    exclude: Option<&str>,
    frame: Bytes,
) -> usize {
    let mut delivered = 0;

    for conn in registry.members_of(channel) {
        if exclude.is_some() && conn.username.as_deref() == exclude {
            continue;
        }
        conn.send_frame(frame.clone());
        delivered += 1;
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::registry::ConnId;
    use bytes::Bytes;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn register_user(
        registry: &mut Registry,
        username: &str,
        channel: Option<&str>,
    ) -> (ConnId, UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = registry.register("127.0.0.1:0".parse().unwrap(), tx);
        let conn = registry.get_mut(id).unwrap();
        conn.username = Some(username.to_string());
        conn.channel = channel.map(str::to_string);
        (id, rx)
    }

    fn event() -> ServerEvent {
        ServerEvent::Relay {
            username: "alice".to_string(),
            message: "hi".to_string(),
        }
    }

    #[test]
    fn test_broadcast_reaches_channel_members_only() {
        let mut registry = Registry::new();
        let (_a, mut alice) = register_user(&mut registry, "alice", Some("general"));
        let (_b, mut bob) = register_user(&mut registry, "bob", Some("general"));
        let (_c, mut carol) = register_user(&mut registry, "carol", Some("python"));

        let delivered = broadcast(&registry, Some("general"), None, &event());
        assert_eq!(delivered, 2);
        assert!(alice.try_recv().is_ok());
        assert!(bob.try_recv().is_ok());
        assert!(carol.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut registry = Registry::new();
        let (_a, mut alice) = register_user(&mut registry, "alice", Some("general"));
        let (_b, mut bob) = register_user(&mut registry, "bob", Some("general"));

        let delivered = broadcast(&registry, Some("general"), Some("alice"), &event());
        assert_eq!(delivered, 1);
        assert!(alice.try_recv().is_err());
        assert!(bob.try_recv().is_ok());
    }

    #[test]
    fn test_broadcast_survives_dead_recipient() {
        let mut registry = Registry::new();
        let (_a, alice) = register_user(&mut registry, "alice", Some("general"));
        let (_b, mut bob) = register_user(&mut registry, "bob", Some("general"));
        drop(alice);

        let delivered = broadcast(&registry, Some("general"), None, &event());
        assert_eq!(delivered, 2);
        assert!(bob.try_recv().is_ok());
    }
}
