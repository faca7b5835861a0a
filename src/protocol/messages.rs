//! Wire event types for the relay protocol
//!
//! Every envelope on the wire is `{"type": <string>, "data": {...}}`. The
//! client-to-server half decodes into [`ClientEvent`], a closed enum the
//! protocol handler dispatches on exhaustively. The server-to-client half
//! is [`ServerEvent`], encoded back into envelopes by the codec.

/// Decoded client-to-server events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `command: login` — claim a username
    Login { username: String },
    /// `command: join` — enter a channel, creating it on first join
    Join { channel: String },
    /// `command: leave` — leave the current channel
    Leave,
    /// `command: channel_list` — request the current channel list
    ChannelList,
    /// `command: rename` — claim a new username
    Rename { username: String },
    /// `message` — relay text to the current channel
    Chat { message: String },
}

impl ClientEvent {
    /// Wire name of this event, used as `error_type` in error replies
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::Login { .. } => "login",
            ClientEvent::Join { .. } => "join",
            ClientEvent::Leave => "leave",
            ClientEvent::ChannelList => "channel_list",
            ClientEvent::Rename { .. } => "rename",
            ClientEvent::Chat { .. } => "message",
        }
    }
}

/// Server-to-client events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// `request` — ask the client to log in (sent once on accept)
    LoginRequest,
    /// `session` success — username accepted, channel list attached
    SessionAccepted { channels: Vec<String> },
    /// `session` failure — username rejected
    SessionRejected { reason: String },
    /// `message` — relayed channel text, sender attached
    Relay { username: String, message: String },
    /// `notification: channel_list`
    ChannelList { channels: Vec<String> },
    /// `notification: user_joined`
    UserJoined {
        channel: String,
        username: String,
        current_users: Vec<String>,
    },
    /// `notification: user_left`
    UserLeft {
        channel: String,
        username: String,
        current_users: Vec<String>,
    },
    /// `notification: user_rename`
    UserRenamed {
        old_username: String,
        new_username: String,
    },
    /// `error` — protocol error or state conflict, connection stays open
    Error {
        error_type: String,
        message: String,
    },
}

impl ServerEvent {
    /// Create an error reply
    pub fn error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert_eq!(
            ClientEvent::Login {
                username: "alice".to_string()
            }
            .kind(),
            "login"
        );
        assert_eq!(ClientEvent::Leave.kind(), "leave");
        assert_eq!(
            ClientEvent::Chat {
                message: "hi".to_string()
            }
            .kind(),
            "message"
        );
    }
}
