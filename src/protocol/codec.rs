//! Codec between JSON envelopes and typed wire events
//!
//! Decoding is deliberately tolerant of anything except a malformed
//! envelope: unknown types and commands, or a `data` payload missing the
//! fields its type requires, produce a [`DecodeError`] the handler can
//! answer with a diagnostic reply instead of dropping the connection.

use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;

use super::frame::Frame;
use super::messages::{ClientEvent, ServerEvent};

/// Failure to turn an inbound payload into a [`ClientEvent`]
#[derive(Debug)]
pub enum DecodeError {
    /// Payload is not well-formed JSON or not an envelope object
    Json(serde_json::Error),
    /// Envelope or payload lacks a required field
    MissingField(&'static str),
    /// Envelope `type` is not one the server understands
    UnknownType(String),
    /// Command name is not one the server understands
    UnknownCommand(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(err) => write!(f, "malformed envelope: {}", err),
            DecodeError::MissingField(field) => write!(f, "missing field: {}", field),
            DecodeError::UnknownType(kind) => write!(f, "unknown envelope type: {}", kind),
            DecodeError::UnknownCommand(cmd) => write!(f, "unknown command: {}", cmd),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err)
    }
}

/// Outer envelope shape, `data` left untyped until `type` is known
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

/// Decode one inbound payload into a typed event
pub fn decode(payload: &[u8]) -> Result<ClientEvent, DecodeError> {
    let envelope: RawEnvelope = serde_json::from_slice(payload)?;

    match envelope.kind.as_str() {
        "command" => decode_command(&envelope.data),
        "message" => {
            let message = field_str(&envelope.data, "message", "data.message")?;
            Ok(ClientEvent::Chat { message })
        }
        other => Err(DecodeError::UnknownType(other.to_string())),
    }
}

fn decode_command(data: &Value) -> Result<ClientEvent, DecodeError> {
    let command = data
        .get("command")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField("data.command"))?;

    match command {
        "login" => Ok(ClientEvent::Login {
            username: param_str(data, "username", "data.parameters.username")?,
        }),
        "join" => Ok(ClientEvent::Join {
            channel: param_str(data, "channel", "data.parameters.channel")?,
        }),
        "leave" => Ok(ClientEvent::Leave),
        "channel_list" => Ok(ClientEvent::ChannelList),
        "rename" => Ok(ClientEvent::Rename {
            username: param_str(data, "username", "data.parameters.username")?,
        }),
        other => Err(DecodeError::UnknownCommand(other.to_string())),
    }
}

fn field_str(data: &Value, field: &str, label: &'static str) -> Result<String, DecodeError> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::MissingField(label))
}

fn param_str(data: &Value, field: &str, label: &'static str) -> Result<String, DecodeError> {
    data.get("parameters")
        .and_then(|params| params.get(field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(DecodeError::MissingField(label))
}

/// Build the JSON envelope for an outbound event
pub fn envelope(event: &ServerEvent) -> Value {
    match event {
        ServerEvent::LoginRequest => json!({
            "type": "request",
            "data": { "request": "login" }
        }),
        ServerEvent::SessionAccepted { channels } => json!({
            "type": "session",
            "data": { "status": true, "channels": channels }
        }),
        ServerEvent::SessionRejected { reason } => json!({
            "type": "session",
            "data": { "status": false, "reason": reason }
        }),
        ServerEvent::Relay { username, message } => json!({
            "type": "message",
            "data": { "username": username, "message": message }
        }),
        ServerEvent::ChannelList { channels } => json!({
            "type": "notification",
            "data": {
                "event_type": "channel_list",
                "parameters": { "channels": channels }
            }
        }),
        ServerEvent::UserJoined {
            channel,
            username,
            current_users,
        } => json!({
            "type": "notification",
            "data": {
                "event_type": "user_joined",
                "parameters": {
                    "channel": channel,
                    "username": username,
                    "current_users": current_users
                }
            }
        }),
        ServerEvent::UserLeft {
            channel,
            username,
            current_users,
        } => json!({
            "type": "notification",
            "data": {
                "event_type": "user_left",
                "parameters": {
                    "channel": channel,
                    "username": username,
                    "current_users": current_users
                }
            }
        }),
        ServerEvent::UserRenamed {
            old_username,
            new_username,
        } => json!({
            "type": "notification",
            "data": {
                "event_type": "user_rename",
                "parameters": {
                    "old_username": old_username,
                    "new_username": new_username
                }
            }
        }),
        ServerEvent::Error {
            error_type,
            message,
        } => json!({
            "type": "error",
            "data": { "error_type": error_type, "message": message }
        }),
    }
}

/// Encode an outbound event into a ready-to-write frame
pub fn encode(event: &ServerEvent) -> Bytes {
    let body = envelope(event).to_string();
    Frame::new(body.into_bytes()).encode_to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::FRAME_HEADER_SIZE;

    fn decode_str(payload: &str) -> Result<ClientEvent, DecodeError> {
        decode(payload.as_bytes())
    }

    #[test]
    fn test_decode_login() {
        let event = decode_str(
            r#"{"type":"command","data":{"command":"login","parameters":{"username":"alice"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Login {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_decode_join_and_leave() {
        let event = decode_str(
            r#"{"type":"command","data":{"command":"join","parameters":{"channel":"general"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Join {
                channel: "general".to_string()
            }
        );

        // Leave carries no parameters at all
        let event = decode_str(r#"{"type":"command","data":{"command":"leave"}}"#).unwrap();
        assert_eq!(event, ClientEvent::Leave);
    }

    #[test]
    fn test_decode_channel_list_and_rename() {
        let event =
            decode_str(r#"{"type":"command","data":{"command":"channel_list"}}"#).unwrap();
        assert_eq!(event, ClientEvent::ChannelList);

        let event = decode_str(
            r#"{"type":"command","data":{"command":"rename","parameters":{"username":"bob"}}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ClientEvent::Rename {
                username: "bob".to_string()
            }
        );
    }

    #[test]
    fn test_decode_chat_message() {
        let event = decode_str(r#"{"type":"message","data":{"message":"hi"}}"#).unwrap();
        assert_eq!(
            event,
            ClientEvent::Chat {
                message: "hi".to_string()
            }
        );
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(
            decode_str("not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_str(r#"{"data":{}}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_str(r#"{"type":"telemetry","data":{}}"#),
            Err(DecodeError::UnknownType(_))
        ));
        assert!(matches!(
            decode_str(r#"{"type":"command","data":{}}"#),
            Err(DecodeError::MissingField("data.command"))
        ));
        assert!(matches!(
            decode_str(r#"{"type":"command","data":{"command":"dance"}}"#),
            Err(DecodeError::UnknownCommand(_))
        ));
        assert!(matches!(
            decode_str(r#"{"type":"command","data":{"command":"login","parameters":{}}}"#),
            Err(DecodeError::MissingField("data.parameters.username"))
        ));
        assert!(matches!(
            decode_str(r#"{"type":"message","data":{}}"#),
            Err(DecodeError::MissingField("data.message"))
        ));
    }

    #[test]
    fn test_encode_session_success() {
        let event = ServerEvent::SessionAccepted {
            channels: vec!["general".to_string(), "python".to_string()],
        };
        assert_eq!(
            envelope(&event),
            serde_json::json!({
                "type": "session",
                "data": { "status": true, "channels": ["general", "python"] }
            })
        );
    }

    #[test]
    fn test_encode_session_failure() {
        let event = ServerEvent::SessionRejected {
            reason: "Username is already taken".to_string(),
        };
        assert_eq!(
            envelope(&event),
            serde_json::json!({
                "type": "session",
                "data": { "status": false, "reason": "Username is already taken" }
            })
        );
    }

    #[test]
    fn test_encode_notifications() {
        let event = ServerEvent::UserJoined {
            channel: "general".to_string(),
            username: "bob".to_string(),
            current_users: vec!["alice".to_string(), "bob".to_string()],
        };
        let value = envelope(&event);
        assert_eq!(value["type"], "notification");
        assert_eq!(value["data"]["event_type"], "user_joined");
        assert_eq!(
            value["data"]["parameters"]["current_users"],
            serde_json::json!(["alice", "bob"])
        );

        let event = ServerEvent::UserRenamed {
            old_username: "bob".to_string(),
            new_username: "rob".to_string(),
        };
        let value = envelope(&event);
        assert_eq!(value["data"]["event_type"], "user_rename");
        assert_eq!(value["data"]["parameters"]["old_username"], "bob");
    }

    #[test]
    fn test_encode_produces_decodable_frame() {
        let frame = encode(&ServerEvent::LoginRequest);
        let body: Value = serde_json::from_slice(&frame[FRAME_HEADER_SIZE..]).unwrap();
        assert_eq!(body["type"], "request");
        assert_eq!(body["data"]["request"], "login");
    }
}
