//! Protocol layer for the chat relay
//!
//! This module provides:
//! - Length-prefixed frame encoding/decoding
//! - Typed wire event definitions
//! - Codec between JSON envelopes and typed events

pub mod codec;
pub mod frame;
pub mod messages;

// Re-export commonly used types
pub use codec::{decode, encode, DecodeError};
pub use frame::{Frame, FrameCodec, FRAME_HEADER_SIZE, MAX_FRAME_SIZE};
pub use messages::{ClientEvent, ServerEvent};
