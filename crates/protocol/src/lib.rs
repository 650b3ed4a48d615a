//! Socrates Protocol - wire types for the tutor WebSocket channel
//!
//! This crate contains the types exchanged between the tutoring client and the
//! streaming AI backend:
//! - Inbound frame classification (`InboundMessage`, `MessageKind`)
//! - Outbound envelope construction (`OutboundMessage`, `MessagePayload`)
//! - Conversation history entries
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, and thiserror
//! 2. **No runtime** - Pure data types and serialization, no sockets or tasks

pub mod envelope;
pub mod error;
pub mod messages;

pub use envelope::{kinds, MessagePayload, OutboundMessage};
pub use error::ProtocolError;
pub use messages::{parse_inbound, HistoryEntry, InboundMessage, MessageKind};
