//! Wire formats exchanged between devices in a shared session.
//!
//! Two payload shapes travel over the peer network:
//!
//! ```text
//! Collaboration blob (bincode, standard config):
//! ┌──────────┬──────────┬──────────────────────┐
//! │ magic    │ priority │ payload              │
//! │ "CLB1"   │ varint   │ len-prefixed bytes   │
//! └──────────┴──────────┴──────────────────────┘
//!
//! Session command (UTF-8 text, no terminator):
//! SessionID:<session identifier>
//! ```
//!
//! Inbound bytes are tried as a blob first; only if that fails are they
//! parsed as a session command. Anything else is ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::CollabError;

/// Prefix of the textual session announcement.
pub const SESSION_ID_PREFIX: &str = "SessionID:";

/// Envelope marker so that text commands never decode as blobs.
const BLOB_MAGIC: [u8; 4] = *b"CLB1";

/// Opaque identifier of a remote device on the local network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell devices apart in logs.
        let full = self.0.to_string();
        write!(f, "peer-{}", &full[..8])
    }
}

/// Identifier of one device's AR tracking session.
///
/// Compared by exact string match. Local identifiers are UUIDs; remote
/// ones are whatever string the peer announced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identifier, as produced by a session reset.
    pub fn random() -> Self {
        Self::from(Uuid::new_v4())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Importance the engine attaches to a collaboration blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    Optional,
}

/// Transport delivery mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Unreliable,
}

impl From<Priority> for Delivery {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical => Delivery::Reliable,
            Priority::Optional => Delivery::Unreliable,
        }
    }
}

/// Serialized tracking state produced by the AR engine.
///
/// The payload is never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationBlob {
    pub priority: Priority,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct BlobEnvelope {
    magic: [u8; 4],
    priority: Priority,
    payload: Vec<u8>,
}

impl CollaborationBlob {
    pub fn new(priority: Priority, payload: Vec<u8>) -> Self {
        Self { priority, payload }
    }

    pub fn critical(payload: Vec<u8>) -> Self {
        Self::new(Priority::Critical, payload)
    }

    pub fn optional(payload: Vec<u8>) -> Self {
        Self::new(Priority::Optional, payload)
    }

    /// Delivery mode matching this blob's priority.
    pub fn delivery(&self) -> Delivery {
        self.priority.into()
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, CollabError> {
        let envelope = BlobEnvelope {
            magic: BLOB_MAGIC,
            priority: self.priority,
            payload: self.payload.clone(),
        };
        bincode::serde::encode_to_vec(&envelope, bincode::config::standard())
            .map_err(|e| CollabError::Encode(e.to_string()))
    }

    /// Deserialize from binary wire format.
    ///
    /// Rejects anything without the envelope marker or with trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, CollabError> {
        let (envelope, read): (BlobEnvelope, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| CollabError::Decode(e.to_string()))?;
        if envelope.magic != BLOB_MAGIC {
            return Err(CollabError::Decode("missing blob marker".to_string()));
        }
        if read != bytes.len() {
            return Err(CollabError::Decode(format!(
                "{} trailing bytes after blob",
                bytes.len() - read
            )));
        }
        Ok(Self {
            priority: envelope.priority,
            payload: envelope.payload,
        })
    }
}

/// `SessionID:<id>` announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub session_id: SessionId,
}

impl SessionCommand {
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    pub fn encode(&self) -> Vec<u8> {
        format!("{SESSION_ID_PREFIX}{}", self.session_id).into_bytes()
    }

    /// Parse a text command. The identifier is everything after the prefix.
    pub fn parse(bytes: &[u8]) -> Result<Self, CollabError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CollabError::InvalidCommand(e.to_string()))?;
        let value = text
            .strip_prefix(SESSION_ID_PREFIX)
            .ok_or_else(|| CollabError::InvalidCommand("missing SessionID prefix".to_string()))?;
        if value.is_empty() {
            return Err(CollabError::InvalidCommand("empty session identifier".to_string()));
        }
        Ok(Self::new(SessionId::new(value)))
    }
}

/// What an inbound payload turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Blob(CollaborationBlob),
    SessionAnnouncement(SessionId),
    Ignored,
}

impl InboundMessage {
    /// Classify raw bytes received from a peer. Blob decoding goes first.
    pub fn classify(bytes: &[u8]) -> Self {
        if let Ok(blob) = CollaborationBlob::decode(bytes) {
            return Self::Blob(blob);
        }
        match SessionCommand::parse(bytes) {
            Ok(command) => Self::SessionAnnouncement(command.session_id),
            Err(_) => Self::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_command_roundtrip_from_uuid() {
        let id = Uuid::new_v4();
        let command = SessionCommand::new(SessionId::from(id));
        let parsed = SessionCommand::parse(&command.encode()).unwrap();
        assert_eq!(parsed.session_id.as_str(), id.to_string());
    }

    #[test]
    fn test_session_command_wire_text() {
        let command = SessionCommand::new(SessionId::new("abc"));
        assert_eq!(command.encode(), b"SessionID:abc".to_vec());
    }

    #[test]
    fn test_session_command_keeps_value_verbatim() {
        // No trimming, no escaping.
        let parsed = SessionCommand::parse(b"SessionID: spaced:colon ").unwrap();
        assert_eq!(parsed.session_id.as_str(), " spaced:colon ");
    }

    #[test]
    fn test_session_command_rejects_other_text() {
        assert!(SessionCommand::parse(b"sessionid:abc").is_err());
        assert!(SessionCommand::parse(b"Hello").is_err());
        assert!(SessionCommand::parse(b"SessionID:").is_err());
        assert!(SessionCommand::parse(&[0xFF, 0xFE]).is_err());
    }

    #[test]
    fn test_blob_preserves_priority_and_payload() {
        let blob = CollaborationBlob::optional(vec![9, 8, 7]);
        let decoded = CollaborationBlob::decode(&blob.encode().unwrap()).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(decoded.delivery(), Delivery::Unreliable);
    }

    #[test]
    fn test_blob_rejects_text_and_garbage() {
        assert!(CollaborationBlob::decode(b"SessionID:abc").is_err());
        assert!(CollaborationBlob::decode(&[0xFF, 0xFE, 0xFD]).is_err());
        assert!(CollaborationBlob::decode(&[]).is_err());
    }

    #[test]
    fn test_blob_rejects_trailing_bytes() {
        let mut bytes = CollaborationBlob::critical(vec![1, 2]).encode().unwrap();
        bytes.push(0);
        assert!(CollaborationBlob::decode(&bytes).is_err());
    }

    #[test]
    fn test_priority_maps_to_delivery() {
        assert_eq!(Delivery::from(Priority::Critical), Delivery::Reliable);
        assert_eq!(Delivery::from(Priority::Optional), Delivery::Unreliable);
    }

    #[test]
    fn test_classify_prefers_blob() {
        // A blob whose payload is itself a session command stays a blob.
        let blob = CollaborationBlob::critical(b"SessionID:xyz".to_vec());
        let bytes = blob.encode().unwrap();
        assert_eq!(InboundMessage::classify(&bytes), InboundMessage::Blob(blob));
    }

    #[test]
    fn test_classify_session_and_ignored() {
        assert_eq!(
            InboundMessage::classify(b"SessionID:xyz"),
            InboundMessage::SessionAnnouncement(SessionId::new("xyz"))
        );
        assert_eq!(InboundMessage::classify(b"ping"), InboundMessage::Ignored);
        assert_eq!(InboundMessage::classify(&[]), InboundMessage::Ignored);
    }

    #[test]
    fn test_peer_id_display_is_short() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(PeerId::from_uuid(id).to_string(), "peer-550e8400");
    }
}
