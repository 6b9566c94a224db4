use thiserror::Error;

/// Errors surfaced by the collaboration tracker.
///
/// Inbound payloads that fail to decode are not reported through this type
/// to the network; they are classified as ignored instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollabError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid session command: {0}")]
    InvalidCommand(String),
    #[error("Catalog error: {0}")]
    Catalog(String),
}
