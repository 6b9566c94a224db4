//! # clyde-collab — Session membership for shared AR scenes
//!
//! Keeps track of which remote device owns which anchors while several
//! co-located users share one collaborative AR session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  NetworkEvent   ┌────────────────┐  EngineEvent  ┌─────────────┐
//! │ PeerNetwork  │ ──────────────► │ SessionTracker │ ◄──────────── │ ArEngine    │
//! │ (transport)  │ ◄────────────── │ (one lock)     │ ────────────► │ (scene)     │
//! └──────────────┘   sends         └───────┬────────┘  add/remove   └─────────────┘
//!                                          │
//!        ┌──────────────┬──────────────────┼──────────────┬───────────────┐
//!        ▼              ▼                  ▼              ▼               ▼
//!  PeerDirectory  SessionBroadcaster  CollaborationRelay  AnchorReconciler  ModelCatalog
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — `SessionID:` text command and collaboration blob envelope
//! - [`directory`] — connected peers and their announced sessions
//! - [`broadcaster`] — local session change detection and announcement
//! - [`relay`] — blob forwarding and inbound payload classification
//! - [`reconciler`] — purging anchors of stale sessions
//! - [`tracker`] — the serialized event handler tying it together
//! - [`catalog`] / [`indicator`] — placement routing and connection status
//! - [`loopback`] — in-process network and scene for simulation and tests

pub mod broadcaster;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod indicator;
pub mod loopback;
pub mod network;
pub mod protocol;
pub mod reconciler;
pub mod relay;
pub mod stats;
pub mod tracker;

// Re-exports for convenience
pub use broadcaster::SessionBroadcaster;
pub use catalog::{ModelCatalog, ModelEntry, PlacementRequest};
pub use config::TrackerConfig;
pub use directory::{PeerDirectory, PeerState, SessionUpdate};
pub use engine::{Anchor, AnchorId, AnchorKind, ArEngine, EngineEvent, Transform};
pub use error::CollabError;
pub use indicator::{ConnectionIndicator, ConnectionStatus};
pub use loopback::{LoopbackHub, LoopbackNetwork, SceneEngine, SentMessage};
pub use network::{NetworkEvent, PeerNetwork};
pub use protocol::{
    CollaborationBlob, Delivery, InboundMessage, PeerId, Priority, SessionCommand, SessionId,
    SESSION_ID_PREFIX,
};
pub use reconciler::AnchorReconciler;
pub use relay::{CollaborationRelay, Inbound, RelayOutcome};
pub use stats::TrackerStats;
pub use tracker::SessionTracker;
