//! Collaboration data relay between the local engine and connected peers.
//!
//! ```text
//!  engine blob ──► forward() ──► send_to_all_peers (reliable | best-effort)
//!
//!  peer bytes ──► receive() ──┬─ blob ─────────► engine.merge_collaboration
//!                             ├─ SessionID:… ──► returned to the tracker
//!                             └─ other ────────► ignored
//! ```

use std::sync::Arc;

use crate::engine::ArEngine;
use crate::error::CollabError;
use crate::network::PeerNetwork;
use crate::protocol::{CollaborationBlob, InboundMessage, PeerId, SessionId};
use crate::stats::AtomicTrackerStats;

/// Result of forwarding an engine blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sent to this many peers.
    Sent(usize),
    /// No peers connected; nothing was sent.
    Dropped,
}

/// Result of handling inbound bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A blob was handed to the engine.
    Merged,
    /// A session announcement for the directory.
    SessionAnnouncement(SessionId),
    Ignored,
}

pub struct CollaborationRelay {
    network: Arc<dyn PeerNetwork>,
    engine: Arc<dyn ArEngine>,
    stats: Arc<AtomicTrackerStats>,
}

impl CollaborationRelay {
    pub(crate) fn new(
        network: Arc<dyn PeerNetwork>,
        engine: Arc<dyn ArEngine>,
        stats: Arc<AtomicTrackerStats>,
    ) -> Self {
        Self { network, engine, stats }
    }

    /// Send an engine blob to every connected peer.
    ///
    /// An encode error means the blob is malformed; the caller logs it and
    /// the send is skipped.
    pub fn forward(&self, blob: &CollaborationBlob) -> Result<RelayOutcome, CollabError> {
        let peers = self.network.connected_peers();
        if peers.is_empty() {
            AtomicTrackerStats::bump(&self.stats.blobs_dropped, 1);
            log::trace!("No peers connected, dropping {:?} blob", blob.priority);
            return Ok(RelayOutcome::Dropped);
        }

        let bytes = blob.encode()?;
        log::trace!(
            "Relaying {} byte {:?} blob to {} peers",
            bytes.len(),
            blob.priority,
            peers.len()
        );
        self.network.send_to_peers(bytes, blob.delivery(), &peers);
        AtomicTrackerStats::bump(&self.stats.blobs_sent, 1);
        Ok(RelayOutcome::Sent(peers.len()))
    }

    /// Interpret bytes received from `from`. Blobs are merged into the
    /// engine right away.
    pub fn receive(&self, bytes: &[u8], from: PeerId) -> Inbound {
        match InboundMessage::classify(bytes) {
            InboundMessage::Blob(blob) => {
                log::trace!("Merging {} byte blob from {from}", blob.payload.len());
                self.engine.merge_collaboration(blob);
                AtomicTrackerStats::bump(&self.stats.blobs_merged, 1);
                Inbound::Merged
            }
            InboundMessage::SessionAnnouncement(session_id) => {
                Inbound::SessionAnnouncement(session_id)
            }
            InboundMessage::Ignored => {
                AtomicTrackerStats::bump(&self.stats.payloads_ignored, 1);
                log::debug!("Ignoring {} byte payload from {from}", bytes.len());
                Inbound::Ignored
            }
        }
    }
}
