//! Announces the local session identifier to connected peers.
//!
//! The engine reports its identifier as often as it likes; only a change
//! produces a broadcast. Announcements are sent reliably and never
//! retried.

use std::sync::Arc;

use crate::network::PeerNetwork;
use crate::protocol::{Delivery, PeerId, SessionCommand, SessionId};
use crate::stats::AtomicTrackerStats;

pub struct SessionBroadcaster {
    network: Arc<dyn PeerNetwork>,
    stats: Arc<AtomicTrackerStats>,
    /// Last identifier seen from the engine.
    last_seen: Option<SessionId>,
}

impl SessionBroadcaster {
    pub(crate) fn new(network: Arc<dyn PeerNetwork>, stats: Arc<AtomicTrackerStats>) -> Self {
        Self {
            network,
            stats,
            last_seen: None,
        }
    }

    /// Feed the engine's current identifier. Broadcasts to all connected
    /// peers and returns `true` when it differs from the last one seen.
    pub fn observe(&mut self, current: &SessionId) -> bool {
        if self.last_seen.as_ref() == Some(current) {
            return false;
        }
        self.last_seen = Some(current.clone());

        let peers = self.network.connected_peers();
        log::info!("Local session changed to {current}, announcing to {} peers", peers.len());
        if !peers.is_empty() {
            let bytes = SessionCommand::new(current.clone()).encode();
            self.network.send_to_all_peers(bytes, Delivery::Reliable);
            AtomicTrackerStats::bump(&self.stats.announcements_sent, 1);
        }
        true
    }

    /// Send `session_id` to a single peer, e.g. right after it joined.
    pub fn announce_to(&self, peer: PeerId, session_id: &SessionId) {
        let bytes = SessionCommand::new(session_id.clone()).encode();
        self.network.send_to_peers(bytes, Delivery::Reliable, &[peer]);
        AtomicTrackerStats::bump(&self.stats.announcements_sent, 1);
        log::debug!("Announced session {session_id} to {peer}");
    }

    pub fn last_seen(&self) -> Option<&SessionId> {
        self.last_seen.as_ref()
    }
}
