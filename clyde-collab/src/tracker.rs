//! Collaborative session membership tracker.
//!
//! Ties the directory, broadcaster, relay and reconciler together and is
//! the single serialization point for membership state:
//!
//! ```text
//!  NetworkEvent ──┐                         ┌──► PeerNetwork (sends)
//!                 ├─► SessionTracker ──lock─┤
//!  EngineEvent ───┘   (one Mutex)           ├──► ArEngine (merge / remove)
//!                                           ├──► placements (mpsc)
//!                                           └──► status (watch)
//! ```
//!
//! Network callbacks, engine callbacks and UI calls may arrive from
//! different tasks. Every directory read-modify-write happens under the
//! tracker's lock, so a re-announcement and a departure for the same peer
//! can never interleave.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use crate::broadcaster::SessionBroadcaster;
use crate::catalog::{ModelCatalog, PlacementRequest};
use crate::config::TrackerConfig;
use crate::directory::{PeerDirectory, SessionUpdate};
use crate::engine::{Anchor, AnchorId, ArEngine, EngineEvent, Transform};
use crate::error::CollabError;
use crate::indicator::{ConnectionIndicator, ConnectionStatus};
use crate::network::{NetworkEvent, PeerNetwork};
use crate::protocol::{CollaborationBlob, PeerId, SessionId};
use crate::reconciler::AnchorReconciler;
use crate::relay::{CollaborationRelay, Inbound, RelayOutcome};
use crate::stats::{AtomicTrackerStats, TrackerStats};

/// State guarded by the tracker lock.
struct TrackerState {
    directory: PeerDirectory,
    broadcaster: SessionBroadcaster,
}

pub struct SessionTracker {
    config: TrackerConfig,
    state: Mutex<TrackerState>,
    network: Arc<dyn PeerNetwork>,
    engine: Arc<dyn ArEngine>,
    relay: CollaborationRelay,
    reconciler: AnchorReconciler,
    catalog: ModelCatalog,
    indicator: ConnectionIndicator,
    placement_tx: mpsc::Sender<PlacementRequest>,
    placement_rx: std::sync::Mutex<Option<mpsc::Receiver<PlacementRequest>>>,
    stats: Arc<AtomicTrackerStats>,
}

impl SessionTracker {
    pub fn new(
        config: TrackerConfig,
        network: Arc<dyn PeerNetwork>,
        engine: Arc<dyn ArEngine>,
        catalog: ModelCatalog,
    ) -> Self {
        let stats = Arc::new(AtomicTrackerStats::default());
        let (placement_tx, placement_rx) = mpsc::channel(config.event_capacity.max(1));

        let state = TrackerState {
            directory: PeerDirectory::new(config.max_peers),
            broadcaster: SessionBroadcaster::new(network.clone(), stats.clone()),
        };

        Self {
            relay: CollaborationRelay::new(network.clone(), engine.clone(), stats.clone()),
            reconciler: AnchorReconciler::new(engine.clone(), stats.clone()),
            state: Mutex::new(state),
            config,
            network,
            engine,
            catalog,
            indicator: ConnectionIndicator::new(),
            placement_tx,
            placement_rx: std::sync::Mutex::new(Some(placement_rx)),
            stats,
        }
    }

    /// Tracker with default configuration and catalog.
    pub fn with_defaults(network: Arc<dyn PeerNetwork>, engine: Arc<dyn ArEngine>) -> Self {
        Self::new(TrackerConfig::default(), network, engine, ModelCatalog::default())
    }

    /// Take the placement receiver (can only be called once).
    pub fn take_placement_rx(&self) -> Option<mpsc::Receiver<PlacementRequest>> {
        self.placement_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Subscribe to connection status changes.
    pub fn status_rx(&self) -> watch::Receiver<ConnectionStatus> {
        self.indicator.subscribe()
    }

    // ─── Network callbacks ──────────────────────────────────────────

    /// Admission decision for a discovered peer.
    pub async fn on_peer_discovered(&self, peer: PeerId) -> bool {
        let state = self.state.lock().await;
        let connected = self.network.connected_peers().len();
        let admitted = state.directory.admits(connected);
        if admitted {
            log::info!("Admitting {peer} ({connected} connected)");
        } else {
            AtomicTrackerStats::bump(&self.stats.peers_rejected, 1);
            log::info!(
                "Rejecting {peer}: {connected} peers connected (max {})",
                state.directory.max_peers()
            );
        }
        admitted
    }

    pub async fn on_peer_joined(&self, peer: PeerId) {
        let mut state = self.state.lock().await;
        if !state.directory.join(peer) {
            log::debug!("{peer} joined again, keeping its recorded session");
        }
        log::info!("{peer} joined ({} in directory)", state.directory.len());

        if self.config.announce_on_join {
            let local = self.engine.session_id();
            state.broadcaster.announce_to(peer, &local);
        }
    }

    pub async fn on_peer_left(&self, peer: PeerId) {
        let mut state = self.state.lock().await;
        if let Some(session_id) = state.directory.session_for(&peer).cloned() {
            self.reconciler.remove_anchors_for_session(&session_id);
        }
        if state.directory.leave(&peer).is_some() {
            log::info!("{peer} left ({} remaining)", state.directory.len());
        }
        if state.directory.is_empty() {
            self.indicator.set(ConnectionStatus::Disconnected);
        }
    }

    pub async fn on_data_received(&self, from: PeerId, bytes: &[u8]) {
        match self.relay.receive(bytes, from) {
            Inbound::SessionAnnouncement(session_id) => {
                let mut state = self.state.lock().await;
                self.apply_announcement(&mut state, from, session_id);
            }
            Inbound::Merged | Inbound::Ignored => {}
        }
    }

    /// Record `session_id` for `peer`, purging anchors of the identifier
    /// it replaces first.
    ///
    /// Only peers in the directory or currently connected are recorded; an
    /// announcement that outlives its sender's departure is dropped.
    fn apply_announcement(&self, state: &mut TrackerState, peer: PeerId, session_id: SessionId) {
        if !state.directory.contains(&peer) && !self.network.connected_peers().contains(&peer) {
            log::debug!("Dropping session {session_id} from unconnected {peer}");
            return;
        }

        if let Some(previous) = state.directory.session_for(&peer) {
            if *previous != session_id {
                let previous = previous.clone();
                self.reconciler.remove_anchors_for_session(&previous);
            }
        }

        match state.directory.record_session(peer, session_id.clone()) {
            SessionUpdate::First => log::info!("{peer} announced session {session_id}"),
            SessionUpdate::Replaced(previous) => {
                log::info!("{peer} re-announced session {previous} -> {session_id}")
            }
            SessionUpdate::Unchanged => log::debug!("{peer} repeated session {session_id}"),
        }
    }

    // ─── Engine callbacks ───────────────────────────────────────────

    /// The engine reported its current session identifier.
    pub async fn on_session_identifier(&self, session_id: SessionId) -> bool {
        let mut state = self.state.lock().await;
        state.broadcaster.observe(&session_id)
    }

    /// The engine produced tracking state to share.
    pub fn on_collaboration_data(&self, blob: CollaborationBlob) -> Option<RelayOutcome> {
        match self.relay.forward(&blob) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::error!("Skipping unencodable collaboration blob: {e}");
                None
            }
        }
    }

    /// Anchors appeared in the scene.
    pub fn on_anchors_added(&self, anchors: &[Anchor]) {
        for anchor in anchors {
            if anchor.is_participant() {
                log::info!("Participant anchor seen, another user is in the scene");
                self.indicator.set(ConnectionStatus::Connected);
                continue;
            }
            if let Some(request) = self.catalog.route(anchor) {
                log::debug!("Placing '{}' on anchor {}", request.model.name, request.anchor_id);
                if let Err(e) = self.placement_tx.try_send(request) {
                    log::warn!("Placement queue unavailable: {e}");
                }
            }
        }
    }

    // ─── UI operations ──────────────────────────────────────────────

    /// Place a catalog model at `transform`, owned by the local session.
    pub fn place_model(&self, name: &str, transform: Transform) -> Result<AnchorId, CollabError> {
        let model = self
            .catalog
            .get(name)
            .ok_or_else(|| CollabError::Catalog(format!("unknown model '{name}'")))?;
        let anchor = Anchor::named(model.name.clone(), self.engine.session_id(), transform);
        let id = anchor.id;
        self.engine.add_anchor(anchor);
        log::info!("Placed '{name}' as anchor {id}");
        Ok(id)
    }

    // ─── Event loop ─────────────────────────────────────────────────

    pub async fn handle_network_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Discovered { peer, reply } => {
                let admitted = self.on_peer_discovered(peer).await;
                if reply.send(admitted).is_err() {
                    log::debug!("Discovery of {peer} abandoned before reply");
                }
            }
            NetworkEvent::Joined(peer) => self.on_peer_joined(peer).await,
            NetworkEvent::Left(peer) => self.on_peer_left(peer).await,
            NetworkEvent::Data { from, bytes } => self.on_data_received(from, &bytes).await,
        }
    }

    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::SessionIdentifier(session_id) => {
                self.on_session_identifier(session_id).await;
            }
            EngineEvent::CollaborationData(blob) => {
                self.on_collaboration_data(blob);
            }
            EngineEvent::AnchorsAdded(anchors) => self.on_anchors_added(&anchors),
        }
    }

    /// Process events until both channels close.
    pub async fn run(
        &self,
        mut network_rx: mpsc::Receiver<NetworkEvent>,
        mut engine_rx: mpsc::Receiver<EngineEvent>,
    ) {
        // Announce whatever identifier the engine starts with.
        self.on_session_identifier(self.engine.session_id()).await;

        loop {
            tokio::select! {
                Some(event) = network_rx.recv() => self.handle_network_event(event).await,
                Some(event) = engine_rx.recv() => self.handle_engine_event(event).await,
                else => break,
            }
        }
        log::debug!("Tracker event loop finished");
    }

    // ─── Inspection ─────────────────────────────────────────────────

    pub async fn peer_count(&self) -> usize {
        self.state.lock().await.directory.len()
    }

    pub async fn peers(&self) -> Vec<PeerId> {
        self.state.lock().await.directory.peers()
    }

    pub async fn session_for(&self, peer: &PeerId) -> Option<SessionId> {
        self.state.lock().await.directory.session_for(peer).cloned()
    }

    pub async fn contains_peer(&self, peer: &PeerId) -> bool {
        self.state.lock().await.directory.contains(peer)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.indicator.status()
    }

    pub fn stats(&self) -> TrackerStats {
        self.stats.snapshot()
    }

    pub fn reconciler(&self) -> &AnchorReconciler {
        &self.reconciler
    }
}
