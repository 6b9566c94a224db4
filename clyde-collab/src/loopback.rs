//! In-process collaborators: a loopback peer network and an in-memory scene.
//!
//! Several simulated devices register with one [`LoopbackHub`]. Each gets a
//! [`LoopbackNetwork`] handle plus a receiver of [`NetworkEvent`]s, which is
//! exactly what a [`SessionTracker`](crate::tracker::SessionTracker) consumes.
//! Every send is recorded so tests can inspect the traffic.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};

use crate::engine::{Anchor, AnchorId, ArEngine, EngineEvent};
use crate::network::{NetworkEvent, PeerNetwork};
use crate::protocol::{CollaborationBlob, Delivery, PeerId, Priority, SessionId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One recorded send.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub from: PeerId,
    pub to: PeerId,
    pub delivery: Delivery,
    pub bytes: Vec<u8>,
}

struct Device {
    events: mpsc::Sender<NetworkEvent>,
}

#[derive(Default)]
pub struct LoopbackHub {
    devices: Mutex<HashMap<PeerId, Device>>,
    links: Mutex<HashMap<PeerId, HashSet<PeerId>>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a device. Returns its network handle and event receiver.
    pub fn register(
        self: &Arc<Self>,
        peer: PeerId,
        capacity: usize,
    ) -> (LoopbackNetwork, mpsc::Receiver<NetworkEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        lock(&self.devices).insert(peer, Device { events: tx });
        let network = LoopbackNetwork {
            local: peer,
            hub: self.clone(),
        };
        (network, rx)
    }

    /// Connect two devices without any discovery or join events.
    pub fn link(&self, a: PeerId, b: PeerId) {
        let mut links = lock(&self.links);
        links.entry(a).or_default().insert(b);
        links.entry(b).or_default().insert(a);
    }

    pub fn unlink(&self, a: PeerId, b: PeerId) {
        let mut links = lock(&self.links);
        if let Some(set) = links.get_mut(&a) {
            set.remove(&b);
        }
        if let Some(set) = links.get_mut(&b) {
            set.remove(&a);
        }
    }

    pub fn linked_peers(&self, peer: PeerId) -> Vec<PeerId> {
        lock(&self.links)
            .get(&peer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn sender(&self, peer: PeerId) -> Option<mpsc::Sender<NetworkEvent>> {
        lock(&self.devices).get(&peer).map(|d| d.events.clone())
    }

    /// `from` discovers `to`. If `from` admits it, both sides are linked and
    /// receive a join event. Returns whether the peer was admitted.
    pub async fn connect(&self, from: PeerId, to: PeerId) -> bool {
        let Some(from_tx) = self.sender(from) else {
            return false;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if from_tx
            .send(NetworkEvent::Discovered { peer: to, reply: reply_tx })
            .await
            .is_err()
        {
            return false;
        }
        let admitted = reply_rx.await.unwrap_or(false);
        if !admitted {
            log::debug!("{from} declined {to}");
            return false;
        }

        self.link(from, to);
        let _ = from_tx.send(NetworkEvent::Joined(to)).await;
        if let Some(to_tx) = self.sender(to) {
            let _ = to_tx.send(NetworkEvent::Joined(from)).await;
        }
        true
    }

    /// Break the link and tell both sides.
    pub async fn disconnect(&self, a: PeerId, b: PeerId) {
        self.unlink(a, b);
        if let Some(tx) = self.sender(a) {
            let _ = tx.send(NetworkEvent::Left(b)).await;
        }
        if let Some(tx) = self.sender(b) {
            let _ = tx.send(NetworkEvent::Left(a)).await;
        }
    }

    /// Take a device off the network, disconnecting it from everyone.
    pub async fn remove(&self, peer: PeerId) {
        for other in self.linked_peers(peer) {
            self.disconnect(peer, other).await;
        }
        lock(&self.devices).remove(&peer);
        lock(&self.links).remove(&peer);
    }

    fn deliver(&self, from: PeerId, bytes: Vec<u8>, delivery: Delivery, peers: &[PeerId]) {
        let linked: HashSet<PeerId> = self.linked_peers(from).into_iter().collect();
        for to in peers.iter().copied().filter(|p| linked.contains(p)) {
            lock(&self.sent).push(SentMessage {
                from,
                to,
                delivery,
                bytes: bytes.clone(),
            });
            if let Some(tx) = self.sender(to) {
                let event = NetworkEvent::Data {
                    from,
                    bytes: bytes.clone(),
                };
                if tx.try_send(event).is_err() {
                    log::warn!("Loopback queue for {to} full or closed, dropping message from {from}");
                }
            }
        }
    }

    /// All recorded sends, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn sent_by(&self, peer: PeerId) -> Vec<SentMessage> {
        lock(&self.sent).iter().filter(|m| m.from == peer).cloned().collect()
    }

    pub fn clear_sent(&self) {
        lock(&self.sent).clear();
    }
}

/// A device's handle on the loopback network.
#[derive(Clone)]
pub struct LoopbackNetwork {
    local: PeerId,
    hub: Arc<LoopbackHub>,
}

impl PeerNetwork for LoopbackNetwork {
    fn connected_peers(&self) -> Vec<PeerId> {
        self.hub.linked_peers(self.local)
    }

    fn send_to_peers(&self, bytes: Vec<u8>, delivery: Delivery, peers: &[PeerId]) {
        self.hub.deliver(self.local, bytes, delivery, peers);
    }
}

/// In-memory AR scene.
///
/// Blobs it emits carry its anchors bincode-encoded, so merging a peer's
/// blob adds that peer's anchors here the way a real engine would.
pub struct SceneEngine {
    session_id: Mutex<SessionId>,
    anchors: Mutex<Vec<Anchor>>,
    events: Mutex<Option<mpsc::Sender<EngineEvent>>>,
    merged: Mutex<usize>,
}

impl SceneEngine {
    pub fn new() -> Self {
        Self::with_session(SessionId::random())
    }

    pub fn with_session(session_id: SessionId) -> Self {
        Self {
            session_id: Mutex::new(session_id),
            anchors: Mutex::new(Vec::new()),
            events: Mutex::new(None),
            merged: Mutex::new(0),
        }
    }

    /// Route engine notifications to `tx`.
    pub fn attach(&self, tx: mpsc::Sender<EngineEvent>) {
        *lock(&self.events) = Some(tx);
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = lock(&self.events).as_ref() {
            if tx.try_send(event).is_err() {
                log::warn!("Engine event queue full or closed");
            }
        }
    }

    /// Restart tracking under a fresh session identifier.
    pub fn reset_session(&self) -> SessionId {
        let id = SessionId::random();
        *lock(&self.session_id) = id.clone();
        self.emit(EngineEvent::SessionIdentifier(id.clone()));
        id
    }

    /// Put an anchor into the scene without any notification.
    pub fn insert_anchor(&self, anchor: Anchor) {
        lock(&self.anchors).push(anchor);
    }

    /// Emit a blob announcing this user's presence to peers.
    pub fn share_presence(&self) {
        let participant = Anchor::participant(self.session_id());
        self.share_anchors(&[participant]);
    }

    /// Emit a best-effort tracking update with an opaque payload.
    pub fn share_tracking(&self, payload: Vec<u8>) {
        self.emit(EngineEvent::CollaborationData(CollaborationBlob::optional(payload)));
    }

    pub fn contains(&self, id: AnchorId) -> bool {
        lock(&self.anchors).iter().any(|a| a.id == id)
    }

    pub fn merged_count(&self) -> usize {
        *lock(&self.merged)
    }

    /// Share `anchors` with peers as a critical blob. An encode failure is
    /// logged and nothing is emitted.
    fn share_anchors(&self, anchors: &[Anchor]) {
        if let Some(blob) = Self::encode_anchors(anchors) {
            self.emit(EngineEvent::CollaborationData(blob));
        }
    }

    fn encode_anchors(anchors: &[Anchor]) -> Option<CollaborationBlob> {
        match bincode::serde::encode_to_vec(anchors, bincode::config::standard()) {
            Ok(payload) => Some(CollaborationBlob::critical(payload)),
            Err(e) => {
                log::error!("Skipping anchor share, encode failed: {e}");
                None
            }
        }
    }

    fn decode_anchors(payload: &[u8]) -> Option<Vec<Anchor>> {
        bincode::serde::decode_from_slice::<Vec<Anchor>, _>(payload, bincode::config::standard())
            .ok()
            .filter(|(_, read)| *read == payload.len())
            .map(|(anchors, _)| anchors)
    }
}

impl Default for SceneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ArEngine for SceneEngine {
    fn session_id(&self) -> SessionId {
        lock(&self.session_id).clone()
    }

    fn anchors(&self) -> Vec<Anchor> {
        lock(&self.anchors).clone()
    }

    fn add_anchor(&self, anchor: Anchor) {
        lock(&self.anchors).push(anchor.clone());
        self.emit(EngineEvent::AnchorsAdded(vec![anchor.clone()]));
        self.share_anchors(&[anchor]);
    }

    fn remove_anchor(&self, id: AnchorId) {
        lock(&self.anchors).retain(|a| a.id != id);
    }

    fn merge_collaboration(&self, blob: CollaborationBlob) {
        *lock(&self.merged) += 1;
        if blob.priority != Priority::Critical {
            return;
        }
        let Some(incoming) = Self::decode_anchors(&blob.payload) else {
            return;
        };

        let added: Vec<Anchor> = {
            let mut anchors = lock(&self.anchors);
            let fresh: Vec<Anchor> = incoming
                .into_iter()
                .filter(|a| !anchors.iter().any(|existing| existing.id == a.id))
                .collect();
            anchors.extend(fresh.iter().cloned());
            fresh
        };
        if !added.is_empty() {
            self.emit(EngineEvent::AnchorsAdded(added));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Transform;

    #[tokio::test]
    async fn test_connect_requires_admission() {
        let hub = LoopbackHub::new();
        let a = PeerId::new();
        let b = PeerId::new();
        let (_net_a, mut rx_a) = hub.register(a, 8);
        let (_net_b, mut rx_b) = hub.register(b, 8);

        let answer = tokio::spawn(async move {
            match rx_a.recv().await {
                Some(NetworkEvent::Discovered { peer, reply }) => {
                    assert_eq!(peer, b);
                    let _ = reply.send(true);
                }
                other => panic!("Expected Discovered, got {other:?}"),
            }
            rx_a
        });

        assert!(hub.connect(a, b).await);
        let mut rx_a = answer.await.unwrap();
        assert!(matches!(rx_a.recv().await, Some(NetworkEvent::Joined(p)) if p == b));
        assert!(matches!(rx_b.recv().await, Some(NetworkEvent::Joined(p)) if p == a));
        assert_eq!(hub.linked_peers(a), vec![b]);
    }

    #[tokio::test]
    async fn test_declined_connection_stays_unlinked() {
        let hub = LoopbackHub::new();
        let a = PeerId::new();
        let b = PeerId::new();
        let (_net_a, mut rx_a) = hub.register(a, 8);
        let (_net_b, _rx_b) = hub.register(b, 8);

        tokio::spawn(async move {
            if let Some(NetworkEvent::Discovered { reply, .. }) = rx_a.recv().await {
                let _ = reply.send(false);
            }
        });

        assert!(!hub.connect(a, b).await);
        assert!(hub.linked_peers(a).is_empty());
    }

    #[tokio::test]
    async fn test_send_only_reaches_linked_peers() {
        let hub = LoopbackHub::new();
        let a = PeerId::new();
        let b = PeerId::new();
        let stranger = PeerId::new();
        let (net_a, _rx_a) = hub.register(a, 8);
        let (_net_b, mut rx_b) = hub.register(b, 8);
        hub.link(a, b);

        net_a.send_to_peers(vec![1, 2], Delivery::Reliable, &[b, stranger]);

        assert_eq!(hub.sent_by(a).len(), 1);
        match rx_b.recv().await {
            Some(NetworkEvent::Data { from, bytes }) => {
                assert_eq!(from, a);
                assert_eq!(bytes, vec![1, 2]);
            }
            other => panic!("Expected Data, got {other:?}"),
        }
    }

    #[test]
    fn test_scene_merge_adds_remote_anchors_once() {
        let local = SceneEngine::new();
        let remote = SceneEngine::new();
        let (tx, mut rx) = mpsc::channel(8);
        remote.attach(tx);

        let anchor = Anchor::named("lamp", remote.session_id(), Transform::IDENTITY);
        remote.add_anchor(anchor.clone());

        let _added = rx.try_recv().unwrap();
        let blob = match rx.try_recv().unwrap() {
            EngineEvent::CollaborationData(blob) => blob,
            other => panic!("Expected CollaborationData, got {other:?}"),
        };

        local.merge_collaboration(blob.clone());
        local.merge_collaboration(blob);
        assert_eq!(local.anchors().len(), 1);
        assert!(local.contains(anchor.id));
        assert_eq!(local.merged_count(), 2);
    }

    #[test]
    fn test_share_presence_carries_participant_anchor() {
        let engine = SceneEngine::with_session(SessionId::new("me"));
        let (tx, mut rx) = mpsc::channel(8);
        engine.attach(tx);

        engine.share_presence();

        let blob = match rx.try_recv().unwrap() {
            EngineEvent::CollaborationData(blob) => blob,
            other => panic!("Expected CollaborationData, got {other:?}"),
        };
        assert_eq!(blob.priority, Priority::Critical);
        assert!(!blob.payload.is_empty());
        let anchors = SceneEngine::decode_anchors(&blob.payload).unwrap();
        assert_eq!(anchors.len(), 1);
        assert!(anchors[0].is_participant());
        assert_eq!(anchors[0].session_id, Some(SessionId::new("me")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scene_reset_changes_session() {
        let engine = SceneEngine::with_session(SessionId::new("first"));
        let next = engine.reset_session();
        assert_ne!(next, SessionId::new("first"));
        assert_eq!(engine.session_id(), next);
    }
}
