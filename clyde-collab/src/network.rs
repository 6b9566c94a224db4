//! Boundary with the peer networking layer.

use tokio::sync::oneshot;

use crate::protocol::{Delivery, PeerId};

/// Operations the tracker needs from the peer network.
///
/// Sends are fire-and-forget: the transport owns delivery guarantees and
/// failures are not reported back.
pub trait PeerNetwork: Send + Sync {
    /// Peers currently connected to this device.
    fn connected_peers(&self) -> Vec<PeerId>;

    fn send_to_peers(&self, bytes: Vec<u8>, delivery: Delivery, peers: &[PeerId]);

    fn send_to_all_peers(&self, bytes: Vec<u8>, delivery: Delivery) {
        let peers = self.connected_peers();
        if !peers.is_empty() {
            self.send_to_peers(bytes, delivery, &peers);
        }
    }
}

/// Callbacks delivered by the peer network.
#[derive(Debug)]
pub enum NetworkEvent {
    /// A nearby device was found. The receiver decides whether to admit it
    /// by answering on `reply`.
    Discovered {
        peer: PeerId,
        reply: oneshot::Sender<bool>,
    },
    Joined(PeerId),
    Left(PeerId),
    Data { from: PeerId, bytes: Vec<u8> },
}
