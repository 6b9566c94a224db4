//! Peer directory: who is connected and which session each peer announced.
//!
//! Per-peer lifecycle:
//!
//! ```text
//! Discovered ──admit──► Joined ──SessionID:S──► Announced(S)
//!                          │                      │   ▲
//!                          │                      └───┘ SessionID:S' (re-announce)
//!                          ▼                      ▼
//!                         Left ◄──────────────── Left
//! ```
//!
//! The directory holds state only. Anchor purging on re-announce and leave
//! is driven by the tracker, which owns the directory behind its lock.

use std::collections::HashMap;

use crate::protocol::{PeerId, SessionId};

/// Connection state of a joined peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerState {
    /// Connected, no session identifier announced yet.
    Joined,
    /// Connected with a known session identifier.
    Announced(SessionId),
}

impl PeerState {
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            PeerState::Joined => None,
            PeerState::Announced(id) => Some(id),
        }
    }
}

/// Result of recording an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// First identifier seen for this peer.
    First,
    /// Same identifier as before.
    Unchanged,
    /// Identifier replaced; holds the previous one.
    Replaced(SessionId),
}

pub struct PeerDirectory {
    peers: HashMap<PeerId, PeerState>,
    max_peers: usize,
}

impl PeerDirectory {
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
        }
    }

    /// Admission check at discovery time against the currently connected
    /// count. Peers mid-join are not counted.
    pub fn admits(&self, connected: usize) -> bool {
        connected < self.max_peers
    }

    /// Register a joined peer. Returns `false` if it was already known.
    pub fn join(&mut self, peer: PeerId) -> bool {
        if self.peers.contains_key(&peer) {
            return false;
        }
        self.peers.insert(peer, PeerState::Joined);
        true
    }

    /// Remove a peer, returning its final state.
    pub fn leave(&mut self, peer: &PeerId) -> Option<PeerState> {
        self.peers.remove(peer)
    }

    /// Overwrite the session identifier recorded for `peer`.
    ///
    /// Announcements may arrive before the join callback; the peer is
    /// recorded either way. Callers decide whether the sender is connected.
    pub fn record_session(&mut self, peer: PeerId, session_id: SessionId) -> SessionUpdate {
        match self.peers.insert(peer, PeerState::Announced(session_id.clone())) {
            Some(PeerState::Announced(previous)) if previous == session_id => SessionUpdate::Unchanged,
            Some(PeerState::Announced(previous)) => SessionUpdate::Replaced(previous),
            Some(PeerState::Joined) | None => SessionUpdate::First,
        }
    }

    pub fn session_for(&self, peer: &PeerId) -> Option<&SessionId> {
        self.peers.get(peer).and_then(PeerState::session_id)
    }

    pub fn state(&self, peer: &PeerId) -> Option<&PeerState> {
        self.peers.get(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn max_peers(&self) -> usize {
        self.max_peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_cap() {
        let directory = PeerDirectory::new(4);
        assert!(directory.admits(0));
        assert!(directory.admits(3));
        assert!(!directory.admits(4));
        assert!(!directory.admits(5));
    }

    #[test]
    fn test_join_leave() {
        let mut directory = PeerDirectory::new(4);
        let peer = PeerId::new();

        assert!(directory.join(peer));
        assert!(!directory.join(peer));
        assert_eq!(directory.state(&peer), Some(&PeerState::Joined));
        assert_eq!(directory.session_for(&peer), None);

        assert_eq!(directory.leave(&peer), Some(PeerState::Joined));
        assert!(directory.is_empty());
        assert_eq!(directory.leave(&peer), None);
    }

    #[test]
    fn test_record_session_overwrites() {
        let mut directory = PeerDirectory::new(4);
        let peer = PeerId::new();
        directory.join(peer);

        assert_eq!(directory.record_session(peer, SessionId::new("X")), SessionUpdate::First);
        assert_eq!(directory.record_session(peer, SessionId::new("X")), SessionUpdate::Unchanged);
        assert_eq!(
            directory.record_session(peer, SessionId::new("Z")),
            SessionUpdate::Replaced(SessionId::new("X"))
        );
        assert_eq!(directory.session_for(&peer), Some(&SessionId::new("Z")));
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn test_announcement_before_join() {
        let mut directory = PeerDirectory::new(4);
        let peer = PeerId::new();

        assert_eq!(directory.record_session(peer, SessionId::new("X")), SessionUpdate::First);
        // A late join does not clobber the announced identifier.
        assert!(!directory.join(peer));
        assert_eq!(directory.session_for(&peer), Some(&SessionId::new("X")));
    }
}
