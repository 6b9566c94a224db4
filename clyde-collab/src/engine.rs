//! Boundary with the host AR engine.
//!
//! The engine owns the scene, the anchors and the local tracking session.
//! The tracker only observes it and asks it to add or remove anchors.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::protocol::{CollaborationBlob, SessionId};

/// Handle of an anchor in the engine's scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(Uuid);

impl AnchorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnchorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column-major 4×4 world transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY.0;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        Transform(m)
    }

    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorKind {
    /// Placed content (a model).
    Content,
    /// Marks the position of another user in the shared scene.
    Participant,
}

/// A spatial reference point in the shared scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub id: AnchorId,
    /// Model name used to route placement. `None` for unnamed anchors.
    pub name: Option<String>,
    /// Session that created this anchor, if known.
    pub session_id: Option<SessionId>,
    pub kind: AnchorKind,
    pub transform: Transform,
}

impl Anchor {
    /// A named content anchor created by `session_id`.
    pub fn named(name: impl Into<String>, session_id: SessionId, transform: Transform) -> Self {
        Self {
            id: AnchorId::new(),
            name: Some(name.into()),
            session_id: Some(session_id),
            kind: AnchorKind::Content,
            transform,
        }
    }

    /// A participant anchor for the user running `session_id`.
    pub fn participant(session_id: SessionId) -> Self {
        Self {
            id: AnchorId::new(),
            name: None,
            session_id: Some(session_id),
            kind: AnchorKind::Participant,
            transform: Transform::IDENTITY,
        }
    }

    pub fn is_participant(&self) -> bool {
        self.kind == AnchorKind::Participant
    }

    pub fn belongs_to(&self, session_id: &SessionId) -> bool {
        self.session_id.as_ref() == Some(session_id)
    }
}

/// Operations the tracker needs from the AR engine.
///
/// Implementations are called from the tracker's serialized context and
/// must not block.
pub trait ArEngine: Send + Sync {
    /// Current local session identifier.
    fn session_id(&self) -> SessionId;

    /// Snapshot of all anchors in the scene.
    fn anchors(&self) -> Vec<Anchor>;

    fn add_anchor(&self, anchor: Anchor);

    fn remove_anchor(&self, id: AnchorId);

    /// Merge tracking state received from a peer.
    fn merge_collaboration(&self, blob: CollaborationBlob);
}

/// Push-style notifications from the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// The engine reports its current session identifier (may be unchanged).
    SessionIdentifier(SessionId),
    /// Outbound tracking state to share with peers.
    CollaborationData(CollaborationBlob),
    /// Anchors were added to the scene, locally or through a merge.
    AnchorsAdded(Vec<Anchor>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_belongs_to_exact_session() {
        let anchor = Anchor::named("lamp", SessionId::new("X"), Transform::IDENTITY);
        assert!(anchor.belongs_to(&SessionId::new("X")));
        assert!(!anchor.belongs_to(&SessionId::new("x")));
        assert!(!anchor.is_participant());
    }

    #[test]
    fn test_anchor_without_session_belongs_to_nobody() {
        let mut anchor = Anchor::participant(SessionId::new("X"));
        anchor.session_id = None;
        assert!(!anchor.belongs_to(&SessionId::new("X")));
    }

    #[test]
    fn test_transform_translation() {
        let t = Transform::from_translation(1.0, 2.0, 3.0);
        assert_eq!(t.translation(), [1.0, 2.0, 3.0]);
        assert_eq!(Transform::default(), Transform::IDENTITY);
    }
}
