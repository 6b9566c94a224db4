//! Anchor ownership reconciliation.
//!
//! When a peer's session goes stale (re-announced under a new identifier,
//! or the peer left), every anchor tagged with the stale identifier is
//! removed from the engine so no orphaned content lingers in the scene.
//!
//! The scan is linear over the engine's anchors. Peer counts are capped at
//! a handful, so the engine snapshot is the source of truth rather than a
//! separate index that could drift from anchors added through merges.

use std::sync::Arc;

use crate::engine::{AnchorId, ArEngine};
use crate::protocol::SessionId;
use crate::stats::AtomicTrackerStats;

pub struct AnchorReconciler {
    engine: Arc<dyn ArEngine>,
    stats: Arc<AtomicTrackerStats>,
}

impl AnchorReconciler {
    pub(crate) fn new(engine: Arc<dyn ArEngine>, stats: Arc<AtomicTrackerStats>) -> Self {
        Self { engine, stats }
    }

    /// Anchors currently owned by `session_id`.
    pub fn anchors_for_session(&self, session_id: &SessionId) -> Vec<AnchorId> {
        self.engine
            .anchors()
            .into_iter()
            .filter(|anchor| anchor.belongs_to(session_id))
            .map(|anchor| anchor.id)
            .collect()
    }

    /// Remove every anchor owned by `session_id`. Returns how many were
    /// removed; zero matches is a no-op.
    pub fn remove_anchors_for_session(&self, session_id: &SessionId) -> usize {
        let stale = self.anchors_for_session(session_id);
        for id in &stale {
            self.engine.remove_anchor(*id);
        }

        if !stale.is_empty() {
            AtomicTrackerStats::bump(&self.stats.anchors_removed, stale.len() as u64);
            log::info!("Removed {} anchors of stale session {session_id}", stale.len());
        } else {
            log::debug!("No anchors to remove for session {session_id}");
        }
        stale.len()
    }
}
