use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of tracker activity counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub blobs_sent: u64,
    pub blobs_dropped: u64,
    pub blobs_merged: u64,
    pub announcements_sent: u64,
    pub anchors_removed: u64,
    pub payloads_ignored: u64,
    pub peers_rejected: u64,
}

/// Lock-free counters shared by the tracker components.
#[derive(Debug, Default)]
pub(crate) struct AtomicTrackerStats {
    pub blobs_sent: AtomicU64,
    pub blobs_dropped: AtomicU64,
    pub blobs_merged: AtomicU64,
    pub announcements_sent: AtomicU64,
    pub anchors_removed: AtomicU64,
    pub payloads_ignored: AtomicU64,
    pub peers_rejected: AtomicU64,
}

impl AtomicTrackerStats {
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TrackerStats {
        TrackerStats {
            blobs_sent: self.blobs_sent.load(Ordering::Relaxed),
            blobs_dropped: self.blobs_dropped.load(Ordering::Relaxed),
            blobs_merged: self.blobs_merged.load(Ordering::Relaxed),
            announcements_sent: self.announcements_sent.load(Ordering::Relaxed),
            anchors_removed: self.anchors_removed.load(Ordering::Relaxed),
            payloads_ignored: self.payloads_ignored.load(Ordering::Relaxed),
            peers_rejected: self.peers_rejected.load(Ordering::Relaxed),
        }
    }
}
