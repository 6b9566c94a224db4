//! Connection status indicator for the UI.
//!
//! Network callbacks do not run on the UI thread, so the status is
//! published through a `watch` channel and the UI reads it on its own side.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No other user seen in the shared scene.
    Disconnected,
    /// Another user's participant anchor is in the scene.
    Connected,
}

impl ConnectionStatus {
    /// RGBA color of the status dot.
    pub fn color(&self) -> [f32; 4] {
        match self {
            ConnectionStatus::Disconnected => [1.0, 0.23, 0.19, 1.0],
            ConnectionStatus::Connected => [0.2, 0.78, 0.35, 1.0],
        }
    }
}

pub struct ConnectionIndicator {
    tx: watch::Sender<ConnectionStatus>,
}

impl ConnectionIndicator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self { tx }
    }

    /// Publish `status`. Returns `true` if it changed.
    pub fn set(&self, status: ConnectionStatus) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            log::info!("Connection status: {status:?}");
        }
        changed
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }
}

impl Default for ConnectionIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_disconnected() {
        let indicator = ConnectionIndicator::new();
        assert_eq!(indicator.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_set_reports_changes_only() {
        let indicator = ConnectionIndicator::new();
        assert!(indicator.set(ConnectionStatus::Connected));
        assert!(!indicator.set(ConnectionStatus::Connected));
        assert!(indicator.set(ConnectionStatus::Disconnected));
    }

    #[tokio::test]
    async fn test_subscriber_sees_update() {
        let indicator = ConnectionIndicator::new();
        let mut rx = indicator.subscribe();

        indicator.set(ConnectionStatus::Connected);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), ConnectionStatus::Connected);
    }

    #[test]
    fn test_colors_differ() {
        assert_ne!(
            ConnectionStatus::Connected.color(),
            ConnectionStatus::Disconnected.color()
        );
    }
}
