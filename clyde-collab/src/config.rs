use serde::{Deserialize, Serialize};

use crate::error::CollabError;

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum concurrently connected peers admitted at discovery
    pub max_peers: usize,
    /// Capacity of the bounded event and placement channels
    pub event_capacity: usize,
    /// Send the local session identifier to each newly joined peer
    pub announce_on_join: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_peers: 4,
            event_capacity: 64,
            announce_on_join: true,
        }
    }
}

impl TrackerConfig {
    /// Parse from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, CollabError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CollabError::Decode(e.to_string()))?;
        if config.event_capacity == 0 {
            return Err(CollabError::Decode("event_capacity must be at least 1".into()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_default() {
        let config = TrackerConfig::default();
        assert_eq!(config.max_peers, 4);
        assert_eq!(config.event_capacity, 64);
        assert!(config.announce_on_join);
    }

    #[test]
    fn test_tracker_config_partial_json() {
        let config = TrackerConfig::from_json(r#"{ "max_peers": 2 }"#).unwrap();
        assert_eq!(config.max_peers, 2);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_tracker_config_bad_json() {
        assert!(TrackerConfig::from_json("{ max_peers: }").is_err());
    }

    #[test]
    fn test_tracker_config_rejects_zero_capacity() {
        let err = TrackerConfig::from_json(r#"{ "event_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, CollabError::Decode(_)));
        assert!(TrackerConfig::from_json(r#"{ "event_capacity": 1 }"#).is_ok());
    }
}
