//! Model catalog and named-anchor placement routing.
//!
//! A content anchor's name selects the model that the rendering side
//! should attach to it. The catalog only resolves names; loading assets is
//! the renderer's job.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::{Anchor, AnchorId, Transform};
use crate::error::CollabError;

fn default_scale() -> f32 {
    1.0
}

/// A placeable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Uniform scale applied on top of the asset's native scale
    #[serde(default = "default_scale")]
    pub scale_compensation: f32,
}

impl ModelEntry {
    pub fn new(name: impl Into<String>, scale_compensation: f32) -> Self {
        Self {
            name: name.into(),
            scale_compensation,
        }
    }

    /// Asset file name the renderer loads for this model.
    pub fn asset_file(&self) -> String {
        format!("{}.usdz", self.name)
    }
}

/// Request for the rendering side to attach a model to an anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRequest {
    pub anchor_id: AnchorId,
    pub model: ModelEntry,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<ModelEntry>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            models: vec![
                ModelEntry::new("earth", 0.3),
                ModelEntry::new("lamp", 0.3),
                ModelEntry::new("conch", 0.3),
            ],
        }
    }
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelEntry>) -> Self {
        Self { models }
    }

    /// Parse a catalog from JSON: `{ "models": [ { "name": ..., "scale_compensation": ... } ] }`.
    pub fn from_json(json: &str) -> Result<Self, CollabError> {
        let catalog: ModelCatalog =
            serde_json::from_str(json).map_err(|e| CollabError::Catalog(e.to_string()))?;
        if let Some(entry) = catalog.models.iter().find(|m| m.name.is_empty()) {
            return Err(CollabError::Catalog(format!(
                "model with empty name (scale {})",
                entry.scale_compensation
            )));
        }
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CollabError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CollabError::Catalog(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Resolve a newly added anchor to a placement. Unnamed and participant
    /// anchors route nowhere; unknown names are logged.
    pub fn route(&self, anchor: &Anchor) -> Option<PlacementRequest> {
        if anchor.is_participant() {
            return None;
        }
        let name = anchor.name.as_deref()?;
        match self.get(name) {
            Some(model) => Some(PlacementRequest {
                anchor_id: anchor.id,
                model: model.clone(),
                transform: anchor.transform,
            }),
            None => {
                log::warn!("Unable to place anchor {}: unknown model '{name}'", anchor.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SessionId;
    use std::io::Write;

    #[test]
    fn test_default_catalog() {
        let catalog = ModelCatalog::default();
        assert_eq!(catalog.names(), vec!["earth", "lamp", "conch"]);
        assert_eq!(catalog.get("lamp").unwrap().scale_compensation, 0.3);
        assert_eq!(catalog.get("lamp").unwrap().asset_file(), "lamp.usdz");
        assert!(catalog.get("chair").is_none());
    }

    #[test]
    fn test_from_json_defaults_scale() {
        let catalog = ModelCatalog::from_json(r#"{ "models": [ { "name": "chair" } ] }"#).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("chair").unwrap().scale_compensation, 1.0);
    }

    #[test]
    fn test_from_json_rejects_empty_name() {
        let err = ModelCatalog::from_json(r#"{ "models": [ { "name": "" } ] }"#).unwrap_err();
        assert!(matches!(err, CollabError::Catalog(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "models": [ {{ "name": "vase", "scale_compensation": 0.5 }} ] }}"#).unwrap();

        let catalog = ModelCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.get("vase").unwrap().scale_compensation, 0.5);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ModelCatalog::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_route_named_anchor() {
        let catalog = ModelCatalog::default();
        let anchor = Anchor::named("earth", SessionId::new("S"), Transform::from_translation(0.0, 0.0, -1.0));

        let request = catalog.route(&anchor).unwrap();
        assert_eq!(request.anchor_id, anchor.id);
        assert_eq!(request.model.name, "earth");
        assert_eq!(request.transform.translation(), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_route_skips_unknown_and_participants() {
        let catalog = ModelCatalog::default();
        let unknown = Anchor::named("chair", SessionId::new("S"), Transform::IDENTITY);
        let participant = Anchor::participant(SessionId::new("S"));

        assert!(catalog.route(&unknown).is_none());
        assert!(catalog.route(&participant).is_none());
    }
}
