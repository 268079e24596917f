//! Multi-canvas registry
//!
//! Canvases are fully isolated: each owns its generator fleet, metric
//! engine, and trace bus. The registry is the only shared structure, and
//! it shares nothing but the id-to-canvas map.

use crate::canvas::Canvas;
use crate::error::{CanvasError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CanvasRegistry {
    canvases: DashMap<String, Arc<Canvas>>,
}

impl CanvasRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a canvas under an explicit id
    pub fn create(&self, id: &str) -> Result<Arc<Canvas>> {
        if self.canvases.contains_key(id) {
            return Err(CanvasError::CanvasExists(id.to_string()));
        }
        let canvas = Arc::new(Canvas::new(id));
        self.canvases.insert(id.to_string(), canvas.clone());
        Ok(canvas)
    }

    /// Create a canvas under a fresh generated id
    pub fn create_anonymous(&self) -> Arc<Canvas> {
        loop {
            let id = Uuid::new_v4().to_string();
            if let Ok(canvas) = self.create(&id) {
                return canvas;
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Arc<Canvas>> {
        self.canvases
            .get(id)
            .map(|c| c.clone())
            .ok_or_else(|| CanvasError::CanvasNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.canvases.iter().map(|c| c.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.canvases
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::CanvasNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_list_remove() {
        let registry = CanvasRegistry::new();
        registry.create("c1").unwrap();
        registry.create("c2").unwrap();
        assert!(matches!(
            registry.create("c1"),
            Err(CanvasError::CanvasExists(_))
        ));

        assert_eq!(registry.list(), vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(registry.get("c1").unwrap().id(), "c1");

        registry.remove("c1").unwrap();
        assert!(registry.get("c1").is_err());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_ids_are_unique() {
        let registry = CanvasRegistry::new();
        let a = registry.create_anonymous();
        let b = registry.create_anonymous();
        assert_ne!(a.id(), b.id());
    }
}
