//! Model registry
//!
//! Owns the merged catalog of known models: a shipped, read-only catalog
//! baked into the binary plus a user catalog persisted as
//! `<cache_root>/user_models.json`. Grounded in the teacher's
//! `DashMap`-backed concurrent `Registry` (`registry::mod::Registry`),
//! generalized from "one entry per backend" to "one entry per model".

pub mod error;
pub mod model;

pub use error::RegistryError;
pub use model::{split_checkpoint, Label, ModelDescriptor};

use dashmap::DashMap;
use std::path::{Path, PathBuf};

const SHIPPED_CATALOG_JSON: &str = include_str!("shipped_catalog.json");

/// Thread-safe, shared catalog of model descriptors.
pub struct ModelRegistry {
    shipped: DashMap<String, ModelDescriptor>,
    user: DashMap<String, ModelDescriptor>,
    user_catalog_path: PathBuf,
}

impl ModelRegistry {
    /// Build a registry from the embedded shipped catalog, with an empty
    /// user catalog backed by `user_catalog_path` (not read from disk yet —
    /// call [`ModelRegistry::load_user_catalog`] to populate it).
    pub fn new(user_catalog_path: impl Into<PathBuf>) -> Self {
        let shipped = DashMap::new();
        if let Ok(descriptors) = serde_json::from_str::<Vec<ModelDescriptor>>(SHIPPED_CATALOG_JSON)
        {
            for d in descriptors {
                shipped.insert(d.name.clone(), d);
            }
        }
        Self {
            shipped,
            user: DashMap::new(),
            user_catalog_path: user_catalog_path.into(),
        }
    }

    /// Load (or reload) the user catalog from disk. Missing file is not an
    /// error — it means no user models have been registered yet.
    pub fn load_user_catalog(&self) -> Result<(), RegistryError> {
        if !self.user_catalog_path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&self.user_catalog_path)?;
        let descriptors: Vec<ModelDescriptor> =
            serde_json::from_str(&content).map_err(|e| RegistryError::Parse(e.to_string()))?;
        self.user.clear();
        for d in descriptors {
            self.user.insert(d.name.clone(), d);
        }
        Ok(())
    }

    fn persist_user_catalog(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.user_catalog_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let descriptors: Vec<ModelDescriptor> =
            self.user.iter().map(|e| e.value().clone()).collect();
        let content =
            serde_json::to_string_pretty(&descriptors).map_err(|e| RegistryError::Parse(e.to_string()))?;
        std::fs::write(&self.user_catalog_path, content)?;
        Ok(())
    }

    /// Register a user-supplied model. Rejects names that collide with the
    /// shipped catalog or an existing user entry.
    pub fn register_user(&self, descriptor: ModelDescriptor) -> Result<(), RegistryError> {
        if self.shipped.contains_key(&descriptor.name) {
            return Err(RegistryError::ShippedNameConflict(descriptor.name));
        }
        if self.user.contains_key(&descriptor.name) {
            return Err(RegistryError::Conflict(descriptor.name));
        }
        self.user.insert(descriptor.name.clone(), descriptor);
        self.persist_user_catalog()
    }

    /// Remove a user-registered model. Shipped models cannot be unregistered.
    pub fn unregister_user(&self, name: &str) -> Result<(), RegistryError> {
        if self.user.remove(name).is_none() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        self.persist_user_catalog()
    }

    /// Look up a model by gateway-facing name, shipped catalog first.
    pub fn get(&self, name: &str) -> Option<ModelDescriptor> {
        self.shipped
            .get(name)
            .map(|e| e.value().clone())
            .or_else(|| self.user.get(name).map(|e| e.value().clone()))
    }

    /// All known models, shipped followed by user-registered.
    pub fn list(&self) -> Vec<ModelDescriptor> {
        let mut all: Vec<ModelDescriptor> =
            self.shipped.iter().map(|e| e.value().clone()).collect();
        all.extend(self.user.iter().map(|e| e.value().clone()));
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn user_catalog_path(&self) -> &Path {
        &self.user_catalog_path
    }

    pub fn len(&self) -> usize {
        self.shipped.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
