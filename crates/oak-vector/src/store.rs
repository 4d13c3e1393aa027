use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::Serialize;

use crate::collection::{Collection, QueryHit};
use crate::{CODE_COLLECTION, Error, MEMORY_COLLECTION, Result};

#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub name: String,
    pub entries: usize,
    pub dim: Option<usize>,
    pub writable: bool,
}

/// Owns the named collections under `<data_dir>/vectors/`. Every operation
/// takes the collection's RwLock so queries cannot race a rebuild.
pub struct VectorStore {
    root: PathBuf,
    collections: HashMap<String, RwLock<Collection>>,
}

impl VectorStore {
    /// Open the standard daemon collections (`code`, `memory`).
    pub fn open(data_dir: &Path) -> Result<Self> {
        Self::open_with_collections(data_dir, &[CODE_COLLECTION, MEMORY_COLLECTION])
    }

    pub fn open_with_collections(data_dir: &Path, names: &[&str]) -> Result<Self> {
        let root = data_dir.join("vectors");
        let mut collections = HashMap::new();
        for name in names {
            let collection = Collection::load(name, &root.join(name))?;
            collections.insert(name.to_string(), RwLock::new(collection));
        }
        Ok(Self { root, collections })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection(&self, name: &str) -> Result<&RwLock<Collection>> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::UnknownCollection(name.to_string()))
    }

    /// Startup guard: compare each populated collection against the
    /// provider's dimensionality. Mismatched collections keep serving reads
    /// but refuse writes until an operator rebuild.
    pub fn check_dims(&self, provider_dim: usize) -> Vec<String> {
        let mut frozen = Vec::new();
        for (name, lock) in &self.collections {
            let mut collection = lock.write().expect("vector lock poisoned");
            if !collection.check_dim(provider_dim) {
                tracing::warn!(
                    collection = %name,
                    stored_dim = ?collection.dim(),
                    provider_dim,
                    "dimension mismatch; writes frozen until rebuild"
                );
                frozen.push(name.clone());
            }
        }
        frozen
    }

    pub fn upsert(
        &self,
        collection: &str,
        id: &str,
        vector: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector lock poisoned");
        guard.upsert(id, vector, metadata)
    }

    pub fn query(
        &self,
        collection: &str,
        vector: &[f32],
        k: usize,
        filter: Option<&dyn Fn(&serde_json::Value) -> bool>,
    ) -> Result<Vec<QueryHit>> {
        let lock = self.collection(collection)?;
        let guard = lock.read().expect("vector lock poisoned");
        Ok(guard.query(vector, k, filter))
    }

    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector lock poisoned");
        guard.delete(id)
    }

    pub fn contains(&self, collection: &str, id: &str) -> Result<bool> {
        let lock = self.collection(collection)?;
        let guard = lock.read().expect("vector lock poisoned");
        Ok(guard.contains(id))
    }

    pub fn count(&self, collection: &str) -> Result<usize> {
        let lock = self.collection(collection)?;
        let guard = lock.read().expect("vector lock poisoned");
        Ok(guard.len())
    }

    /// Rebuild step 1: drop everything, reset the dimension tag, unfreeze.
    /// The caller re-embeds from the relational store afterwards.
    pub fn clear(&self, collection: &str) -> Result<()> {
        let lock = self.collection(collection)?;
        let mut guard = lock.write().expect("vector lock poisoned");
        guard.clear()
    }

    pub fn status(&self) -> Vec<CollectionStatus> {
        let mut statuses: Vec<CollectionStatus> = self
            .collections
            .iter()
            .map(|(name, lock)| {
                let guard = lock.read().expect("vector lock poisoned");
                CollectionStatus {
                    name: name.clone(),
                    entries: guard.len(),
                    dim: guard.dim(),
                    writable: !guard.is_frozen(),
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_standard_collections() {
        let temp_dir = TempDir::new().unwrap();
        let store = VectorStore::open(temp_dir.path()).unwrap();

        assert_eq!(store.count(CODE_COLLECTION).unwrap(), 0);
        assert_eq!(store.count(MEMORY_COLLECTION).unwrap(), 0);
        assert!(store.count("nope").is_err());
    }

    #[test]
    fn test_dimension_change_requires_rebuild() {
        let temp_dir = TempDir::new().unwrap();

        // Populate with a d=3 provider
        {
            let store = VectorStore::open(temp_dir.path()).unwrap();
            store
                .upsert(MEMORY_COLLECTION, "m1", vec![1.0, 0.0, 0.0], serde_json::json!({}))
                .unwrap();
        }

        // Restart with a d=4 provider
        let store = VectorStore::open(temp_dir.path()).unwrap();
        let frozen = store.check_dims(4);
        assert_eq!(frozen, vec![MEMORY_COLLECTION.to_string()]);

        // Reads succeed, writes are refused
        assert_eq!(
            store
                .query(MEMORY_COLLECTION, &[1.0, 0.0, 0.0], 5, None)
                .unwrap()
                .len(),
            1
        );
        assert!(
            store
                .upsert(MEMORY_COLLECTION, "m2", vec![1.0, 0.0, 0.0, 0.0], serde_json::json!({}))
                .is_err()
        );

        // Operator rebuild: clear, then writes at the new dimensionality work
        store.clear(MEMORY_COLLECTION).unwrap();
        store
            .upsert(MEMORY_COLLECTION, "m2", vec![1.0, 0.0, 0.0, 0.0], serde_json::json!({}))
            .unwrap();
        let status = store.status();
        let memory = status.iter().find(|s| s.name == MEMORY_COLLECTION).unwrap();
        assert_eq!(memory.dim, Some(4));
        assert!(memory.writable);
    }
}
