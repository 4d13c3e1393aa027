use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, cosine_similarity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

/// One result from a similarity query, ordered by descending score
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Dimensionality of every vector in the collection; fixed by the
    /// first upsert and only reset by `clear`.
    dim: Option<usize>,
    /// BTreeMap keeps snapshots byte-stable across saves
    entries: BTreeMap<String, VectorEntry>,
}

/// A single named collection. Not thread safe on its own; the store wraps
/// each collection in an RwLock.
#[derive(Debug)]
pub struct Collection {
    name: String,
    dir: PathBuf,
    snapshot: Snapshot,
    /// Set when the configured embedder's dimensionality disagrees with the
    /// stored one. Reads keep working; writes fail until rebuild.
    frozen_for_writes: bool,
}

impl Collection {
    pub fn load(name: &str, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let snapshot_path = dir.join("entries.json");
        let snapshot = if snapshot_path.exists() {
            let content = fs::read_to_string(&snapshot_path)?;
            serde_json::from_str(&content)?
        } else {
            Snapshot::default()
        };

        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            snapshot,
            frozen_for_writes: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dim(&self) -> Option<usize> {
        self.snapshot.dim
    }

    pub fn len(&self) -> usize {
        self.snapshot.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.entries.is_empty()
    }

    /// Startup dimensionality guard: a populated collection whose stored
    /// dim disagrees with the provider's freezes writes until rebuild.
    pub fn check_dim(&mut self, provider_dim: usize) -> bool {
        match self.snapshot.dim {
            Some(dim) if dim != provider_dim && !self.snapshot.entries.is_empty() => {
                self.frozen_for_writes = true;
                false
            }
            _ => {
                self.frozen_for_writes = false;
                true
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_for_writes
    }

    /// Idempotent by id: a later upsert for the same id replaces the prior
    /// vector and metadata, so dual-write replays never duplicate.
    pub fn upsert(
        &mut self,
        id: &str,
        vector: Vec<f32>,
        metadata: serde_json::Value,
    ) -> Result<()> {
        if self.frozen_for_writes {
            return Err(Error::DimensionMismatch {
                collection: self.name.clone(),
                expected: self.snapshot.dim.unwrap_or(0),
                got: vector.len(),
            });
        }
        match self.snapshot.dim {
            None => self.snapshot.dim = Some(vector.len()),
            Some(dim) if dim != vector.len() => {
                return Err(Error::DimensionMismatch {
                    collection: self.name.clone(),
                    expected: dim,
                    got: vector.len(),
                });
            }
            Some(_) => {}
        }

        self.snapshot
            .entries
            .insert(id.to_string(), VectorEntry { vector, metadata });
        self.persist()
    }

    pub fn delete(&mut self, id: &str) -> Result<bool> {
        let removed = self.snapshot.entries.remove(id).is_some();
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.snapshot.entries.contains_key(id)
    }

    /// Drop all entries and the dimension tag; the next upsert fixes a new
    /// dimensionality. Used by operator rebuilds.
    pub fn clear(&mut self) -> Result<()> {
        self.snapshot.entries.clear();
        self.snapshot.dim = None;
        self.frozen_for_writes = false;
        self.persist()
    }

    pub fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&dyn Fn(&serde_json::Value) -> bool>,
    ) -> Vec<QueryHit> {
        let mut hits: Vec<QueryHit> = self
            .snapshot
            .entries
            .iter()
            .filter(|(_, entry)| match filter {
                Some(predicate) => predicate(&entry.metadata),
                None => true,
            })
            .map(|(id, entry)| QueryHit {
                id: id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                metadata: entry.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    pub fn get_metadata(&self, id: &str) -> Option<&serde_json::Value> {
        self.snapshot.entries.get(id).map(|entry| &entry.metadata)
    }

    // Snapshot write is atomic: temp file then rename, so a crash mid-save
    // leaves the previous snapshot intact.
    fn persist(&self) -> Result<()> {
        let content = serde_json::to_string(&self.snapshot)?;
        let tmp_path = self.dir.join("entries.json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, self.dir.join("entries.json"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(path: &str) -> serde_json::Value {
        serde_json::json!({ "file_path": path })
    }

    #[test]
    fn test_upsert_fixes_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let mut collection = Collection::load("memory", temp_dir.path()).unwrap();

        collection.upsert("a", vec![1.0, 0.0], meta("x")).unwrap();
        assert_eq!(collection.dim(), Some(2));

        let err = collection.upsert("b", vec![1.0, 0.0, 0.0], meta("y")).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, got: 3, .. }));
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let mut collection = Collection::load("memory", temp_dir.path()).unwrap();

        collection.upsert("a", vec![1.0, 0.0], meta("old")).unwrap();
        collection.upsert("a", vec![0.0, 1.0], meta("new")).unwrap();

        assert_eq!(collection.len(), 1);
        assert_eq!(collection.get_metadata("a").unwrap()["file_path"], "new");
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut collection = Collection::load("memory", temp_dir.path()).unwrap();
            collection.upsert("a", vec![1.0, 0.0], meta("x")).unwrap();
        }
        let collection = Collection::load("memory", temp_dir.path()).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.dim(), Some(2));
    }

    #[test]
    fn test_dim_mismatch_freezes_writes_not_reads() {
        let temp_dir = TempDir::new().unwrap();
        let mut collection = Collection::load("memory", temp_dir.path()).unwrap();
        collection.upsert("a", vec![1.0, 0.0], meta("x")).unwrap();

        // Provider changed from d=2 to d=3
        assert!(!collection.check_dim(3));
        assert!(collection.is_frozen());

        // Reads still work
        assert_eq!(collection.query(&[1.0, 0.0], 5, None).len(), 1);

        // Writes are refused
        assert!(collection.upsert("b", vec![1.0, 0.0, 0.0], meta("y")).is_err());

        // Rebuild clears the freeze and adopts the new dimensionality
        collection.clear().unwrap();
        assert!(collection.check_dim(3));
        collection.upsert("b", vec![1.0, 0.0, 0.0], meta("y")).unwrap();
        assert_eq!(collection.dim(), Some(3));
    }

    #[test]
    fn test_query_orders_by_score_and_filters() {
        let temp_dir = TempDir::new().unwrap();
        let mut collection = Collection::load("memory", temp_dir.path()).unwrap();
        collection.upsert("close", vec![1.0, 0.0], meta("a.rs")).unwrap();
        collection.upsert("far", vec![0.0, 1.0], meta("b.rs")).unwrap();
        collection.upsert("mid", vec![0.7, 0.7], meta("a.rs")).unwrap();

        let hits = collection.query(&[1.0, 0.0], 10, None);
        assert_eq!(hits[0].id, "close");
        assert_eq!(hits[2].id, "far");

        let filter = |metadata: &serde_json::Value| metadata["file_path"] == "a.rs";
        let hits = collection.query(&[1.0, 0.0], 10, Some(&filter));
        assert_eq!(hits.len(), 2);
    }
}
