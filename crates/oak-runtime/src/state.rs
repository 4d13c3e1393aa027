use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use oak_engine::Engine;
use oak_model::{HttpEmbedder, HttpSummarizer};
use oak_store::Database;
use oak_vector::VectorStore;
use uuid::Uuid;

use crate::config::DaemonConfig;
use crate::{Result, files};

/// Everything the daemon is made of, built once at startup and threaded
/// through constructors. No global lookups: tests assemble their own.
pub struct DaemonState {
    pub config: DaemonConfig,
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub engine: Arc<Engine>,
    /// Per-process bearer token; the dashboard reads it from its meta tag
    pub auth_token: String,
    pub started_at: DateTime<Utc>,
    pub port: u16,
}

impl DaemonState {
    pub fn initialize(
        project_root: &Path,
        data_dir: &Path,
        config: DaemonConfig,
    ) -> Result<Arc<Self>> {
        config.validate()?;
        std::fs::create_dir_all(data_dir)?;

        let db = Database::open(&data_dir.join("oak.db"))?;
        let vectors = VectorStore::open(data_dir)?;

        let embedder = HttpEmbedder::new(
            &config.embedding.base_url,
            &config.embedding.model,
            config.embedding.dim,
            Duration::from_secs(config.embedding.timeout_secs),
        )?;
        let summarizer = HttpSummarizer::new(
            &config.summarizer.base_url,
            &config.summarizer.model,
            Duration::from_secs(config.summarizer.timeout_secs),
        )?;

        // Dimension guard: mismatched collections serve reads but refuse
        // writes until an operator rebuild
        let frozen = vectors.check_dims(config.embedding.dim);
        if !frozen.is_empty() {
            tracing::warn!(
                collections = ?frozen,
                "vector collections frozen for writes; run rebuild after provider change"
            );
        }

        let engine = Arc::new(Engine::new(
            Arc::new(Mutex::new(db)),
            Arc::new(vectors),
            Arc::new(embedder),
            Arc::new(summarizer),
            config.engine_config(),
        ));

        let port = if config.server.port != 0 {
            config.server.port
        } else {
            files::derive_port(project_root)
        };

        Ok(Arc::new(Self {
            config,
            project_root: project_root.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
            engine,
            auth_token: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            port,
        }))
    }

    /// True when `candidate` stays inside the project root after
    /// normalization; backup/restore refuses anything else.
    pub fn contains_path(&self, candidate: &Path) -> bool {
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.project_root.join(candidate)
        };
        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                std::path::Component::ParentDir => {
                    if !normalized.pop() {
                        return false;
                    }
                }
                std::path::Component::CurDir => {}
                other => normalized.push(other.as_os_str()),
            }
        }
        normalized.starts_with(&self.project_root)
    }
}
