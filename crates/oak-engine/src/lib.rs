// Ingestion-to-memory core: dedup, session/batch state machine, batch
// processor with the dual-store write, retrieval and injection.

mod dedupe;
mod error;
mod injection;
mod ops;
mod pipeline;
mod processor;
mod retrieval;

use std::sync::{Arc, Mutex};

use oak_model::{Embedder, Summarizer};
use oak_store::Database;
use oak_vector::VectorStore;
use tokio::sync::Notify;

pub use dedupe::DedupeCache;
pub use error::{Error, Result};
pub use injection::build_injection;
pub use ops::CodeChunk;
pub use pipeline::{HookResponse, SessionSlot, handle_hook};
pub use processor::run_processor_worker;
pub use retrieval::{RetrievalResult, RetrievedItem, SearchType, SessionDigest};

/// Engine-level tunables; the runtime fills these from DaemonConfig.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub limits: oak_hooks::HookLimits,
    pub flush_threshold: usize,
    pub dedup_capacity: usize,
    pub confidence_floor: f64,
    pub max_attempts: i64,
    pub max_code_chunks: usize,
    pub max_code_lines: usize,
    pub max_memories: usize,
    pub max_session_summaries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: oak_hooks::HookLimits::default(),
            flush_threshold: 10,
            dedup_capacity: 1000,
            confidence_floor: 0.7,
            max_attempts: 3,
            max_code_chunks: 3,
            max_code_lines: 50,
            max_memories: 10,
            max_session_summaries: 5,
        }
    }
}

/// Shared engine state: every HTTP worker, processor worker and recovery
/// pass holds an `Arc<Engine>`. Built once at the composition root; tests
/// stand up their own with in-memory stores and mock providers.
pub struct Engine {
    pub(crate) db: Arc<Mutex<Database>>,
    pub(crate) vectors: Arc<VectorStore>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) summarizer: Arc<dyn Summarizer>,
    pub(crate) config: EngineConfig,
    pub(crate) dedupe: Mutex<DedupeCache>,
    pub(crate) sessions: Mutex<std::collections::HashMap<String, Arc<tokio::sync::Mutex<SessionSlot>>>>,
    /// Batch ids currently being processed, so concurrent workers never
    /// double-claim (the dual-store write is idempotent anyway)
    pub(crate) in_flight: Mutex<std::collections::HashSet<i64>>,
    /// Wakes processor workers when a batch is queued
    pub(crate) work_available: Notify,
}

impl Engine {
    pub fn new(
        db: Arc<Mutex<Database>>,
        vectors: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Arc<dyn Summarizer>,
        config: EngineConfig,
    ) -> Self {
        let dedup_capacity = config.dedup_capacity;
        Self {
            db,
            vectors,
            embedder,
            summarizer,
            config,
            dedupe: Mutex::new(DedupeCache::new(dedup_capacity)),
            sessions: Mutex::new(std::collections::HashMap::new()),
            in_flight: Mutex::new(std::collections::HashSet::new()),
            work_available: Notify::new(),
        }
    }

    pub fn db(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    pub fn vectors(&self) -> &Arc<VectorStore> {
        &self.vectors
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Signal processor workers that completed batches are waiting
    pub fn notify_work(&self) {
        self.work_available.notify_waiters();
    }
}
