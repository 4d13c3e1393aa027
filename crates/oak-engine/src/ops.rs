use oak_types::excerpt;
use oak_vector::{CODE_COLLECTION, MEMORY_COLLECTION};
use serde::Deserialize;

use crate::{Engine, Result};

/// One chunk from the external code indexer. The daemon never produces
/// these; it only embeds what the indexer hands over.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub text: String,
    pub file_path: String,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub start_line: Option<i64>,
    #[serde(default)]
    pub end_line: Option<i64>,
}

impl Engine {
    /// Embedding repair: every observation row with `embedded=false` gets
    /// its vector half replayed. Idempotent; recovery runs this each pass.
    pub async fn repair_embeddings(&self) -> Result<usize> {
        let pending = {
            let db = self.db.lock().expect("db lock poisoned");
            db.observations_pending_embedding()?
        };

        let mut repaired = 0;
        for row in pending {
            match self.embed_observation(&row).await {
                Ok(()) => repaired += 1,
                Err(err) => {
                    tracing::debug!(observation_id = %row.id, error = %err, "embedding repair deferred");
                }
            }
        }
        Ok(repaired)
    }

    /// Operator rebuild after an embedding-provider change: drop the
    /// memory collection and re-embed every live observation row.
    pub async fn rebuild_memories(&self) -> Result<usize> {
        self.vectors.clear(MEMORY_COLLECTION)?;

        let rows = {
            let db = self.db.lock().expect("db lock poisoned");
            let rows = db.all_active_observations()?;
            // Flags reflect reality again once each row is re-upserted
            for row in &rows {
                db.set_observation_unembedded(&row.id)?;
            }
            rows
        };

        let mut rebuilt = 0;
        for row in rows {
            self.embed_observation(&row).await?;
            rebuilt += 1;
        }
        tracing::info!(rebuilt, "memory collection rebuilt");
        Ok(rebuilt)
    }

    /// Operator rebuild of the code collection from the indexer's chunks.
    /// Does not touch observations.
    pub async fn rebuild_code_index(&self, chunks: &[CodeChunk]) -> Result<usize> {
        self.vectors.clear(CODE_COLLECTION)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            self.vectors.upsert(
                CODE_COLLECTION,
                &chunk.id,
                vector,
                serde_json::json!({
                    "file_path": chunk.file_path,
                    "doc_type": chunk.doc_type,
                    "symbol": chunk.symbol,
                    "start_line": chunk.start_line,
                    "end_line": chunk.end_line,
                    "preview": excerpt(&chunk.text, 2000),
                }),
            )?;
        }
        tracing::info!(chunks = chunks.len(), "code collection rebuilt");
        Ok(chunks.len())
    }

    /// Opportunistic store/vector reconciliation: large divergence is
    /// logged for diagnosis, never auto-rebuilt.
    pub fn reconcile_counts(&self) -> Result<()> {
        let embedded_rows = {
            let db = self.db.lock().expect("db lock poisoned");
            db.count_embedded_observations()?
        };
        let vector_entries = self.vectors.count(MEMORY_COLLECTION)? as i64;

        let divergence = (embedded_rows - vector_entries).abs();
        if divergence > 10 {
            tracing::warn!(
                embedded_rows,
                vector_entries,
                divergence,
                "relational/vector stores diverge; operator rebuild-memories may be needed"
            );
        }
        Ok(())
    }
}
