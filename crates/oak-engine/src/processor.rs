use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oak_model::{SummaryActivity, SummaryRequest, redact};
use oak_store::{BatchRecord, NewObservation, ObservationFilter, ObservationRecord};
use oak_types::{BatchClassification, MemoryType, content_hash, excerpt};
use oak_vector::MEMORY_COLLECTION;

use crate::{Engine, Error, Result};

/// Long-lived processor worker. Pulls completed batches from the store
/// (producers never block on it), sleeps until notified or the poll
/// interval elapses, and exits on the shutdown signal.
pub async fn run_processor_worker(
    engine: Arc<Engine>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = engine.work_available.notified() => {}
            _ = tokio::time::sleep(Duration::from_secs(15)) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }

        match engine.process_pending().await {
            Ok(0) => {}
            Ok(count) => tracing::debug!(count, "batches processed"),
            Err(err) => tracing::warn!(error = %err, "processing pass failed"),
        }
    }
}

impl Engine {
    /// Process every batch in `completed AND NOT processed` (plus
    /// retry-eligible failures). Returns how many batches reached a
    /// terminal state this pass.
    pub async fn process_pending(&self) -> Result<usize> {
        let pending = {
            let db = self.db.lock().expect("db lock poisoned");
            db.batches_pending_processing(self.config.max_attempts)?
        };

        let mut done = 0;
        for batch in pending {
            {
                let mut in_flight = self.in_flight.lock().expect("in_flight lock poisoned");
                if !in_flight.insert(batch.id) {
                    continue;
                }
            }
            let outcome = self.process_batch(&batch).await;
            self.in_flight
                .lock()
                .expect("in_flight lock poisoned")
                .remove(&batch.id);

            match outcome {
                Ok(true) => done += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(batch_id = batch.id, error = %err, "batch processing error");
                }
            }
        }
        Ok(done)
    }

    /// One batch through the dual-store write. Returns Ok(true) when the
    /// batch reached `processed`, Ok(false) when it stays queued for a
    /// later retry (transient provider failure).
    async fn process_batch(&self, batch: &BatchRecord) -> Result<bool> {
        let (activities, session) = {
            let db = self.db.lock().expect("db lock poisoned");
            (
                db.activities_for_batch(batch.id)?,
                db.get_session(&batch.session_id)?,
            )
        };

        let request = SummaryRequest {
            session_id: batch.session_id.clone(),
            agent_label: session.map(|s| s.agent_label).unwrap_or_default(),
            prompt_text: batch.prompt_text.clone(),
            is_session_end: false,
            activities: activities
                .iter()
                .map(|activity| SummaryActivity {
                    tool_name: activity.tool_name.clone(),
                    file_path: activity.file_path.clone(),
                    output_excerpt: excerpt(
                        activity.tool_output.as_deref().unwrap_or(""),
                        200,
                    )
                    .to_string(),
                    success: activity.success,
                })
                .collect(),
        };

        let summary = match self.summarizer.summarize(&request).await {
            Ok(summary) => summary,
            Err(oak_model::Error::MalformedResponse(reason)) => {
                // Counts against the attempt budget; terminal once the
                // recovery loop has exhausted retries
                let db = self.db.lock().expect("db lock poisoned");
                db.mark_batch_failed(batch.id, &reason)?;
                tracing::warn!(batch_id = batch.id, reason = %reason, "summarizer response unparseable");
                return Ok(false);
            }
            Err(err) => {
                // Transient: batch stays completed, recovery retries
                tracing::debug!(batch_id = batch.id, error = %err, "summarizer unavailable; will retry");
                return Ok(false);
            }
        };

        // Replay safety: observations already derived from this batch are
        // matched by content hash so re-runs neither duplicate rows nor
        // re-embed unchanged text.
        let existing: HashMap<String, ObservationRecord> = {
            let db = self.db.lock().expect("db lock poisoned");
            db.list_observations(
                &ObservationFilter {
                    batch_id: Some(batch.id),
                    include_archived: true,
                    ..Default::default()
                },
                500,
                0,
            )?
            .into_iter()
            .map(|row| (row.content_hash.clone(), row))
            .collect()
        };

        for extracted in &summary.observations {
            if extracted.confidence < self.config.confidence_floor {
                continue;
            }
            let text = redact(&extracted.observation_text);
            let hash = content_hash(&text);

            let row = match existing.get(&hash) {
                Some(row) if row.embedded => continue,
                Some(row) => row.clone(),
                None => {
                    let memory_type = MemoryType::parse(&extracted.memory_type)
                        .unwrap_or(MemoryType::Discovery);
                    let db = self.db.lock().expect("db lock poisoned");
                    db.insert_observation(
                        &NewObservation {
                            session_id: batch.session_id.clone(),
                            batch_id: Some(batch.id),
                            memory_type,
                            observation_text: text,
                            tags: extracted.tags.clone(),
                            file_path: extracted.file_path.clone(),
                            confidence: extracted.confidence,
                        },
                        Utc::now(),
                    )?
                }
            };

            // Steps 3c-3e: crash-safe because the row above is durable
            // with embedded=false and the vector upsert is idempotent
            if let Err(err) = self.embed_observation(&row).await {
                tracing::warn!(observation_id = %row.id, error = %err, "embedding deferred to recovery");
            }
        }

        {
            let db = self.db.lock().expect("db lock poisoned");
            if let Some(classification) = BatchClassification::parse(&summary.classification) {
                db.set_batch_classification(batch.id, classification)?;
            }
            if let Some(response_summary) = &summary.response_summary {
                db.set_batch_summary(batch.id, response_summary)?;
            }
            db.mark_batch_processed(batch.id)?;
        }
        tracing::info!(
            batch_id = batch.id,
            session_id = %batch.session_id,
            observations = summary.observations.len(),
            "batch processed"
        );
        Ok(true)
    }

    /// Steps 3c-3e of the dual-store write: embed, upsert by observation
    /// id, then flip the embedded flag. Safe to replay any number of times.
    pub async fn embed_observation(&self, row: &ObservationRecord) -> Result<()> {
        let vectors = self.embedder.embed(&[row.observation_text.clone()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model(oak_model::Error::BadEmbedding("empty batch".into())))?;

        self.vectors.upsert(
            MEMORY_COLLECTION,
            &row.id,
            vector,
            serde_json::json!({
                "memory_type": row.memory_type.as_str(),
                "file_path": row.file_path,
                "session_id": row.session_id,
                "tags": row.tags,
                "preview": excerpt(&row.observation_text, 400),
            }),
        )?;

        let db = self.db.lock().expect("db lock poisoned");
        db.mark_observation_embedded(&row.id)?;
        Ok(())
    }

    /// Manual or summary-driven observation ingestion: redact, insert with
    /// embedded=false (durable commit point), then the vector half.
    pub async fn persist_observation(
        &self,
        mut observation: NewObservation,
    ) -> Result<ObservationRecord> {
        observation.observation_text = redact(&observation.observation_text);
        let row = {
            let db = self.db.lock().expect("db lock poisoned");
            db.insert_observation(&observation, Utc::now())?
        };
        if let Err(err) = self.embed_observation(&row).await {
            tracing::warn!(observation_id = %row.id, error = %err, "embedding deferred to recovery");
        }
        let db = self.db.lock().expect("db lock poisoned");
        Ok(db.get_observation(&row.id)?.unwrap_or(row))
    }

    /// Session-end summary: one summarizer call over the session's
    /// activities, stored as a `session_summary` observation.
    pub async fn store_session_summary(&self, session_id: &str) -> Result<()> {
        let (activities, session, last_prompt) = {
            let db = self.db.lock().expect("db lock poisoned");
            let batches = db.batches_for_session(session_id)?;
            (
                db.activities_for_session(session_id)?,
                db.get_session(session_id)?,
                batches.last().map(|batch| batch.prompt_text.clone()),
            )
        };
        if activities.is_empty() {
            return Ok(());
        }

        let request = SummaryRequest {
            session_id: session_id.to_string(),
            agent_label: session.map(|s| s.agent_label).unwrap_or_default(),
            prompt_text: last_prompt.unwrap_or_default(),
            is_session_end: true,
            activities: activities
                .iter()
                .rev()
                .take(50)
                .map(|activity| SummaryActivity {
                    tool_name: activity.tool_name.clone(),
                    file_path: activity.file_path.clone(),
                    output_excerpt: excerpt(activity.tool_output.as_deref().unwrap_or(""), 120)
                        .to_string(),
                    success: activity.success,
                })
                .collect(),
        };

        let summary = self.summarizer.summarize(&request).await?;
        let text = match summary.response_summary {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(()),
        };

        self.persist_observation(NewObservation {
            session_id: session_id.to_string(),
            batch_id: None,
            memory_type: MemoryType::SessionSummary,
            observation_text: text,
            tags: Vec::new(),
            file_path: None,
            confidence: 1.0,
        })
        .await?;
        Ok(())
    }
}
