mod common;

use std::sync::Arc;

use common::{DownEmbedder, MalformedSummarizer, MockEmbedder, MockSummarizer, build_engine};
use oak_engine::handle_hook;
use oak_hooks::HookKind;
use oak_types::BatchStatus;
use oak_vector::MEMORY_COLLECTION;
use tempfile::TempDir;

async fn seed_completed_batch(engine: &Arc<oak_engine::Engine>, session_id: &str) {
    handle_hook(
        engine,
        HookKind::PromptSubmit,
        &serde_json::json!({
            "agent": "claude",
            "session_id": session_id,
            "generation_id": "g1",
            "prompt": "add login"
        }),
    )
    .await;
    handle_hook(
        engine,
        HookKind::PostToolUse,
        &serde_json::json!({
            "agent": "claude",
            "session_id": session_id,
            "tool_use_id": format!("{}-t1", session_id),
            "tool_name": "Edit",
            "tool_input": {"file_path": "src/login.rs"},
            "tool_output": "done"
        }),
    )
    .await;
    handle_hook(
        engine,
        HookKind::Stop,
        &serde_json::json!({"agent": "claude", "session_id": session_id}),
    )
    .await;
}

#[tokio::test]
async fn test_crash_mid_dual_write_recovers_without_duplicates() {
    let dir = TempDir::new().unwrap();

    // First life of the daemon: summarizer works, embedder is down. The
    // observation row lands durably with embedded=false; the vector half
    // never happens.
    {
        let engine = build_engine(
            dir.path(),
            Arc::new(DownEmbedder),
            Arc::new(MockSummarizer::new()),
        );
        seed_completed_batch(&engine, "S1").await;
        engine.process_pending().await.unwrap();

        let db = engine.db().lock().unwrap();
        let pending = db.observations_pending_embedding().unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].embedded);
        assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 0);
    }

    // Restart with a healthy embedder: recovery re-embeds exactly once
    let engine = build_engine(
        dir.path(),
        Arc::new(MockEmbedder),
        Arc::new(MockSummarizer::new()),
    );
    let repaired = engine.repair_embeddings().await.unwrap();
    assert_eq!(repaired, 1);
    assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 1);

    // A second pass finds nothing to do and creates no duplicates
    let repaired_again = engine.repair_embeddings().await.unwrap();
    assert_eq!(repaired_again, 0);
    assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 1);

    let db = engine.db().lock().unwrap();
    let pending = db.observations_pending_embedding().unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_reprocessing_same_batch_does_not_duplicate_observations() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(
        dir.path(),
        Arc::new(MockEmbedder),
        Arc::new(MockSummarizer::new()),
    );
    seed_completed_batch(&engine, "S1").await;

    engine.process_pending().await.unwrap();

    // Force the batch back to completed, as reset-processing would
    {
        let db = engine.db().lock().unwrap();
        let batch = db.batches_for_session("S1").unwrap().remove(0);
        assert_eq!(batch.status, BatchStatus::Processed);
    }
    engine.db().lock().unwrap().reset_processing(false).unwrap();

    engine.process_pending().await.unwrap();

    let db = engine.db().lock().unwrap();
    let observations = db.list_observations(&Default::default(), 50, 0).unwrap();
    // Content hash matched the earlier row; no duplicate was inserted
    assert_eq!(observations.len(), 1);
    assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 1);
}

#[tokio::test]
async fn test_malformed_summary_fails_batch_until_attempts_exhausted() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(
        dir.path(),
        Arc::new(MockEmbedder),
        Arc::new(MalformedSummarizer),
    );
    seed_completed_batch(&engine, "S1").await;

    // Each pass burns one attempt; default ceiling is 3
    for attempt in 1..=3 {
        engine.process_pending().await.unwrap();
        let db = engine.db().lock().unwrap();
        let batch = db.batches_for_session("S1").unwrap().remove(0);
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.fail_count, attempt);
        assert!(batch.fail_reason.is_some());
    }

    // Terminally failed: no longer pending
    let pending = {
        let db = engine.db().lock().unwrap();
        db.batches_pending_processing(3).unwrap()
    };
    assert!(pending.is_empty());

    // Activities remain queryable even though the batch never summarized
    let db = engine.db().lock().unwrap();
    assert_eq!(db.activities_for_session("S1").unwrap().len(), 1);
}

#[tokio::test]
async fn test_rebuild_memories_round_trip() {
    let dir = TempDir::new().unwrap();
    let engine = build_engine(
        dir.path(),
        Arc::new(MockEmbedder),
        Arc::new(MockSummarizer::new()),
    );
    seed_completed_batch(&engine, "S1").await;
    engine.process_pending().await.unwrap();

    let before = engine.vectors().count(MEMORY_COLLECTION).unwrap();
    assert_eq!(before, 1);

    // Nuke the collection, rebuild from the relational store
    engine.vectors().clear(MEMORY_COLLECTION).unwrap();
    assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 0);

    let rebuilt = engine.rebuild_memories().await.unwrap();
    assert_eq!(rebuilt, 1);
    assert_eq!(engine.vectors().count(MEMORY_COLLECTION).unwrap(), 1);

    // Every observation row has its vector entry back, same id
    let db = engine.db().lock().unwrap();
    for row in db.all_active_observations().unwrap() {
        assert!(engine.vectors().contains(MEMORY_COLLECTION, &row.id).unwrap());
        assert!(db.get_observation(&row.id).unwrap().unwrap().embedded);
    }
}
