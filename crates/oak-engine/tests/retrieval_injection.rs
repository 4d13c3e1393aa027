mod common;

use common::default_engine;
use oak_engine::{SearchType, handle_hook};
use oak_hooks::HookKind;
use oak_store::NewObservation;
use oak_types::{ConfidenceLevel, MemoryType};
use tempfile::TempDir;

#[tokio::test]
async fn test_file_aware_retrieval_injects_matching_observation() {
    let dir = TempDir::new().unwrap();
    let engine = default_engine(dir.path());

    // Observations need a session to hang off
    handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "S1", "source": "startup"}),
    )
    .await;

    engine
        .persist_observation(NewObservation {
            session_id: "S1".to_string(),
            batch_id: None,
            memory_type: MemoryType::Gotcha,
            observation_text: "auth module requires Redis".to_string(),
            tags: vec!["auth".to_string()],
            file_path: Some("src/auth.py".to_string()),
            confidence: 0.9,
        })
        .await
        .unwrap();

    let response = handle_hook(
        &engine,
        HookKind::PostToolUse,
        &serde_json::json!({
            "agent": "claude",
            "session_id": "S1",
            "tool_use_id": "t1",
            "tool_name": "Read",
            "tool_input": {"file_path": "src/auth.py"},
            "tool_output": "def authenticate(): ..."
        }),
    )
    .await;

    let injected = response["injected_context"]
        .as_str()
        .expect("file-touching read gets context back");
    assert!(injected.contains("auth module requires Redis"));
    assert!(injected.contains("src/auth.py"));
}

#[tokio::test]
async fn test_archived_observations_filtered_lazily() {
    let dir = TempDir::new().unwrap();
    let engine = default_engine(dir.path());

    handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "S1", "source": "startup"}),
    )
    .await;

    let row = engine
        .persist_observation(NewObservation {
            session_id: "S1".to_string(),
            batch_id: None,
            memory_type: MemoryType::Decision,
            observation_text: "we chose sqlite for the activity log".to_string(),
            tags: vec![],
            file_path: None,
            confidence: 1.0,
        })
        .await
        .unwrap();

    // Archive the row; the vector entry stays (lazy cascade) but
    // retrieval must not surface it
    engine.db().lock().unwrap().archive_observation(&row.id).unwrap();
    assert_eq!(
        engine
            .vectors()
            .count(oak_vector::MEMORY_COLLECTION)
            .unwrap(),
        1
    );

    let result = engine
        .retrieve("sqlite activity log", SearchType::Memory, None, None)
        .await;
    assert!(result.memories.is_empty());
}

#[tokio::test]
async fn test_prompt_submit_uses_high_confidence_only() {
    let dir = TempDir::new().unwrap();
    let engine = default_engine(dir.path());

    handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "S1", "source": "startup"}),
    )
    .await;

    // Eight observations: after quartile grading only the top two can be
    // high; a prompt-submit injection may carry at most those
    for i in 0..8 {
        engine
            .persist_observation(NewObservation {
                session_id: "S1".to_string(),
                batch_id: None,
                memory_type: MemoryType::Discovery,
                observation_text: format!("note number {} about various modules", i),
                tags: vec![],
                file_path: None,
                confidence: 1.0,
            })
            .await
            .unwrap();
    }

    let result = engine
        .retrieve(
            "note number 3 about various modules",
            SearchType::Memory,
            None,
            Some(ConfidenceLevel::High),
        )
        .await;

    assert!(!result.memories.is_empty());
    assert!(
        result
            .memories
            .iter()
            .all(|m| m.confidence == ConfidenceLevel::High)
    );
    assert!(result.memories.len() <= 2);
}

#[tokio::test]
async fn test_session_start_injection_lists_recent_summaries() {
    let dir = TempDir::new().unwrap();
    let engine = default_engine(dir.path());

    handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "OLD", "source": "startup"}),
    )
    .await;
    engine
        .persist_observation(NewObservation {
            session_id: "OLD".to_string(),
            batch_id: None,
            memory_type: MemoryType::SessionSummary,
            observation_text: "previously: implemented the login flow".to_string(),
            tags: vec![],
            file_path: None,
            confidence: 1.0,
        })
        .await
        .unwrap();

    let response = handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "NEW", "source": "startup"}),
    )
    .await;

    let injected = response["injected_context"].as_str().unwrap();
    assert!(injected.contains("Recent sessions:"));
    assert!(injected.contains("implemented the login flow"));
}

#[tokio::test]
async fn test_resume_session_start_injects_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = default_engine(dir.path());

    let response = handle_hook(
        &engine,
        HookKind::SessionStart,
        &serde_json::json!({"agent": "claude", "session_id": "S1", "source": "resume"}),
    )
    .await;

    assert_eq!(response["status"], "ok");
    assert!(response.get("injected_context").is_none());
}
