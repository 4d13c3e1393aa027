use std::sync::Arc;

use chrono::Utc;
use oak_hooks::{HookKind, decode_event, fingerprint};
use oak_store::NewActivity;
use oak_types::{
    ConfidenceLevel, EventContext, HookEvent, SessionSource, SessionStatus, ToolActivity, excerpt,
};
use serde::Serialize;

use crate::retrieval::SearchType;
use crate::{Engine, Result, build_injection};

/// Per-session in-memory state. One slot per live session id; every
/// transition for that session runs under the slot's lock, which is what
/// serializes transitions and enforces at-most-one-active-batch.
#[derive(Debug, Default)]
pub struct SessionSlot {
    /// Activities buffered since the last flush
    buffer: Vec<NewActivity>,
    /// Cached id of the session's active batch, if known
    active_batch: Option<i64>,
}

/// Envelope every hook endpoint answers with. Errors never surface as
/// failures to the agent: `status` is always "ok" and problems ride in
/// `detail`.
#[derive(Debug, Clone, Serialize)]
pub struct HookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injected_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_batch_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Default for HookResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            session_id: None,
            injected_context: None,
            prompt_batch_id: None,
            detail: None,
        }
    }
}

impl HookResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    fn with_session(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            ..Default::default()
        }
    }

    fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "status": "ok" }))
    }
}

/// Entry point for every hook delivery: decode, dedupe, apply, cache.
/// Always answers an ok envelope; malformed input and internal errors
/// degrade to empty context because the agent must never be blocked.
pub async fn handle_hook(
    engine: &Arc<Engine>,
    kind: HookKind,
    body: &serde_json::Value,
) -> serde_json::Value {
    let (context, event) = match decode_event(kind, body, &engine.config.limits) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::warn!(error = %err, "dropping malformed hook payload");
            return HookResponse::ok().to_value();
        }
    };

    let slot = engine.session_slot(&context.session_id);
    let mut slot = slot.lock().await;

    // The stop fingerprint is keyed by the open batch so a stop after a
    // new prompt is not mistaken for a duplicate.
    let active_batch_id = match &event {
        HookEvent::Stop => cached_or_stored_active_batch(engine, &context.session_id, &slot),
        _ => None,
    };
    let fp = fingerprint(&context.session_id, &context.agent, &event, active_batch_id);

    if let Some(cached) = engine
        .dedupe
        .lock()
        .expect("dedupe lock poisoned")
        .hit(&fp)
    {
        tracing::debug!(
            session_id = %context.session_id,
            event = event.name(),
            "duplicate delivery replayed from cache"
        );
        return cached;
    }

    let response = match apply_event(engine, &context, &event, &mut slot).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                session_id = %context.session_id,
                event = event.name(),
                error = %err,
                "hook processing degraded"
            );
            let mut response = HookResponse::with_session(&context.session_id);
            response.detail = Some(err.to_string());
            response
        }
    };

    let value = response.to_value();
    engine
        .dedupe
        .lock()
        .expect("dedupe lock poisoned")
        .record(fp, value.clone());
    value
}

async fn apply_event(
    engine: &Arc<Engine>,
    context: &EventContext,
    event: &HookEvent,
    slot: &mut SessionSlot,
) -> Result<HookResponse> {
    match event {
        HookEvent::SessionStart { source } => on_session_start(engine, context, *source).await,
        HookEvent::PromptSubmit {
            prompt,
            generation_id,
        } => on_prompt_submit(engine, context, slot, prompt, generation_id).await,
        HookEvent::PostToolUse { tool } => {
            on_post_tool_use(engine, context, slot, tool, true, None).await
        }
        HookEvent::PostToolUseFailure {
            tool,
            error_message,
        } => on_post_tool_use(engine, context, slot, tool, false, Some(error_message)).await,
        HookEvent::Stop => on_stop(engine, context, slot),
        HookEvent::SessionEnd => on_session_end(engine, context, slot),
        HookEvent::SubagentStart { subagent_id } => {
            record_marker(engine, context, slot, "subagent-start", Some(subagent_id))
        }
        HookEvent::SubagentStop { subagent_id } => {
            record_marker(engine, context, slot, "subagent-stop", Some(subagent_id))
        }
        HookEvent::PreCompact => record_marker(engine, context, slot, "pre-compact", None),
        HookEvent::Notify {
            last_assistant_message,
            ..
        } => record_marker(
            engine,
            context,
            slot,
            "notify",
            last_assistant_message.as_deref().map(|m| excerpt(m, 200)),
        ),
    }
}

async fn on_session_start(
    engine: &Arc<Engine>,
    context: &EventContext,
    source: SessionSource,
) -> Result<HookResponse> {
    ensure_session_for_start(engine, context, source)?;

    let mut response = HookResponse::with_session(&context.session_id);

    // Resumed or compacted sessions already carry their context
    if source.is_fresh() {
        let result = engine
            .retrieve(
                "important gotchas decisions bugs",
                SearchType::All,
                None,
                Some(ConfidenceLevel::High),
            )
            .await;
        // Fresh starts always get at least the index-status header
        let injection = build_injection(&result, &engine.index_status(), false)
            .unwrap_or_else(|| format!("[oak] {}\n", engine.index_status()));
        response.injected_context = Some(injection);
    }

    Ok(response)
}

async fn on_prompt_submit(
    engine: &Arc<Engine>,
    context: &EventContext,
    slot: &mut SessionSlot,
    prompt: &str,
    generation_id: &str,
) -> Result<HookResponse> {
    ensure_session(engine, context)?;
    engine.flush_slot(context, slot)?;

    let now = Utc::now();
    let plan = referenced_plan(prompt);
    let batch_id = {
        let db = engine.db.lock().expect("db lock poisoned");
        let closed = db.close_active_batches_for_session(&context.session_id, now)?;
        if !closed.is_empty() {
            tracing::debug!(
                session_id = %context.session_id,
                batches = ?closed,
                "closed prior batches for new prompt"
            );
        }

        let prompt_source = if plan.is_some() {
            oak_types::PromptSource::Plan
        } else {
            oak_types::PromptSource::User
        };
        let batch_id = db.open_batch(
            &context.session_id,
            prompt,
            prompt_source,
            Some(generation_id),
            now,
        )?;
        if let Some(content) = &plan {
            db.set_batch_plan(batch_id, content)?;
        }
        db.touch_session(&context.session_id, now)?;
        batch_id
    };
    slot.active_batch = Some(batch_id);
    engine.notify_work();

    let result = engine
        .retrieve(prompt, SearchType::All, None, Some(ConfidenceLevel::High))
        .await;

    let mut response = HookResponse::with_session(&context.session_id);
    response.prompt_batch_id = Some(batch_id);
    response.injected_context = build_injection(&result, &engine.index_status(), true);
    Ok(response)
}

async fn on_post_tool_use(
    engine: &Arc<Engine>,
    context: &EventContext,
    slot: &mut SessionSlot,
    tool: &ToolActivity,
    success: bool,
    error_message: Option<&str>,
) -> Result<HookResponse> {
    ensure_session(engine, context)?;
    let now = Utc::now();

    let batch_id = cached_or_stored_active_batch(engine, &context.session_id, slot);
    slot.active_batch = batch_id;

    slot.buffer.push(NewActivity {
        session_id: context.session_id.clone(),
        batch_id,
        tool_name: tool.tool_name.clone(),
        tool_use_id: Some(tool.tool_use_id.clone()),
        tool_input: Some(tool.tool_input.clone()),
        tool_output: Some(tool.tool_output.clone()),
        file_path: tool.file_path.clone(),
        success,
        error_message: error_message.map(str::to_string),
        created_at: now,
    });

    {
        let db = engine.db.lock().expect("db lock poisoned");
        db.touch_session(&context.session_id, now)?;

        if let (Some(plan), Some(batch_id)) = (&tool.plan_write, batch_id) {
            db.set_batch_plan(batch_id, &plan.content)?;
            tracing::info!(
                session_id = %context.session_id,
                plan_path = %plan.plan_path,
                "batch reclassified as plan"
            );
        }
    }

    if slot.buffer.len() >= engine.config.flush_threshold {
        engine.flush_slot(context, slot)?;
    }

    let mut response = HookResponse::with_session(&context.session_id);

    // File-touching tools get file-scoped context back; failures don't
    if success && tool.file_path.is_some() {
        let query = file_scoped_query(engine, slot, tool);
        let result = engine
            .retrieve(
                &query,
                SearchType::Memory,
                tool.file_path.as_deref(),
                Some(ConfidenceLevel::Medium),
            )
            .await;
        response.injected_context = build_injection(&result, &engine.index_status(), false);
    }

    Ok(response)
}

/// The rich file-scoped query: file path, output excerpt and the
/// originating prompt together retrieve materially better than the path
/// alone.
fn file_scoped_query(engine: &Engine, slot: &SessionSlot, tool: &ToolActivity) -> String {
    let prompt_excerpt = slot
        .active_batch
        .and_then(|batch_id| {
            let db = engine.db.lock().expect("db lock poisoned");
            db.get_batch(batch_id).ok().flatten()
        })
        .map(|batch| excerpt(&batch.prompt_text, 200).to_string())
        .unwrap_or_default();
    format!(
        "{} {} {}",
        tool.file_path.as_deref().unwrap_or(""),
        excerpt(&tool.tool_output, 200),
        prompt_excerpt
    )
    .trim()
    .to_string()
}

fn on_stop(
    engine: &Arc<Engine>,
    context: &EventContext,
    slot: &mut SessionSlot,
) -> Result<HookResponse> {
    ensure_session(engine, context)?;
    engine.flush_slot(context, slot)?;

    let now = Utc::now();
    {
        let db = engine.db.lock().expect("db lock poisoned");
        let closed = db.close_active_batches_for_session(&context.session_id, now)?;
        db.touch_session(&context.session_id, now)?;
        if !closed.is_empty() {
            tracing::debug!(
                session_id = %context.session_id,
                batches = ?closed,
                "batches closed on stop"
            );
        }
    }
    slot.active_batch = None;
    engine.notify_work();

    Ok(HookResponse::with_session(&context.session_id))
}

fn on_session_end(
    engine: &Arc<Engine>,
    context: &EventContext,
    slot: &mut SessionSlot,
) -> Result<HookResponse> {
    ensure_session(engine, context)?;
    engine.flush_slot(context, slot)?;

    let now = Utc::now();
    let had_activity = {
        let db = engine.db.lock().expect("db lock poisoned");
        db.close_active_batches_for_session(&context.session_id, now)?;
        db.complete_session(&context.session_id, now)?;
        !db.activities_for_session(&context.session_id)?.is_empty()
    };
    slot.active_batch = None;
    engine.notify_work();

    // The session summary runs off the request path; observation
    // persistence goes through the normal dual-store write.
    if had_activity {
        let engine = Arc::clone(engine);
        let session_id = context.session_id.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.store_session_summary(&session_id).await {
                tracing::warn!(session_id = %session_id, error = %err, "session summary failed");
            }
        });
    }

    tracing::info!(session_id = %context.session_id, "session completed");
    Ok(HookResponse::with_session(&context.session_id))
}

fn record_marker(
    engine: &Arc<Engine>,
    context: &EventContext,
    slot: &mut SessionSlot,
    marker: &str,
    note: Option<&str>,
) -> Result<HookResponse> {
    ensure_session(engine, context)?;
    let now = Utc::now();

    slot.buffer.push(NewActivity {
        session_id: context.session_id.clone(),
        batch_id: cached_or_stored_active_batch(engine, &context.session_id, slot),
        tool_name: marker.to_string(),
        tool_use_id: None,
        tool_input: None,
        tool_output: note.map(str::to_string),
        file_path: None,
        success: true,
        error_message: None,
        created_at: now,
    });

    {
        let db = engine.db.lock().expect("db lock poisoned");
        db.touch_session(&context.session_id, now)?;
    }

    if slot.buffer.len() >= engine.config.flush_threshold {
        engine.flush_slot(context, slot)?;
    }
    Ok(HookResponse::with_session(&context.session_id))
}

fn create_session_row(
    db: &oak_store::Database,
    context: &EventContext,
    source: SessionSource,
    now: chrono::DateTime<Utc>,
) -> Result<()> {
    db.insert_session(&oak_store::SessionRecord {
        id: context.session_id.clone(),
        agent_label: context.agent.clone(),
        source,
        status: SessionStatus::Active,
        created_at: now,
        last_activity_at: now,
        ended_at: None,
        tool_count: 0,
        files_touched: 0,
        error_count: 0,
    })?;
    tracing::info!(session_id = %context.session_id, agent = %context.agent, "session created");
    Ok(())
}

/// Session-start handling of the session row: create it, reactivate a
/// completed one, and let a dual-hook re-delivery's newer agent label win.
/// Only session-start may mutate an existing row this way.
fn ensure_session_for_start(
    engine: &Engine,
    context: &EventContext,
    source: SessionSource,
) -> Result<()> {
    let now = Utc::now();
    let db = engine.db.lock().expect("db lock poisoned");
    match db.get_session(&context.session_id)? {
        None => create_session_row(&db, context, source, now)?,
        Some(existing) => {
            if existing.status == SessionStatus::Completed {
                db.reactivate_session(&context.session_id, source, now)?;
                tracing::info!(session_id = %context.session_id, "session reactivated");
            }
            if existing.agent_label != context.agent {
                db.update_agent_label(&context.session_id, &context.agent)?;
            }
        }
    }
    Ok(())
}

/// Every other event only needs the row to exist. An existing row is left
/// untouched: a stray marker or tool event on a completed session must not
/// resurrect it or rewrite its label.
fn ensure_session(engine: &Engine, context: &EventContext) -> Result<()> {
    let now = Utc::now();
    let db = engine.db.lock().expect("db lock poisoned");
    if db.get_session(&context.session_id)?.is_none() {
        create_session_row(&db, context, SessionSource::Startup, now)?;
    }
    Ok(())
}

fn cached_or_stored_active_batch(
    engine: &Engine,
    session_id: &str,
    slot: &SessionSlot,
) -> Option<i64> {
    if slot.active_batch.is_some() {
        return slot.active_batch;
    }
    let db = engine.db.lock().expect("db lock poisoned");
    db.active_batch_for_session(session_id)
        .ok()
        .flatten()
        .map(|batch| batch.id)
}

impl Engine {
    pub(crate) fn session_slot(&self, session_id: &str) -> Arc<tokio::sync::Mutex<SessionSlot>> {
        let mut sessions = self.sessions.lock().expect("sessions lock poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(SessionSlot::default())))
            .clone()
    }

    /// Drain the slot's buffer through the bulk insert path. Duplicate
    /// tool_use_ids that slipped past the dedupe window die on the unique
    /// index; the rest of the flush is retried row by row.
    pub(crate) fn flush_slot(&self, context: &EventContext, slot: &mut SessionSlot) -> Result<()> {
        if slot.buffer.is_empty() {
            return Ok(());
        }
        let batch: Vec<NewActivity> = slot.buffer.drain(..).collect();
        let mut db = self.db.lock().expect("db lock poisoned");
        match db.insert_activities(&batch) {
            Ok(ids) => {
                tracing::debug!(
                    session_id = %context.session_id,
                    count = ids.len(),
                    "activity buffer flushed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %context.session_id,
                    error = %err,
                    "bulk flush failed; retrying rows individually"
                );
                for activity in &batch {
                    if let Err(row_err) = db.insert_activity(activity) {
                        tracing::warn!(
                            tool_use_id = ?activity.tool_use_id,
                            error = %row_err,
                            "activity dropped"
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// Recovery-pass flush: drain every live session's buffer so nothing
    /// sits in memory longer than one recovery interval.
    pub async fn flush_all_buffers(&self) {
        let slots: Vec<(String, Arc<tokio::sync::Mutex<SessionSlot>>)> = {
            let sessions = self.sessions.lock().expect("sessions lock poisoned");
            sessions
                .iter()
                .map(|(id, slot)| (id.clone(), slot.clone()))
                .collect()
        };
        for (session_id, slot) in slots {
            let mut slot = slot.lock().await;
            let context = EventContext {
                agent: String::new(),
                session_id,
                hook_origin: None,
            };
            if let Err(err) = self.flush_slot(&context, &mut slot) {
                tracing::warn!(session_id = %context.session_id, error = %err, "recovery flush failed");
            }
        }
    }

    pub(crate) fn index_status(&self) -> String {
        let code = self.vectors.count(oak_vector::CODE_COLLECTION).unwrap_or(0);
        let memories = self
            .vectors
            .count(oak_vector::MEMORY_COLLECTION)
            .unwrap_or(0);
        format!("index: {} code chunks, {} memories", code, memories)
    }
}

/// A prompt that names a plan file pulls that plan's content into the
/// batch. The file is read from the project tree; a missing file just
/// means no attachment.
fn referenced_plan(prompt: &str) -> Option<String> {
    let token = prompt
        .split_whitespace()
        .find(|token| oak_hooks::is_plan_path(token))?;
    let path = token.trim_matches(|c: char| "\"'`,;:()".contains(c));
    std::fs::read_to_string(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_omits_empty_fields() {
        let response = HookResponse::ok();
        let value = response.to_value();
        assert_eq!(value, serde_json::json!({ "status": "ok" }));
    }

    #[test]
    fn test_referenced_plan_missing_file_is_none() {
        assert!(referenced_plan("follow .claude/plans/does-not-exist.md").is_none());
        assert!(referenced_plan("no plan here").is_none());
    }
}
