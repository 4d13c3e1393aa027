use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use oak_engine::Engine;
use serde::Serialize;

use crate::config::RecoveryConfig;
use crate::Result;

/// What one recovery pass did; surfaced in logs and /api/status
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryReport {
    pub stuck_batches_closed: usize,
    pub stale_sessions_closed: usize,
    pub orphans_attached: usize,
    pub batches_processed: usize,
    pub embeddings_repaired: usize,
}

/// One recovery pass: stuck batches, then stale sessions, then orphans,
/// then the processing pump, embedding repair and count reconciliation.
/// `now` is injected so tests can move the clock.
pub async fn run_recovery_pass(
    engine: &Arc<Engine>,
    config: &RecoveryConfig,
    now: DateTime<Utc>,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    // Buffered activities land first so the staleness checks see them
    engine.flush_all_buffers().await;

    // Stuck batches: active with no activity past the cutoff
    {
        let batch_cutoff = now - chrono::Duration::seconds(config.batch_stale_secs);
        let db = engine.db().lock().expect("db lock poisoned");
        for batch in db.stale_active_batches(batch_cutoff)? {
            db.close_batch(batch.id, now)?;
            report.stuck_batches_closed += 1;
            tracing::info!(batch_id = batch.id, session_id = %batch.session_id, "stuck batch completed");
        }
    }

    // Stale sessions: completing one also closes whatever batch it left open
    {
        let session_cutoff = now - chrono::Duration::seconds(config.session_stale_secs);
        let db = engine.db().lock().expect("db lock poisoned");
        for session_id in db.stale_active_sessions(session_cutoff)? {
            let closed = db.close_active_batches_for_session(&session_id, now)?;
            db.complete_session(&session_id, now)?;
            report.stale_sessions_closed += 1;
            report.stuck_batches_closed += closed.len();
            tracing::info!(session_id = %session_id, "stale session completed");
        }
    }

    // Orphaned activities: attach to the session's most recent batch, or
    // synthesize a recovery batch to hold them
    {
        let db = engine.db().lock().expect("db lock poisoned");
        let orphans = db.orphaned_activities()?;
        let mut by_session: std::collections::HashMap<String, Vec<i64>> = Default::default();
        for orphan in orphans {
            by_session.entry(orphan.session_id).or_default().push(orphan.id);
        }
        for (session_id, activity_ids) in by_session {
            let batch_id = match db.latest_batch_for_session(&session_id)? {
                Some(batch_id) => batch_id,
                None => {
                    let batch_id = db.open_batch(
                        &session_id,
                        "(recovered activities)",
                        oak_types::PromptSource::Internal,
                        None,
                        now,
                    )?;
                    db.close_batch(batch_id, now)?;
                    batch_id
                }
            };
            db.attach_activities_to_batch(&activity_ids, batch_id)?;
            report.orphans_attached += activity_ids.len();
            tracing::info!(
                session_id = %session_id,
                batch_id,
                count = activity_ids.len(),
                "orphaned activities re-attached"
            );
        }
    }

    // Processing pump and embedding repair
    report.batches_processed = engine.process_pending().await?;
    report.embeddings_repaired = engine.repair_embeddings().await?;

    // Cheap opportunistic reconciliation; logs, never rebuilds
    engine.reconcile_counts()?;

    Ok(report)
}

/// The timer task the scheduler owns: a pass every `interval_secs` until
/// shutdown, regardless of traffic.
pub async fn run_recovery_loop(
    engine: Arc<Engine>,
    config: RecoveryConfig,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(Duration::from_secs(config.interval_secs.max(1)));
    timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                match run_recovery_pass(&engine, &config, Utc::now()).await {
                    Ok(report) => {
                        if report.stuck_batches_closed > 0
                            || report.stale_sessions_closed > 0
                            || report.orphans_attached > 0
                            || report.batches_processed > 0
                            || report.embeddings_repaired > 0
                        {
                            tracing::info!(?report, "recovery pass");
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "recovery pass failed"),
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
