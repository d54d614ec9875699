/// Execution pipeline orchestrator.
///
/// Coordinates the full proof-of-action flow:
/// 1. Drive the automation engine against the target page
/// 2. Hash the canonical payload (goal, final URL, timestamp, result)
/// 3. Persist the execution record with its hash
/// 4. Queue the record for on-chain anchoring
///
/// The anchor step is queued, never awaited. The caller gets the record
/// back as soon as it is durable and the chain catches up in the
/// background.
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::{AutomationEngine, RunOutcome};
use crate::error::Result;
use crate::poa;
use crate::state::models::ExecutionRecord;
use crate::state::{NewExecution, RecordStore};
use crate::worker::{AnchorWorker, DispatchOutcome};

/// A recorded run: the persisted record plus the engine's live-view
/// URL, which is handed back to the caller but never stored.
#[derive(Debug)]
pub struct RecordedRun {
    pub record: ExecutionRecord,
    pub streaming_url: Option<String>,
}

/// Run an automation goal, then hash, persist, and queue its proof.
///
/// The hash covers the URL the run ended on, not the one it started
/// from; redirects and in-page navigation are part of what is attested.
pub async fn run_and_record(
    store: &dyn RecordStore,
    engine: &dyn AutomationEngine,
    worker: &AnchorWorker,
    org_id: Uuid,
    goal: &str,
    url: &str,
) -> Result<RecordedRun> {
    info!(org_id = %org_id, engine = engine.name(), url = %url, "Starting execution pipeline");

    let outcome = engine.run(goal, url).await?;
    info!(
        run_id = outcome.run_id.as_deref().unwrap_or("unknown"),
        final_url = %outcome.final_url,
        "Automation run complete"
    );

    let record = create_record(store, worker, org_id, goal, &outcome).await?;

    Ok(RecordedRun {
        record,
        streaming_url: outcome.streaming_url,
    })
}

/// Hash a finished run, insert the pending record, and queue its anchor.
pub async fn create_record(
    store: &dyn RecordStore,
    worker: &AnchorWorker,
    org_id: Uuid,
    goal: &str,
    outcome: &RunOutcome,
) -> Result<ExecutionRecord> {
    let poa_hash = poa::poa_hash(
        goal,
        &outcome.final_url,
        &outcome.timestamp,
        Some(&outcome.result_json),
    )?;

    // Persist before anchoring so the record survives a crash.
    let record = store
        .insert_execution(NewExecution {
            org_id,
            run_id: outcome.run_id.clone(),
            goal: goal.to_string(),
            target_url: outcome.final_url.clone(),
            poa_timestamp: outcome.timestamp.clone(),
            result_json: Some(outcome.result_json.clone()),
            poa_hash,
        })
        .await?;

    info!(id = %record.id, poa_hash = %record.poa_hash, "Execution recorded");

    // A full queue is not a request failure; the record stays pending
    // and can be re-anchored.
    match worker.dispatch(record.id).await {
        DispatchOutcome::Queued => {}
        other => {
            warn!(id = %record.id, outcome = ?other, "Anchor not queued");
        }
    }

    Ok(record)
}
