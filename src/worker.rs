/// Supervised anchoring worker.
///
/// Anchor attempts run on a background pool fed by a bounded queue, so
/// the HTTP response never waits on the chain and a burst of requests
/// cannot spawn an unbounded number of in-flight transactions.
///
/// One attempt has two phases, each persisted as it happens:
/// 1. Submit: sign and broadcast the transaction, then record its hash.
///    The hash is kept even if the attempt later fails.
/// 2. Confirm: poll until mined, then mark the record completed. Any
///    failure in either phase marks the record failed with the error.
///
/// An in-memory lock table keyed by record id makes attempts
/// single-flight: dispatching a record that is already queued or running
/// is refused rather than double-submitting to the chain. A record that
/// was mid-attempt when the process died is still `pending` in the
/// store, so startup recovery simply re-queues all pending records.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chain::ChainGateway;
use crate::error::{Result, TrailError};
use crate::state::RecordStore;

/// Outcome of trying to hand a record to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Accepted; an attempt will run shortly.
    Queued,
    /// An attempt for this record is already queued or running.
    AlreadyInFlight,
    /// The queue is full; try again later.
    Saturated,
}

/// Tuning for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub workers: usize,
    pub queue_depth: usize,
    pub confirm_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_depth: 64,
            confirm_timeout: Duration::from_secs(180),
        }
    }
}

/// Handle to the anchor queue. Cheap to clone; all clones feed the same
/// pool.
#[derive(Clone)]
pub struct AnchorWorker {
    tx: mpsc::Sender<Uuid>,
    // Held so the queue stays open even with zero workers running.
    rx: Arc<Mutex<mpsc::Receiver<Uuid>>>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    store: Arc<dyn RecordStore>,
}

impl AnchorWorker {
    /// Start the worker pool and return a dispatch handle.
    pub fn spawn(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn ChainGateway>,
        options: WorkerOptions,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let in_flight = Arc::new(Mutex::new(HashSet::new()));

        for worker in 0..options.workers {
            let rx = rx.clone();
            let store = store.clone();
            let gateway = gateway.clone();
            let in_flight = in_flight.clone();
            let confirm_timeout = options.confirm_timeout;

            tokio::spawn(async move {
                loop {
                    let id = { rx.lock().await.recv().await };
                    let Some(id) = id else { break };

                    if let Err(e) =
                        anchor_execution(store.as_ref(), gateway.as_ref(), id, confirm_timeout)
                            .await
                    {
                        warn!(id = %id, error = %e, "Anchor attempt failed");
                    }

                    in_flight.lock().await.remove(&id);
                }
                debug!(worker, "Anchor worker stopped");
            });
        }

        Self {
            tx,
            rx,
            in_flight,
            store,
        }
    }

    /// Queue an anchor attempt for a record.
    ///
    /// The in-flight check and the reservation are one step; two
    /// concurrent dispatches for the same record cannot both pass.
    pub async fn dispatch(&self, id: Uuid) -> DispatchOutcome {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(id) {
                return DispatchOutcome::AlreadyInFlight;
            }
        }

        match self.tx.try_send(id) {
            Ok(()) => DispatchOutcome::Queued,
            Err(e) => {
                self.in_flight.lock().await.remove(&id);
                if matches!(e, TrySendError::Closed(_)) {
                    error!("Anchor queue is closed");
                }
                DispatchOutcome::Saturated
            }
        }
    }

    /// Re-queue every record still pending in the store.
    ///
    /// Run once at startup: a record that was mid-attempt when the
    /// process died is still pending, and a fresh transaction for an
    /// already-anchored hash is harmless.
    pub async fn recover_pending(&self) -> Result<usize> {
        let pending = self.store.list_pending().await?;
        let mut queued = 0;

        for record in &pending {
            {
                let mut in_flight = self.in_flight.lock().await;
                if !in_flight.insert(record.id) {
                    continue;
                }
            }

            if self.tx.send(record.id).await.is_err() {
                self.in_flight.lock().await.remove(&record.id);
                return Err(TrailError::AnchorSubmit("anchor queue is closed".into()));
            }
            queued += 1;
        }

        if queued > 0 {
            info!(count = queued, "Re-queued pending anchor attempts");
        }
        Ok(queued)
    }
}

/// Run one full anchor attempt for a record.
pub async fn anchor_execution(
    store: &dyn RecordStore,
    gateway: &dyn ChainGateway,
    id: Uuid,
    confirm_timeout: Duration,
) -> Result<()> {
    let record = store
        .get_execution(id)
        .await?
        .ok_or(TrailError::NotFound(id))?;

    info!(id = %id, chain = gateway.chain_name(), "Submitting anchor transaction");

    let tx_hash = match gateway.submit(&record.poa_hash).await {
        Ok(tx_hash) => tx_hash,
        Err(e) => {
            store.set_failed(id, &e.to_string()).await?;
            return Err(e);
        }
    };

    store.set_submitted(id, &tx_hash).await?;
    info!(id = %id, tx_hash = %tx_hash, "Anchor transaction submitted");

    match gateway.await_confirmation(&tx_hash, confirm_timeout).await {
        Ok(receipt) => {
            store.set_completed(id, &tx_hash).await?;
            info!(
                id = %id,
                tx_hash = %tx_hash,
                block = receipt.block_number.as_deref().unwrap_or("unknown"),
                "Anchor confirmed"
            );
            Ok(())
        }
        Err(e) => {
            store.set_failed(id, &e.to_string()).await?;
            Err(e)
        }
    }
}
