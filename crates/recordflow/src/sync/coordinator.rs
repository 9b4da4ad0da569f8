//! Worker lifecycle.
//!
//! The coordinator builds one worker per configured entity type and runs
//! them either as independent tasks or strictly one at a time, per the
//! configuration flag. All workers share one cancellation token;
//! `stop()` cancels it and waits for every task to reach a safe stopping
//! point, so no batch is left with a half-advanced cursor.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use recordflow_api::ChangeFeed;

use crate::config::SyncSettings;
use crate::metadata::EntityMetadataCache;
use crate::storage::{CursorStore, DestinationStore};
use crate::sync::clock::Clock;
use crate::sync::worker::SyncWorker;

pub struct Coordinator {
    workers: Vec<Arc<SyncWorker>>,
    concurrent: bool,
    poll_interval: std::time::Duration,
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Build workers for every configured entity type.
    ///
    /// A missing column mapping is fatal for that worker alone: it is
    /// logged and skipped, and the remaining workers are unaffected.
    pub fn new(
        settings: &SyncSettings,
        metadata: &EntityMetadataCache,
        feed: Arc<dyn ChangeFeed>,
        destination: Arc<dyn DestinationStore>,
        cursors: Arc<dyn CursorStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let mut workers = Vec::with_capacity(settings.entity_types.len());

        for entity_type in &settings.entity_types {
            match SyncWorker::new(
                entity_type.clone(),
                metadata,
                Arc::clone(&feed),
                Arc::clone(&destination),
                Arc::clone(&cursors),
                Arc::clone(&clock),
                settings.poll_interval(),
                shutdown.clone(),
            ) {
                Ok(worker) => workers.push(Arc::new(worker)),
                Err(e) => {
                    error!(
                        entity_type = %entity_type,
                        error = %e,
                        "worker cannot start without its column mapping, skipping"
                    );
                }
            }
        }

        Self {
            workers,
            concurrent: settings.process_all_entity_types_concurrently,
            poll_interval: settings.poll_interval(),
            shutdown,
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Number of workers that passed metadata resolution.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Spawn the sync tasks.
    ///
    /// Concurrent mode runs every worker's own poll loop as a separate
    /// task. Sequential mode runs a single task that gives each worker
    /// one complete poll cycle before the next worker starts, so at
    /// most one worker is ever active.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            warn!("coordinator already started");
            return;
        }

        if self.concurrent {
            info!(workers = self.workers.len(), "starting workers concurrently");
            for worker in &self.workers {
                let worker = Arc::clone(worker);
                tasks.push(tokio::spawn(async move { worker.run().await }));
            }
        } else {
            info!(workers = self.workers.len(), "starting workers sequentially");
            let workers = self.workers.clone();
            let shutdown = self.shutdown.clone();
            let poll_interval = self.poll_interval;
            tasks.push(tokio::spawn(async move {
                'rounds: loop {
                    for worker in &workers {
                        if shutdown.is_cancelled() {
                            break 'rounds;
                        }
                        if let Err(e) = worker.poll_once().await {
                            warn!(
                                entity_type = %worker.entity_type(),
                                error = %e,
                                "poll cycle failed, retrying next round"
                            );
                        }
                    }
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                info!("sequential sync loop stopped");
            }));
        }
    }

    /// Signal cancellation and wait for every task to finish cleanly.
    pub async fn stop(&self) {
        info!("stopping sync workers");
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        info!("all sync workers stopped");
    }
}
