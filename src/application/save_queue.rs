// Save queue - persists dashboard snapshots and deletions in order, one at a time
use crate::application::persistence_sync::{PersistenceError, PersistenceSync};
use crate::domain::dashboard::Dashboard;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub struct SaveReport {
    pub dashboard_id: String,
    pub outcome: Result<(), String>,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("save worker has stopped")]
    Stopped,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

enum Job {
    Save(Dashboard),
    Delete {
        dashboard_id: String,
        done: oneshot::Sender<Result<(), PersistenceError>>,
    },
}

/// Folds one incoming job into the pending batch. Snapshots collapse to the newest per
/// dashboard; a delete drops the dashboard's pending snapshot and every later one.
fn enqueue(batch: &mut Vec<Job>, deleted: &mut HashSet<String>, job: Job) {
    match job {
        Job::Save(dashboard) => {
            if deleted.contains(&dashboard.id) {
                tracing::debug!("Dropping snapshot of deleted dashboard {}", dashboard.id);
                return;
            }
            let pending = batch
                .iter_mut()
                .find(|j| matches!(j, Job::Save(d) if d.id == dashboard.id));
            match pending {
                Some(existing) => *existing = Job::Save(dashboard),
                None => batch.push(Job::Save(dashboard)),
            }
        }
        Job::Delete { dashboard_id, done } => {
            batch.retain(|j| !matches!(j, Job::Save(d) if d.id == dashboard_id));
            deleted.insert(dashboard_id.clone());
            batch.push(Job::Delete { dashboard_id, done });
        }
    }
}

#[derive(Clone)]
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SaveQueue {
    /// Spawns the worker. Snapshots queued while a save is running collapse to the newest
    /// one per dashboard, so the store only ever moves forward. Deletes run after any save
    /// already in flight, so a deleted dashboard is never written back.
    pub fn spawn(
        persistence: Arc<PersistenceSync>,
        reports: mpsc::UnboundedSender<SaveReport>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            let mut deleted = HashSet::new();
            while let Some(first) = rx.recv().await {
                let mut batch = Vec::new();
                enqueue(&mut batch, &mut deleted, first);
                while let Ok(next) = rx.try_recv() {
                    enqueue(&mut batch, &mut deleted, next);
                }

                for job in batch {
                    match job {
                        Job::Save(dashboard) => {
                            let outcome =
                                persistence.save(&dashboard).await.map_err(|e| e.to_string());
                            tracing::debug!("Saved dashboard {} ({:?})", dashboard.id, outcome);
                            let report = SaveReport {
                                dashboard_id: dashboard.id,
                                outcome,
                            };
                            if reports.send(report).is_err() {
                                return;
                            }
                        }
                        Job::Delete { dashboard_id, done } => {
                            let outcome = persistence.delete(&dashboard_id).await;
                            tracing::info!("Deleted dashboard {} ({:?})", dashboard_id, outcome);
                            let _ = done.send(outcome);
                        }
                    }
                }
            }
        });

        Self { tx }
    }

    /// Fire-and-forget; failures come back as a `SaveReport`
    pub fn schedule(&self, dashboard: Dashboard) {
        if self.tx.send(Job::Save(dashboard)).is_err() {
            tracing::warn!("Save worker stopped; dropping snapshot");
        }
    }

    /// Resolves once the dashboard is gone. Snapshots of it queued before or after the
    /// call are discarded.
    pub async fn delete(&self, dashboard_id: &str) -> Result<(), QueueError> {
        let (done, rx) = oneshot::channel();
        let job = Job::Delete {
            dashboard_id: dashboard_id.to_string(),
            done,
        };
        self.tx.send(job).map_err(|_| QueueError::Stopped)?;
        rx.await.map_err(|_| QueueError::Stopped)?.map_err(QueueError::from)
    }
}
