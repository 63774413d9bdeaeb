//! Single-writer progress aggregation for sync jobs.
//!
//! Workers never touch a job record. They send events through a
//! [`ProgressReporter`]; one aggregator task owns the counters and the
//! error log, persists each change, and hands the final tally back when
//! every reporter has been dropped.
//!
//! ```text
//! worker ─┐
//! worker ─┼─ events ─▶ aggregator ─▶ SyncJobStore
//! worker ─┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use marketsync_core::{
    OrgId, PlatformType, SyncJobId, SyncJobStatus, SyncJobType, SyncJobUpdate, SyncProgress,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::store::{StoreResult, SyncJobStore};

#[derive(Debug)]
enum Event {
    Discovered(u64),
    Succeeded,
    Failed { items: u64, error: String },
    Error(String),
}

/// Handle workers use to report progress. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<Event>,
}

impl ProgressReporter {
    fn send(&self, event: Event) {
        // The aggregator outlives every reporter, so a send only fails
        // after it has already panicked.
        if self.tx.send(event).is_err() {
            warn!("Progress event dropped");
        }
    }

    /// `items` more items will be attempted.
    pub fn discovered(&self, items: u64) {
        if items > 0 {
            self.send(Event::Discovered(items));
        }
    }

    /// One item was attempted and did not fail. Skipped items count here.
    pub fn succeeded(&self) {
        self.send(Event::Succeeded);
    }

    /// One item was attempted and failed.
    pub fn failed(&self, error: impl Into<String>) {
        self.failed_many(1, error);
    }

    /// `items` items failed for one shared reason.
    pub fn failed_many(&self, items: u64, error: impl Into<String>) {
        self.send(Event::Failed {
            items,
            error: error.into(),
        });
    }

    /// Record an error that is not tied to a counted item.
    pub fn error(&self, error: impl Into<String>) {
        self.send(Event::Error(error.into()));
    }
}

#[derive(Debug, Default)]
struct Tally {
    total: u64,
    processed: u64,
    failed: u64,
    errors: Vec<String>,
}

impl Tally {
    /// Apply `event`; returns whether any counter moved.
    fn apply(&mut self, event: Event) -> bool {
        match event {
            Event::Discovered(items) => self.total += items,
            Event::Succeeded => self.processed += 1,
            Event::Failed { items, error } => {
                self.processed += items;
                self.failed += items;
                self.errors.push(error);
            }
            Event::Error(error) => {
                self.errors.push(error);
                return false;
            }
        }
        self.total = self.total.max(self.processed);
        true
    }
}

async fn aggregate(
    job_id: SyncJobId,
    jobs: Arc<dyn SyncJobStore>,
    mut rx: mpsc::UnboundedReceiver<Event>,
) -> Tally {
    let mut tally = Tally::default();
    while let Some(event) = rx.recv().await {
        if !tally.apply(event) {
            continue;
        }
        let update = SyncJobUpdate::counters(tally.total, tally.processed, tally.failed);
        if let Err(err) = jobs.update_progress(job_id, update).await {
            warn!(job_id = %job_id, error = %err, "Failed to persist sync progress");
        }
    }
    tally
}

/// A running sync job and its aggregator.
pub struct JobTracker {
    job_id: SyncJobId,
    jobs: Arc<dyn SyncJobStore>,
    reporter: ProgressReporter,
    aggregator: JoinHandle<Tally>,
}

impl JobTracker {
    /// Create a job, mark it running and spawn its aggregator.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the job record cannot be created or marked
    /// running. A job that was created but never started is marked failed.
    pub async fn start(
        jobs: Arc<dyn SyncJobStore>,
        org_id: OrgId,
        job_type: SyncJobType,
        platform: Option<PlatformType>,
    ) -> StoreResult<Self> {
        let job = jobs.create(org_id, job_type, platform).await?;
        if let Err(err) = jobs
            .update_progress(job.id, SyncJobUpdate::started(Utc::now()))
            .await
        {
            error!(job_id = %job.id, error = %err, "Failed to mark sync job running");
            let mut progress = job.progress();
            progress.status = SyncJobStatus::Failed;
            progress.errors.push(format!("could not start: {err}"));
            if let Err(abandon_err) = jobs
                .update_progress(job.id, SyncJobUpdate::finished(&progress, Utc::now()))
                .await
            {
                warn!(job_id = %job.id, error = %abandon_err, "Failed to abandon sync job");
            }
            return Err(err);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let aggregator = tokio::spawn(aggregate(job.id, Arc::clone(&jobs), rx));
        info!(job_id = %job.id, job_type = %job_type, "Sync job started");

        Ok(Self {
            job_id: job.id,
            jobs,
            reporter: ProgressReporter { tx },
            aggregator,
        })
    }

    #[must_use]
    pub const fn job_id(&self) -> SyncJobId {
        self.job_id
    }

    #[must_use]
    pub fn reporter(&self) -> ProgressReporter {
        self.reporter.clone()
    }

    /// Wait for outstanding events, then write the terminal state.
    ///
    /// `failure` marks the job `failed` and is appended to its error log;
    /// otherwise the job is `completed`, whatever its failed item count.
    /// Every reporter clone must be dropped first or this never returns.
    pub async fn finish(self, failure: Option<String>) -> SyncProgress {
        let Self {
            job_id,
            jobs,
            reporter,
            aggregator,
        } = self;
        drop(reporter);

        let mut tally = aggregator.await.unwrap_or_else(|err| {
            error!(job_id = %job_id, error = %err, "Progress aggregator died");
            Tally {
                errors: vec![format!("progress aggregator failed: {err}")],
                ..Tally::default()
            }
        });

        let status = if let Some(failure) = failure {
            tally.errors.push(failure);
            SyncJobStatus::Failed
        } else {
            SyncJobStatus::Completed
        };
        let progress = SyncProgress {
            job_id,
            status,
            total_items: tally.total,
            processed_items: tally.processed,
            failed_items: tally.failed,
            errors: tally.errors,
        };

        if let Err(err) = jobs
            .update_progress(job_id, SyncJobUpdate::finished(&progress, Utc::now()))
            .await
        {
            warn!(job_id = %job_id, error = %err, "Failed to persist final sync state");
        }

        if status == SyncJobStatus::Failed {
            error!(
                job_id = %job_id,
                processed = progress.processed_items,
                failed = progress.failed_items,
                "Sync job failed"
            );
        } else {
            info!(
                job_id = %job_id,
                total = progress.total_items,
                processed = progress.processed_items,
                failed = progress.failed_items,
                "Sync job completed"
            );
        }
        debug!(job_id = %job_id, errors = progress.errors.len(), "Sync job errors recorded");
        progress
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("job_id", &self.job_id)
            .finish_non_exhaustive()
    }
}
