//! Sync job bookkeeping: job records, progress snapshots and the
//! append-only sync log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{OrgId, SyncJobId};
use super::platform::PlatformType;
use super::status::{SyncJobStatus, SyncJobType, SyncLogStatus};

/// One tracked invocation of an orchestrated sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    pub id: SyncJobId,
    pub org_id: OrgId,
    pub job_type: SyncJobType,
    pub platform: Option<PlatformType>,
    pub status: SyncJobStatus,
    pub total_items: u64,
    pub processed_items: u64,
    pub failed_items: u64,
    pub error_log: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncJob {
    /// A fresh pending job.
    #[must_use]
    pub fn new(org_id: OrgId, job_type: SyncJobType, platform: Option<PlatformType>) -> Self {
        Self {
            id: SyncJobId::generate(),
            org_id,
            job_type,
            platform,
            status: SyncJobStatus::Pending,
            total_items: 0,
            processed_items: 0,
            failed_items: 0,
            error_log: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Snapshot of the job's progress.
    #[must_use]
    pub fn progress(&self) -> SyncProgress {
        SyncProgress {
            job_id: self.id,
            status: self.status,
            total_items: self.total_items,
            processed_items: self.processed_items,
            failed_items: self.failed_items,
            errors: self.error_log.clone(),
        }
    }
}

/// A partial job update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncJobUpdate {
    pub status: Option<SyncJobStatus>,
    pub total_items: Option<u64>,
    pub processed_items: Option<u64>,
    pub failed_items: Option<u64>,
    pub error_log: Option<Vec<String>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SyncJobUpdate {
    /// Move the job to `running`.
    #[must_use]
    pub fn started(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(SyncJobStatus::Running),
            started_at: Some(now),
            ..Self::default()
        }
    }

    /// Report counters only.
    #[must_use]
    pub fn counters(total: u64, processed: u64, failed: u64) -> Self {
        Self {
            total_items: Some(total),
            processed_items: Some(processed),
            failed_items: Some(failed),
            ..Self::default()
        }
    }

    /// Final write: counters, errors and a terminal status.
    #[must_use]
    pub fn finished(progress: &SyncProgress, now: DateTime<Utc>) -> Self {
        Self {
            status: Some(progress.status),
            total_items: Some(progress.total_items),
            processed_items: Some(progress.processed_items),
            failed_items: Some(progress.failed_items),
            error_log: Some(progress.errors.clone()),
            started_at: None,
            completed_at: Some(now),
        }
    }

    /// Apply this update to a job in place, without validation.
    pub fn apply_to(&self, job: &mut SyncJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(total) = self.total_items {
            job.total_items = total;
        }
        if let Some(processed) = self.processed_items {
            job.processed_items = processed;
        }
        if let Some(failed) = self.failed_items {
            job.failed_items = failed;
        }
        if let Some(errors) = &self.error_log {
            job.error_log.clone_from(errors);
        }
        if let Some(at) = self.started_at {
            job.started_at = Some(at);
        }
        if let Some(at) = self.completed_at {
            job.completed_at = Some(at);
        }
    }
}

/// Progress summary returned to callers of a sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub job_id: SyncJobId,
    pub status: SyncJobStatus,
    pub total_items: u64,
    pub processed_items: u64,
    pub failed_items: u64,
    pub errors: Vec<String>,
}

impl SyncProgress {
    /// Items that were attempted and did not fail.
    #[must_use]
    pub const fn succeeded_items(&self) -> u64 {
        self.processed_items.saturating_sub(self.failed_items)
    }

    /// Share of items processed, 0-100. An empty job counts as complete.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> f64 {
        if self.total_items == 0 {
            return 100.0;
        }
        (self.processed_items as f64 / self.total_items as f64) * 100.0
    }
}

/// What a sync log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    CreateProduct,
    UpdateProduct,
    UpdateStock,
    ImportOrder,
    RefreshToken,
}

impl SyncAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateProduct => "create_product",
            Self::UpdateProduct => "update_product",
            Self::UpdateStock => "update_stock",
            Self::ImportOrder => "import_order",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity a sync log entry is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Product,
    Inventory,
    Order,
    Connection,
}

/// One platform operation attempt. Entries are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub platform: PlatformType,
    pub action: SyncAction,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub status: SyncLogStatus,
    pub message: Option<String>,
    pub job_id: Option<SyncJobId>,
    pub timestamp: DateTime<Utc>,
}

impl SyncLogEntry {
    /// A successful attempt.
    #[must_use]
    pub fn success(
        platform: PlatformType,
        action: SyncAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            action,
            entity_type,
            entity_id: Some(entity_id.into()),
            status: SyncLogStatus::Success,
            message: None,
            job_id: None,
            timestamp: Utc::now(),
        }
    }

    /// A failed attempt with its error message.
    #[must_use]
    pub fn error(
        platform: PlatformType,
        action: SyncAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: SyncLogStatus::Error,
            message: Some(message.into()),
            ..Self::success(platform, action, entity_type, entity_id)
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the job this attempt belongs to.
    #[must_use]
    pub const fn for_job(mut self, job_id: SyncJobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}
