//! The Persistence Adapter contract: the narrow set of transactional
//! operations the Job Queue and Pipeline Run Tracker need. Implementations
//! live in separate crates (`edgarq-postgres` for production,
//! `edgarq-testing` for tests) so this crate never depends on a concrete
//! database driver.

use async_trait::async_trait;
use uuid::Uuid;

use crate::job::{Job, JobFilter, NewJob, QueueStats};
use crate::pipeline_run::{NewPipelineRun, PipelineRun, PipelineRunFilter};

/// Errors a [`JobStore`] or [`PipelineRunStore`] may report.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflicting state transition: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable, priority-ordered, retry-aware job storage.
///
/// Implementations must guarantee that `claim_next_pending` leases a job
/// to at most one caller, even under concurrent invocation — see
/// SPEC_FULL.md §4.B for the exact algorithm a SQL-backed implementation
/// follows (`SELECT ... FOR UPDATE SKIP LOCKED`).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert_job(&self, spec: NewJob) -> Result<Job, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Ordered by `created_at` descending.
    async fn list_jobs(
        &self,
        filter: JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError>;

    /// Atomically claims and leases the highest-priority, oldest pending
    /// job, or returns `None` if the queue is empty.
    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError>;

    async fn complete_job(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<Option<Job>, StoreError>;

    /// Implements the retry policy from SPEC_FULL.md §4.B: re-queues the
    /// job if `retry_count < max_retries`, else terminally fails it.
    async fn fail_job(&self, id: Uuid, error: &str) -> Result<Option<Job>, StoreError>;

    /// Succeeds only if the job is currently `pending`; returns `None`
    /// otherwise (including "not found").
    async fn cancel_pending_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Finds `in_progress` jobs whose `updated_at` predates
    /// `now - threshold_secs` and applies the retry policy to each with
    /// the distinguished stale-lease error message. Returns the jobs as
    /// they stood *after* the transition.
    async fn sweep_stale(&self, threshold_secs: i64) -> Result<Vec<Job>, StoreError>;

    /// Administrative counts of jobs by status, for operator visibility.
    async fn queue_stats(&self) -> Result<QueueStats, StoreError>;
}

/// Durable storage for [`PipelineRun`] aggregation state.
#[async_trait]
pub trait PipelineRunStore: Send + Sync {
    async fn create_run(&self, spec: NewPipelineRun) -> Result<PipelineRun, StoreError>;

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError>;

    async fn list_runs(
        &self,
        filter: PipelineRunFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PipelineRun>, StoreError>;

    async fn start_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError>;

    async fn complete_run(
        &self,
        id: Uuid,
        jobs_created: i32,
        jobs_completed: i32,
        jobs_failed: i32,
    ) -> Result<Option<PipelineRun>, StoreError>;

    async fn fail_run(
        &self,
        id: Uuid,
        error: &str,
        jobs_created: i32,
        jobs_completed: i32,
        jobs_failed: i32,
    ) -> Result<Option<PipelineRun>, StoreError>;

    /// One row per company with a non-null `started_at`, most recent
    /// first.
    async fn latest_run_per_company(&self) -> Result<Vec<PipelineRun>, StoreError>;

    /// Counts leading `failed`/`partial` runs (newest first) for a
    /// company within the last `window` runs, stopping at the first
    /// non-failure status.
    async fn count_consecutive_failures(
        &self,
        company_id: Uuid,
        window: i64,
    ) -> Result<i64, StoreError>;
}
