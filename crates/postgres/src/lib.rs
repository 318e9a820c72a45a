//! PostgreSQL implementation of the Job Queue and Pipeline Run Tracker.
//!
//! # Features
//!
//! - Contention-free claim via `SELECT ... FOR UPDATE SKIP LOCKED`
//! - The retry policy (requeue vs. terminal fail) expressed as a single
//!   `CASE`-driven `UPDATE`, so there is no read-then-write race window
//!   between deciding to retry and committing the decision
//! - `DISTINCT ON` for `latest_run_per_company`
//!
//! # Database Schema
//!
//! See `migrations/0001_init.sql` for the `jobs` and `pipeline_runs`
//! tables this crate reads and writes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use edgarq_postgres::{PgJobStore, PgPipelineRunStore};
//! use sqlx::PgPool;
//!
//! let pool = PgPool::connect("postgres://localhost/edgarq").await?;
//! let jobs = PgJobStore::new(pool.clone());
//! let runs = PgPipelineRunStore::new(pool);
//! ```

mod job_store;
mod pipeline_run_store;
mod rows;

pub use job_store::PgJobStore;
pub use pipeline_run_store::PgPipelineRunStore;

fn storage_unavailable(err: sqlx::Error) -> edgarq_core::StoreError {
    edgarq_core::StoreError::StorageUnavailable(Box::new(err))
}

fn parse_unavailable(err: edgarq_core::job::UnknownVariant) -> edgarq_core::StoreError {
    edgarq_core::StoreError::StorageUnavailable(Box::new(err))
}
