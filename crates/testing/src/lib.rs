//! In-memory [`edgarq_core::JobStore`] / [`edgarq_core::PipelineRunStore`]
//! and a manually-advanced [`edgarq_core::Clock`], so the worker poll loop,
//! the scheduler's alert thresholds, and the stale-sweep/retry policies can
//! be exercised deterministically without a live Postgres instance.
//!
//! The in-memory job store keeps the same "exactly one claimer" guarantee
//! as the Postgres store: selection and lease assignment happen under a
//! single async mutex, playing the role `SELECT ... FOR UPDATE SKIP LOCKED`
//! plays against a real table.

mod clock;
mod job_store;
mod pipeline_run_store;

pub use clock::ManualClock;
pub use job_store::InMemoryJobStore;
pub use pipeline_run_store::InMemoryPipelineRunStore;
