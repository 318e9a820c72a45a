//! # edgarq-core
//!
//! Durable work coordination primitives for the SEC EDGAR ingestion and
//! summarization system: the Job Queue, the Pipeline Run Tracker, the
//! Persistence Adapter contract they're built on, and the small set of
//! shared utilities (an injectable clock, a cooperative-cancellation
//! token, and a bounded retry helper) that the worker and scheduler
//! layers use to stay correct under crash and contention.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler ──enqueue──▶ JobStore ◀──claim/complete/fail── Worker
//!                            │
//!                            └── sweep_stale (periodic)
//!
//! Worker ──observe outcomes──▶ PipelineRunStore (start/complete/fail run)
//! ```
//!
//! This crate defines the *contracts* ([`store::JobStore`],
//! [`store::PipelineRunStore`]) and the *entities* ([`job::Job`],
//! [`pipeline_run::PipelineRun`]). Concrete storage lives in
//! `edgarq-postgres` (production) and `edgarq-testing` (in-memory, for
//! tests). The worker poll loop and handler registry live in
//! `edgarq-worker`; the periodic discovery/alerting driver lives in
//! `edgarq-scheduler`.
//!
//! ## Key invariants
//!
//! 1. At most one worker ever holds a lease on a given job at a time —
//!    enforced by the store's `claim_next_pending` implementation, not by
//!    this crate (see `edgarq-postgres` for the `SKIP LOCKED` claim).
//! 2. A job's `retry_count` never exceeds `max_retries`.
//! 3. A pipeline run's counters are set exactly once, at its terminal
//!    transition.
//! 4. All "now" reads go through [`clock::Clock`] so stale-sweep and
//!    consecutive-failure logic can be tested deterministically.

pub mod clock;
pub mod collaborators;
pub mod job;
pub mod pipeline_run;
pub mod retry;
pub mod shutdown;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use collaborators::{
    ContentStore, DocumentExtractor, EdgarClient, FilingRef, GenerationResult, LLMClient,
    ModelConfig, SECTION_KINDS,
};
pub use job::{
    Job, JobFilter, JobStatus, JobType, NewJob, QueueStats, DEFAULT_MAX_RETRIES, DEFAULT_PRIORITY,
};
pub use pipeline_run::{
    NewPipelineRun, PipelineRun, PipelineRunFilter, PipelineRunStatus, PipelineTrigger,
};
pub use retry::{retry_backoff, RetryError};
pub use shutdown::{ShutdownRequested, ShutdownToken};
pub use store::{JobStore, PipelineRunStore, StoreError};
