//! The worker poll loop: claim one job, dispatch it through the handler
//! registry, record the outcome, repeat. A second cadence periodically
//! sweeps stale in-progress leases back into the retry policy.
//!
//! Grounded on the claim/dispatch/mark-outcome shape of a conventional
//! database-backed job worker, adapted to this crate's single-job
//! `claim_next_pending` (rather than a batch claim) and to the
//! cooperative-cancellation idiom already used by `edgarq_core::shutdown`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use edgarq_core::job::{Job, JobType};
use edgarq_core::JobStore;
use tracing::Instrument;

use crate::context::HandlerContext;
use crate::registry::Handler;

pub struct PollLoop {
    worker_id: String,
    ctx: HandlerContext,
    registry: HashMap<JobType, Arc<dyn Handler>>,
    poll_interval: Duration,
    stale_threshold_secs: i64,
    stale_check_interval: Duration,
}

impl PollLoop {
    pub fn new(
        worker_id: String,
        ctx: HandlerContext,
        registry: HashMap<JobType, Arc<dyn Handler>>,
        poll_interval: Duration,
        stale_threshold_secs: i64,
        stale_check_interval: Duration,
    ) -> Self {
        Self {
            worker_id,
            ctx,
            registry,
            poll_interval,
            stale_threshold_secs,
            stale_check_interval,
        }
    }

    pub async fn run(self) {
        tracing::info!(worker_id = %self.worker_id, "worker_started");
        let mut next_sweep = tokio::time::Instant::now() + self.stale_check_interval;

        loop {
            if self.ctx.shutdown.is_tripped() {
                break;
            }

            if tokio::time::Instant::now() >= next_sweep {
                self.sweep_stale().await;
                next_sweep = tokio::time::Instant::now() + self.stale_check_interval;
            }

            let claimed = match self.ctx.jobs.claim_next_pending(&self.worker_id).await {
                Ok(job) => job,
                Err(error) => {
                    tracing::error!(%error, "claim_next_pending_failed");
                    let _ = self
                        .ctx
                        .shutdown
                        .sleep_interruptible(self.poll_interval)
                        .await;
                    continue;
                }
            };

            let Some(job) = claimed else {
                if self
                    .ctx
                    .shutdown
                    .sleep_interruptible(self.poll_interval)
                    .await
                    .is_err()
                {
                    break;
                }
                continue;
            };

            self.execute(job).await;
        }

        tracing::info!(worker_id = %self.worker_id, "worker_stopped");
    }

    async fn sweep_stale(&self) {
        match self.ctx.jobs.sweep_stale(self.stale_threshold_secs).await {
            Ok(swept) if !swept.is_empty() => {
                tracing::warn!(count = swept.len(), "stale_jobs_swept");
            }
            Ok(_) => {}
            Err(error) => tracing::error!(%error, "sweep_stale_failed"),
        }
    }

    async fn execute(&self, job: Job) {
        let job_id = job.id;
        let job_type = job.job_type;
        let span = tracing::info_span!("job", job_id = %job_id, job_type = %job_type);

        async move {
            let Some(handler) = self.registry.get(&job_type) else {
                let error = Job::missing_handler_error(job_type);
                tracing::error!(%error, "job_dispatch_failed");
                if let Err(e) = self.ctx.jobs.fail_job(job_id, &error).await {
                    tracing::error!(error = %e, "fail_job_failed");
                }
                return;
            };

            match handler.call(job.params.clone(), &self.ctx).await {
                Ok(result) => {
                    tracing::info!("job_completed");
                    if let Err(error) = self.ctx.jobs.complete_job(job_id, Some(result)).await {
                        tracing::error!(%error, "complete_job_failed");
                    }
                }
                Err(error) => {
                    // Only a handler that actually unwound via
                    // `RetryError::Shutdown` gets the distinguished message;
                    // an unrelated failure that happens to land while a
                    // shutdown is in flight still records its own text.
                    let message = if matches!(
                        error.downcast_ref::<edgarq_core::RetryError>(),
                        Some(edgarq_core::RetryError::Shutdown)
                    ) {
                        Job::SHUTDOWN_ERROR_MESSAGE.to_string()
                    } else {
                        error.to_string()
                    };
                    tracing::warn!(error = %message, "job_failed");
                    if let Err(e) = self.ctx.jobs.fail_job(job_id, &message).await {
                        tracing::error!(error = %e, "fail_job_failed");
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::default_registry;
    use crate::test_support::test_context;
    use edgarq_core::{JobStatus, NewJob};

    #[tokio::test]
    async fn claims_and_completes_a_test_job() {
        let ctx = test_context();
        let jobs = ctx.jobs.clone();
        let job = jobs
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({"x": 1})))
            .await
            .unwrap();
        let claimed = jobs.claim_next_pending("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, job.id);

        let poll_loop = PollLoop::new(
            "w1".to_string(),
            ctx,
            default_registry(),
            Duration::from_millis(1),
            600,
            Duration::from_secs(60),
        );
        poll_loop.execute(claimed).await;

        let after = jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use async_trait::async_trait as async_trait_attr;

        struct FlakyOnce(AtomicUsize);

        #[async_trait_attr]
        impl Handler for FlakyOnce {
            async fn call(
                &self,
                _params: serde_json::Value,
                _ctx: &HandlerContext,
            ) -> anyhow::Result<serde_json::Value> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("boom")
                }
                Ok(serde_json::json!({}))
            }
        }

        let ctx = test_context();
        let jobs = ctx.jobs.clone();
        let job = jobs
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})).with_max_retries(3))
            .await
            .unwrap();

        let mut registry: HashMap<JobType, Arc<dyn Handler>> = HashMap::new();
        registry.insert(JobType::Test, Arc::new(FlakyOnce(AtomicUsize::new(0))));

        let poll_loop = PollLoop::new(
            "w1".to_string(),
            ctx,
            registry,
            Duration::from_millis(1),
            600,
            Duration::from_secs(60),
        );

        let claimed = jobs.claim_next_pending("w1").await.unwrap().unwrap();
        poll_loop.execute(claimed).await;
        let after_first = jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after_first.status, JobStatus::Pending);
        assert_eq!(after_first.retry_count, 1);
        assert_eq!(after_first.worker_id, None);
        assert_eq!(after_first.error.as_deref(), Some("boom"));

        let reclaimed = jobs.claim_next_pending("w1").await.unwrap().unwrap();
        poll_loop.execute(reclaimed).await;
        let after_second = jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after_second.status, JobStatus::Completed);
        assert_eq!(after_second.retry_count, 1);
    }

    #[tokio::test]
    async fn missing_handler_terminally_fails_the_job() {
        let ctx = test_context();
        let jobs = ctx.jobs.clone();
        // An empty registry stands in for a job type with no configured
        // handler; dispatch must terminally fail the job rather than
        // leave it in_progress forever.
        let job = jobs
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})).with_max_retries(1))
            .await
            .unwrap();
        let claimed = jobs.claim_next_pending("w1").await.unwrap().unwrap();

        let poll_loop = PollLoop::new(
            "w1".to_string(),
            ctx,
            HashMap::new(),
            Duration::from_millis(1),
            600,
            Duration::from_secs(60),
        );
        poll_loop.execute(claimed).await;

        let after = jobs.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert!(after.error.unwrap().contains("No handler registered"));
    }
}
