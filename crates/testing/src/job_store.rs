use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use edgarq_core::job::{Job, JobFilter, JobStatus, NewJob, QueueStats};
use edgarq_core::store::{JobStore, StoreError};
use edgarq_core::Clock;
use uuid::Uuid;

/// In-memory [`JobStore`]. Selection for `claim_next_pending` and the
/// retry-policy updates in `fail_job`/`sweep_stale` happen under
/// `claim_lock`, the in-process analogue of `SELECT ... FOR UPDATE SKIP
/// LOCKED`: it guarantees at most one caller ever wins a given job's lease.
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, Job>,
    claim_lock: tokio::sync::Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl InMemoryJobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            jobs: DashMap::new(),
            claim_lock: tokio::sync::Mutex::new(()),
            clock,
        }
    }

    fn apply_retry_policy(&self, job: &mut Job, error: &str) {
        let now = self.clock.now();
        job.retry_count += 1;
        job.error = Some(error.to_string());
        job.updated_at = now;
        if job.retry_count < job.max_retries {
            job.status = JobStatus::Pending;
            job.worker_id = None;
            job.started_at = None;
            job.completed_at = None;
            job.duration = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(now);
            job.duration = job
                .started_at
                .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, spec: NewJob) -> Result<Job, StoreError> {
        let now = self.clock.now();
        let job = Job {
            id: Uuid::now_v7(),
            job_type: spec.job_type,
            params: spec.params,
            priority: spec.priority,
            status: JobStatus::Pending,
            worker_id: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            retry_count: 0,
            max_retries: spec.max_retries,
            result: None,
            error: None,
            duration: None,
        };
        self.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.get(&id).map(|entry| entry.clone()))
    }

    async fn list_jobs(
        &self,
        filter: JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|job| filter.status.map_or(true, |s| s == job.status))
            .filter(|job| filter.job_type.map_or(true, |t| t == job.job_type))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError> {
        let _guard = self.claim_lock.lock().await;

        let candidate = self
            .jobs
            .iter()
            .filter(|entry| entry.value().status == JobStatus::Pending)
            .map(|entry| (entry.value().priority, entry.value().created_at, *entry.key()))
            .min();

        let Some((_, _, id)) = candidate else {
            return Ok(None);
        };

        let mut entry = self.jobs.get_mut(&id).expect("candidate id just selected");
        let now = self.clock.now();
        entry.status = JobStatus::InProgress;
        entry.worker_id = Some(worker_id.to_string());
        entry.started_at = Some(now);
        entry.updated_at = now;
        Ok(Some(entry.clone()))
    }

    async fn complete_job(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<Option<Job>, StoreError> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != JobStatus::InProgress {
            return Ok(None);
        }
        let now = self.clock.now();
        entry.status = JobStatus::Completed;
        entry.result = result;
        entry.completed_at = Some(now);
        entry.updated_at = now;
        entry.duration = entry
            .started_at
            .map(|started| (now - started).num_milliseconds() as f64 / 1000.0);
        Ok(Some(entry.clone()))
    }

    async fn fail_job(&self, id: Uuid, error: &str) -> Result<Option<Job>, StoreError> {
        let _guard = self.claim_lock.lock().await;
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != JobStatus::InProgress {
            return Ok(None);
        }
        self.apply_retry_policy(&mut entry, error);
        Ok(Some(entry.clone()))
    }

    async fn cancel_pending_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let Some(mut entry) = self.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != JobStatus::Pending {
            return Ok(None);
        }
        entry.status = JobStatus::Cancelled;
        entry.updated_at = self.clock.now();
        Ok(Some(entry.clone()))
    }

    async fn sweep_stale(&self, threshold_secs: i64) -> Result<Vec<Job>, StoreError> {
        let _guard = self.claim_lock.lock().await;
        let cutoff = self.clock.now() - Duration::seconds(threshold_secs);
        let error = Job::stale_error_message(threshold_secs);

        let stale_ids: Vec<Uuid> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().status == JobStatus::InProgress)
            .filter(|entry| entry.value().updated_at < cutoff)
            .map(|entry| *entry.key())
            .collect();

        let mut swept = Vec::with_capacity(stale_ids.len());
        for id in stale_ids {
            let mut entry = self.jobs.get_mut(&id).expect("stale id just selected");
            self.apply_retry_policy(&mut entry, &error);
            swept.push(entry.clone());
        }
        Ok(swept)
    }

    async fn queue_stats(&self) -> Result<QueueStats, StoreError> {
        let mut stats = QueueStats::default();
        for entry in self.jobs.iter() {
            match entry.value().status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use edgarq_core::job::JobType;
    use edgarq_core::SystemClock;

    use super::*;
    use crate::ManualClock;

    #[tokio::test]
    async fn claim_returns_lowest_priority_oldest_job_first() {
        let store = InMemoryJobStore::new(Arc::new(SystemClock));
        let low = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})).with_priority(4))
            .await
            .unwrap();
        let high = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})).with_priority(0))
            .await
            .unwrap();

        let claimed = store.claim_next_pending("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, high.id);
        assert_ne!(claimed.id, low.id);
    }

    #[tokio::test]
    async fn claim_on_empty_queue_returns_none() {
        let store = InMemoryJobStore::new(Arc::new(SystemClock));
        assert!(store.claim_next_pending("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fail_job_requeues_until_retry_budget_exhausted() {
        let store = InMemoryJobStore::new(Arc::new(SystemClock));
        let job = store
            .insert_job(
                NewJob::new(JobType::Test, serde_json::json!({})).with_max_retries(2),
            )
            .await
            .unwrap();

        store.claim_next_pending("w1").await.unwrap();
        let after_first = store.fail_job(job.id, "boom").await.unwrap().unwrap();
        assert_eq!(after_first.status, JobStatus::Pending);
        assert_eq!(after_first.retry_count, 1);

        store.claim_next_pending("w1").await.unwrap();
        let after_second = store.fail_job(job.id, "boom again").await.unwrap().unwrap();
        assert_eq!(after_second.status, JobStatus::Failed);
        assert_eq!(after_second.retry_count, 2);
    }

    #[tokio::test]
    async fn cancel_only_succeeds_while_pending() {
        let store = InMemoryJobStore::new(Arc::new(SystemClock));
        let job = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
            .await
            .unwrap();

        store.claim_next_pending("w1").await.unwrap();
        // Now in_progress: cancel must refuse and leave the job untouched.
        assert!(store.cancel_pending_job(job.id).await.unwrap().is_none());
        let still_in_progress = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(still_in_progress.status, JobStatus::InProgress);

        let pending = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
            .await
            .unwrap();
        let cancelled = store.cancel_pending_job(pending.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        // No claim can ever return the cancelled job.
        for _ in 0..3 {
            let claimed = store.claim_next_pending("w2").await.unwrap();
            assert!(claimed.map_or(true, |j| j.id != pending.id));
        }
    }

    #[tokio::test]
    async fn concurrent_claims_never_double_lease() {
        let store = Arc::new(InMemoryJobStore::new(Arc::new(SystemClock)));
        for _ in 0..20 {
            store
                .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for w in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    match store.claim_next_pending(&format!("w{w}")).await.unwrap() {
                        Some(job) => claimed.push(job.id),
                        None => break,
                    }
                }
                claimed
            }));
        }

        let mut all_claimed = Vec::new();
        for handle in handles {
            all_claimed.extend(handle.await.unwrap());
        }

        let unique: std::collections::HashSet<_> = all_claimed.iter().collect();
        assert_eq!(unique.len(), all_claimed.len(), "no job claimed twice");
        assert_eq!(all_claimed.len(), 20, "every job claimed exactly once");
    }

    #[tokio::test]
    async fn queue_stats_counts_each_status() {
        let store = InMemoryJobStore::new(Arc::new(SystemClock));
        let to_complete = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
            .await
            .unwrap();
        store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
            .await
            .unwrap();

        let claimed = store.claim_next_pending("w1").await.unwrap().unwrap();
        assert_eq!(claimed.id, to_complete.id);
        store.complete_job(to_complete.id, None).await.unwrap();

        let stats = store.queue_stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_progress, 0);
    }

    #[tokio::test]
    async fn sweep_stale_applies_retry_policy_and_distinguished_message() {
        let clock = Arc::new(ManualClock::epoch());
        let store = InMemoryJobStore::new(clock.clone());
        let job = store
            .insert_job(NewJob::new(JobType::Test, serde_json::json!({})))
            .await
            .unwrap();
        store.claim_next_pending("w1").await.unwrap();

        clock.advance(Duration::seconds(700));
        let swept = store.sweep_stale(600).await.unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].id, job.id);
        assert!(swept[0].error.as_ref().unwrap().contains("Stale"));
    }
}
