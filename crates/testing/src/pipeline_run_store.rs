use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use edgarq_core::pipeline_run::{
    NewPipelineRun, PipelineRun, PipelineRunFilter, PipelineRunStatus,
};
use edgarq_core::store::{PipelineRunStore, StoreError};
use edgarq_core::Clock;
use uuid::Uuid;

/// In-memory [`PipelineRunStore`].
pub struct InMemoryPipelineRunStore {
    runs: DashMap<Uuid, PipelineRun>,
    clock: Arc<dyn Clock>,
}

impl InMemoryPipelineRunStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            runs: DashMap::new(),
            clock,
        }
    }
}

#[async_trait]
impl PipelineRunStore for InMemoryPipelineRunStore {
    async fn create_run(&self, spec: NewPipelineRun) -> Result<PipelineRun, StoreError> {
        let run = PipelineRun {
            id: Uuid::now_v7(),
            company_id: spec.company_id,
            trigger: spec.trigger,
            status: PipelineRunStatus::Pending,
            forms: spec.forms,
            started_at: None,
            completed_at: None,
            error: None,
            jobs_created: 0,
            jobs_completed: 0,
            jobs_failed: 0,
            metadata: spec.metadata,
        };
        self.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        Ok(self.runs.get(&id).map(|entry| entry.clone()))
    }

    async fn list_runs(
        &self,
        filter: PipelineRunFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PipelineRun>, StoreError> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|run| filter.company_id.map_or(true, |c| c == run.company_id))
            .filter(|run| filter.status.map_or(true, |s| s == run.status))
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn start_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        let Some(mut entry) = self.runs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != PipelineRunStatus::Pending {
            return Ok(None);
        }
        entry.status = PipelineRunStatus::Running;
        entry.started_at = Some(self.clock.now());
        Ok(Some(entry.clone()))
    }

    async fn complete_run(
        &self,
        id: Uuid,
        jobs_created: i32,
        jobs_completed: i32,
        jobs_failed: i32,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let Some(mut entry) = self.runs.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != PipelineRunStatus::Running {
            return Ok(None);
        }
        entry.status = PipelineRun::classify_completion(jobs_failed);
        entry.jobs_created = jobs_created;
        entry.jobs_completed = jobs_completed;
        entry.jobs_failed = jobs_failed;
        entry.completed_at = Some(self.clock.now());
        Ok(Some(entry.clone()))
    }

    /// Unconditional terminal failure: unlike `complete_run`, this applies
    /// regardless of the run's current status (matching the source's
    /// `fail_pipeline_run`, which carries no status guard at all).
    async fn fail_run(
        &self,
        id: Uuid,
        error: &str,
        jobs_created: i32,
        jobs_completed: i32,
        jobs_failed: i32,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let Some(mut entry) = self.runs.get_mut(&id) else {
            return Ok(None);
        };
        entry.status = PipelineRunStatus::Failed;
        entry.error = Some(error.to_string());
        entry.jobs_created = jobs_created;
        entry.jobs_completed = jobs_completed;
        entry.jobs_failed = jobs_failed;
        entry.completed_at = Some(self.clock.now());
        Ok(Some(entry.clone()))
    }

    async fn latest_run_per_company(&self) -> Result<Vec<PipelineRun>, StoreError> {
        let mut latest: std::collections::HashMap<Uuid, PipelineRun> =
            std::collections::HashMap::new();
        for entry in self.runs.iter() {
            let run = entry.value();
            let Some(started_at) = run.started_at else {
                continue;
            };
            match latest.get(&run.company_id) {
                Some(existing) if existing.started_at.unwrap_or_default() >= started_at => {}
                _ => {
                    latest.insert(run.company_id, run.clone());
                }
            }
        }
        let mut runs: Vec<PipelineRun> = latest.into_values().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    async fn count_consecutive_failures(
        &self,
        company_id: Uuid,
        window: i64,
    ) -> Result<i64, StoreError> {
        let mut runs: Vec<PipelineRun> = self
            .runs
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|run| run.company_id == company_id && run.started_at.is_some())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let mut count = 0i64;
        for run in runs.into_iter().take(window.max(0) as usize) {
            if run.status.is_failure_like() {
                count += 1;
            } else {
                break;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use edgarq_core::pipeline_run::PipelineTrigger;
    use edgarq_core::SystemClock;

    use super::*;
    use crate::ManualClock;
    use chrono::Duration;

    #[tokio::test]
    async fn fail_run_is_unconditional_terminal_failure() {
        let store = InMemoryPipelineRunStore::new(Arc::new(SystemClock));

        // From `pending` (never started).
        let pending = store
            .create_run(NewPipelineRun::new(
                Uuid::now_v7(),
                vec![],
                PipelineTrigger::Scheduled,
            ))
            .await
            .unwrap();
        let failed = store
            .fail_run(pending.id, "aborted before start", 0, 0, 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, PipelineRunStatus::Failed);

        // From `running`.
        let running = store
            .create_run(NewPipelineRun::new(
                Uuid::now_v7(),
                vec![],
                PipelineTrigger::Scheduled,
            ))
            .await
            .unwrap();
        store.start_run(running.id).await.unwrap();
        let failed = store
            .fail_run(running.id, "boom", 2, 1, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, PipelineRunStatus::Failed);
        assert_eq!(failed.jobs_created, 2);

        // From an already-`completed` run — still applies unconditionally.
        let completed = store
            .create_run(NewPipelineRun::new(
                Uuid::now_v7(),
                vec![],
                PipelineTrigger::Scheduled,
            ))
            .await
            .unwrap();
        store.start_run(completed.id).await.unwrap();
        store.complete_run(completed.id, 1, 1, 0).await.unwrap();
        let refailed = store
            .fail_run(completed.id, "retroactive failure", 1, 1, 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refailed.status, PipelineRunStatus::Failed);

        // Unknown id still returns `None`.
        assert!(store
            .fail_run(Uuid::now_v7(), "boom", 0, 0, 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn complete_run_classifies_partial_when_any_job_failed() {
        let store = InMemoryPipelineRunStore::new(Arc::new(SystemClock));
        let run = store
            .create_run(NewPipelineRun::new(
                Uuid::now_v7(),
                vec!["10-K".to_string()],
                PipelineTrigger::Scheduled,
            ))
            .await
            .unwrap();
        store.start_run(run.id).await.unwrap();

        let completed = store.complete_run(run.id, 3, 2, 1).await.unwrap().unwrap();
        assert_eq!(completed.status, PipelineRunStatus::Partial);
    }

    #[tokio::test]
    async fn count_consecutive_failures_stops_at_first_success() {
        let clock = Arc::new(ManualClock::epoch());
        let store = InMemoryPipelineRunStore::new(clock.clone());
        let company = Uuid::now_v7();

        // Oldest to newest: failed, failed, completed, failed. Counting
        // newest-first must stop at the completed run and report 1.
        for jobs_failed in [1, 1, 0, 1] {
            let run = store
                .create_run(NewPipelineRun::new(
                    company,
                    vec![],
                    PipelineTrigger::Scheduled,
                ))
                .await
                .unwrap();
            store.start_run(run.id).await.unwrap();
            store.complete_run(run.id, 1, 1, jobs_failed).await.unwrap();
            clock.advance(Duration::seconds(1));
        }

        let total = store.count_consecutive_failures(company, 10).await.unwrap();
        assert_eq!(total, 1);
    }
}
