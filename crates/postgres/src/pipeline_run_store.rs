use async_trait::async_trait;
use edgarq_core::pipeline_run::{NewPipelineRun, PipelineRun, PipelineRunFilter};
use edgarq_core::store::{PipelineRunStore, StoreError};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::rows::row_to_pipeline_run;
use crate::storage_unavailable;

/// PostgreSQL-backed [`PipelineRunStore`].
#[derive(Clone)]
pub struct PgPipelineRunStore {
    pool: PgPool,
}

impl PgPipelineRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PipelineRunStore for PgPipelineRunStore {
    async fn create_run(&self, spec: NewPipelineRun) -> Result<PipelineRun, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO pipeline_runs (id, company_id, trigger, forms, metadata)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, company_id, trigger, status, forms, started_at, completed_at,
                      error, jobs_created, jobs_completed, jobs_failed, metadata
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(spec.company_id)
        .bind(spec.trigger.to_string())
        .bind(&spec.forms)
        .bind(spec.metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row_to_pipeline_run(row)
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, company_id, trigger, status, forms, started_at, completed_at,
                   error, jobs_created, jobs_completed, jobs_failed, metadata
            FROM pipeline_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_pipeline_run).transpose()
    }

    async fn list_runs(
        &self,
        filter: PipelineRunFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PipelineRun>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT id, company_id, trigger, status, forms, started_at, completed_at,
                   error, jobs_created, jobs_completed, jobs_failed, metadata
            FROM pipeline_runs
            WHERE 1 = 1
            "#,
        );

        if let Some(company_id) = filter.company_id {
            qb.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }

        qb.push(" ORDER BY started_at DESC NULLS LAST LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_unavailable)?;

        rows.into_iter().map(row_to_pipeline_run).collect()
    }

    async fn start_run(&self, id: Uuid) -> Result<Option<PipelineRun>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = 'running',
                started_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, company_id, trigger, status, forms, started_at, completed_at,
                      error, jobs_created, jobs_completed, jobs_failed, metadata
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_pipeline_run).transpose()
    }

    async fn complete_run(
        &self,
        id: Uuid,
        jobs_created: i32,
        jobs_completed: i32,
        jobs_failed: i32,
    ) -> Result<Option<PipelineRun>, StoreError> {
        let status = PipelineRun::classify_completion(jobs_failed).to_string();

        let row = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = $1,
                jobs_created = $2,
                jobs_completed = $3,
                jobs_failed = $4,
                completed_at = now()
            WHERE id = $5 AND status = 'running'
            RETURNING id, company_id, trigger, status, forms, started_at, completed_at,
                      error, jobs_created, jobs_completed, jobs_failed, metadata
            "#,
        )
        .bind(status)
        .bind(jobs_created)
        .bind(jobs_completed)
        .bind(jobs_failed)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_pipeline_run).transpose()
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
        let row = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = 'failed',
                error = $1,
                jobs_created = $2,
                jobs_completed = $3,
                jobs_failed = $4,
                completed_at = now()
            WHERE id = $5
            RETURNING id, company_id, trigger, status, forms, started_at, completed_at,
                      error, jobs_created, jobs_completed, jobs_failed, metadata
            "#,
        )
        .bind(error)
        .bind(jobs_created)
        .bind(jobs_completed)
        .bind(jobs_failed)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_pipeline_run).transpose()
    }

    async fn latest_run_per_company(&self) -> Result<Vec<PipelineRun>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (company_id)
                   id, company_id, trigger, status, forms, started_at, completed_at,
                   error, jobs_created, jobs_completed, jobs_failed, metadata
            FROM pipeline_runs
            WHERE started_at IS NOT NULL
            ORDER BY company_id, started_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        rows.into_iter().map(row_to_pipeline_run).collect()
    }

    async fn count_consecutive_failures(
        &self,
        company_id: Uuid,
        window: i64,
    ) -> Result<i64, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT status
            FROM pipeline_runs
            WHERE company_id = $1 AND started_at IS NOT NULL
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(window)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        let mut count = 0i64;
        for row in rows {
            let status: String = row.try_get("status").map_err(storage_unavailable)?;
            let status = status
                .parse::<edgarq_core::PipelineRunStatus>()
                .map_err(crate::parse_unavailable)?;
            if status.is_failure_like() {
                count += 1;
            } else {
                break;
            }
        }

        Ok(count)
    }
}
