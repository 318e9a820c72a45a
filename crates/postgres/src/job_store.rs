use async_trait::async_trait;
use edgarq_core::job::{Job, JobFilter, NewJob, QueueStats};
use edgarq_core::store::{JobStore, StoreError};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::rows::row_to_job;
use crate::storage_unavailable;

/// PostgreSQL-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert_job(&self, spec: NewJob) -> Result<Job, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, params, priority, max_retries)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(spec.job_type.as_str())
        .bind(spec.params)
        .bind(spec.priority)
        .bind(spec.max_retries)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row_to_job(row)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, job_type, params, priority, status, worker_id, created_at,
                   updated_at, started_at, completed_at, retry_count, max_retries,
                   result, error, duration
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_job).transpose()
    }

    async fn list_jobs(
        &self,
        filter: JobFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT id, job_type, params, priority, status, worker_id, created_at,
                   updated_at, started_at, completed_at, retry_count, max_retries,
                   result, error, duration
            FROM jobs
            WHERE 1 = 1
            "#,
        );

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(job_type) = filter.job_type {
            qb.push(" AND job_type = ")
                .push_bind(job_type.as_str().to_string());
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_unavailable)?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn claim_next_pending(&self, worker_id: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            WITH claimable AS (
                SELECT id
                FROM jobs
                WHERE status = 'pending'
                ORDER BY priority ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'in_progress',
                worker_id = $1,
                started_at = now(),
                updated_at = now()
            WHERE id IN (SELECT id FROM claimable)
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_job).transpose()
    }

    async fn complete_job(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
    ) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                result = $1,
                completed_at = now(),
                updated_at = now(),
                duration = CASE
                    WHEN started_at IS NOT NULL
                    THEN EXTRACT(EPOCH FROM (now() - started_at))
                    ELSE NULL
                END
            WHERE id = $2 AND status = 'in_progress'
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(result)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_job).transpose()
    }

    async fn fail_job(&self, id: Uuid, error: &str) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET retry_count = retry_count + 1,
                error = $1,
                status = CASE
                    WHEN retry_count + 1 < max_retries THEN 'pending'
                    ELSE 'failed'
                END,
                worker_id = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE worker_id
                END,
                started_at = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE started_at
                END,
                completed_at = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE now()
                END,
                duration = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    WHEN started_at IS NOT NULL THEN EXTRACT(EPOCH FROM (now() - started_at))
                    ELSE NULL
                END,
                updated_at = now()
            WHERE id = $2 AND status = 'in_progress'
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(error)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_job).transpose()
    }

    async fn cancel_pending_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'cancelled',
                updated_at = now()
            WHERE id = $1 AND status = 'pending'
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        row.map(row_to_job).transpose()
    }

    async fn sweep_stale(&self, threshold_secs: i64) -> Result<Vec<Job>, StoreError> {
        let error = Job::stale_error_message(threshold_secs);

        let rows = sqlx::query(
            r#"
            UPDATE jobs
            SET retry_count = retry_count + 1,
                error = $1,
                status = CASE
                    WHEN retry_count + 1 < max_retries THEN 'pending'
                    ELSE 'failed'
                END,
                worker_id = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE worker_id
                END,
                started_at = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE started_at
                END,
                completed_at = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    ELSE now()
                END,
                duration = CASE
                    WHEN retry_count + 1 < max_retries THEN NULL
                    WHEN started_at IS NOT NULL THEN EXTRACT(EPOCH FROM (now() - started_at))
                    ELSE NULL
                END,
                updated_at = now()
            WHERE status = 'in_progress'
              AND updated_at < now() - ($2 * interval '1 second')
            RETURNING id, job_type, params, priority, status, worker_id, created_at,
                      updated_at, started_at, completed_at, retry_count, max_retries,
                      result, error, duration
            "#,
        )
        .bind(error)
        .bind(threshold_secs as f64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        rows.into_iter().map(row_to_job).collect()
    }

    async fn queue_stats(&self) -> Result<QueueStats, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'in_progress') as in_progress,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed,
                COUNT(*) FILTER (WHERE status = 'cancelled') as cancelled
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage_unavailable)?;

        Ok(QueueStats {
            pending: row.get("pending"),
            in_progress: row.get("in_progress"),
            completed: row.get("completed"),
            failed: row.get("failed"),
            cancelled: row.get("cancelled"),
        })
    }
}
