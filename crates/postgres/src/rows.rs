//! Maps `sqlx::postgres::PgRow` to the core entities. Status/type/trigger
//! columns are TEXT, so every row needs a `FromStr` parse rather than a
//! native enum decode.

use std::str::FromStr;

use edgarq_core::{Job, JobStatus, JobType, PipelineRun, PipelineRunStatus, PipelineTrigger};
use sqlx::Row;
use sqlx::postgres::PgRow;

use crate::{parse_unavailable, storage_unavailable};

pub fn row_to_job(row: PgRow) -> Result<Job, edgarq_core::StoreError> {
    let job_type: String = row.try_get("job_type").map_err(storage_unavailable)?;
    let status: String = row.try_get("status").map_err(storage_unavailable)?;

    Ok(Job {
        id: row.try_get("id").map_err(storage_unavailable)?,
        job_type: JobType::from_str(&job_type).map_err(parse_unavailable)?,
        params: row.try_get("params").map_err(storage_unavailable)?,
        priority: row.try_get("priority").map_err(storage_unavailable)?,
        status: JobStatus::from_str(&status).map_err(parse_unavailable)?,
        worker_id: row.try_get("worker_id").map_err(storage_unavailable)?,
        created_at: row.try_get("created_at").map_err(storage_unavailable)?,
        updated_at: row.try_get("updated_at").map_err(storage_unavailable)?,
        started_at: row.try_get("started_at").map_err(storage_unavailable)?,
        completed_at: row.try_get("completed_at").map_err(storage_unavailable)?,
        retry_count: row.try_get("retry_count").map_err(storage_unavailable)?,
        max_retries: row.try_get("max_retries").map_err(storage_unavailable)?,
        result: row.try_get("result").map_err(storage_unavailable)?,
        error: row.try_get("error").map_err(storage_unavailable)?,
        duration: row.try_get("duration").map_err(storage_unavailable)?,
    })
}

pub fn row_to_pipeline_run(row: PgRow) -> Result<PipelineRun, edgarq_core::StoreError> {
    let trigger: String = row.try_get("trigger").map_err(storage_unavailable)?;
    let status: String = row.try_get("status").map_err(storage_unavailable)?;

    Ok(PipelineRun {
        id: row.try_get("id").map_err(storage_unavailable)?,
        company_id: row.try_get("company_id").map_err(storage_unavailable)?,
        trigger: PipelineTrigger::from_str(&trigger).map_err(parse_unavailable)?,
        status: PipelineRunStatus::from_str(&status).map_err(parse_unavailable)?,
        forms: row.try_get("forms").map_err(storage_unavailable)?,
        started_at: row.try_get("started_at").map_err(storage_unavailable)?,
        completed_at: row.try_get("completed_at").map_err(storage_unavailable)?,
        error: row.try_get("error").map_err(storage_unavailable)?,
        jobs_created: row.try_get("jobs_created").map_err(storage_unavailable)?,
        jobs_completed: row.try_get("jobs_completed").map_err(storage_unavailable)?,
        jobs_failed: row.try_get("jobs_failed").map_err(storage_unavailable)?,
        metadata: row.try_get("metadata").map_err(storage_unavailable)?,
    })
}
