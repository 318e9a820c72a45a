//! The pipeline run entity: a workflow tracking the jobs produced to
//! satisfy one ingest/summarize request for one company.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a run was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineTrigger {
    Manual,
    Scheduled,
}

impl fmt::Display for PipelineTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineTrigger::Manual => "manual",
            PipelineTrigger::Scheduled => "scheduled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PipelineTrigger {
    type Err = crate::job::UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(PipelineTrigger::Manual),
            "scheduled" => Ok(PipelineTrigger::Scheduled),
            other => Err(crate::job::UnknownVariant(other.to_string())),
        }
    }
}

/// Lifecycle state of a [`PipelineRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Partial,
}

impl fmt::Display for PipelineRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineRunStatus::Pending => "pending",
            PipelineRunStatus::Running => "running",
            PipelineRunStatus::Completed => "completed",
            PipelineRunStatus::Failed => "failed",
            PipelineRunStatus::Partial => "partial",
        };
        f.write_str(s)
    }
}

impl PipelineRunStatus {
    /// Failure-adjacent terminal states counted by
    /// `count_consecutive_failures`.
    pub fn is_failure_like(&self) -> bool {
        matches!(self, PipelineRunStatus::Failed | PipelineRunStatus::Partial)
    }
}

impl std::str::FromStr for PipelineRunStatus {
    type Err = crate::job::UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PipelineRunStatus::Pending),
            "running" => Ok(PipelineRunStatus::Running),
            "completed" => Ok(PipelineRunStatus::Completed),
            "failed" => Ok(PipelineRunStatus::Failed),
            "partial" => Ok(PipelineRunStatus::Partial),
            other => Err(crate::job::UnknownVariant(other.to_string())),
        }
    }
}

/// A multi-job workflow record for one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub company_id: Uuid,
    pub trigger: PipelineTrigger,
    pub status: PipelineRunStatus,
    pub forms: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub jobs_created: i32,
    pub jobs_completed: i32,
    pub jobs_failed: i32,
    pub metadata: serde_json::Value,
}

impl PipelineRun {
    /// `complete_run`'s terminal classification: `partial` whenever any
    /// job failed, `completed` otherwise. See SPEC_FULL.md §9 — the
    /// adopted policy matches the source's code path rather than the
    /// stricter "partial only if something also succeeded" reading.
    pub fn classify_completion(jobs_failed: i32) -> PipelineRunStatus {
        if jobs_failed > 0 {
            PipelineRunStatus::Partial
        } else {
            PipelineRunStatus::Completed
        }
    }
}

/// Parameters for creating a new pipeline run.
#[derive(Debug, Clone)]
pub struct NewPipelineRun {
    pub company_id: Uuid,
    pub forms: Vec<String>,
    pub trigger: PipelineTrigger,
    pub metadata: serde_json::Value,
}

impl NewPipelineRun {
    pub fn new(company_id: Uuid, forms: Vec<String>, trigger: PipelineTrigger) -> Self {
        Self {
            company_id,
            forms,
            trigger,
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Filter applied by [`crate::store::PipelineRunStore::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct PipelineRunFilter {
    pub company_id: Option<Uuid>,
    pub status: Option<PipelineRunStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_completion_matches_s6() {
        assert_eq!(
            PipelineRun::classify_completion(2),
            PipelineRunStatus::Partial
        );
        assert_eq!(
            PipelineRun::classify_completion(0),
            PipelineRunStatus::Completed
        );
    }

    #[test]
    fn failure_like_covers_failed_and_partial_only() {
        assert!(PipelineRunStatus::Failed.is_failure_like());
        assert!(PipelineRunStatus::Partial.is_failure_like());
        assert!(!PipelineRunStatus::Completed.is_failure_like());
        assert!(!PipelineRunStatus::Running.is_failure_like());
        assert!(!PipelineRunStatus::Pending.is_failure_like());
    }
}
