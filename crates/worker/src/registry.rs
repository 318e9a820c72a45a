//! The handler registry: maps each [`JobType`] to the function that
//! executes it. Built once at startup and shared read-only across the
//! poll loop's lifetime.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use edgarq_core::job::JobType;
use serde_json::Value;

use crate::context::HandlerContext;
use crate::handlers;

/// A registered job-type handler.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, params: Value, ctx: &HandlerContext) -> anyhow::Result<Value>;
}

type BoxFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

/// Adapts one of the free-function handlers in [`handlers`] into a
/// [`Handler`] object, so `default_registry` doesn't need one struct per
/// job type.
struct FnHandler(for<'a> fn(Value, &'a HandlerContext) -> BoxFuture<'a>);

#[async_trait]
impl Handler for FnHandler {
    async fn call(&self, params: Value, ctx: &HandlerContext) -> anyhow::Result<Value> {
        (self.0)(params, ctx).await
    }
}

macro_rules! fn_handler {
    ($f:expr) => {
        Arc::new(FnHandler(|p, c| Box::pin($f(p, c))))
    };
}

/// The closed set of registered job-type handlers (SPEC_FULL.md §4.C).
/// A `JobType` with no entry here is a configuration error, not a
/// retryable failure — the poll loop terminally fails such jobs.
pub fn default_registry() -> HashMap<JobType, Arc<dyn Handler>> {
    let mut registry: HashMap<JobType, Arc<dyn Handler>> = HashMap::new();
    registry.insert(JobType::Test, fn_handler!(handlers::handle_test));
    registry.insert(
        JobType::CompanyIngestion,
        fn_handler!(handlers::handle_company_ingestion),
    );
    registry.insert(
        JobType::FilingIngestion,
        fn_handler!(handlers::handle_filing_ingestion),
    );
    registry.insert(
        JobType::ContentGeneration,
        fn_handler!(handlers::handle_content_generation),
    );
    registry.insert(
        JobType::IngestPipeline,
        fn_handler!(handlers::handle_ingest_pipeline),
    );
    registry.insert(
        JobType::FullPipeline,
        fn_handler!(handlers::handle_full_pipeline),
    );
    registry.insert(JobType::BulkIngest, fn_handler!(handlers::handle_bulk_ingest));
    registry.insert(
        JobType::CompanyGroupPipeline,
        fn_handler!(handlers::handle_company_group_pipeline),
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_job_type() {
        let registry = default_registry();
        for job_type in JobType::all() {
            assert!(
                registry.contains_key(job_type),
                "missing handler for {job_type}"
            );
        }
    }
}
