//! Worker process entry point. Wires the handler registry, the Postgres
//! stores, and the process-wide shutdown token, then runs the poll loop
//! until a signal trips the token.
//!
//! The four external collaborators (§6: `EdgarClient`, `DocumentExtractor`,
//! `LLMClient`, `ContentStore`) are specified only by contract — concrete
//! implementations (an EDGAR HTTP fetcher, an HTML/XBRL extractor, an LLM
//! API client, a domain-table adapter) are out of scope for this layer and
//! are supplied by whatever deployment wires this binary together. The
//! stubs below satisfy the trait bounds so the worker can start; replace
//! them with real adapters before running against production traffic.

use std::sync::Arc;

use anyhow::Context;
use edgarq_core::{ContentStore, DocumentExtractor, EdgarClient, FilingRef, GenerationResult, LLMClient, ModelConfig, ShutdownToken};
use edgarq_postgres::{PgJobStore, PgPipelineRunStore};
use edgarq_worker::{default_registry, HandlerContext, PollLoop, WorkerConfig};
use clap::Parser;

struct UnconfiguredCollaborator(&'static str);

#[async_trait::async_trait]
impl EdgarClient for UnconfiguredCollaborator {
    async fn get_recent_filings(&self, _: &str, _: &str, _: usize) -> anyhow::Result<Vec<FilingRef>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn get_current_filings(&self, _: &str) -> anyhow::Result<Vec<FilingRef>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn get_filings_by_date(
        &self,
        _: &str,
        _: chrono::NaiveDate,
        _: chrono::NaiveDate,
    ) -> anyhow::Result<Vec<FilingRef>> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

#[async_trait::async_trait]
impl DocumentExtractor for UnconfiguredCollaborator {
    async fn get_sections(
        &self,
        _: &FilingRef,
        _: &[&str],
    ) -> anyhow::Result<std::collections::HashMap<String, String>> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

#[async_trait::async_trait]
impl LLMClient for UnconfiguredCollaborator {
    async fn generate(&self, _: &ModelConfig, _: &str, _: &str) -> anyhow::Result<GenerationResult> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

#[async_trait::async_trait]
impl ContentStore for UnconfiguredCollaborator {
    async fn upsert_company(&self, _: &str, _: &str) -> anyhow::Result<uuid::Uuid> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn upsert_filing(&self, _: uuid::Uuid, _: &FilingRef) -> anyhow::Result<uuid::Uuid> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn store_generated_content(
        &self,
        _: uuid::Uuid,
        _: &[uuid::Uuid],
        _: &str,
        _: &str,
    ) -> anyhow::Result<uuid::Uuid> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn ticker_for_company(&self, _: uuid::Uuid) -> anyhow::Result<Option<String>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn all_tracked_tickers(&self) -> anyhow::Result<Vec<String>> {
        anyhow::bail!("{} is not configured", self.0)
    }
    async fn known_accession_numbers(
        &self,
        _: uuid::Uuid,
        _: &[String],
    ) -> anyhow::Result<std::collections::HashSet<String>> {
        anyhow::bail!("{} is not configured", self.0)
    }
}

fn init_tracing(log_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = WorkerConfig::parse();
    init_tracing(config.log_json);

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .context("connecting to database")?;

    let shutdown = ShutdownToken::new();
    shutdown.spawn_signal_trap();

    let worker_id = format!(
        "{}-{}",
        hostname_or_default(),
        std::process::id()
    );

    let collaborator = Arc::new(UnconfiguredCollaborator("collaborator"));
    let ctx = HandlerContext {
        edgar: collaborator.clone(),
        extractor: collaborator.clone(),
        llm: collaborator.clone(),
        content: collaborator,
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        runs: Arc::new(PgPipelineRunStore::new(pool)),
        shutdown,
    };

    PollLoop::new(
        worker_id,
        ctx,
        default_registry(),
        config.poll_interval(),
        config.stale_threshold_secs,
        config.stale_check_interval(),
    )
    .run()
    .await;

    Ok(())
}

fn hostname_or_default() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "worker".to_string())
}
