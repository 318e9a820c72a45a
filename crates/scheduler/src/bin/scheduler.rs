//! Scheduler process entry point. Runs the poll/alert tick on a fixed
//! interval until a signal trips the shutdown token, mirroring
//! `scheduler/main.py`'s run loop (poll, then check alerts, then sleep in
//! short increments so shutdown is noticed promptly).
//!
//! `EdgarClient` and `ContentStore` are specified only by contract (§6);
//! concrete implementations are out of scope here, same as in the worker
//! binary.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use edgarq_core::{ContentStore, EdgarClient, FilingRef, ShutdownToken};
use edgarq_postgres::{PgJobStore, PgPipelineRunStore};
use edgarq_scheduler::{check_alerts, poll_all_companies, poll_all_filings, AlertDeps, PollingDeps, SchedulerConfig};

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

/// Upper bound on one chunk of the inter-tick sleep, so a tripped shutdown
/// token is noticed within a few seconds even when `poll_interval` is
/// hours long.
const SLEEP_CHUNK: Duration = Duration::from_secs(5);

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
    let config = SchedulerConfig::parse();
    init_tracing(config.log_json);

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .context("connecting to database")?;

    let shutdown = ShutdownToken::new();
    shutdown.spawn_signal_trap();

    let collaborator = Arc::new(UnconfiguredCollaborator("collaborator"));
    let jobs = Arc::new(PgJobStore::new(pool.clone()));
    let runs = Arc::new(PgPipelineRunStore::new(pool));

    let polling_deps = PollingDeps {
        edgar: collaborator.clone(),
        content: collaborator.clone(),
        jobs,
    };
    let alert_deps = AlertDeps {
        runs,
        content: collaborator,
        http: reqwest::Client::new(),
    };

    while !shutdown.is_tripped() {
        if let Err(error) = poll_all_companies(
            &polling_deps,
            &config.enabled_forms,
            config.filing_lookback_days,
        )
        .await
        {
            tracing::error!(%error, "poll_all_companies_failed");
        }

        if config.bulk_ingest_enabled {
            if let Err(error) = poll_all_filings(
                &polling_deps,
                &config.bulk_ingest_forms,
                config.bulk_ingest_batch_size,
            )
            .await
            {
                tracing::error!(%error, "poll_all_filings_failed");
            }
        }

        if let Err(error) = check_alerts(&alert_deps, &config).await {
            tracing::error!(%error, "check_alerts_failed");
        }

        sleep_until_next_tick(&shutdown, config.poll_interval()).await;
    }

    tracing::info!("scheduler_shutdown");
    Ok(())
}

async fn sleep_until_next_tick(shutdown: &ShutdownToken, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() {
        if shutdown.is_tripped() {
            return;
        }
        let chunk = remaining.min(SLEEP_CHUNK);
        if shutdown.sleep_interruptible(chunk).await.is_err() {
            return;
        }
        remaining -= chunk;
    }
}
