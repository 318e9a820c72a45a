//! Scheduler configuration via environment variables. Mirrors
//! `SchedulerSettings` (`server/symbology/scheduler/config.py`): same
//! variable names under a `SCHEDULER_` prefix, same defaults.

use std::time::Duration;

use clap::Parser;

fn parse_csv(raw: &str) -> Result<Vec<String>, String> {
    Ok(raw.split(',').map(str::trim).map(str::to_string).collect())
}

#[derive(Debug, Clone, Parser)]
#[command(name = "edgarq-scheduler", about = "Periodic EDGAR discovery and alerting")]
pub struct SchedulerConfig {
    /// Seconds between polling cycles (default 6 hours).
    #[arg(long, env = "SCHEDULER_POLL_INTERVAL", default_value_t = 21600)]
    pub poll_interval_secs: i64,

    /// Form types polled for each tracked company.
    #[arg(
        long,
        env = "SCHEDULER_ENABLED_FORMS",
        value_parser = parse_csv,
        default_value = "10-K,10-Q"
    )]
    pub enabled_forms: Vec<String>,

    /// How far back to consider a filing "new".
    #[arg(long, env = "SCHEDULER_FILING_LOOKBACK_DAYS", default_value_t = 30)]
    pub filing_lookback_days: i64,

    /// Enable polling EDGAR's full current-filings feed, not just tracked
    /// companies.
    #[arg(long, env = "SCHEDULER_BULK_INGEST_ENABLED", default_value_t = false)]
    pub bulk_ingest_enabled: bool,

    /// Form types considered by bulk discovery.
    #[arg(
        long,
        env = "SCHEDULER_BULK_INGEST_FORMS",
        value_parser = parse_csv,
        default_value = "10-K,10-K/A,10-Q,10-Q/A"
    )]
    pub bulk_ingest_forms: Vec<String>,

    /// Filings per `bulk_ingest` job.
    #[arg(long, env = "SCHEDULER_BULK_INGEST_BATCH_SIZE", default_value_t = 50)]
    pub bulk_ingest_batch_size: usize,

    /// Consecutive failing runs before a company triggers an alert.
    #[arg(
        long,
        env = "SCHEDULER_ALERT_CONSECUTIVE_FAILURE_THRESHOLD",
        default_value_t = 3
    )]
    pub alert_consecutive_failure_threshold: i64,

    /// Seconds a run may stay `running` before it's considered stale.
    #[arg(
        long,
        env = "SCHEDULER_ALERT_STALE_RUN_THRESHOLD_SECONDS",
        default_value_t = 7200
    )]
    pub alert_stale_run_threshold_secs: i64,

    /// Webhook POST target for alert payloads. No alerts are sent if unset.
    #[arg(long, env = "SCHEDULER_ALERT_WEBHOOK_URL")]
    pub alert_webhook_url: Option<String>,

    /// Webhook request timeout.
    #[arg(long, env = "SCHEDULER_ALERT_WEBHOOK_TIMEOUT", default_value_t = 10)]
    pub alert_webhook_timeout_secs: u64,

    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(0) as u64)
    }

    pub fn alert_webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.alert_webhook_timeout_secs)
    }
}
