//! Worker configuration via environment variables, parsed at process
//! start. Mirrors `WorkerSettings` (`server/symbology/worker/config.py`):
//! same variable names under a `WORKER_` prefix, same defaults.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "edgarq-worker", about = "Background job worker")]
pub struct WorkerConfig {
    /// Seconds between queue polls.
    #[arg(long, env = "WORKER_POLL_INTERVAL", default_value_t = 2.0)]
    pub poll_interval_secs: f64,

    /// Seconds before an in-progress job is considered stale.
    #[arg(long, env = "WORKER_STALE_THRESHOLD", default_value_t = 600)]
    pub stale_threshold_secs: i64,

    /// Seconds between stale-job sweeps.
    #[arg(long, env = "WORKER_STALE_CHECK_INTERVAL", default_value_t = 60.0)]
    pub stale_check_interval_secs: f64,

    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Emit logs as JSON rather than human-readable text.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.0))
    }

    pub fn stale_check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.stale_check_interval_secs.max(0.0))
    }
}
