//! Alert detection and webhook dispatch for pipeline monitoring. Grounded
//! on `scheduler/alerts.py`'s `detect_consecutive_failures`/
//! `detect_stale_runs`/`send_webhook`/`check_alerts`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use edgarq_core::pipeline_run::{PipelineRunFilter, PipelineRunStatus};
use edgarq_core::{ContentStore, PipelineRunStore};
use serde_json::json;
use uuid::Uuid;

use crate::config::SchedulerConfig;

/// How many of a company's most recent runs `count_consecutive_failures`
/// considers. The original system has no cap beyond "all of them"; a
/// large-but-bounded window avoids an unbounded scan for companies with a
/// very long run history.
const FAILURE_LOOKBACK_WINDOW: i64 = 200;

/// Runs considered for the stale-run alert in one pass. Bounded the same
/// way `list_pipeline_runs` is bounded everywhere else in this system.
const STALE_RUN_SCAN_LIMIT: i64 = 1000;

#[derive(Debug, Clone)]
pub struct FailureAlert {
    pub company_id: Uuid,
    pub ticker: String,
    pub consecutive_failures: i64,
}

#[derive(Debug, Clone)]
pub struct StaleRunAlert {
    pub run_id: Uuid,
    pub company_id: Uuid,
    pub stale_seconds: i64,
}

pub struct AlertDeps {
    pub runs: Arc<dyn PipelineRunStore>,
    pub content: Arc<dyn ContentStore>,
    pub http: reqwest::Client,
}

/// Finds companies whose most recent runs have failed at least `threshold`
/// times in a row.
pub async fn detect_consecutive_failures(
    deps: &AlertDeps,
    threshold: i64,
) -> anyhow::Result<Vec<FailureAlert>> {
    let latest_runs = deps.runs.latest_run_per_company().await?;
    let mut alerts = Vec::new();

    for run in latest_runs {
        let failures = deps
            .runs
            .count_consecutive_failures(run.company_id, FAILURE_LOOKBACK_WINDOW)
            .await?;
        if failures < threshold {
            continue;
        }
        let ticker = deps
            .content
            .ticker_for_company(run.company_id)
            .await?
            .unwrap_or_else(|| "unknown".to_string());
        alerts.push(FailureAlert {
            company_id: run.company_id,
            ticker,
            consecutive_failures: failures,
        });
    }

    Ok(alerts)
}

/// Finds runs stuck in `running` beyond `threshold_seconds`.
pub async fn detect_stale_runs(
    deps: &AlertDeps,
    threshold_secs: i64,
) -> anyhow::Result<Vec<StaleRunAlert>> {
    let filter = PipelineRunFilter {
        status: Some(PipelineRunStatus::Running),
        ..Default::default()
    };
    let running = deps.runs.list_runs(filter, STALE_RUN_SCAN_LIMIT, 0).await?;

    let now = Utc::now();
    let mut alerts = Vec::new();
    for run in running {
        let Some(started_at) = run.started_at else {
            continue;
        };
        let stale_seconds = (now - started_at).num_seconds();
        if stale_seconds > threshold_secs {
            alerts.push(StaleRunAlert {
                run_id: run.id,
                company_id: run.company_id,
                stale_seconds,
            });
        }
    }

    Ok(alerts)
}

/// POSTs an alert payload to `url`. Logs only the hostname, never the
/// full URL (which may embed credentials or a signed path).
pub async fn send_webhook(client: &reqwest::Client, url: &str, payload: &serde_json::Value, timeout: Duration) {
    let host = reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    match client.post(url).timeout(timeout).json(payload).send().await {
        Ok(response) => {
            tracing::info!(url_host = %host, status = response.status().as_u16(), "alert_webhook_sent");
        }
        Err(error) => {
            tracing::error!(url_host = %host, %error, "alert_webhook_failed");
        }
    }
}

/// Orchestrates alert detection and dispatch. Called once per scheduler
/// tick.
pub async fn check_alerts(deps: &AlertDeps, config: &SchedulerConfig) -> anyhow::Result<()> {
    let failure_alerts =
        detect_consecutive_failures(deps, config.alert_consecutive_failure_threshold).await?;
    let stale_alerts =
        detect_stale_runs(deps, config.alert_stale_run_threshold_secs).await?;

    for alert in &failure_alerts {
        tracing::warn!(
            ticker = %alert.ticker,
            company_id = %alert.company_id,
            consecutive_failures = alert.consecutive_failures,
            "alert_consecutive_failures"
        );
    }
    for alert in &stale_alerts {
        tracing::warn!(
            run_id = %alert.run_id,
            company_id = %alert.company_id,
            stale_seconds = alert.stale_seconds,
            "alert_stale_run"
        );
    }

    tracing::info!(
        failure_alerts = failure_alerts.len(),
        stale_alerts = stale_alerts.len(),
        "alert_check_completed"
    );

    if let Some(url) = &config.alert_webhook_url {
        if !failure_alerts.is_empty() || !stale_alerts.is_empty() {
            let payload = json!({
                "failure_alerts": failure_alerts.iter().map(|a| json!({
                    "company_id": a.company_id.to_string(),
                    "ticker": a.ticker,
                    "consecutive_failures": a.consecutive_failures,
                })).collect::<Vec<_>>(),
                "stale_alerts": stale_alerts.iter().map(|a| json!({
                    "run_id": a.run_id.to_string(),
                    "company_id": a.company_id.to_string(),
                    "stale_seconds": a.stale_seconds,
                })).collect::<Vec<_>>(),
            });
            send_webhook(&deps.http, url, &payload, config.alert_webhook_timeout()).await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgarq_core::pipeline_run::{NewPipelineRun, PipelineTrigger};
    use edgarq_core::SystemClock;
    use edgarq_testing::InMemoryPipelineRunStore;

    fn deps_with(runs: Arc<dyn PipelineRunStore>, content: Arc<dyn ContentStore>) -> AlertDeps {
        AlertDeps {
            runs,
            content,
            http: reqwest::Client::new(),
        }
    }

    #[tokio::test]
    async fn consecutive_failures_below_threshold_produce_no_alert() {
        let runs: Arc<dyn PipelineRunStore> =
            Arc::new(InMemoryPipelineRunStore::new(Arc::new(SystemClock)));
        let company_id = Uuid::now_v7();
        let run = runs
            .create_run(NewPipelineRun::new(company_id, vec![], PipelineTrigger::Scheduled))
            .await
            .unwrap();
        runs.start_run(run.id).await.unwrap();
        runs.complete_run(run.id, 1, 1, 1).await.unwrap();

        let content: Arc<dyn ContentStore> = crate::test_support::test_content_store();
        let deps = deps_with(runs, content);

        let alerts = detect_consecutive_failures(&deps, 3).await.unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn stale_run_past_threshold_is_flagged() {
        let runs: Arc<dyn PipelineRunStore> =
            Arc::new(InMemoryPipelineRunStore::new(Arc::new(SystemClock)));
        let company_id = Uuid::now_v7();
        let run = runs
            .create_run(NewPipelineRun::new(company_id, vec![], PipelineTrigger::Scheduled))
            .await
            .unwrap();
        runs.start_run(run.id).await.unwrap();

        let content: Arc<dyn ContentStore> = crate::test_support::test_content_store();
        let deps = deps_with(runs, content);

        // threshold of 0 seconds: any started run counts as stale immediately.
        let alerts = detect_stale_runs(&deps, 0).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].company_id, company_id);
    }
}
