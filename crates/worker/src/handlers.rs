//! The closed set of job-type handlers (SPEC_FULL.md §4.C). Each handler
//! takes the job's opaque `params` and the shared [`HandlerContext`] and
//! returns a JSON result stored verbatim on the job row, or an error that
//! the poll loop records via the queue's retry policy.
//!
//! Mirrors the single-module shape of the original `worker/handlers.py`:
//! one handler per registered job type, plus the compound handlers that
//! call others in sequence.

use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use edgarq_core::{
    ContentStore, DocumentExtractor, EdgarClient, FilingRef, LLMClient, ModelConfig,
    NewPipelineRun, PipelineRunStore, PipelineTrigger,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::context::HandlerContext;

fn require_str<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("missing required param '{key}'"))
}

fn require_uuid(params: &Value, key: &str) -> anyhow::Result<Uuid> {
    let raw = require_str(params, key)?;
    Uuid::parse_str(raw).map_err(|e| anyhow::anyhow!("param '{key}' is not a valid uuid: {e}"))
}

/// Echo handler used by integration tests (S1 in SPEC_FULL.md §8).
pub async fn handle_test(params: Value, _ctx: &HandlerContext) -> anyhow::Result<Value> {
    Ok(json!({"echo": params, "status": "ok"}))
}

/// Fetches company metadata (derived from its most recent `10-K`) and
/// upserts it into the content store.
pub async fn handle_company_ingestion(
    params: Value,
    ctx: &HandlerContext,
) -> anyhow::Result<Value> {
    let ticker = require_str(&params, "ticker")?;

    let filings = ctx.edgar.get_recent_filings(ticker, "10-K", 1).await?;
    let name = filings
        .first()
        .map(|f| f.company_name.clone())
        .unwrap_or_else(|| ticker.to_string());

    let company_id = ctx.content.upsert_company(ticker, &name).await?;

    Ok(json!({
        "ticker": ticker,
        "company_id": company_id.to_string(),
        "name": name,
    }))
}

/// Fetches recent filings for one company/form and upserts them,
/// optionally extracting document sections along the way.
pub async fn handle_filing_ingestion(
    params: Value,
    ctx: &HandlerContext,
) -> anyhow::Result<Value> {
    let company_id = require_uuid(&params, "company_id")?;
    let ticker = require_str(&params, "ticker")?;
    let form = params
        .get("form")
        .and_then(Value::as_str)
        .unwrap_or("10-K")
        .to_string();
    let count = params.get("count").and_then(Value::as_u64).unwrap_or(5) as usize;
    let include_documents = params
        .get("include_documents")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let filings = ctx.edgar.get_recent_filings(ticker, &form, count).await?;
    let mut filing_ids = Vec::with_capacity(filings.len());

    for filing in &filings {
        let filing_id = ctx.content.upsert_filing(company_id, filing).await?;
        if include_documents {
            if let Err(error) = ctx
                .extractor
                .get_sections(filing, edgarq_core::SECTION_KINDS)
                .await
            {
                tracing::warn!(
                    %error,
                    accession = %filing.accession_number,
                    "section_extraction_failed"
                );
            }
        }
        filing_ids.push(filing_id.to_string());
    }

    Ok(json!({
        "ticker": ticker,
        "form": form,
        "filing_ids": filing_ids,
    }))
}

/// Invokes the LLM (through the bounded retry helper) for one
/// (company, document-set, prompt) and stores the generated text.
pub async fn handle_content_generation(
    params: Value,
    ctx: &HandlerContext,
) -> anyhow::Result<Value> {
    let company_id = require_uuid(&params, "company_id")?;
    let document_ids: Vec<Uuid> = params
        .get("document_ids")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                .collect()
        })
        .unwrap_or_default();
    let system_prompt = params
        .get("system_prompt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let user_prompt = require_str(&params, "user_prompt")?.to_string();
    let model_config = ModelConfig {
        model: params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string(),
        max_tokens: params
            .get("max_tokens")
            .and_then(Value::as_u64)
            .unwrap_or(1024) as u32,
        temperature: params
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(0.2) as f32,
    };
    let timeout = std::time::Duration::from_secs(
        params.get("timeout_secs").and_then(Value::as_u64).unwrap_or(120),
    );

    let llm = ctx.llm.clone();
    let result = edgarq_core::retry_backoff(&ctx.shutdown, timeout, || {
        let llm = llm.clone();
        let model_config = model_config.clone();
        let system_prompt = system_prompt.clone();
        let user_prompt = user_prompt.clone();
        async move { llm.generate(&model_config, &system_prompt, &user_prompt).await }
    })
    .await?;

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    result.text.hash(&mut hasher);
    let content_hash = format!("{:016x}", hasher.finish());

    let content_id = ctx
        .content
        .store_generated_content(company_id, &document_ids, &content_hash, &result.text)
        .await?;

    Ok(json!({
        "company_id": company_id.to_string(),
        "content_id": content_id.to_string(),
        "input_tokens": result.input_tokens,
        "output_tokens": result.output_tokens,
        "stop_reason": result.stop_reason,
    }))
}

/// Compound: company ingestion followed by filing ingestion for the
/// company it just resolved.
pub async fn handle_ingest_pipeline(params: Value, ctx: &HandlerContext) -> anyhow::Result<Value> {
    let company_result = handle_company_ingestion(params, ctx).await?;
    let ticker = company_result["ticker"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    let company_id = company_result["company_id"]
        .as_str()
        .unwrap_or_default()
        .to_string();

    let filing_params = json!({"company_id": company_id, "ticker": ticker});
    let filing_result = handle_filing_ingestion(filing_params, ctx).await?;

    Ok(json!({
        "ticker": ticker,
        "company_id": company_id,
        "filings": filing_result["filing_ids"].clone(),
    }))
}

/// Compound: ingest plus pipeline-run bookkeeping. Unlike the other
/// handlers, this one owns a [`edgarq_core::PipelineRun`] end to end —
/// the scheduler only enqueues the job, it never creates the run itself.
pub async fn handle_full_pipeline(params: Value, ctx: &HandlerContext) -> anyhow::Result<Value> {
    let ticker = require_str(&params, "ticker")?.to_string();
    let forms: Vec<String> = params
        .get("forms")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_else(|| vec!["10-K".to_string(), "10-Q".to_string()]);
    let trigger = match params.get("trigger").and_then(Value::as_str) {
        Some("manual") => PipelineTrigger::Manual,
        _ => PipelineTrigger::Scheduled,
    };

    let company_result = handle_company_ingestion(json!({"ticker": ticker}), ctx).await?;
    let company_id = require_uuid(&company_result, "company_id")?;

    let run = ctx
        .runs
        .create_run(NewPipelineRun::new(company_id, forms.clone(), trigger))
        .await?;
    ctx.runs.start_run(run.id).await?;

    let mut jobs_created = 1;
    let mut jobs_completed = 1;
    let mut jobs_failed = 0;

    let filing_params = json!({
        "company_id": company_id.to_string(),
        "ticker": ticker,
        "form": forms.first().cloned().unwrap_or_else(|| "10-K".to_string()),
    });
    jobs_created += 1;
    match handle_filing_ingestion(filing_params, ctx).await {
        Ok(_) => jobs_completed += 1,
        Err(error) => {
            jobs_failed += 1;
            tracing::warn!(%error, %ticker, "full_pipeline_filing_ingestion_failed");
        }
    }

    let finished = if jobs_completed == 0 {
        ctx.runs
            .fail_run(run.id, "all jobs in this run failed", jobs_created, jobs_completed, jobs_failed)
            .await?
    } else {
        ctx.runs
            .complete_run(run.id, jobs_created, jobs_completed, jobs_failed)
            .await?
    };
    let finished = finished
        .ok_or_else(|| anyhow::anyhow!("pipeline run {} vanished mid-execution", run.id))?;

    Ok(json!({
        "ticker": ticker,
        "company_id": company_id.to_string(),
        "pipeline_run_id": finished.id.to_string(),
        "status": finished.status.to_string(),
        "jobs_created": jobs_created,
        "jobs_completed": jobs_completed,
        "jobs_failed": jobs_failed,
    }))
}

/// Ingests a batch of filings discovered across all of EDGAR (not just
/// tracked companies), keyed by CIK rather than ticker.
pub async fn handle_bulk_ingest(params: Value, ctx: &HandlerContext) -> anyhow::Result<Value> {
    let filings = params
        .get("filings")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut ingested = 0usize;
    let mut failed = 0usize;

    for entry in &filings {
        match ingest_one_bulk_filing(entry, ctx).await {
            Ok(()) => ingested += 1,
            Err(error) => {
                failed += 1;
                tracing::warn!(%error, "bulk_ingest_entry_failed");
            }
        }
    }

    Ok(json!({
        "total": filings.len(),
        "ingested": ingested,
        "failed": failed,
    }))
}

async fn ingest_one_bulk_filing(entry: &Value, ctx: &HandlerContext) -> anyhow::Result<()> {
    let cik = require_str(entry, "cik")?;
    let company_name = entry
        .get("company_name")
        .and_then(Value::as_str)
        .unwrap_or(cik);
    let accession_number = require_str(entry, "accession_number")?;
    let form = entry.get("form").and_then(Value::as_str).unwrap_or("10-K");
    let filing_date = entry
        .get("filing_date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or_else(|| chrono::Utc::now().date_naive());

    let company_id = ctx.content.upsert_company(cik, company_name).await?;
    let filing = FilingRef {
        accession_number: accession_number.to_string(),
        filing_date,
        form: form.to_string(),
        cik: cik.to_string(),
        company_name: company_name.to_string(),
    };
    ctx.content.upsert_filing(company_id, &filing).await?;
    Ok(())
}

/// Runs the ingest pipeline for a fixed set of already-known companies.
pub async fn handle_company_group_pipeline(
    params: Value,
    ctx: &HandlerContext,
) -> anyhow::Result<Value> {
    let company_ids: Vec<Uuid> = params
        .get("company_ids")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))
                .collect()
        })
        .unwrap_or_default();

    let mut results = Vec::with_capacity(company_ids.len());
    for company_id in company_ids {
        let ticker = ctx.content.ticker_for_company(company_id).await?;
        let Some(ticker) = ticker else {
            results.push(json!({"company_id": company_id.to_string(), "status": "unknown_company"}));
            continue;
        };
        match handle_ingest_pipeline(json!({"ticker": ticker}), ctx).await {
            Ok(outcome) => results.push(
                json!({"company_id": company_id.to_string(), "status": "ok", "result": outcome}),
            ),
            Err(error) => results.push(
                json!({"company_id": company_id.to_string(), "status": "failed", "error": error.to_string()}),
            ),
        }
    }

    Ok(json!({
        "companies_processed": results.len(),
        "results": results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[tokio::test]
    async fn test_handler_echoes_params() {
        let ctx = test_context();
        let result = handle_test(json!({"foo": "bar"}), &ctx).await.unwrap();
        assert_eq!(result, json!({"echo": {"foo": "bar"}, "status": "ok"}));
    }

    #[tokio::test]
    async fn test_handler_echoes_empty_params() {
        let ctx = test_context();
        let result = handle_test(json!({}), &ctx).await.unwrap();
        assert_eq!(result["status"], "ok");
    }

    #[tokio::test]
    async fn company_ingestion_requires_ticker() {
        let ctx = test_context();
        let err = handle_company_ingestion(json!({}), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("ticker"));
    }

    #[tokio::test]
    async fn company_ingestion_upserts_company() {
        let ctx = test_context();
        let result = handle_company_ingestion(json!({"ticker": "AAPL"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["ticker"], "AAPL");
        assert!(result["company_id"].is_string());
    }

    #[tokio::test]
    async fn ingest_pipeline_calls_company_then_filing_ingestion() {
        let ctx = test_context();
        let result = handle_ingest_pipeline(json!({"ticker": "AAPL"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result["ticker"], "AAPL");
        assert!(result["company_id"].is_string());
        assert!(result["filings"].is_array());
    }
}
