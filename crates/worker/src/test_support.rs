//! Fakes for the §6 external collaborators, used only by this crate's own
//! unit tests. Not a general-purpose mock library — just enough behavior
//! for handler tests to exercise the happy path deterministically.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use edgarq_core::{
    ContentStore, DocumentExtractor, EdgarClient, FilingRef, GenerationResult, LLMClient,
    ModelConfig, ShutdownToken,
};
use edgarq_testing::{InMemoryJobStore, InMemoryPipelineRunStore};
use uuid::Uuid;

use crate::context::HandlerContext;

struct FakeEdgarClient;

#[async_trait]
impl EdgarClient for FakeEdgarClient {
    async fn get_recent_filings(
        &self,
        ticker: &str,
        form: &str,
        count: usize,
    ) -> anyhow::Result<Vec<FilingRef>> {
        let n = count.clamp(1, 3);
        Ok((0..n)
            .map(|i| FilingRef {
                accession_number: format!("0000000000-24-{i:06}"),
                filing_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                form: form.to_string(),
                cik: "0000320193".to_string(),
                company_name: format!("{ticker} Inc."),
            })
            .collect())
    }

    async fn get_current_filings(&self, _form: &str) -> anyhow::Result<Vec<FilingRef>> {
        Ok(vec![])
    }

    async fn get_filings_by_date(
        &self,
        _form: &str,
        _from: NaiveDate,
        _to: NaiveDate,
    ) -> anyhow::Result<Vec<FilingRef>> {
        Ok(vec![])
    }
}

struct FakeDocumentExtractor;

#[async_trait]
impl DocumentExtractor for FakeDocumentExtractor {
    async fn get_sections(
        &self,
        _filing: &FilingRef,
        section_kinds: &[&str],
    ) -> anyhow::Result<HashMap<String, String>> {
        Ok(section_kinds
            .iter()
            .map(|k| (k.to_string(), "lorem ipsum".to_string()))
            .collect())
    }
}

struct FakeLLMClient;

#[async_trait]
impl LLMClient for FakeLLMClient {
    async fn generate(
        &self,
        _model_config: &ModelConfig,
        _system_prompt: &str,
        user_prompt: &str,
    ) -> anyhow::Result<GenerationResult> {
        Ok(GenerationResult {
            text: format!("summary of: {user_prompt}"),
            input_tokens: 10,
            output_tokens: 20,
            duration_ns: 1_000_000,
            stop_reason: "end_turn".to_string(),
        })
    }
}

#[derive(Default)]
struct FakeContentStore {
    company_ids: Mutex<HashMap<String, Uuid>>,
    tickers: Mutex<HashMap<Uuid, String>>,
    accessions: Mutex<HashMap<Uuid, HashSet<String>>>,
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn upsert_company(&self, ticker: &str, _name: &str) -> anyhow::Result<Uuid> {
        let mut company_ids = self.company_ids.lock().unwrap();
        if let Some(id) = company_ids.get(ticker) {
            return Ok(*id);
        }
        let id = Uuid::now_v7();
        company_ids.insert(ticker.to_string(), id);
        self.tickers.lock().unwrap().insert(id, ticker.to_string());
        Ok(id)
    }

    async fn upsert_filing(&self, company_id: Uuid, filing: &FilingRef) -> anyhow::Result<Uuid> {
        self.accessions
            .lock()
            .unwrap()
            .entry(company_id)
            .or_default()
            .insert(filing.accession_number.clone());
        Ok(Uuid::now_v7())
    }

    async fn store_generated_content(
        &self,
        _company_id: Uuid,
        _document_ids: &[Uuid],
        _content_hash: &str,
        _text: &str,
    ) -> anyhow::Result<Uuid> {
        Ok(Uuid::now_v7())
    }

    async fn ticker_for_company(&self, company_id: Uuid) -> anyhow::Result<Option<String>> {
        Ok(self.tickers.lock().unwrap().get(&company_id).cloned())
    }

    async fn all_tracked_tickers(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.company_ids.lock().unwrap().keys().cloned().collect())
    }

    async fn known_accession_numbers(
        &self,
        company_id: Uuid,
        _forms: &[String],
    ) -> anyhow::Result<HashSet<String>> {
        Ok(self
            .accessions
            .lock()
            .unwrap()
            .get(&company_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A [`HandlerContext`] wired entirely to in-memory fakes, for handler unit
/// tests that don't need a live database or external network calls.
pub fn test_context() -> HandlerContext {
    let clock = Arc::new(edgarq_core::SystemClock);
    HandlerContext {
        edgar: Arc::new(FakeEdgarClient),
        extractor: Arc::new(FakeDocumentExtractor),
        llm: Arc::new(FakeLLMClient),
        content: Arc::new(FakeContentStore::default()),
        jobs: Arc::new(InMemoryJobStore::new(clock.clone())),
        runs: Arc::new(InMemoryPipelineRunStore::new(clock)),
        shutdown: ShutdownToken::new(),
    }
}
