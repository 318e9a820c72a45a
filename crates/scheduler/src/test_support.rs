//! Fakes for the §6 external collaborators, used only by this crate's own
//! unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use edgarq_core::{ContentStore, EdgarClient, FilingRef, JobStore, SystemClock};
use edgarq_testing::InMemoryJobStore;
use uuid::Uuid;

struct FakeEdgarClient;

#[async_trait]
impl EdgarClient for FakeEdgarClient {
    async fn get_recent_filings(
        &self,
        ticker: &str,
        form: &str,
        count: usize,
    ) -> anyhow::Result<Vec<FilingRef>> {
        let n = count.clamp(1, 1);
        Ok((0..n)
            .map(|_| FilingRef {
                accession_number: "0000320193-24-000001".to_string(),
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

pub fn test_edgar_client() -> Arc<dyn EdgarClient> {
    Arc::new(FakeEdgarClient)
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

/// A content store pre-seeded with one tracked company, `AAPL`.
pub fn test_content_store() -> Arc<dyn ContentStore> {
    let store = FakeContentStore::default();
    let id = Uuid::now_v7();
    store.company_ids.lock().unwrap().insert("AAPL".to_string(), id);
    store.tickers.lock().unwrap().insert(id, "AAPL".to_string());
    Arc::new(store)
}

pub fn test_job_store() -> Arc<dyn JobStore> {
    Arc::new(InMemoryJobStore::new(Arc::new(SystemClock)))
}
