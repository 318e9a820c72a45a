//! Contract-only collaborator interfaces (SPEC_FULL.md §6): the EDGAR
//! fetchers, document extractors, LLM client, and domain content store this
//! system depends on but does not implement. Real implementations (the
//! actual EDGAR crawler, the HTML/XBRL extractor, a model provider client,
//! the companies/filings/documents schema) live outside this workspace;
//! this module only fixes the shape worker handlers and the scheduler
//! depend on.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One filing reference as surfaced by the EDGAR collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingRef {
    pub accession_number: String,
    pub filing_date: NaiveDate,
    pub form: String,
    pub cik: String,
    pub company_name: String,
}

/// Fetches filing references from SEC EDGAR for tracked companies, the
/// global current-filings feed, or an explicit date range.
#[async_trait]
pub trait EdgarClient: Send + Sync {
    async fn get_recent_filings(
        &self,
        ticker: &str,
        form: &str,
        count: usize,
    ) -> anyhow::Result<Vec<FilingRef>>;

    async fn get_current_filings(&self, form: &str) -> anyhow::Result<Vec<FilingRef>>;

    async fn get_filings_by_date(
        &self,
        form: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<FilingRef>>;
}

/// Section kinds a [`DocumentExtractor`] can be asked for.
pub const SECTION_KINDS: &[&str] = &[
    "business_description",
    "risk_factors",
    "management_discussion",
    "financial_statements",
    "legal_proceedings",
    "controls_and_procedures",
    "market_for_securities",
    "quantitative_disclosures",
];

/// Derives structured sections (business description, risk factors, ...)
/// from a filing's HTML/XBRL document.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn get_sections(
        &self,
        filing: &FilingRef,
        section_kinds: &[&str],
    ) -> anyhow::Result<HashMap<String, String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ns: u64,
    pub stop_reason: String,
}

/// A text-generation provider. Implementations must honor the calling
/// code's cancellation token when wrapped in [`crate::retry::retry_backoff`]
/// — this trait itself has no cancellation parameter because the retry
/// helper, not the client, owns the cooperative-shutdown contract.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn generate(
        &self,
        model_config: &ModelConfig,
        system_prompt: &str,
        user_prompt: &str,
    ) -> anyhow::Result<GenerationResult>;
}

/// Domain storage: companies, filings, documents, generated content,
/// ratings. Upserts are keyed by natural key (accession number for
/// filings, content hash for generated content).
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn upsert_company(&self, ticker: &str, name: &str) -> anyhow::Result<Uuid>;

    async fn upsert_filing(&self, company_id: Uuid, filing: &FilingRef) -> anyhow::Result<Uuid>;

    async fn store_generated_content(
        &self,
        company_id: Uuid,
        document_ids: &[Uuid],
        content_hash: &str,
        text: &str,
    ) -> anyhow::Result<Uuid>;

    async fn ticker_for_company(&self, company_id: Uuid) -> anyhow::Result<Option<String>>;

    async fn all_tracked_tickers(&self) -> anyhow::Result<Vec<String>>;

    async fn known_accession_numbers(
        &self,
        company_id: Uuid,
        forms: &[String],
    ) -> anyhow::Result<HashSet<String>>;
}
