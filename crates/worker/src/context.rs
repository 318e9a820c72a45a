//! Everything a handler needs besides its own params: the external
//! collaborators (§6), the stores a compound handler enqueues follow-up
//! work or updates a pipeline run through, and the shutdown token the LLM
//! retry helper polls.

use std::sync::Arc;

use edgarq_core::{ContentStore, DocumentExtractor, EdgarClient, JobStore, LLMClient, PipelineRunStore, ShutdownToken};

pub struct HandlerContext {
    pub edgar: Arc<dyn EdgarClient>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub llm: Arc<dyn LLMClient>,
    pub content: Arc<dyn ContentStore>,
    pub jobs: Arc<dyn JobStore>,
    pub runs: Arc<dyn PipelineRunStore>,
    pub shutdown: ShutdownToken,
}
