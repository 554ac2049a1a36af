//! Crew boundary: the narrow interface the flow uses to delegate content
//! generation, plus the default LLM-backed implementation.
//!
//! Every invocation returns its structured output together with the tokens
//! it consumed. Retries, model fallback and output repair all live behind
//! this boundary; the flow treats any `CrewError` as a step failure.

pub mod catalog;
pub mod llm;
pub mod llm_crews;
pub mod response;

#[cfg(test)]
mod stub;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{
    ConsolidatedNewsItem, CounterArgument, CounterArgumentSources, KeyIdea, NewsCritique,
    NewsItem, NewsList, NewsResearchPlan, SupportingEvidence, TokenUsage,
};

pub use catalog::{CrewCatalog, CrewDef};
pub use llm::{LlmCaller, LlmResponse};
pub use llm_crews::LlmCrews;

/// What discovery starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seed {
    Topic(String),
    Urls(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverRequest {
    pub seed: Seed,
    pub pool_size: u32,
    pub max_news: u32,
    pub current_date: String,
    pub perspective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueRequest {
    pub news: NewsItem,
    pub perspective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub news: NewsItem,
    pub topic: String,
    pub perspective: String,
}

/// One key idea of one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub news_title: String,
    pub source_url: String,
    pub key_idea: KeyIdea,
    pub perspective: String,
}

/// One counter-argument candidate of one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterArgRequest {
    pub news_title: String,
    pub source_url: String,
    pub counter_argument: CounterArgument,
    pub perspective: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub item: ConsolidatedNewsItem,
    pub perspective: String,
    pub tone: String,
    pub language: String,
}

/// Output of one crew invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrewOutput<T> {
    pub output: T,
    pub usage: TokenUsage,
}

impl<T> CrewOutput<T> {
    pub fn new(output: T, usage: TokenUsage) -> Self {
        Self { output, usage }
    }
}

/// The crews a news flow delegates to. One method per pipeline stage.
#[async_trait]
pub trait NewsCrews: Send + Sync {
    /// Discovery (topic seed) or scraping (URL seed).
    async fn discover(&self, req: &DiscoverRequest) -> Result<CrewOutput<NewsList>, CrewError>;

    async fn critique(&self, req: &CritiqueRequest) -> Result<CrewOutput<NewsCritique>, CrewError>;

    async fn plan(&self, req: &PlanRequest) -> Result<CrewOutput<NewsResearchPlan>, CrewError>;

    async fn research(
        &self,
        req: &ResearchRequest,
    ) -> Result<CrewOutput<SupportingEvidence>, CrewError>;

    async fn counter_research(
        &self,
        req: &CounterArgRequest,
    ) -> Result<CrewOutput<CounterArgumentSources>, CrewError>;

    /// Article text (markdown).
    async fn write(&self, req: &WriteRequest) -> Result<CrewOutput<String>, CrewError>;
}

/// Error type for crew invocations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CrewError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Model '{0}' returned an empty response")]
    EmptyResponse(String),
    #[error("Malformed output: {0}")]
    Malformed(String),
    #[error("All models failed: {}", .0.join("; "))]
    AllModelsFailed(Vec<String>),
    #[error("No API key configured for adapter '{0}'")]
    MissingApiKey(String),
    #[error("Unknown adapter type: '{0}'")]
    UnknownAdapter(String),
    #[error("Unknown crew: '{0}'")]
    UnknownCrew(String),
}
