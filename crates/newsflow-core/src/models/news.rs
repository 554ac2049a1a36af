//! Records exchanged with the crews and accumulated in the flow state.
//!
//! Field names are snake_case on the wire because crews produce and consume
//! these shapes as JSON documents.

use serde::{Deserialize, Serialize};

/// A candidate news story as returned by discovery or scraping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub news_title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsList {
    #[serde(default)]
    pub news_list: Vec<NewsItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyIdea {
    pub key_idea: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ideas {
    #[serde(default)]
    pub ideas: Vec<KeyIdea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub datapoint: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datapoints {
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterArgument {
    pub counter_argument: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterArguments {
    #[serde(default)]
    pub counter_arguments: Vec<CounterArgument>,
}

/// Research angles for one news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsResearchPlan {
    pub news_title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub key_ideas: Ideas,
    #[serde(default)]
    pub key_datapoints: Datapoints,
    #[serde(default)]
    pub counter_arguments: CounterArguments,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub idea: String,
    pub evidence: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub summary: String,
}

/// Evidence gathered for one key idea of one plan.
///
/// `news_title` and `source_url` refer to the parent news item; they are
/// optional so the consolidation cleanup can drop them when redundant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportingEvidence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub idea: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterArgSource {
    pub counter_argument: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub summary: String,
}

/// Sources backing one counter-argument candidate of one plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterArgumentSources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub counter_argument: CounterArgument,
    #[serde(default)]
    pub supporting_sources: Vec<CounterArgSource>,
}

/// Verdict on whether a discovered item is worth researching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsCritique {
    pub news_title: String,
    #[serde(default = "default_true")]
    pub approved: bool,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One merged record per distinct story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedNewsItem {
    pub news_title: String,
    pub summary: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub supporting_evidence: Vec<SupportingEvidence>,
    #[serde(default)]
    pub datapoints: Vec<Datapoints>,
    #[serde(default)]
    pub counter_argument_sources: Vec<CounterArgumentSources>,
}

impl ConsolidatedNewsItem {
    pub fn new(news_title: impl Into<String>) -> Self {
        Self {
            news_title: news_title.into(),
            summary: None,
            source_url: None,
            content: None,
            supporting_evidence: Vec::new(),
            datapoints: Vec::new(),
            counter_argument_sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedNews {
    #[serde(default)]
    pub news_list: Vec<ConsolidatedNewsItem>,
}
