use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::flow::FlowStep;
use crate::models::news::{
    ConsolidatedNews, CounterArgumentSources, NewsCritique, NewsList, NewsResearchPlan,
    SupportingEvidence,
};
use crate::models::run::RunStatus;

/// Prompt/completion token counts for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

impl std::ops::Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
        }
    }
}

impl std::iter::Sum for TokenUsage {
    fn sum<I: Iterator<Item = TokenUsage>>(iter: I) -> Self {
        iter.fold(TokenUsage::default(), |acc, u| acc + u)
    }
}

/// Seed parameters of a run. Fixed once the first checkpoint exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowInputs {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub news_urls: Vec<String>,
    #[serde(default = "default_pool_size")]
    pub num_starting_pool_news: u32,
    #[serde(default = "default_max_news")]
    pub num_max_news: u32,
    #[serde(default)]
    pub perspective: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default = "default_current_date")]
    pub current_date: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_pool_size() -> u32 {
    2
}

fn default_max_news() -> u32 {
    1
}

fn default_current_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for FlowInputs {
    fn default() -> Self {
        Self {
            topic: String::new(),
            news_urls: Vec::new(),
            num_starting_pool_news: default_pool_size(),
            num_max_news: default_max_news(),
            perspective: String::new(),
            tone: String::new(),
            current_date: default_current_date(),
            language: default_language(),
        }
    }
}

impl FlowInputs {
    pub fn has_topic(&self) -> bool {
        !self.topic.trim().is_empty()
    }

    pub fn has_urls(&self) -> bool {
        self.news_urls.iter().any(|u| !u.trim().is_empty())
    }

    pub fn has_seed(&self) -> bool {
        self.has_topic() || self.has_urls()
    }
}

/// Durable progress of one run. A snapshot is checkpointed after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub id: String,
    pub inputs: FlowInputs,
    /// The only field routing reads on resume.
    pub last_completed: FlowStep,
    #[serde(default)]
    pub news_list: Option<NewsList>,
    #[serde(default)]
    pub critiques: Vec<NewsCritique>,
    #[serde(default)]
    pub plans: Vec<NewsResearchPlan>,
    #[serde(default)]
    pub news_evidence: Vec<SupportingEvidence>,
    #[serde(default)]
    pub counter_arguments: Vec<CounterArgumentSources>,
    #[serde(default)]
    pub consolidated: Option<ConsolidatedNews>,
    #[serde(default)]
    pub articles: Vec<String>,
    #[serde(default)]
    pub flow_tokens: BTreeMap<String, TokenUsage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowState {
    pub fn new(id: impl Into<String>, inputs: FlowInputs) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            inputs,
            last_completed: FlowStep::Initialize,
            news_list: None,
            critiques: Vec::new(),
            plans: Vec::new(),
            news_evidence: Vec::new(),
            counter_arguments: Vec::new(),
            consolidated: None,
            articles: Vec::new(),
            flow_tokens: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Advance the progress marker. Moving backwards is rejected; use
    /// [`FlowState::override_progress`] for an explicit rewind.
    pub fn complete_step(&mut self, step: FlowStep) -> Result<(), FlowError> {
        if step.rank() < self.last_completed.rank() {
            return Err(FlowError::Internal(format!(
                "progress marker cannot move from '{}' back to '{}'",
                self.last_completed, step
            )));
        }
        self.last_completed = step;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Rewind the progress marker so execution continues after `step`.
    /// Skipping ahead of the last completed step is rejected.
    pub fn override_progress(&mut self, step: FlowStep) -> Result<(), FlowError> {
        if step.rank() > self.last_completed.rank() {
            return Err(FlowError::Configuration(format!(
                "cannot resume from '{}': run has only completed '{}'",
                step, self.last_completed
            )));
        }
        self.last_completed = step;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record a step's token usage, replacing any earlier entry for it.
    pub fn record_usage(&mut self, step: FlowStep, usage: TokenUsage) {
        self.flow_tokens.insert(step.as_str().to_string(), usage);
    }

    pub fn is_complete(&self) -> bool {
        self.last_completed.is_terminal()
    }

    pub fn status(&self) -> RunStatus {
        if self.is_complete() {
            RunStatus::Completed
        } else {
            RunStatus::InProgress
        }
    }

    /// Total tokens across all recorded steps.
    pub fn total_usage(&self) -> TokenUsage {
        self.flow_tokens.values().copied().sum()
    }
}
