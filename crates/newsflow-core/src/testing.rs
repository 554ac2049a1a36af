//! Deterministic crews for tests and offline demos.
//!
//! `ScriptedCrews` fabricates plausible records from its inputs without
//! calling any model. Research output deliberately varies the news title's
//! case and punctuation so consolidation has fuzzy matches to resolve.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::crew::{
    CounterArgRequest, CrewError, CrewOutput, CritiqueRequest, DiscoverRequest, NewsCrews,
    PlanRequest, ResearchRequest, Seed, WriteRequest,
};
use crate::models::{
    CounterArgSource, CounterArgument, CounterArgumentSources, CounterArguments, Datapoint,
    Datapoints, EvidenceItem, Ideas, KeyIdea, NewsCritique, NewsItem, NewsList,
    NewsResearchPlan, SupportingEvidence, TokenUsage,
};

const HEADLINES: [&str; 4] = [
    "Fed Raises Rates Again",
    "Drought Threatens Andean Harvests",
    "Chipmakers Expand European Plants",
    "City Council Approves Transit Levy",
];

/// Tokens reported for every invocation.
pub const USAGE_PER_CALL: TokenUsage = TokenUsage {
    prompt_tokens: 100,
    completion_tokens: 50,
};

pub struct ScriptedCrews {
    calls: Mutex<Vec<String>>,
    rejected: HashSet<String>,
    fail_once_at: Mutex<Option<String>>,
    titles: Vec<String>,
    ideas_per_plan: usize,
    counter_args_per_plan: usize,
}

impl Default for ScriptedCrews {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCrews {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rejected: HashSet::new(),
            fail_once_at: Mutex::new(None),
            titles: Vec::new(),
            ideas_per_plan: 2,
            counter_args_per_plan: 1,
        }
    }

    /// Critique rejects the item with this exact title.
    pub fn rejecting(mut self, title: &str) -> Self {
        self.rejected.insert(title.to_string());
        self
    }

    /// The next invocation of `crew` fails; later ones succeed.
    pub fn failing_once_at(self, crew: &str) -> Self {
        if let Ok(mut slot) = self.fail_once_at.lock() {
            *slot = Some(crew.to_string());
        }
        self
    }

    /// Discovered and scraped items take these titles, in order, before
    /// falling back to the stock headlines.
    pub fn with_titles(mut self, titles: &[&str]) -> Self {
        self.titles = titles.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_ideas_per_plan(mut self, n: usize) -> Self {
        self.ideas_per_plan = n;
        self
    }

    /// Headline used for the `i`-th discovered item.
    pub fn headline(i: usize) -> String {
        match i / HEADLINES.len() {
            0 => HEADLINES[i].to_string(),
            round => format!("{} (Part {})", HEADLINES[i % HEADLINES.len()], round + 1),
        }
    }

    fn title(&self, i: usize) -> String {
        self.titles
            .get(i)
            .cloned()
            .unwrap_or_else(|| Self::headline(i))
    }

    /// Every invocation so far, as `crew` or `crew:detail`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Crew names in invocation order with consecutive repeats collapsed.
    pub fn crew_sequence(&self) -> Vec<String> {
        let mut seq: Vec<String> = Vec::new();
        for call in self.calls() {
            let crew = call.split(':').next().unwrap_or_default().to_string();
            if seq.last() != Some(&crew) {
                seq.push(crew);
            }
        }
        seq
    }

    fn record(&self, crew: &str, detail: &str) -> Result<(), CrewError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(if detail.is_empty() {
                crew.to_string()
            } else {
                format!("{}:{}", crew, detail)
            });
        }
        let fail = self
            .fail_once_at
            .lock()
            .map(|mut slot| {
                if slot.as_deref() == Some(crew) {
                    slot.take().is_some()
                } else {
                    false
                }
            })
            .unwrap_or(false);
        if fail {
            return Err(CrewError::Http(format!("injected failure in {}", crew)));
        }
        Ok(())
    }
}

#[async_trait]
impl NewsCrews for ScriptedCrews {
    async fn discover(&self, req: &DiscoverRequest) -> Result<CrewOutput<NewsList>, CrewError> {
        let news_list = match &req.seed {
            Seed::Topic(topic) => {
                self.record("discover", topic)?;
                (0..req.pool_size as usize)
                    .map(|i| NewsItem {
                        news_title: self.title(i),
                        summary: format!("Why it matters for {}", topic),
                        source_url: format!("https://news.example.com/{}", i),
                        content: format!("Full text of story {} about {}.", i, topic),
                    })
                    .collect()
            }
            Seed::Urls(urls) => {
                self.record("scrape", &urls.join(","))?;
                urls.iter()
                    .enumerate()
                    .map(|(i, url)| NewsItem {
                        news_title: self.title(i),
                        summary: format!("Scraped from {}", url),
                        source_url: url.clone(),
                        content: format!("Content published at {}.", url),
                    })
                    .collect()
            }
        };
        Ok(CrewOutput::new(NewsList { news_list }, USAGE_PER_CALL))
    }

    async fn critique(&self, req: &CritiqueRequest) -> Result<CrewOutput<NewsCritique>, CrewError> {
        self.record("critique", &req.news.news_title)?;
        let approved = !self.rejected.contains(&req.news.news_title);
        Ok(CrewOutput::new(
            NewsCritique {
                news_title: req.news.news_title.clone(),
                approved,
                rationale: if approved {
                    "Well sourced".to_string()
                } else {
                    "Off topic".to_string()
                },
                concerns: Vec::new(),
            },
            USAGE_PER_CALL,
        ))
    }

    async fn plan(&self, req: &PlanRequest) -> Result<CrewOutput<NewsResearchPlan>, CrewError> {
        self.record("planning", &req.news.news_title)?;
        let title = &req.news.news_title;
        Ok(CrewOutput::new(
            NewsResearchPlan {
                news_title: title.clone(),
                source_url: req.news.source_url.clone(),
                key_ideas: Ideas {
                    ideas: (0..self.ideas_per_plan)
                        .map(|i| KeyIdea {
                            key_idea: format!("{} idea {}", title, i),
                            rationale: "central claim".to_string(),
                        })
                        .collect(),
                },
                key_datapoints: Datapoints {
                    datapoints: vec![Datapoint {
                        datapoint: format!("{} grew 3%", title),
                        rationale: "headline figure".to_string(),
                    }],
                },
                counter_arguments: CounterArguments {
                    counter_arguments: (0..self.counter_args_per_plan)
                        .map(|i| CounterArgument {
                            counter_argument: format!("{} objection {}", title, i),
                            rationale: "critics disagree".to_string(),
                        })
                        .collect(),
                },
            },
            USAGE_PER_CALL,
        ))
    }

    async fn research(
        &self,
        req: &ResearchRequest,
    ) -> Result<CrewOutput<SupportingEvidence>, CrewError> {
        self.record("research", &req.key_idea.key_idea)?;
        Ok(CrewOutput::new(
            SupportingEvidence {
                news_title: Some(format!("{}!", req.news_title.to_lowercase())),
                source_url: None,
                idea: req.key_idea.key_idea.clone(),
                rationale: req.key_idea.rationale.clone(),
                evidence: vec![EvidenceItem {
                    idea: req.key_idea.key_idea.clone(),
                    evidence: "A peer-reviewed study agrees".to_string(),
                    source_url: "https://journal.example.org/study".to_string(),
                    rationale: "independent confirmation".to_string(),
                    summary: "Study summary".to_string(),
                }],
            },
            USAGE_PER_CALL,
        ))
    }

    async fn counter_research(
        &self,
        req: &CounterArgRequest,
    ) -> Result<CrewOutput<CounterArgumentSources>, CrewError> {
        self.record("counter_args", &req.counter_argument.counter_argument)?;
        Ok(CrewOutput::new(
            CounterArgumentSources {
                news_title: None,
                source_url: None,
                counter_argument: req.counter_argument.clone(),
                supporting_sources: vec![CounterArgSource {
                    counter_argument: req.counter_argument.counter_argument.clone(),
                    rationale: req.counter_argument.rationale.clone(),
                    source_url: "https://opinion.example.org/rebuttal".to_string(),
                    summary: "Rebuttal summary".to_string(),
                }],
            },
            USAGE_PER_CALL,
        ))
    }

    async fn write(&self, req: &WriteRequest) -> Result<CrewOutput<String>, CrewError> {
        self.record("writer", &req.item.news_title)?;
        let item = &req.item;
        let article = format!(
            "# {}\n\n{} evidence bundles, {} datapoint sets, {} counter-arguments.\n\n\
             Perspective: {}. Tone: {}.\n",
            item.news_title,
            item.supporting_evidence.len(),
            item.datapoints.len(),
            item.counter_argument_sources.len(),
            req.perspective,
            req.tone
        );
        Ok(CrewOutput::new(article, USAGE_PER_CALL))
    }
}
