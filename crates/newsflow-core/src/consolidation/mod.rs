//! Consolidation engine: merges per-item step outputs into one record per
//! story, keyed by fuzzy title identity.
//!
//! Registration order matters: a title joins the *first* registered key it
//! is close enough to, and matching is not transitive.

pub mod similarity;

use crate::models::{
    ConsolidatedNews, ConsolidatedNewsItem, CounterArgumentSources, Datapoints, NewsItem,
    NewsList, NewsResearchPlan, SupportingEvidence,
};

pub use similarity::{normalize_title, similarity_ratio, TITLE_MATCH_THRESHOLD};

/// How a value is folded into an existing consolidated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    FirstWins,
    LastWins,
    Append,
}

/// Per-field merge policies for [`ConsolidatedNewsItem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeTable {
    pub news_title: MergePolicy,
    pub summary: MergePolicy,
    pub source_url: MergePolicy,
    pub content: MergePolicy,
    pub supporting_evidence: MergePolicy,
    pub datapoints: MergePolicy,
    pub counter_argument_sources: MergePolicy,
}

/// Empty scalar values are never written, so under `FirstWins` the first
/// non-empty value wins.
impl Default for MergeTable {
    fn default() -> Self {
        Self {
            news_title: MergePolicy::FirstWins,
            summary: MergePolicy::FirstWins,
            source_url: MergePolicy::FirstWins,
            content: MergePolicy::FirstWins,
            supporting_evidence: MergePolicy::Append,
            datapoints: MergePolicy::Append,
            counter_argument_sources: MergePolicy::Append,
        }
    }
}

fn merge_scalar(slot: &mut Option<String>, value: &str, policy: MergePolicy) {
    if value.is_empty() {
        return;
    }
    match policy {
        MergePolicy::FirstWins if slot.is_some() => {}
        MergePolicy::FirstWins | MergePolicy::LastWins => *slot = Some(value.to_string()),
        MergePolicy::Append => match slot {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(value);
            }
            None => *slot = Some(value.to_string()),
        },
    }
}

fn merge_list<T>(slot: &mut Vec<T>, value: T, policy: MergePolicy) {
    match policy {
        MergePolicy::Append => slot.push(value),
        MergePolicy::FirstWins if !slot.is_empty() => {}
        MergePolicy::FirstWins | MergePolicy::LastWins => *slot = vec![value],
    }
}

/// Normalized-key registry preserving insertion order.
#[derive(Debug)]
pub struct TitleRegistry {
    threshold: f32,
    policies: MergeTable,
    entries: Vec<(String, ConsolidatedNewsItem)>,
}

impl TitleRegistry {
    pub fn new(threshold: f32, policies: MergeTable) -> Self {
        Self {
            threshold,
            policies,
            entries: Vec::new(),
        }
    }

    /// Resolve `raw_title` to an existing entry by fuzzy match, or register
    /// a new one with empty summary/source/content.
    pub fn ensure_entry(&mut self, raw_title: &str) -> &mut ConsolidatedNewsItem {
        let normalized = normalize_title(raw_title);
        let found = similarity::find_close_key(
            &normalized,
            self.entries.iter().map(|(key, _)| key.as_str()),
            self.threshold,
        );
        let idx = match found {
            Some(idx) => {
                let title_policy = self.policies.news_title;
                if title_policy == MergePolicy::LastWins && !raw_title.is_empty() {
                    self.entries[idx].1.news_title = raw_title.to_string();
                }
                idx
            }
            None => {
                self.entries
                    .push((normalized, ConsolidatedNewsItem::new(raw_title)));
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    pub fn add_news(&mut self, news: &NewsItem) {
        let policies = self.policies;
        let entry = self.ensure_entry(&news.news_title);
        merge_scalar(&mut entry.summary, &news.summary, policies.summary);
        merge_scalar(&mut entry.source_url, &news.source_url, policies.source_url);
        merge_scalar(&mut entry.content, &news.content, policies.content);
    }

    pub fn add_evidence(&mut self, evidence: &SupportingEvidence) {
        let policy = self.policies.supporting_evidence;
        let title = evidence.news_title.as_deref().unwrap_or_default();
        merge_list(
            &mut self.ensure_entry(title).supporting_evidence,
            evidence.clone(),
            policy,
        );
    }

    pub fn add_plan(&mut self, plan: &NewsResearchPlan) {
        let policy = self.policies.datapoints;
        let datapoints: Datapoints = plan.key_datapoints.clone();
        merge_list(
            &mut self.ensure_entry(&plan.news_title).datapoints,
            datapoints,
            policy,
        );
    }

    pub fn add_counter_argument(&mut self, sources: &CounterArgumentSources) {
        let policy = self.policies.counter_argument_sources;
        let title = sources.news_title.as_deref().unwrap_or_default();
        merge_list(
            &mut self.ensure_entry(title).counter_argument_sources,
            sources.clone(),
            policy,
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_news(self) -> ConsolidatedNews {
        ConsolidatedNews {
            news_list: self.entries.into_iter().map(|(_, item)| item).collect(),
        }
    }
}

/// Merge the four step collections with the default threshold and policies.
pub fn consolidate(
    news_list: Option<&NewsList>,
    evidence: &[SupportingEvidence],
    plans: &[NewsResearchPlan],
    counter_arguments: &[CounterArgumentSources],
) -> ConsolidatedNews {
    consolidate_with(
        TITLE_MATCH_THRESHOLD,
        MergeTable::default(),
        news_list,
        evidence,
        plans,
        counter_arguments,
    )
}

pub fn consolidate_with(
    threshold: f32,
    policies: MergeTable,
    news_list: Option<&NewsList>,
    evidence: &[SupportingEvidence],
    plans: &[NewsResearchPlan],
    counter_arguments: &[CounterArgumentSources],
) -> ConsolidatedNews {
    let mut registry = TitleRegistry::new(threshold, policies);

    for news in news_list.map(|l| l.news_list.as_slice()).unwrap_or_default() {
        registry.add_news(news);
    }
    for item in evidence {
        registry.add_evidence(item);
    }
    for plan in plans {
        registry.add_plan(plan);
    }
    for item in counter_arguments {
        registry.add_counter_argument(item);
    }

    tracing::debug!(
        "[Consolidation] {} evidence, {} plans, {} counter-argument bundles -> {} items",
        evidence.len(),
        plans.len(),
        counter_arguments.len(),
        registry.len()
    );
    registry.into_news()
}

/// Drop nested `news_title`/`source_url` fields that repeat the parent's.
pub fn cleanup(news: &mut ConsolidatedNews) {
    for item in &mut news.news_list {
        let title = item.news_title.as_str();
        let source = item.source_url.as_deref();

        for evidence in &mut item.supporting_evidence {
            if evidence.news_title.as_deref() == Some(title) {
                evidence.news_title = None;
            }
            if source.is_some() && evidence.source_url.as_deref() == source {
                evidence.source_url = None;
            }
        }
        for sources in &mut item.counter_argument_sources {
            if sources.news_title.as_deref() == Some(title) {
                sources.news_title = None;
            }
            if source.is_some() && sources.source_url.as_deref() == source {
                sources.source_url = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CounterArgument, Datapoint, Ideas, CounterArguments};

    fn news(title: &str, summary: &str, url: &str) -> NewsItem {
        NewsItem {
            news_title: title.to_string(),
            summary: summary.to_string(),
            source_url: url.to_string(),
            content: format!("content of {}", title),
        }
    }

    fn evidence(title: &str, url: &str, idea: &str) -> SupportingEvidence {
        SupportingEvidence {
            news_title: Some(title.to_string()),
            source_url: Some(url.to_string()),
            idea: idea.to_string(),
            rationale: String::new(),
            evidence: Vec::new(),
        }
    }

    fn plan(title: &str, datapoint: &str) -> NewsResearchPlan {
        NewsResearchPlan {
            news_title: title.to_string(),
            source_url: String::new(),
            key_ideas: Ideas::default(),
            key_datapoints: Datapoints {
                datapoints: vec![Datapoint {
                    datapoint: datapoint.to_string(),
                    rationale: String::new(),
                }],
            },
            counter_arguments: CounterArguments::default(),
        }
    }

    fn counter(title: &str, text: &str) -> CounterArgumentSources {
        CounterArgumentSources {
            news_title: Some(title.to_string()),
            source_url: None,
            counter_argument: CounterArgument {
                counter_argument: text.to_string(),
                rationale: String::new(),
            },
            supporting_sources: Vec::new(),
        }
    }

    #[test]
    fn case_and_punctuation_variants_merge() {
        let list = NewsList {
            news_list: vec![news("Fed Raises Rates!", "s", "https://a")],
        };
        let out = consolidate(
            Some(&list),
            &[evidence("fed raises rates", "https://a", "inflation")],
            &[plan("FED RAISES RATES", "5.5%")],
            &[counter("Fed raises rates.", "growth slows")],
        );
        assert_eq!(out.news_list.len(), 1);
        let item = &out.news_list[0];
        assert_eq!(item.news_title, "Fed Raises Rates!");
        assert_eq!(item.supporting_evidence.len(), 1);
        assert_eq!(item.datapoints.len(), 1);
        assert_eq!(item.counter_argument_sources.len(), 1);
    }

    #[test]
    fn dissimilar_titles_stay_separate() {
        let list = NewsList {
            news_list: vec![
                news("Fed Raises Rates", "a", "https://a"),
                news("Fed Cuts Rates", "b", "https://b"),
            ],
        };
        let out = consolidate(Some(&list), &[], &[], &[]);
        assert_eq!(out.news_list.len(), 2);
        assert_eq!(out.news_list[1].summary.as_deref(), Some("b"));
    }

    #[test]
    fn unmatched_evidence_creates_standalone_entry() {
        let list = NewsList {
            news_list: vec![news("Fed Raises Rates", "a", "https://a")],
        };
        let out = consolidate(
            Some(&list),
            &[evidence("Drought in the Andes", "https://x", "water")],
            &[],
            &[],
        );
        assert_eq!(out.news_list.len(), 2);
        let orphan = &out.news_list[1];
        assert_eq!(orphan.news_title, "Drought in the Andes");
        assert!(orphan.summary.is_none());
        assert!(orphan.source_url.is_none());
        assert!(orphan.content.is_none());
        assert_eq!(orphan.supporting_evidence.len(), 1);
    }

    #[test]
    fn missing_news_list_is_tolerated() {
        let out = consolidate(None, &[], &[plan("Solo", "1")], &[]);
        assert_eq!(out.news_list.len(), 1);
        assert_eq!(out.news_list[0].news_title, "Solo");
    }

    #[test]
    fn first_writer_wins_for_scalars() {
        let list = NewsList {
            news_list: vec![
                news("Fed Raises Rates", "first", "https://a"),
                news("fed raises rates!", "second", "https://b"),
            ],
        };
        let out = consolidate(Some(&list), &[], &[], &[]);
        assert_eq!(out.news_list.len(), 1);
        assert_eq!(out.news_list[0].summary.as_deref(), Some("first"));
        assert_eq!(out.news_list[0].source_url.as_deref(), Some("https://a"));
    }

    #[test]
    fn empty_first_value_does_not_claim_the_field() {
        let list = NewsList {
            news_list: vec![
                news("Fed Raises Rates", "", "https://a"),
                news("fed raises rates!", "filled later", ""),
                news("Fed raises rates", "too late", "https://c"),
            ],
        };
        let out = consolidate(Some(&list), &[], &[], &[]);
        assert_eq!(out.news_list.len(), 1);
        assert_eq!(out.news_list[0].summary.as_deref(), Some("filled later"));
        assert_eq!(out.news_list[0].source_url.as_deref(), Some("https://a"));
    }

    #[test]
    fn merge_table_can_switch_to_last_wins() {
        let list = NewsList {
            news_list: vec![
                news("Fed Raises Rates", "first", "https://a"),
                news("fed raises rates!", "second", "https://b"),
            ],
        };
        let policies = MergeTable {
            summary: MergePolicy::LastWins,
            ..MergeTable::default()
        };
        let out = consolidate_with(TITLE_MATCH_THRESHOLD, policies, Some(&list), &[], &[], &[]);
        assert_eq!(out.news_list[0].summary.as_deref(), Some("second"));
        assert_eq!(out.news_list[0].source_url.as_deref(), Some("https://a"));
    }

    #[test]
    fn secondary_records_append_in_order() {
        let list = NewsList {
            news_list: vec![news("Fed Raises Rates", "a", "https://a")],
        };
        let out = consolidate(
            Some(&list),
            &[
                evidence("Fed Raises Rates", "https://a", "one"),
                evidence("fed raises rates", "https://a", "two"),
            ],
            &[],
            &[],
        );
        let ideas: Vec<_> = out.news_list[0]
            .supporting_evidence
            .iter()
            .map(|e| e.idea.as_str())
            .collect();
        assert_eq!(ideas, vec!["one", "two"]);
    }

    #[test]
    fn consolidation_is_deterministic() {
        let list = NewsList {
            news_list: vec![
                news("Fed Raises Rates", "a", "https://a"),
                news("Fed Cuts Rates", "b", "https://b"),
            ],
        };
        let ev = [
            evidence("Fed Cuts Rates", "https://b", "x"),
            evidence("Orphan", "https://o", "y"),
        ];
        let plans = [plan("Fed Raises Rates", "1"), plan("Fed Cuts Rates", "2")];
        let ca = [counter("fed cuts rates", "z")];
        let first = consolidate(Some(&list), &ev, &plans, &ca);
        let second = consolidate(Some(&list), &ev, &plans, &ca);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn cleanup_strips_only_redundant_fields() {
        let list = NewsList {
            news_list: vec![news("Fed Raises Rates", "a", "https://a")],
        };
        let mut out = consolidate(
            Some(&list),
            &[
                evidence("Fed Raises Rates", "https://a", "same"),
                evidence("fed raises rates!", "https://other", "different"),
            ],
            &[],
            &[counter("Fed Raises Rates", "c")],
        );
        cleanup(&mut out);
        let item = &out.news_list[0];

        assert!(item.supporting_evidence[0].news_title.is_none());
        assert!(item.supporting_evidence[0].source_url.is_none());

        assert_eq!(
            item.supporting_evidence[1].news_title.as_deref(),
            Some("fed raises rates!")
        );
        assert_eq!(
            item.supporting_evidence[1].source_url.as_deref(),
            Some("https://other")
        );
        assert!(item.counter_argument_sources[0].news_title.is_none());

        let json = serde_json::to_value(&item.supporting_evidence[0]).unwrap();
        assert!(json.get("news_title").is_none());
        assert_eq!(json["idea"], "same");
    }
}
