//! Default crews: one prompted completion per invocation, validated into
//! the expected record shape.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::catalog::{self, CrewCatalog, CrewDef};
use super::llm::{LlmCaller, LlmResponse};
use super::response::parse_structured;
use super::{
    CounterArgRequest, CrewError, CrewOutput, CritiqueRequest, DiscoverRequest, NewsCrews,
    PlanRequest, ResearchRequest, Seed, WriteRequest,
};
use crate::config::LlmConfig;
use crate::models::{
    CounterArgumentSources, NewsCritique, NewsList, NewsResearchPlan, SupportingEvidence,
};

pub struct LlmCrews {
    caller: LlmCaller,
    catalog: CrewCatalog,
}

impl LlmCrews {
    pub fn new(config: LlmConfig, catalog: CrewCatalog) -> Result<Self, CrewError> {
        Ok(Self {
            caller: LlmCaller::new(config)?,
            catalog,
        })
    }

    pub fn catalog(&self) -> &CrewCatalog {
        &self.catalog
    }

    fn crew(&self, id: &str) -> Result<&CrewDef, CrewError> {
        self.catalog
            .get(id)
            .ok_or_else(|| CrewError::UnknownCrew(id.to_string()))
    }

    async fn complete(&self, def: &CrewDef, prompt: &str) -> Result<LlmResponse, CrewError> {
        match &def.models {
            Some(models) => {
                self.caller
                    .complete_with(models, &def.system_prompt, prompt)
                    .await
            }
            None => self.caller.complete(&def.system_prompt, prompt).await,
        }
    }

    /// Prompt a crew and parse its answer as `T`, asking the model to
    /// repair unparseable output up to `reformat_attempts` times.
    async fn invoke_structured<T: DeserializeOwned + Send>(
        &self,
        crew_id: &str,
        vars: HashMap<&str, String>,
    ) -> Result<CrewOutput<T>, CrewError> {
        let def = self.crew(crew_id)?;
        let prompt = def.render(&vars);

        let mut resp = self.complete(def, &prompt).await?;
        let mut usage = resp.usage;
        let mut last_err = match parse_structured::<T>(&resp.content) {
            Ok(output) => return Ok(CrewOutput::new(output, usage)),
            Err(e) => e,
        };

        for attempt in 1..=self.caller.config().reformat_attempts {
            tracing::warn!(
                "[LlmCrews] {} output unparseable ({}), reformat attempt {}",
                crew_id,
                last_err,
                attempt
            );
            let repair = format!(
                "Your previous answer could not be parsed: {}\n\n\
                 Original request:\n{}\n\nPrevious answer:\n{}\n\n\
                 Reply again with only the corrected JSON document.",
                last_err, prompt, resp.content
            );
            resp = self.complete(def, &repair).await?;
            usage = usage + resp.usage;
            match parse_structured::<T>(&resp.content) {
                Ok(output) => return Ok(CrewOutput::new(output, usage)),
                Err(e) => last_err = e,
            }
        }

        Err(last_err)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl NewsCrews for LlmCrews {
    async fn discover(&self, req: &DiscoverRequest) -> Result<CrewOutput<NewsList>, CrewError> {
        let mut vars = HashMap::new();
        vars.insert("num_starting_news", req.pool_size.to_string());
        vars.insert("num_max_news", req.max_news.to_string());
        vars.insert("current_date", req.current_date.clone());
        vars.insert("perspective", req.perspective.clone());

        let crew_id = match &req.seed {
            Seed::Topic(topic) => {
                vars.insert("topic", topic.clone());
                catalog::DISCOVER
            }
            Seed::Urls(urls) => {
                vars.insert("news_urls", urls.join("\n"));
                catalog::SCRAPE
            }
        };
        self.invoke_structured(crew_id, vars).await
    }

    async fn critique(&self, req: &CritiqueRequest) -> Result<CrewOutput<NewsCritique>, CrewError> {
        let mut vars = HashMap::new();
        vars.insert("news_title", req.news.news_title.clone());
        vars.insert("source_url", req.news.source_url.clone());
        vars.insert("summary", req.news.summary.clone());
        vars.insert("content", req.news.content.clone());
        vars.insert("perspective", req.perspective.clone());
        self.invoke_structured(catalog::CRITIQUE, vars).await
    }

    async fn plan(&self, req: &PlanRequest) -> Result<CrewOutput<NewsResearchPlan>, CrewError> {
        let mut vars = HashMap::new();
        vars.insert("news_title", req.news.news_title.clone());
        vars.insert("source_url", req.news.source_url.clone());
        vars.insert("summary", req.news.summary.clone());
        vars.insert("content", req.news.content.clone());
        vars.insert("topic", req.topic.clone());
        vars.insert("perspective", req.perspective.clone());
        self.invoke_structured(catalog::PLANNING, vars).await
    }

    async fn research(
        &self,
        req: &ResearchRequest,
    ) -> Result<CrewOutput<SupportingEvidence>, CrewError> {
        let mut vars = HashMap::new();
        vars.insert("news_title", req.news_title.clone());
        vars.insert("source_url", req.source_url.clone());
        vars.insert("key_idea", req.key_idea.key_idea.clone());
        vars.insert("rationale", req.key_idea.rationale.clone());
        vars.insert("perspective", req.perspective.clone());
        self.invoke_structured(catalog::RESEARCH, vars).await
    }

    async fn counter_research(
        &self,
        req: &CounterArgRequest,
    ) -> Result<CrewOutput<CounterArgumentSources>, CrewError> {
        let mut vars = HashMap::new();
        vars.insert("news_title", req.news_title.clone());
        vars.insert("source_url", req.source_url.clone());
        vars.insert("counter_argument", req.counter_argument.counter_argument.clone());
        vars.insert("counter_rationale", req.counter_argument.rationale.clone());
        vars.insert("perspective", req.perspective.clone());
        self.invoke_structured(catalog::COUNTER_ARGS, vars).await
    }

    async fn write(&self, req: &WriteRequest) -> Result<CrewOutput<String>, CrewError> {
        let item = &req.item;
        let mut vars = HashMap::new();
        vars.insert("title", item.news_title.clone());
        vars.insert("url", item.source_url.clone().unwrap_or_default());
        vars.insert("original_content", item.content.clone().unwrap_or_default());
        vars.insert("evidence", to_json(&item.supporting_evidence));
        vars.insert("datapoints", to_json(&item.datapoints));
        vars.insert("counterarguments", to_json(&item.counter_argument_sources));
        vars.insert("perspective", req.perspective.clone());
        vars.insert("tone", req.tone.clone());
        vars.insert("language", req.language.clone());

        let def = self.crew(catalog::WRITER)?;
        let resp = self.complete(def, &def.render(&vars)).await?;
        Ok(CrewOutput::new(resp.content, resp.usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::stub::{completion, ChatStub};
    use crate::models::{ConsolidatedNewsItem, NewsItem, TokenUsage};

    const CRITIQUE_JSON: &str =
        r#"{"news_title":"Rates rise","approved":false,"rationale":"single source","concerns":["thin"]}"#;

    fn critique_request() -> CritiqueRequest {
        CritiqueRequest {
            news: NewsItem {
                news_title: "Rates rise".to_string(),
                summary: "Central bank moves".to_string(),
                source_url: "https://example.com/rates".to_string(),
                content: String::new(),
            },
            perspective: "skeptical".to_string(),
        }
    }

    fn crews(stub: &ChatStub, reformat_attempts: u32) -> LlmCrews {
        let config = LlmConfig {
            reformat_attempts,
            ..stub.config(&["m1"])
        };
        LlmCrews::new(config, CrewCatalog::builtin()).unwrap()
    }

    #[tokio::test]
    async fn unparseable_answer_is_sent_back_for_repair() {
        let stub = ChatStub::start(vec![
            completion("Sure! Here is my critique: approved-ish", 20, 5),
            completion(&format!("```json\n{}\n```", CRITIQUE_JSON), 8, 2),
        ])
        .await;

        let out = crews(&stub, 1).critique(&critique_request()).await.unwrap();

        assert!(!out.output.approved);
        assert_eq!(out.output.concerns, vec!["thin".to_string()]);
        assert_eq!(out.usage, TokenUsage::new(28, 7));
        assert_eq!(stub.requests().len(), 2);
        let repair = stub.user_prompt(1);
        assert!(repair.contains("could not be parsed"));
        assert!(repair.contains("approved-ish"));
        assert!(repair.contains(&stub.user_prompt(0)));
    }

    #[tokio::test]
    async fn gives_up_after_configured_reformat_attempts() {
        let stub = ChatStub::start(vec![
            completion("nope", 1, 1),
            completion("still nope", 1, 1),
            completion("never", 1, 1),
            completion(CRITIQUE_JSON, 1, 1),
        ])
        .await;

        let err = crews(&stub, 2).critique(&critique_request()).await.unwrap_err();

        assert!(matches!(err, CrewError::Malformed(_)));
        assert_eq!(stub.requests().len(), 3);
    }

    #[tokio::test]
    async fn no_reformat_attempts_fails_on_first_bad_answer() {
        let stub = ChatStub::start(vec![completion("nope", 1, 1), completion(CRITIQUE_JSON, 1, 1)]).await;

        let err = crews(&stub, 0).critique(&critique_request()).await.unwrap_err();

        assert!(matches!(err, CrewError::Malformed(_)));
        assert_eq!(stub.requests().len(), 1);
    }

    #[tokio::test]
    async fn writer_returns_text_as_is() {
        let stub = ChatStub::start(vec![completion("# Headline\n\nBody text.", 30, 90)]).await;
        let crews = crews(&stub, 1);
        let request = WriteRequest {
            item: ConsolidatedNewsItem::new("Rates rise"),
            perspective: "neutral".to_string(),
            tone: "plain".to_string(),
            language: "en".to_string(),
        };

        let out = crews.write(&request).await.unwrap();

        assert_eq!(out.output, "# Headline\n\nBody text.");
        assert_eq!(out.usage, TokenUsage::new(30, 90));
        assert_eq!(stub.requests().len(), 1);
    }
}
