//! NewsFlow: executes a run step by step, checkpointing after each.
//!
//! A run:
//! 1. Claims its run id (one executor per id at a time)
//! 2. Loads the latest checkpoint, or starts fresh from the seed inputs
//! 3. Routes to the entry step (`discover`/`scrape`, or the successor of
//!    the last completed step)
//! 4. Executes steps in canonical order, fanning out per item where needed
//! 5. Checkpoints the state after every completed step
//!
//! Nothing is checkpointed mid-step: a step that fails part-way through
//! its fan-out is re-executed in full on resume.

use std::collections::HashMap;

use uuid::Uuid;

use crate::artifacts::ArtifactStore;
use crate::consolidation;
use crate::cost::{calculate_cost, CostReport};
use crate::crew::{
    CounterArgRequest, CritiqueRequest, DiscoverRequest, PlanRequest, ResearchRequest, Seed,
    WriteRequest,
};
use crate::error::FlowError;
use crate::flow::fan_out::{fan_out, split_usage};
use crate::flow::step::{route, FlowStep, Route};
use crate::models::{FlowInputs, FlowState, NewsList};
use crate::state::{AppState, RunClaim};

/// A request to start or resume a run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Checkpoint key. Generated when absent.
    pub run_id: Option<String>,
    pub inputs: FlowInputs,
    /// Rewind the progress marker to this step before routing, so the run
    /// continues with its successor.
    pub resume_from: Option<FlowStep>,
}

/// A run that passed routing and is ready to execute.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub state: FlowState,
    pub route: Route,
    /// No checkpoint existed for this run id.
    pub fresh: bool,
}

/// Result of a run that reached the end of the pipeline.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: FlowState,
    pub cost: CostReport,
    /// Steps executed by this invocation, in order.
    pub executed: Vec<FlowStep>,
}

pub struct NewsFlow {
    state: AppState,
}

impl NewsFlow {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Claim, prepare and execute a run to completion.
    pub async fn kickoff(&self, request: RunRequest) -> Result<RunOutcome, FlowError> {
        let run_id = request
            .run_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let claim = self.state.claim_run(&run_id)?;
        let prepared = self
            .prepare(&claim, request.inputs, request.resume_from)
            .await?;
        self.execute(claim, prepared).await
    }

    /// Load or create the run state, apply any override and route it.
    /// Configuration errors surface here, before any crew is invoked.
    pub async fn prepare(
        &self,
        claim: &RunClaim,
        inputs: FlowInputs,
        resume_from: Option<FlowStep>,
    ) -> Result<PreparedRun, FlowError> {
        let run_id = claim.run_id();
        let existing = self.state.checkpoint_store.latest(run_id).await?;

        let (mut state, fresh) = match existing {
            Some(state) => {
                if inputs.has_seed() && inputs != state.inputs {
                    tracing::info!(
                        "[NewsFlow] Run {} already has inputs; ignoring the new ones",
                        run_id
                    );
                }
                (state, false)
            }
            None => {
                if let Some(step) = resume_from {
                    return Err(FlowError::Configuration(format!(
                        "cannot resume run {} from '{}': no checkpoint exists",
                        run_id, step
                    )));
                }
                (FlowState::new(run_id, inputs), true)
            }
        };

        if let Some(step) = resume_from {
            let previous = state.last_completed;
            state.override_progress(step)?;
            tracing::info!(
                "[NewsFlow] Run {}: progress marker overridden '{}' -> '{}'",
                run_id,
                previous,
                step
            );
        }

        let route = route(&state)?;
        self.state.run_store.register(run_id, &state.inputs).await?;

        if resume_from.is_some() {
            self.state
                .checkpoint_store
                .save(&state, state.last_completed)
                .await?;
        }

        Ok(PreparedRun {
            state,
            route,
            fresh,
        })
    }

    /// Execute a prepared run from its routed entry step to the end.
    pub async fn execute(
        &self,
        claim: RunClaim,
        prepared: PreparedRun,
    ) -> Result<RunOutcome, FlowError> {
        let PreparedRun {
            mut state,
            route,
            fresh,
        } = prepared;
        let artifacts = self.state.artifacts.for_run(&state.id);

        if fresh {
            tracing::info!("[NewsFlow] Initializing run {} with {:?}", state.id, state.inputs);
            self.state
                .checkpoint_store
                .save(&state, FlowStep::Initialize)
                .await?;
        }

        match route {
            Route::Start(step) => tracing::info!("[NewsFlow] Run {} starting at '{}'", state.id, step),
            Route::Resume { after } => {
                tracing::info!("[NewsFlow] Run {} resuming after '{}'", state.id, after)
            }
        }

        let mut executed = Vec::new();
        let mut next = route.first_step();
        while let Some(step) = next {
            tracing::info!("[NewsFlow] Run {}: executing '{}'", state.id, step);
            if let Err(e) = self.execute_step(step, &mut state, &artifacts).await {
                tracing::error!(
                    "[NewsFlow] Run {} failed at '{}': {} (checkpoint stays at '{}')",
                    state.id,
                    step,
                    e,
                    state.last_completed
                );
                return Err(e);
            }
            state.complete_step(step)?;
            self.state.checkpoint_store.save(&state, step).await?;
            executed.push(step);
            next = step.next();
        }

        let cost = calculate_cost(&state.flow_tokens, &self.state.config.pricing);
        for step in &cost.steps {
            tracing::info!(
                "[NewsFlow] '{}': {} prompt + {} completion tokens, ~${:.4}",
                step.step,
                step.prompt_tokens,
                step.completion_tokens,
                step.cost
            );
        }
        tracing::info!(
            "[NewsFlow] Run {} completed: {} tokens, ~${:.4}",
            state.id,
            cost.total_tokens,
            cost.total_cost
        );

        drop(claim);
        Ok(RunOutcome {
            state,
            cost,
            executed,
        })
    }

    async fn execute_step(
        &self,
        step: FlowStep,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        match step {
            FlowStep::Initialize => Ok(()),
            FlowStep::Discover | FlowStep::Scrape => self.discover(step, state, artifacts).await,
            FlowStep::Critique => self.critique(state, artifacts).await,
            FlowStep::PlanResearch => self.plan_research(state, artifacts).await,
            FlowStep::ResearchNews => self.research_news(state, artifacts).await,
            FlowStep::CounterArgs => self.counter_args(state, artifacts).await,
            FlowStep::WriteArticles => self.write_articles(state, artifacts).await,
        }
    }

    fn limit(&self, step: FlowStep) -> usize {
        self.state.config.fan_out.limit_for(step)
    }

    async fn discover(
        &self,
        step: FlowStep,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        let inputs = &state.inputs;
        let seed = match step {
            FlowStep::Scrape => Seed::Urls(inputs.news_urls.clone()),
            _ => Seed::Topic(inputs.topic.clone()),
        };
        let request = DiscoverRequest {
            seed,
            pool_size: inputs.num_starting_pool_news,
            max_news: inputs.num_max_news,
            current_date: inputs.current_date.clone(),
            perspective: inputs.perspective.clone(),
        };

        let result = self
            .state
            .crews
            .discover(&request)
            .await
            .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        tracing::info!(
            "[NewsFlow] {} found {} news items",
            step,
            result.output.news_list.len()
        );
        artifacts.save_record("news_list.json", None, &result.output).await;
        state.news_list = Some(result.output);
        state.record_usage(step, result.usage);
        Ok(())
    }

    async fn critique(&self, state: &mut FlowState, artifacts: &ArtifactStore) -> Result<(), FlowError> {
        let step = FlowStep::Critique;
        let crews = &self.state.crews;
        let perspective = state.inputs.perspective.clone();
        let items = state
            .news_list
            .as_ref()
            .map(|l| l.news_list.clone())
            .unwrap_or_default();

        let results = fan_out(items.iter().cloned(), self.limit(step), |news| {
            let crews = crews.clone();
            let request = CritiqueRequest {
                news,
                perspective: perspective.clone(),
            };
            async move { crews.critique(&request).await }
        })
        .await
        .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        let (mut critiques, usage) = split_usage(results);
        for (i, (critique, news)) in critiques.iter_mut().zip(&items).enumerate() {
            if critique.news_title.trim().is_empty() {
                critique.news_title = news.news_title.clone();
            }
            artifacts
                .save_record(&format!("critique_{}.json", i), Some(&news.news_title), critique)
                .await;
        }

        let approved = critiques.iter().filter(|c| c.approved).count();
        tracing::info!(
            "[NewsFlow] critique approved {}/{} news items",
            approved,
            critiques.len()
        );
        state.critiques = critiques;
        state.record_usage(step, usage);
        Ok(())
    }

    async fn plan_research(
        &self,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        let step = FlowStep::PlanResearch;
        let crews = &self.state.crews;
        let topic = state.inputs.topic.clone();
        let perspective = state.inputs.perspective.clone();
        let surviving = surviving_news(state);

        tracing::info!("[NewsFlow] Planning research for {} news", surviving.news_list.len());
        let results = fan_out(surviving.news_list.iter().cloned(), self.limit(step), |news| {
            let crews = crews.clone();
            let request = PlanRequest {
                news,
                topic: topic.clone(),
                perspective: perspective.clone(),
            };
            async move { crews.plan(&request).await }
        })
        .await
        .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        let (mut plans, usage) = split_usage(results);
        for (i, (plan, news)) in plans.iter_mut().zip(&surviving.news_list).enumerate() {
            if plan.news_title.trim().is_empty() {
                plan.news_title = news.news_title.clone();
            }
            if plan.source_url.trim().is_empty() {
                plan.source_url = news.source_url.clone();
            }
            artifacts
                .save_record(&format!("research_plan_{}.json", i), Some(&plan.news_title), plan)
                .await;
        }

        state.plans = plans;
        state.record_usage(step, usage);
        Ok(())
    }

    async fn research_news(
        &self,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        let step = FlowStep::ResearchNews;
        let crews = &self.state.crews;
        let perspective = &state.inputs.perspective;
        let requests: Vec<ResearchRequest> = state
            .plans
            .iter()
            .flat_map(|plan| {
                plan.key_ideas.ideas.iter().map(move |idea| ResearchRequest {
                    news_title: plan.news_title.clone(),
                    source_url: plan.source_url.clone(),
                    key_idea: idea.clone(),
                    perspective: perspective.clone(),
                })
            })
            .collect();

        tracing::info!(
            "[NewsFlow] Researching {} key ideas across {} plans",
            requests.len(),
            state.plans.len()
        );
        let results = fan_out(requests.iter().cloned(), self.limit(step), |request| {
            let crews = crews.clone();
            async move { crews.research(&request).await }
        })
        .await
        .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        let (mut evidence, usage) = split_usage(results);
        for (i, (item, request)) in evidence.iter_mut().zip(&requests).enumerate() {
            backfill(&mut item.news_title, &request.news_title);
            backfill(&mut item.source_url, &request.source_url);
            artifacts
                .save_record(&format!("evidence_{}.json", i), Some(&request.news_title), item)
                .await;
        }

        state.news_evidence = evidence;
        state.record_usage(step, usage);
        Ok(())
    }

    async fn counter_args(
        &self,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        let step = FlowStep::CounterArgs;
        let crews = &self.state.crews;
        let perspective = &state.inputs.perspective;
        let requests: Vec<CounterArgRequest> = state
            .plans
            .iter()
            .flat_map(|plan| {
                plan.counter_arguments
                    .counter_arguments
                    .iter()
                    .map(move |candidate| CounterArgRequest {
                        news_title: plan.news_title.clone(),
                        source_url: plan.source_url.clone(),
                        counter_argument: candidate.clone(),
                        perspective: perspective.clone(),
                    })
            })
            .collect();

        tracing::info!(
            "[NewsFlow] Researching {} counter-arguments across {} plans",
            requests.len(),
            state.plans.len()
        );
        let results = fan_out(requests.iter().cloned(), self.limit(step), |request| {
            let crews = crews.clone();
            async move { crews.counter_research(&request).await }
        })
        .await
        .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        let (mut sources, usage) = split_usage(results);
        for (i, (item, request)) in sources.iter_mut().zip(&requests).enumerate() {
            backfill(&mut item.news_title, &request.news_title);
            backfill(&mut item.source_url, &request.source_url);
            artifacts
                .save_record(&format!("counterargs_{}.json", i), Some(&request.news_title), item)
                .await;
        }

        state.counter_arguments = sources;
        state.record_usage(step, usage);
        Ok(())
    }

    async fn write_articles(
        &self,
        state: &mut FlowState,
        artifacts: &ArtifactStore,
    ) -> Result<(), FlowError> {
        let step = FlowStep::WriteArticles;
        let crews = &self.state.crews;

        let surviving = surviving_news(state);
        let mut consolidated = consolidation::consolidate(
            Some(&surviving),
            &state.news_evidence,
            &state.plans,
            &state.counter_arguments,
        );
        consolidation::cleanup(&mut consolidated);
        artifacts
            .save_record("final_research_output.json", None, &consolidated)
            .await;

        let requests: Vec<WriteRequest> = consolidated
            .news_list
            .iter()
            .map(|item| WriteRequest {
                item: item.clone(),
                perspective: state.inputs.perspective.clone(),
                tone: state.inputs.tone.clone(),
                language: state.inputs.language.clone(),
            })
            .collect();

        tracing::info!("[NewsFlow] Writing {} articles", requests.len());
        let results = fan_out(requests.iter().cloned(), self.limit(step), |request| {
            let crews = crews.clone();
            async move { crews.write(&request).await }
        })
        .await
        .map_err(|e| FlowError::collaborator(step.as_str(), e))?;

        let (articles, usage) = split_usage(results);
        for (i, article) in articles.iter().enumerate() {
            artifacts
                .save_record(&format!("article_{}.md", i), None, article)
                .await;
        }

        state.consolidated = Some(consolidated);
        state.articles = articles;
        state.record_usage(step, usage);
        Ok(())
    }
}

/// News items that passed critique, capped at `num_max_news` (0 = no cap).
/// Items without a verdict pass.
pub fn surviving_news(state: &FlowState) -> NewsList {
    let verdicts: HashMap<String, bool> = state
        .critiques
        .iter()
        .map(|c| (consolidation::normalize_title(&c.news_title), c.approved))
        .collect();
    let cap = match state.inputs.num_max_news {
        0 => usize::MAX,
        n => n as usize,
    };

    let news_list = state
        .news_list
        .as_ref()
        .map(|l| l.news_list.as_slice())
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter(|(i, news)| {
            state
                .critiques
                .get(*i)
                .filter(|c| c.news_title == news.news_title)
                .map(|c| c.approved)
                .or_else(|| {
                    verdicts
                        .get(&consolidation::normalize_title(&news.news_title))
                        .copied()
                })
                .unwrap_or(true)
        })
        .map(|(_, news)| news.clone())
        .take(cap)
        .collect();

    NewsList { news_list }
}

fn backfill(slot: &mut Option<String>, value: &str) {
    let missing = slot.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true);
    if missing && !value.is_empty() {
        *slot = Some(value.to_string());
    }
}
