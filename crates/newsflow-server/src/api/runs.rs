use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use newsflow_core::cost::CostReport;
use newsflow_core::flow::{run_cost, run_report};
use newsflow_core::models::{FlowInputs, RunReport};
use newsflow_core::{AppState, FlowError, FlowStep, NewsFlow};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_runs).post(submit_run))
        .route("/{id}", get(get_run))
        .route("/{id}/checkpoints", get(list_checkpoints))
        .route("/{id}/cost", get(get_cost))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRunRequest {
    run_id: Option<String>,
    topic: Option<String>,
    news_urls: Option<Vec<String>>,
    num_starting_pool_news: Option<u32>,
    num_max_news: Option<u32>,
    perspective: Option<String>,
    tone: Option<String>,
    current_date: Option<String>,
    language: Option<String>,
    resume_from: Option<String>,
}

impl SubmitRunRequest {
    fn inputs(&self) -> FlowInputs {
        let defaults = FlowInputs::default();
        FlowInputs {
            topic: self.topic.clone().unwrap_or_default(),
            news_urls: self.news_urls.clone().unwrap_or_default(),
            num_starting_pool_news: self
                .num_starting_pool_news
                .unwrap_or(defaults.num_starting_pool_news),
            num_max_news: self.num_max_news.unwrap_or(defaults.num_max_news),
            perspective: self.perspective.clone().unwrap_or_default(),
            tone: self.tone.clone().unwrap_or_default(),
            current_date: self.current_date.clone().unwrap_or(defaults.current_date),
            language: self.language.clone().unwrap_or(defaults.language),
        }
    }
}

/// POST /api/runs: Start or resume a run in the background.
///
/// Routing happens before the response, so a run that can never start is
/// rejected here rather than failing silently in the background.
async fn submit_run(
    State(state): State<AppState>,
    Json(body): Json<SubmitRunRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), FlowError> {
    let resume_from = body
        .resume_from
        .as_deref()
        .map(str::parse::<FlowStep>)
        .transpose()?;
    let run_id = body
        .run_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let claim = state.claim_run(&run_id)?;
    let flow = NewsFlow::new(state.clone());
    let prepared = flow.prepare(&claim, body.inputs(), resume_from).await?;
    let inputs = prepared.state.inputs.clone();

    tokio::spawn(async move {
        let run_id = claim.run_id().to_string();
        if let Err(e) = flow.execute(claim, prepared).await {
            tracing::error!("[API] Run {} stopped: {}", run_id, e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "runId": run_id,
            "status": "in_progress",
            "inputs": inputs,
        })),
    ))
}

async fn list_runs(State(state): State<AppState>) -> Result<Json<serde_json::Value>, FlowError> {
    let runs = state.run_store.list().await?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunReport>, FlowError> {
    run_report(&state, &id).await.map(Json)
}

async fn list_checkpoints(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, FlowError> {
    let checkpoints = state.checkpoint_store.list(&id).await?;
    if checkpoints.is_empty() && state.run_store.get(&id).await?.is_none() {
        return Err(FlowError::NotFound(format!("Run {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "checkpoints": checkpoints })))
}

async fn get_cost(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CostReport>, FlowError> {
    run_cost(&state, &id).await.map(Json)
}
