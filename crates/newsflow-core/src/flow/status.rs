//! Run status queries.

use crate::cost::{calculate_cost, CostReport};
use crate::error::FlowError;
use crate::flow::FlowStep;
use crate::models::{RunReport, RunStatus};
use crate::state::AppStateInner;

/// Status of a run from its latest checkpoint. A registered run with no
/// checkpoint yet reports `in_progress` at `initialize` with no state.
pub async fn run_report(app: &AppStateInner, run_id: &str) -> Result<RunReport, FlowError> {
    if let Some(state) = app.checkpoint_store.latest(run_id).await? {
        return Ok(RunReport {
            run_id: run_id.to_string(),
            status: state.status(),
            last_completed_step: state.last_completed,
            cost: calculate_cost(&state.flow_tokens, &app.config.pricing),
            state: Some(state),
        });
    }

    match app.run_store.get(run_id).await? {
        Some(_) => Ok(RunReport {
            run_id: run_id.to_string(),
            status: RunStatus::InProgress,
            last_completed_step: FlowStep::Initialize,
            cost: CostReport::default(),
            state: None,
        }),
        None => Err(FlowError::NotFound(format!("Run {} not found", run_id))),
    }
}

/// Cost report for a run's latest checkpoint.
pub async fn run_cost(app: &AppStateInner, run_id: &str) -> Result<CostReport, FlowError> {
    Ok(run_report(app, run_id).await?.cost)
}
