use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cost::CostReport;
use crate::flow::FlowStep;
use crate::models::flow_state::{FlowInputs, FlowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A submitted run, registered before its first checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub inputs: FlowInputs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of a run's checkpoint history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub id: i64,
    pub run_id: String,
    pub step: FlowStep,
    pub created_at: DateTime<Utc>,
}

/// What a status query returns for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub last_completed_step: FlowStep,
    pub cost: CostReport,
    /// Absent while the run is registered but not yet checkpointed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<FlowState>,
}
