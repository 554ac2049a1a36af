use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::FlowError;
use crate::flow::FlowStep;
use crate::models::{CheckpointSummary, FlowState};

/// Append-only history of `FlowState` snapshots, one row per completed step.
#[derive(Clone)]
pub struct CheckpointStore {
    db: Database,
}

impl CheckpointStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist a snapshot of `state` tagged with the step just completed.
    pub async fn save(&self, state: &FlowState, step: FlowStep) -> Result<i64, FlowError> {
        let run_id = state.id.clone();
        let state_json = serde_json::to_string(state)
            .map_err(|e| FlowError::Internal(format!("Failed to serialize state: {}", e)))?;
        let now = Utc::now().timestamp_millis();

        let id = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO flow_states (run_id, step, state_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![run_id, step.as_str(), state_json, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        tracing::debug!("[CheckpointStore] {} checkpointed after '{}'", state.id, step);
        Ok(id)
    }

    /// Most recent snapshot for a run: the resumption point.
    pub async fn latest(&self, run_id: &str) -> Result<Option<FlowState>, FlowError> {
        let run_id = run_id.to_string();
        let json: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT state_json FROM flow_states WHERE run_id = ?1 \
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    rusqlite::params![run_id],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| FlowError::Database(format!("Corrupt checkpoint: {}", e)))
        })
        .transpose()
    }

    /// Checkpoint history for a run, oldest first.
    pub async fn list(&self, run_id: &str) -> Result<Vec<CheckpointSummary>, FlowError> {
        let run_id = run_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, run_id, step, created_at FROM flow_states \
                     WHERE run_id = ?1 ORDER BY created_at ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![run_id], |row| Ok(row_to_summary(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows.into_iter().flatten().collect())
            })
            .await
    }
}

/// Rows with an unknown step name (written by a newer build) are skipped.
fn row_to_summary(row: &rusqlite::Row<'_>) -> Option<CheckpointSummary> {
    let step: String = row.get(2).ok()?;
    Some(CheckpointSummary {
        id: row.get(0).unwrap_or_default(),
        run_id: row.get(1).unwrap_or_default(),
        step: step.parse().ok()?,
        created_at: row
            .get::<_, i64>(3)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlowInputs;

    fn store() -> CheckpointStore {
        CheckpointStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn latest_returns_most_recent_snapshot() {
        let store = store();
        let mut state = FlowState::new("run-a", FlowInputs::default());
        store.save(&state, FlowStep::Initialize).await.unwrap();

        state.complete_step(FlowStep::Discover).unwrap();
        store.save(&state, FlowStep::Discover).await.unwrap();

        let latest = store.latest("run-a").await.unwrap().unwrap();
        assert_eq!(latest.last_completed, FlowStep::Discover);
        assert!(store.latest("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn runs_do_not_share_checkpoints() {
        let store = store();
        let mut a = FlowState::new("a", FlowInputs::default());
        a.complete_step(FlowStep::Scrape).unwrap();
        store.save(&a, FlowStep::Scrape).await.unwrap();
        let b = FlowState::new("b", FlowInputs::default());
        store.save(&b, FlowStep::Initialize).await.unwrap();

        assert_eq!(
            store.latest("a").await.unwrap().unwrap().last_completed,
            FlowStep::Scrape
        );
        assert_eq!(store.list("b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_oldest_first() {
        let store = store();
        let mut state = FlowState::new("run-h", FlowInputs::default());
        store.save(&state, FlowStep::Initialize).await.unwrap();
        for step in [FlowStep::Discover, FlowStep::Critique, FlowStep::PlanResearch] {
            state.complete_step(step).unwrap();
            store.save(&state, step).await.unwrap();
        }
        let steps: Vec<_> = store
            .list("run-h")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(
            steps,
            vec![
                FlowStep::Initialize,
                FlowStep::Discover,
                FlowStep::Critique,
                FlowStep::PlanResearch
            ]
        );
    }
}
