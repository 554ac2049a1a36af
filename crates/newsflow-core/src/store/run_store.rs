use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::FlowError;
use crate::models::{FlowInputs, RunRecord};

/// Registry of submitted runs and their seed inputs.
#[derive(Clone)]
pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a run, or touch `updated_at` if it is already registered.
    /// The first inputs recorded for a run id are kept.
    pub async fn register(&self, run_id: &str, inputs: &FlowInputs) -> Result<RunRecord, FlowError> {
        let id = run_id.to_string();
        let inputs_json = serde_json::to_string(inputs)
            .map_err(|e| FlowError::Internal(format!("Failed to serialize inputs: {}", e)))?;
        let now = Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO runs (run_id, inputs_json, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?3) \
                     ON CONFLICT(run_id) DO UPDATE SET updated_at = excluded.updated_at",
                    rusqlite::params![id, inputs_json, now],
                )?;
                Ok(())
            })
            .await?;

        self.get(run_id)
            .await?
            .ok_or_else(|| FlowError::Internal(format!("Run {} vanished after insert", run_id)))
    }

    pub async fn get(&self, run_id: &str) -> Result<Option<RunRecord>, FlowError> {
        let id = run_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT run_id, inputs_json, created_at, updated_at FROM runs WHERE run_id = ?1",
                    rusqlite::params![id],
                    |row| Ok(row_to_run(row)),
                )
                .optional()
            })
            .await
    }

    /// All runs, most recently updated first.
    pub async fn list(&self) -> Result<Vec<RunRecord>, FlowError> {
        self.db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT run_id, inputs_json, created_at, updated_at FROM runs \
                     ORDER BY updated_at DESC, run_id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_run(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> RunRecord {
    let to_dt = |ms: Option<i64>| ms.and_then(|v| Utc.timestamp_millis_opt(v).single());
    let inputs_json: String = row.get(1).unwrap_or_default();

    RunRecord {
        run_id: row.get(0).unwrap_or_default(),
        inputs: serde_json::from_str(&inputs_json).unwrap_or_default(),
        created_at: to_dt(row.get(2).ok()).unwrap_or_else(Utc::now),
        updated_at: to_dt(row.get(3).ok()).unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_keeps_first_inputs() {
        let store = RunStore::new(Database::open_in_memory().unwrap());
        let first = FlowInputs {
            topic: "first".to_string(),
            ..Default::default()
        };
        let second = FlowInputs {
            topic: "second".to_string(),
            ..Default::default()
        };
        store.register("r1", &first).await.unwrap();
        let rec = store.register("r1", &second).await.unwrap();
        assert_eq!(rec.inputs.topic, "first");
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
