//! Shared application state for the flow engine and its adapters.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::artifacts::ArtifactStore;
use crate::config::FlowConfig;
use crate::crew::{CrewCatalog, LlmCrews, NewsCrews};
use crate::db::Database;
use crate::error::FlowError;
use crate::store::{CheckpointStore, RunStore};

/// Shared state accessible by the engine, API handlers and CLI commands.
pub struct AppStateInner {
    pub db: Database,
    pub checkpoint_store: CheckpointStore,
    pub run_store: RunStore,
    pub artifacts: ArtifactStore,
    pub crews: Arc<dyn NewsCrews>,
    pub config: FlowConfig,
    active_runs: Arc<Mutex<HashSet<String>>>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    pub fn new(db: Database, config: FlowConfig, crews: Arc<dyn NewsCrews>) -> Self {
        Self {
            checkpoint_store: CheckpointStore::new(db.clone()),
            run_store: RunStore::new(db.clone()),
            artifacts: ArtifactStore::new(PathBuf::from(&config.output_dir)),
            crews,
            config,
            db,
            active_runs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// State backed by the LLM crews described in `config`.
    pub fn with_llm_crews(db: Database, config: FlowConfig) -> Result<Self, FlowError> {
        let catalog = CrewCatalog::with_dir(config.crews_dir.as_deref())?;
        let crews = LlmCrews::new(config.llm.clone(), catalog)
            .map_err(|e| FlowError::Configuration(e.to_string()))?;
        let crews = Arc::new(crews);
        Ok(Self::new(db, config, crews))
    }

    /// Reserve `run_id` for one executor. The reservation lasts until the
    /// returned claim is dropped.
    pub fn claim_run(&self, run_id: &str) -> Result<RunClaim, FlowError> {
        let mut active = self
            .active_runs
            .lock()
            .map_err(|e| FlowError::Internal(format!("Lock poisoned: {}", e)))?;
        if !active.insert(run_id.to_string()) {
            return Err(FlowError::Conflict(format!(
                "Run {} is already executing",
                run_id
            )));
        }
        Ok(RunClaim {
            run_id: run_id.to_string(),
            active: self.active_runs.clone(),
        })
    }

    pub fn is_running(&self, run_id: &str) -> bool {
        self.active_runs
            .lock()
            .map(|active| active.contains(run_id))
            .unwrap_or(false)
    }
}

/// Exclusive right to execute one run.
#[derive(Debug)]
pub struct RunClaim {
    run_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl RunClaim {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Drop for RunClaim {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.run_id);
        }
    }
}
