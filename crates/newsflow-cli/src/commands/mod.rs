//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the newsflow-core domain logic through `AppState`.

pub mod checkpoints;
pub mod cost;
pub mod crews;
pub mod run;
pub mod runs;
pub mod server;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use newsflow_core::{AppState, AppStateInner, Database, FlowConfig};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config: Option<String>,
    pub db: Option<String>,
    pub output_dir: Option<String>,
}

/// Load the config file and apply command-line overrides on top of it.
pub fn load_config(opts: &GlobalOpts) -> Result<FlowConfig, String> {
    let mut config = FlowConfig::load(opts.config.as_deref().map(Path::new))
        .map_err(|e| e.to_string())?;
    if let Some(db) = &opts.db {
        config.database_path = db.clone();
    }
    if let Some(dir) = &opts.output_dir {
        config.output_dir = dir.clone();
    }
    Ok(config)
}

/// Initialize a shared `AppState` backed by the configured LLM crews.
///
/// This mirrors `newsflow_server::create_app_state` but exits the process
/// on failure, as a CLI should.
pub fn init_state(opts: &GlobalOpts) -> AppState {
    let config = load_config(opts).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(1);
    });

    let db = Database::open(&config.database_path).unwrap_or_else(|e| {
        eprintln!("Failed to open database '{}': {}", config.database_path, e);
        std::process::exit(1);
    });

    let inner = AppStateInner::with_llm_crews(db, config).unwrap_or_else(|e| {
        eprintln!("Failed to load crews: {}", e);
        std::process::exit(1);
    });

    Arc::new(inner)
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
