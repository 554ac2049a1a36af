//! News Flow Core: transport-agnostic domain logic for the news pipeline.
//!
//! This crate contains the resumable flow state machine, the consolidation
//! engine, cost accounting, the step output store, SQLite-backed checkpoint
//! and run stores, and the collaborator interface the pipeline delegates
//! content generation to. It has **no HTTP framework dependency** by default,
//! making it suitable for use in:
//!
//! - HTTP servers (via `newsflow-server`)
//! - CLI tools (via `newsflow-cli`)
//!
//! # Feature Flags
//!
//! - `axum`: Enables `IntoResponse` impl on `FlowError` for use in axum handlers.
//! - `testing`: Exposes [`testing::ScriptedCrews`], a deterministic collaborator.

pub mod artifacts;
pub mod config;
pub mod consolidation;
pub mod cost;
pub mod crew;
pub mod db;
pub mod error;
pub mod flow;
pub mod models;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Convenience re-exports
pub use config::FlowConfig;
pub use db::Database;
pub use error::FlowError;
pub use flow::{FlowStep, NewsFlow, RunRequest};
pub use state::{AppState, AppStateInner};
