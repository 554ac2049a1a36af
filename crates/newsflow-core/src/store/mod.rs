pub mod checkpoint_store;
pub mod run_store;

pub use checkpoint_store::CheckpointStore;
pub use run_store::RunStore;
