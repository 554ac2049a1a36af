pub mod flow_state;
pub mod news;
pub mod run;

pub use flow_state::{FlowInputs, FlowState, TokenUsage};
pub use news::*;
pub use run::{CheckpointSummary, RunRecord, RunReport, RunStatus};
