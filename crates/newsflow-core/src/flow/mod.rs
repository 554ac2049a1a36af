//! Flow state machine: step routing, execution and checkpointing.

pub mod engine;
pub mod fan_out;
pub mod status;
pub mod step;

pub use engine::{surviving_news, NewsFlow, PreparedRun, RunOutcome, RunRequest};
pub use status::{run_cost, run_report};
pub use step::{route, FlowStep, Route};
