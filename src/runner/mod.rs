mod orchestrator;
mod retry;
mod stage;

pub use orchestrator::{AttemptContext, Orchestrator, TriageReport};
pub use stage::{StageRecord, StageStatus};
