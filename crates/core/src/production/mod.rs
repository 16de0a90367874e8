//! Production batches: submit every selected item, monitor the queue and
//! fetch the finished videos.

mod orchestrator;
mod types;

pub use orchestrator::BatchProductionOrchestrator;
pub use types::*;
