//! Publishing completed items to the video-hosting platform.

mod http;
mod orchestrator;
mod scheduler;
mod simulated;
mod types;

pub use http::HttpPublisher;
pub use orchestrator::BatchPublishOrchestrator;
pub use scheduler::SmartScheduler;
pub use simulated::SimulatedPublisher;
pub use types::*;
