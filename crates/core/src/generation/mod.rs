//! Remote generation backend boundary and the per-item pipeline stages.
//!
//! Each production pipeline runs [`TaskSubmitter`] then [`TaskPoller`] then
//! [`ArtifactFetcher`] against one [`GenerationBackend`].

mod fetcher;
mod http;
mod poller;
mod simulated;
mod submitter;
mod types;

pub use fetcher::ArtifactFetcher;
pub use http::HttpGenerationBackend;
pub use poller::{TaskMatcher, TaskPoller};
pub use simulated::{SimulatedGenerationBackend, SIMULATED_ARTIFACT};
pub use submitter::TaskSubmitter;
pub use types::*;
