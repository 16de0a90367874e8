//! Work items and the shared board pipelines report into.

mod board;
mod export;
mod types;

pub use board::ItemBoard;
pub use export::{file_stem, ArtifactExport};
pub use types::*;
