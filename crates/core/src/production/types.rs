//! Types for production batches.

use serde::Serialize;
use thiserror::Error;

use crate::credentials::{CredentialError, GenerationAuth};
use crate::generation::GenerationError;

/// Errors from a production batch.
///
/// Only [`Validation`](Self::Validation) and
/// [`Credential`](Self::Credential) abort a batch before it starts; the
/// others are per-item and end up on the item's log.
#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("production cancelled")]
    Cancelled,

    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

impl ProductionError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProductionError::Validation(_) => "validation",
            ProductionError::Credential(_) => "credential",
            ProductionError::Generation(e) => e.kind(),
            ProductionError::Cancelled => "cancelled",
            ProductionError::Aborted(_) => "aborted",
        }
    }
}

/// Where a production batch sends its jobs.
#[derive(Debug, Clone)]
pub enum ProductionMode {
    /// Real backend, one fixed credential for the whole batch.
    Live(GenerationAuth),
    /// Offline backend with synthetic delays and a canned artifact.
    Simulation,
}

impl ProductionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductionMode::Live(_) => "live",
            ProductionMode::Simulation => "simulation",
        }
    }

    pub fn is_simulation(&self) -> bool {
        matches!(self, ProductionMode::Simulation)
    }
}

/// Terminal outcome of every item in a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductionReport {
    pub completed: Vec<String>,
    pub failed: Vec<String>,
}

impl ProductionReport {
    pub fn total(&self) -> usize {
        self.completed.len() + self.failed.len()
    }
}
