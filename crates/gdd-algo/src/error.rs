use gdd_core::GddError;
use thiserror::Error;

use crate::backend::{BackendError, SolveStatus};

/// Errors that abort a decomposition run.
#[derive(Debug, Error)]
pub enum LagrangeError {
    #[error("Invalid model graph: {0}")]
    Model(#[from] GddError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Subproblem for block {block} ({name}) ended {status}")]
    SubproblemFailed {
        block: usize,
        name: String,
        status: SolveStatus,
    },

    #[error("Heuristic model ended {status} after fixing {fixed} variables")]
    HeuristicFailed { status: SolveStatus, fixed: usize },

    #[error("LP relaxation ended {0}")]
    RelaxationFailed(SolveStatus),

    #[error("Master problem failed: {0}")]
    MasterFailed(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type LagrangeResult<T> = Result<T, LagrangeError>;
