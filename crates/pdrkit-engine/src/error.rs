use std::fmt::Display;

use thiserror::Error;

use pdrkit_cfa::LocationId;
use pdrkit_smt::abstraction::AbstractionError;

use crate::analysis::AnalysisError;
use crate::frames::FrameError;

/// Errors raised by a PDR run.
///
/// `Solver`, `SolverUnknown` and `Cancelled` are recoverable: the run is
/// inconclusive and [`crate::PdrAlgorithm::verify`] reports them as
/// [`crate::PdrResult::Unknown`]. The rest are contract violations.
#[derive(Debug, Error)]
pub enum PdrError {
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Solver returned unknown: {0}")]
    SolverUnknown(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("refinement at location L{location} did not remove the spurious abstract predecessor at level {level}")]
    RefinementStalled { location: LocationId, level: usize },
}

impl PdrError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PdrError::Solver(_) | PdrError::SolverUnknown(_) | PdrError::Cancelled(_)
        )
    }

    pub(crate) fn solver<E: Display>(err: E) -> Self {
        PdrError::Solver(err.to_string())
    }
}

impl From<AbstractionError> for PdrError {
    fn from(err: AbstractionError) -> Self {
        match err {
            AbstractionError::Solver(msg) => PdrError::Solver(msg),
            AbstractionError::Unknown(reason) => PdrError::SolverUnknown(reason),
        }
    }
}
