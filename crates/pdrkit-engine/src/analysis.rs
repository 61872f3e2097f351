//! The program view the engine works on.

use indexmap::IndexMap;
use thiserror::Error;

use pdrkit_cfa::{Block, Cfa, CfaError, LocationId};
use pdrkit_smt::sorts::SmtSort;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Cfa(#[from] CfaError),
    #[error("unknown location L{0}")]
    UnknownLocation(LocationId),
}

/// Block-level view of a program: locations are block starts, transitions
/// are [`Block`]s.
pub trait ProgramAnalysis {
    fn entry(&self) -> LocationId;

    fn error_locations(&self) -> Vec<LocationId>;

    fn variables(&self) -> &IndexMap<String, SmtSort>;

    fn location_name(&self, location: LocationId) -> String {
        format!("L{location}")
    }

    fn predecessor_blocks(&self, location: LocationId) -> Result<Vec<Block>, AnalysisError>;

    fn successor_blocks(&self, location: LocationId) -> Result<Vec<Block>, AnalysisError>;
}

impl ProgramAnalysis for Cfa {
    fn entry(&self) -> LocationId {
        Cfa::entry(self)
    }

    fn error_locations(&self) -> Vec<LocationId> {
        Cfa::error_locations(self)
    }

    fn variables(&self) -> &IndexMap<String, SmtSort> {
        Cfa::variables(self)
    }

    fn location_name(&self, location: LocationId) -> String {
        self.location(location)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("L{location}"))
    }

    fn predecessor_blocks(&self, location: LocationId) -> Result<Vec<Block>, AnalysisError> {
        if self.location(location).is_none() {
            return Err(AnalysisError::UnknownLocation(location));
        }
        Ok(self.blocks_into(location)?)
    }

    fn successor_blocks(&self, location: LocationId) -> Result<Vec<Block>, AnalysisError> {
        if self.location(location).is_none() {
            return Err(AnalysisError::UnknownLocation(location));
        }
        Ok(self.blocks_from(location)?)
    }
}
