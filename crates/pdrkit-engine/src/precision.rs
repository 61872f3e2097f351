//! Per-location predicate sets and the abstractions computed from them.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use pdrkit_cfa::LocationId;
use pdrkit_smt::abstraction::{cartesian_abstraction, predicate_for, Abstraction};
use pdrkit_smt::solver::{declare_all, SmtSolver};
use pdrkit_smt::sorts::SmtSort;
use pdrkit_smt::terms::SmtTerm;

use crate::error::PdrError;

/// Tracks the abstraction predicates of every location. Predicate sets only
/// grow during a run.
pub struct PredicatePrecisionManager<S: SmtSolver> {
    solver: S,
    predicates: HashMap<LocationId, Vec<SmtTerm>>,
}

impl<S: SmtSolver> PredicatePrecisionManager<S> {
    /// `variables` are declared on `solver` once; abstracted formulas range
    /// over them.
    pub fn new(mut solver: S, variables: &IndexMap<String, SmtSort>) -> Result<Self, PdrError> {
        let declarations: Vec<(String, SmtSort)> = variables
            .iter()
            .map(|(name, sort)| (name.clone(), sort.clone()))
            .collect();
        declare_all(&mut solver, &declarations).map_err(PdrError::solver)?;
        Ok(Self {
            solver,
            predicates: HashMap::new(),
        })
    }

    pub fn predicates(&self, location: LocationId) -> &[SmtTerm] {
        self.predicates
            .get(&location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of predicates over all locations.
    pub fn predicate_count(&self) -> usize {
        self.predicates.values().map(Vec::len).sum()
    }

    pub fn compute_abstraction(
        &mut self,
        location: LocationId,
        formula: &SmtTerm,
    ) -> Result<Abstraction, PdrError> {
        let predicates = self.predicates.get(&location).cloned().unwrap_or_default();
        Ok(cartesian_abstraction(&mut self.solver, formula, &predicates)?)
    }

    /// Add the predicate `not interpolant` at `location` and abstract
    /// `formula` again.
    pub fn refine_and_compute_abstraction(
        &mut self,
        location: LocationId,
        formula: &SmtTerm,
        interpolant: &SmtTerm,
    ) -> Result<Abstraction, PdrError> {
        let predicate = predicate_for(&interpolant.negate());
        let known = self.predicates.entry(location).or_default();
        if !known.contains(&predicate) {
            debug!(location, predicate = %predicate, "PDR: new predicate");
            known.push(predicate);
        }
        self.compute_abstraction(location, formula)
    }
}
