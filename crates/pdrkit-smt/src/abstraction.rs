//! Cartesian predicate abstraction.
//!
//! The Cartesian abstraction of a formula `f` over predicates `p1..pn` is the
//! strongest cube `l1 /\ .. /\ lk` with each `li` in `{pj, not pj}` that `f`
//! implies. It costs two implication checks per predicate.

use thiserror::Error;

use crate::solver::{with_scope, SatResult, SmtSolver};
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum AbstractionError {
    #[error("solver error during abstraction: {0}")]
    Solver(String),
    #[error("solver returned unknown during abstraction: {0}")]
    Unknown(String),
}

/// Result of abstracting a formula.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Abstraction {
    /// The formula is unsatisfiable.
    False,
    /// Conjunction of predicate literals; the empty cube is `true`.
    Cube(Vec<SmtTerm>),
}

impl Abstraction {
    pub fn literals(&self) -> &[SmtTerm] {
        match self {
            Abstraction::False => &[],
            Abstraction::Cube(literals) => literals,
        }
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Abstraction::False)
    }

    pub fn to_term(&self) -> SmtTerm {
        match self {
            Abstraction::False => SmtTerm::bool(false),
            Abstraction::Cube(literals) => SmtTerm::and_all(literals.iter().cloned()),
        }
    }
}

/// Abstract `formula` over `predicates`.
///
/// Every variable of `formula` and of the predicates must already be declared
/// on `solver`. An empty predicate list yields `true` without a solver call.
pub fn cartesian_abstraction<S>(
    solver: &mut S,
    formula: &SmtTerm,
    predicates: &[SmtTerm],
) -> Result<Abstraction, AbstractionError>
where
    S: SmtSolver + ?Sized,
{
    if predicates.is_empty() {
        return Ok(Abstraction::Cube(Vec::new()));
    }
    let solver_err = |e: S::Error| AbstractionError::Solver(e.to_string());

    with_scope(solver, |solver| {
        solver.assert(formula)?;
        let base = solver.check_sat()?;
        if base == SatResult::Unsat {
            return Ok(Ok(Abstraction::False));
        }
        if let SatResult::Unknown(reason) = base {
            return Ok(Err(AbstractionError::Unknown(reason)));
        }

        let mut literals = Vec::new();
        for predicate in predicates {
            match implied(solver, &predicate.negate())? {
                Ok(true) => {
                    literals.push(predicate.clone());
                    continue;
                }
                Ok(false) => {}
                Err(reason) => return Ok(Err(AbstractionError::Unknown(reason))),
            }
            match implied(solver, predicate)? {
                Ok(true) => literals.push(predicate.negate()),
                Ok(false) => {}
                Err(reason) => return Ok(Err(AbstractionError::Unknown(reason))),
            }
        }
        Ok(Ok(Abstraction::Cube(literals)))
    })
    .map_err(solver_err)?
}

/// Whether the asserted context plus `refutation` is unsatisfiable.
fn implied<S>(solver: &mut S, refutation: &SmtTerm) -> Result<Result<bool, String>, S::Error>
where
    S: SmtSolver + ?Sized,
{
    with_scope(solver, |solver| {
        solver.assert(refutation)?;
        Ok(match solver.check_sat()? {
            SatResult::Unsat => Ok(true),
            SatResult::Sat => Ok(false),
            SatResult::Unknown(reason) => Err(reason),
        })
    })
}

/// Predicate derived from a refinement formula: nested double negations are
/// stripped so `not not p` and `p` name the same predicate.
pub fn predicate_for(formula: &SmtTerm) -> SmtTerm {
    let mut current = formula;
    while let SmtTerm::Not(inner) = current {
        match inner.as_ref() {
            SmtTerm::Not(innermost) => current = innermost,
            _ => break,
        }
    }
    current.clone()
}
