use std::collections::HashMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

/// A model (variable assignments) extracted from a SAT result.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub values: HashMap<String, ModelValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelValue {
    Int(i64),
    Bool(bool),
}

impl ModelValue {
    /// The value as a literal term.
    pub fn to_term(self) -> SmtTerm {
        match self {
            ModelValue::Int(n) => SmtTerm::int(n),
            ModelValue::Bool(b) => SmtTerm::bool(b),
        }
    }
}

impl Model {
    pub fn get(&self, name: &str) -> Option<ModelValue> {
        self.values.get(name).copied()
    }
}

/// Abstract SMT solver interface.
pub trait SmtSolver {
    type Error: std::error::Error;

    /// Declare a new variable.
    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Self::Error>;

    /// Assert a constraint.
    fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error>;

    /// Push a new scope.
    fn push(&mut self) -> Result<(), Self::Error>;

    /// Pop a scope.
    fn pop(&mut self) -> Result<(), Self::Error>;

    /// Check satisfiability.
    fn check_sat(&mut self) -> Result<SatResult, Self::Error>;

    /// Check satisfiability and extract a model if SAT.
    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Self::Error>;

    /// Returns true when the backend supports `check-sat-assuming` with
    /// retrievable UNSAT cores over the provided assumptions.
    fn supports_assumption_unsat_core(&self) -> bool {
        false
    }

    /// Check satisfiability under a set of Boolean assumption variables.
    ///
    /// Assumptions are backend variable names that must be declared as `Bool`.
    fn check_sat_assuming(&mut self, _assumptions: &[String]) -> Result<SatResult, Self::Error> {
        self.check_sat()
    }

    /// Return UNSAT-core assumptions for the previous `check_sat_assuming`.
    fn get_unsat_core_assumptions(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(Vec::new())
    }

    /// Reset the solver state.
    fn reset(&mut self) -> Result<(), Self::Error>;
}

/// Run `f` inside a fresh solver scope.
///
/// The scope is popped on every exit path. When both `f` and the pop fail,
/// the error from `f` wins.
pub fn with_scope<S, T, F>(solver: &mut S, f: F) -> Result<T, S::Error>
where
    S: SmtSolver + ?Sized,
    F: FnOnce(&mut S) -> Result<T, S::Error>,
{
    solver.push()?;
    let result = f(solver);
    close_scope(result, solver.pop())
}

/// Combine the result of a scoped body with the result of popping its
/// scope. The body's error takes precedence.
pub fn close_scope<T, E>(result: Result<T, E>, pop_result: Result<(), E>) -> Result<T, E> {
    match (result, pop_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Err(err), Ok(())) => Err(err),
        (Ok(_), Err(pop_err)) => Err(pop_err),
        (Err(err), Err(_)) => Err(err),
    }
}

pub fn declare_all<S: SmtSolver + ?Sized>(
    solver: &mut S,
    declarations: &[(String, SmtSort)],
) -> Result<(), S::Error> {
    for (name, sort) in declarations {
        solver.declare_var(name, sort)?;
    }
    Ok(())
}

pub fn assert_all<S: SmtSolver + ?Sized>(
    solver: &mut S,
    assertions: &[SmtTerm],
) -> Result<(), S::Error> {
    for assertion in assertions {
        solver.assert(assertion)?;
    }
    Ok(())
}

/// Check whether the conjunction of `assertions` is unsatisfiable, inside a
/// scope. `Unknown` answers are returned as-is.
pub fn check_conjunction<S: SmtSolver + ?Sized>(
    solver: &mut S,
    assertions: &[SmtTerm],
) -> Result<SatResult, S::Error> {
    with_scope(solver, |solver| {
        assert_all(solver, assertions)?;
        solver.check_sat()
    })
}
