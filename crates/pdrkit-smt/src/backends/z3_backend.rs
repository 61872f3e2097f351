use std::collections::HashMap;

use thiserror::Error;
use z3::ast::{Bool, Int};
use z3::SatResult as Z3SatResult;

use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch for variable {0}")]
    SortMismatch(String),
}

/// [`SmtSolver`] backed by the z3 crate.
///
/// Variables live in name-indexed tables that survive `push`/`pop`, so a
/// variable declared inside a scope stays usable after the scope is popped.
/// Redeclaring a name with the same sort is a no-op.
pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, Int>,
    bool_vars: HashMap<String, Bool>,
    last_assumptions: Vec<(String, Bool)>,
    params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            last_assumptions: Vec::new(),
            params: None,
        }
    }

    /// Solver whose individual checks give up after `timeout_secs`.
    /// Zero means no limit.
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        let mut solver = Self::new();
        if timeout_secs == 0 {
            return solver;
        }
        let mut params = z3::Params::new();
        let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout_ms);
        solver.solver.set_params(&params);
        solver.params = Some(params);
        solver
    }

    pub fn declared_sort(&self, name: &str) -> Option<SmtSort> {
        if self.int_vars.contains_key(name) {
            Some(SmtSort::Int)
        } else if self.bool_vars.contains_key(name) {
            Some(SmtSort::Bool)
        } else {
            None
        }
    }

    /// Number of distinct names declared since construction or the last
    /// reset. Declarations outlive `pop`.
    pub fn declaration_count(&self) -> usize {
        self.int_vars.len() + self.bool_vars.len()
    }

    fn int_pair(&self, lhs: &SmtTerm, rhs: &SmtTerm) -> Result<(Int, Int), Z3Error> {
        Ok((
            self.translate_term(lhs)?.into_int()?,
            self.translate_term(rhs)?.into_int()?,
        ))
    }

    fn bool_list(&self, terms: &[SmtTerm]) -> Result<Vec<Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(Z3Term::into_bool))
            .collect()
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l + &r))
            }
            SmtTerm::Sub(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l - &r))
            }
            SmtTerm::Mul(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l * &r))
            }
            SmtTerm::Eq(lhs, rhs) => {
                match (self.translate_term(lhs)?, self.translate_term(rhs)?) {
                    (Z3Term::Int(l), Z3Term::Int(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                    (Z3Term::Bool(l), Z3Term::Bool(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                    _ => Err(Z3Error::Internal(format!("sort mismatch in {term}"))),
                }
            }
            SmtTerm::Lt(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            SmtTerm::Le(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            SmtTerm::Gt(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.gt(&r)))
            }
            SmtTerm::Ge(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.ge(&r)))
            }
            SmtTerm::And(terms) => {
                let bools = self.bool_list(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.bool_list(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                match (self.translate_term(then)?, self.translate_term(els)?) {
                    (Z3Term::Int(t), Z3Term::Int(e)) => Ok(Z3Term::Int(c.ite(&t, &e))),
                    (Z3Term::Bool(t), Z3Term::Bool(e)) => Ok(Z3Term::Bool(c.ite(&t, &e))),
                    _ => Err(Z3Error::Internal(format!("sort mismatch in {term}"))),
                }
            }
        }
    }

    fn convert(&self, result: Z3SatResult) -> SatResult {
        match result {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown(
                self.solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into()),
            ),
        }
    }
}

enum Z3Term {
    Int(Int),
    Bool(Bool),
}

impl Z3Term {
    fn into_int(self) -> Result<Int, Z3Error> {
        match self {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(Z3Error::Internal("Expected Int, got Bool".into())),
        }
    }

    fn into_bool(self) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::Internal("Expected Bool, got Int".into())),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        match (self.declared_sort(name), sort) {
            (Some(existing), _) if existing == *sort => return Ok(()),
            (Some(_), _) => return Err(Z3Error::SortMismatch(name.to_string())),
            (None, SmtSort::Int) => {
                self.int_vars.insert(name.to_string(), Int::new_const(name));
            }
            (None, SmtSort::Bool) => {
                self.bool_vars.insert(name.to_string(), Bool::new_const(name));
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        let result = self.solver.check();
        Ok(self.convert(result))
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        let checked = self.solver.check();
        let result = self.convert(checked);
        if result != SatResult::Sat {
            return Ok((result, None));
        }
        let z3_model = self
            .solver
            .get_model()
            .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
        let mut values = HashMap::new();
        for &(name, sort) in var_names {
            let value = match sort {
                SmtSort::Int => self
                    .int_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<Int>(v, true))
                    .and_then(|val| val.as_i64())
                    .map(ModelValue::Int),
                SmtSort::Bool => self
                    .bool_vars
                    .get(name)
                    .and_then(|v| z3_model.eval::<Bool>(v, true))
                    .and_then(|val| val.as_bool())
                    .map(ModelValue::Bool),
            };
            if let Some(value) = value {
                values.insert(name.to_string(), value);
            }
        }
        Ok((SatResult::Sat, Some(Model { values })))
    }

    fn supports_assumption_unsat_core(&self) -> bool {
        true
    }

    fn check_sat_assuming(&mut self, assumptions: &[String]) -> Result<SatResult, Z3Error> {
        let mut lits = Vec::with_capacity(assumptions.len());
        for name in assumptions {
            let var = self
                .bool_vars
                .get(name)
                .ok_or_else(|| Z3Error::UnknownVariable(name.clone()))?;
            lits.push((name.clone(), var.clone()));
        }
        let asts: Vec<Bool> = lits.iter().map(|(_, lit)| lit.clone()).collect();
        self.last_assumptions = lits;
        let result = self.solver.check_assumptions(&asts);
        Ok(self.convert(result))
    }

    fn get_unsat_core_assumptions(&mut self) -> Result<Vec<String>, Z3Error> {
        let core = self.solver.get_unsat_core();
        Ok(self
            .last_assumptions
            .iter()
            .filter(|(_, lit)| core.contains(lit))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.bool_vars.clear();
        self.last_assumptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn x() -> SmtTerm {
        SmtTerm::var("x")
    }

    #[test]
    fn z3_basic_sat_and_unsat() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("y", &SmtSort::Int)?;

        solver.push()?;
        solver.assert(&SmtTerm::and(vec![
            x().gt(SmtTerm::int(0)),
            SmtTerm::var("y").gt(SmtTerm::int(0)),
            x().add(SmtTerm::var("y")).eq(SmtTerm::int(10)),
        ]))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.pop()?;

        solver.assert(&x().gt(SmtTerm::int(0)))?;
        solver.assert(&x().lt(SmtTerm::int(0)))?;
        assert_eq!(solver.check_sat()?, SatResult::Unsat);
        Ok(())
    }

    #[test]
    fn z3_model_extraction_over_versioned_names() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x@0", &SmtSort::Int)?;
        solver.declare_var("x@1", &SmtSort::Int)?;
        solver.assert(&SmtTerm::var("x@1").eq(SmtTerm::var("x@0").sub(SmtTerm::int(1))))?;
        solver.assert(&SmtTerm::var("x@1").eq(SmtTerm::int(41)))?;

        let (result, model) =
            solver.check_sat_with_model(&[("x@0", &SmtSort::Int), ("x@1", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get("x@0"), Some(ModelValue::Int(42)));
        assert_eq!(model.get("x@1"), Some(ModelValue::Int(41)));
        Ok(())
    }

    #[test]
    fn z3_assumption_unsat_core_names_conflicting_literals() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        for lit in ["a", "b", "c"] {
            solver.declare_var(lit, &SmtSort::Bool)?;
        }
        solver.assert(&SmtTerm::var("a").implies(x().gt(SmtTerm::int(0))))?;
        solver.assert(&SmtTerm::var("b").implies(x().lt(SmtTerm::int(0))))?;
        solver.assert(&SmtTerm::var("c").implies(x().lt(SmtTerm::int(100))))?;

        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(solver.check_sat_assuming(&names)?, SatResult::Unsat);

        let core = solver.get_unsat_core_assumptions()?;
        assert!(core.contains(&"a".to_string()));
        assert!(core.contains(&"b".to_string()));
        Ok(())
    }

    #[test]
    fn z3_unknown_assumption_is_rejected() {
        let mut solver = Z3Solver::new();
        let result = solver.check_sat_assuming(&["missing".to_string()]);
        assert!(matches!(result, Err(Z3Error::UnknownVariable(name)) if name == "missing"));
    }

    #[test]
    fn z3_timeout_configuration_survives_reset() -> TestResult {
        let mut solver = Z3Solver::with_timeout_secs(2);
        assert!(solver.params.is_some());

        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&x().eq(SmtTerm::int(1)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);

        solver.reset()?;
        assert_eq!(solver.declared_sort("x"), None);
        solver.declare_var("x", &SmtSort::Int)?;
        solver.assert(&x().eq(SmtTerm::int(2)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        assert!(solver.params.is_some());
        Ok(())
    }

    #[test]
    fn z3_redeclaration_same_sort_is_noop_other_sort_fails() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("x", &SmtSort::Int)?;
        solver.declare_var("x", &SmtSort::Int)?;
        assert!(matches!(
            solver.declare_var("x", &SmtSort::Bool),
            Err(Z3Error::SortMismatch(_))
        ));
        solver.assert(&x().eq(SmtTerm::int(5)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        Ok(())
    }

    #[test]
    fn z3_declarations_survive_pop() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.push()?;
        solver.declare_var("y", &SmtSort::Int)?;
        solver.pop()?;
        assert_eq!(solver.declaration_count(), 1);
        solver.assert(&SmtTerm::var("y").ge(SmtTerm::int(3)))?;
        assert_eq!(solver.check_sat()?, SatResult::Sat);
        solver.reset()?;
        assert_eq!(solver.declaration_count(), 0);
        Ok(())
    }

    #[test]
    fn z3_translate_nested_ite() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("a", &SmtSort::Bool)?;
        solver.declare_var("b", &SmtSort::Bool)?;
        solver.declare_var("x", &SmtSort::Int)?;

        let inner = SmtTerm::var("b").ite(SmtTerm::int(1), SmtTerm::int(2));
        let outer = SmtTerm::var("a").ite(inner, SmtTerm::int(3));
        solver.assert(&x().eq(outer))?;
        solver.assert(&SmtTerm::var("a"))?;
        solver.assert(&SmtTerm::var("b").not())?;

        let (result, model) = solver.check_sat_with_model(&[("x", &SmtSort::Int)])?;
        assert_eq!(result, SatResult::Sat);
        let model = model.ok_or_else(|| std::io::Error::other("expected model"))?;
        assert_eq!(model.get("x"), Some(ModelValue::Int(2)));
        Ok(())
    }

    #[test]
    fn z3_sort_mismatch_in_terms_is_an_error() -> TestResult {
        let mut solver = Z3Solver::new();
        solver.declare_var("p", &SmtSort::Bool)?;
        let bad = SmtTerm::var("p").add(SmtTerm::int(1)).eq(SmtTerm::int(2));
        assert!(solver.assert(&bad).is_err());
        Ok(())
    }
}
