//! Craig interpolation for linear integer arithmetic.
//!
//! When `A /\ B` is unsatisfiable, an interpolant `I` satisfies:
//! - `A => I`
//! - `I /\ B` is unsatisfiable
//! - `I` mentions only variables from the shared vocabulary
//!
//! The z3 crate exposes no interpolation API, so interpolants are computed
//! from the formulas themselves. Non-shared integer variables defined by
//! unit-coefficient equalities in `A` are eliminated by substitution; the
//! resulting atoms over the shared vocabulary are candidate conjuncts, which
//! are minimized with an assumption-based unsat core against `B`. When no
//! subset of candidates refutes `B` and `B` itself is over the shared
//! vocabulary, `not B` is returned. Every interpolant is checked against `A`
//! before it is handed out.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::solver::{assert_all, declare_all, with_scope, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Outcome of an interpolation query.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationResult {
    /// `A /\ B` is unsatisfiable with this interpolant.
    Interpolant(SmtTerm),
    /// `A /\ B` is satisfiable.
    Satisfiable,
    /// No interpolant could be produced.
    Unknown(String),
}

const ASSUMPTION_PREFIX: &str = "__itp_cand_";

/// Compute an interpolant for `A = and(a)` and `B = and(b)` over `shared`.
///
/// `declarations` must list every variable of `a` and `b`; they are declared
/// on `solver` before any query. All assertions are scoped.
pub fn interpolate<S>(
    solver: &mut S,
    declarations: &[(String, SmtSort)],
    a: &[SmtTerm],
    b: &[SmtTerm],
    shared: &BTreeSet<String>,
) -> Result<InterpolationResult, S::Error>
where
    S: SmtSolver + ?Sized,
{
    declare_all(solver, declarations)?;

    let joint = with_scope(solver, |solver| {
        assert_all(solver, a)?;
        assert_all(solver, b)?;
        solver.check_sat()
    })?;
    match joint {
        SatResult::Unsat => {}
        SatResult::Sat => return Ok(InterpolationResult::Satisfiable),
        SatResult::Unknown(reason) => return Ok(InterpolationResult::Unknown(reason)),
    }

    let int_vars: BTreeSet<&str> = declarations
        .iter()
        .filter(|(_, sort)| *sort == SmtSort::Int)
        .map(|(name, _)| name.as_str())
        .collect();
    let atoms = eliminate_local_vars(flatten(a), shared, &int_vars);
    let candidates: Vec<SmtTerm> = atoms
        .into_iter()
        .filter(|atom| !atom.is_true())
        .filter(|atom| atom.free_vars().iter().all(|v| shared.contains(v)))
        .collect();
    debug!(candidates = candidates.len(), "interpolation candidates");

    if let Some(itp) = minimize_candidates(solver, &candidates, b)? {
        if implied_by(solver, a, &itp)? {
            return Ok(InterpolationResult::Interpolant(itp));
        }
    }

    let b_vars: BTreeSet<String> = b.iter().flat_map(SmtTerm::free_vars).collect();
    if b_vars.iter().all(|v| shared.contains(v)) {
        let itp = SmtTerm::and_all(b.iter().cloned()).negate();
        if implied_by(solver, a, &itp)? {
            return Ok(InterpolationResult::Interpolant(itp));
        }
    }
    Ok(InterpolationResult::Unknown(
        "no interpolant over the shared vocabulary".into(),
    ))
}

fn flatten(terms: &[SmtTerm]) -> Vec<SmtTerm> {
    let conj = SmtTerm::and_all(terms.iter().cloned());
    conj.conjuncts().into_iter().cloned().collect()
}

/// Smallest refuting subset of `candidates` found through an unsat core, or
/// `None` when the candidates do not refute `b`.
fn minimize_candidates<S>(
    solver: &mut S,
    candidates: &[SmtTerm],
    b: &[SmtTerm],
) -> Result<Option<SmtTerm>, S::Error>
where
    S: SmtSolver + ?Sized,
{
    if candidates.is_empty() {
        return Ok(None);
    }
    with_scope(solver, |solver| {
        let mut names = Vec::with_capacity(candidates.len());
        for (idx, candidate) in candidates.iter().enumerate() {
            let name = format!("{ASSUMPTION_PREFIX}{idx}");
            solver.declare_var(&name, &SmtSort::Bool)?;
            solver.assert(&SmtTerm::var(name.clone()).implies(candidate.clone()))?;
            names.push(name);
        }
        assert_all(solver, b)?;
        if solver.check_sat_assuming(&names)? != SatResult::Unsat {
            return Ok(None);
        }
        let core: BTreeSet<String> = if solver.supports_assumption_unsat_core() {
            solver.get_unsat_core_assumptions()?.into_iter().collect()
        } else {
            names.iter().cloned().collect()
        };
        let kept = names
            .iter()
            .zip(candidates)
            .filter(|(name, _)| core.contains(*name))
            .map(|(_, candidate)| candidate.clone());
        Ok(Some(SmtTerm::and_all(kept)))
    })
}

fn implied_by<S>(solver: &mut S, a: &[SmtTerm], itp: &SmtTerm) -> Result<bool, S::Error>
where
    S: SmtSolver + ?Sized,
{
    with_scope(solver, |solver| {
        assert_all(solver, a)?;
        solver.assert(&itp.negate())?;
        Ok(solver.check_sat()? == SatResult::Unsat)
    })
}

/// Linear integer expression `sum(coeff * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LinearExpr {
    coeffs: BTreeMap<String, i64>,
    constant: i64,
}

impl LinearExpr {
    fn from_term(term: &SmtTerm) -> Option<Self> {
        match term {
            SmtTerm::IntLit(n) => Some(Self {
                coeffs: BTreeMap::new(),
                constant: *n,
            }),
            SmtTerm::Var(name) => {
                let mut coeffs = BTreeMap::new();
                coeffs.insert(name.clone(), 1);
                Some(Self {
                    coeffs,
                    constant: 0,
                })
            }
            SmtTerm::Add(lhs, rhs) => Self::from_term(lhs)?.combine(&Self::from_term(rhs)?, 1),
            SmtTerm::Sub(lhs, rhs) => Self::from_term(lhs)?.combine(&Self::from_term(rhs)?, -1),
            SmtTerm::Mul(lhs, rhs) => {
                let l = Self::from_term(lhs)?;
                let r = Self::from_term(rhs)?;
                if l.coeffs.is_empty() {
                    r.scale(l.constant)
                } else if r.coeffs.is_empty() {
                    l.scale(r.constant)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn combine(mut self, other: &Self, sign: i64) -> Option<Self> {
        for (var, coeff) in &other.coeffs {
            let slot = self.coeffs.entry(var.clone()).or_insert(0);
            *slot = slot.checked_add(coeff.checked_mul(sign)?)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_add(other.constant.checked_mul(sign)?)?;
        Some(self)
    }

    fn scale(mut self, factor: i64) -> Option<Self> {
        for coeff in self.coeffs.values_mut() {
            *coeff = coeff.checked_mul(factor)?;
        }
        self.coeffs.retain(|_, c| *c != 0);
        self.constant = self.constant.checked_mul(factor)?;
        Some(self)
    }

    fn to_term(&self) -> SmtTerm {
        let mut acc: Option<SmtTerm> = None;
        for (var, coeff) in &self.coeffs {
            let v = SmtTerm::var(var.clone());
            acc = Some(match (acc, *coeff) {
                (None, 1) => v,
                (None, c) => SmtTerm::int(c).mul(v),
                (Some(t), 1) => t.add(v),
                (Some(t), -1) => t.sub(v),
                (Some(t), c) => t.add(SmtTerm::int(c).mul(v)),
            });
        }
        match acc {
            None => SmtTerm::int(self.constant),
            Some(t) if self.constant == 0 => t,
            Some(t) if self.constant > 0 => t.add(SmtTerm::int(self.constant)),
            Some(t) => t.sub(SmtTerm::int(-self.constant)),
        }
    }
}

/// A definition `var = expr` solved out of a linear equality where `var`
/// is a local integer variable with a unit coefficient.
fn solve_for_local(
    atom: &SmtTerm,
    shared: &BTreeSet<String>,
    int_vars: &BTreeSet<&str>,
) -> Option<(String, SmtTerm)> {
    let SmtTerm::Eq(lhs, rhs) = atom else {
        return None;
    };
    let diff = LinearExpr::from_term(lhs)?.combine(&LinearExpr::from_term(rhs)?, -1)?;
    let (var, coeff) = diff.coeffs.iter().find(|(var, coeff)| {
        !shared.contains(*var) && int_vars.contains(var.as_str()) && coeff.abs() == 1
    })?;
    let var = var.clone();
    // var * c + rest = 0  =>  var = -c * rest  for c in {1, -1}
    let mut rest = diff.clone();
    rest.coeffs.remove(&var);
    let solved = rest.scale(-coeff)?;
    Some((var, solved.to_term()))
}

fn eliminate_local_vars(
    mut atoms: Vec<SmtTerm>,
    shared: &BTreeSet<String>,
    int_vars: &BTreeSet<&str>,
) -> Vec<SmtTerm> {
    loop {
        let found = atoms
            .iter()
            .enumerate()
            .find_map(|(idx, atom)| solve_for_local(atom, shared, int_vars).map(|d| (idx, d)));
        let Some((idx, (var, definition))) = found else {
            return atoms;
        };
        atoms.remove(idx);
        atoms = atoms
            .iter()
            .map(|atom| atom.substitute(&var, &definition))
            .collect();
    }
}
