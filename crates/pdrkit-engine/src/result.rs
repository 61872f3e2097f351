use serde::Serialize;
use std::fmt;

use pdrkit_cfa::LocationId;
use pdrkit_smt::terms::SmtTerm;

use crate::obligation::ProofObligation;

/// One location of a counterexample path with the state reached there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterexampleStep {
    pub location: LocationId,
    pub name: String,
    /// Valuation at this location; `None` where the run did not record one.
    pub state: Option<SmtTerm>,
}

/// Path from the entry to an error location.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Counterexample {
    pub steps: Vec<CounterexampleStep>,
}

impl Counterexample {
    /// Walk the cause chain of `obligation` (which sits closest to the
    /// entry) and finish at `error`.
    pub fn from_obligation<N>(obligation: &ProofObligation, error: LocationId, name_of: N) -> Self
    where
        N: Fn(LocationId) -> String,
    {
        let mut steps: Vec<CounterexampleStep> = obligation
            .chain()
            .map(|ob| CounterexampleStep {
                location: ob.location(),
                name: name_of(ob.location()),
                state: Some(ob.state().clone()),
            })
            .collect();
        steps.push(CounterexampleStep {
            location: error,
            name: name_of(error),
            state: None,
        });
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn locations(&self) -> Vec<LocationId> {
        self.steps.iter().map(|s| s.location).collect()
    }
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match &step.state {
                Some(state) => writeln!(f, "  {i}: {} [{}]", step.name, state)?,
                None => writeln!(f, "  {i}: {}", step.name)?,
            }
        }
        Ok(())
    }
}

/// Verdict of a PDR run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdrResult {
    /// The frames at `level` and `level + 1` coincide: no error location is
    /// reachable.
    Safe { level: usize },
    /// An error location is reachable along `counterexample`.
    Unsafe { counterexample: Counterexample },
    /// Verification was inconclusive.
    Unknown { reason: String },
}

impl PdrResult {
    /// Machine-readable verdict class. Depends only on the variant.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            PdrResult::Safe { .. } => "safe",
            PdrResult::Unsafe { .. } => "unsafe",
            PdrResult::Unknown { .. } => "unknown",
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, PdrResult::Safe { .. })
    }

    pub fn is_unsafe(&self) -> bool {
        matches!(self, PdrResult::Unsafe { .. })
    }

    pub fn counterexample(&self) -> Option<&Counterexample> {
        match self {
            PdrResult::Unsafe { counterexample } => Some(counterexample),
            _ => None,
        }
    }
}

impl fmt::Display for PdrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdrResult::Safe { level } => {
                write!(f, "RESULT: SAFE (inductive at frame {level})")
            }
            PdrResult::Unsafe { counterexample } => {
                writeln!(f, "RESULT: UNSAFE")?;
                write!(f, "Counterexample ({} steps):\n{counterexample}", counterexample.len())
            }
            PdrResult::Unknown { reason } => write!(f, "RESULT: UNKNOWN ({reason})"),
        }
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PdrStats {
    pub frames_opened: usize,
    pub obligations: usize,
    pub ctis: usize,
    pub refinements: usize,
    pub propagated_clauses: usize,
    pub solver_queries: usize,
}
