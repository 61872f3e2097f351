//! SMT queries issued by the PDR driver.
//!
//! [`PdrSat`] owns three solver instances plus the one inside the precision
//! manager: `prover` answers the abstract consecution, CTI and propagation
//! queries with assumption cores, `interpolating_prover` handles the
//! concrete consecution and its interpolants, and `subsumption_prover` only
//! ever sees program variables. Every query runs in a scoped session.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use tracing::{debug, trace};

use pdrkit_cfa::Block;
use pdrkit_smt::abstraction::Abstraction;
use pdrkit_smt::backends::smtlib_printer::to_smtlib_script;
use pdrkit_smt::interpolation::{interpolate, InterpolationResult};
use pdrkit_smt::solver::{close_scope, Model, ModelValue, SatResult, SmtSolver};
use pdrkit_smt::sorts::SmtSort;
use pdrkit_smt::ssa::SsaMap;
use pdrkit_smt::terms::SmtTerm;

use crate::error::PdrError;
use crate::frames::FrameSet;
use crate::options::PdrOptions;
use crate::precision::PredicatePrecisionManager;

/// Outcome of a relative-induction check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsecutionResult {
    /// The state is unreachable in one step from the frame. The literals
    /// form a cube that contains the state and is equally unreachable.
    Success(Vec<SmtTerm>),
    /// A concrete predecessor state inside the frame.
    Failure(SmtTerm),
}

/// A solver with query accounting. Errors leave as [`PdrError`].
pub(crate) struct Prover<S: SmtSolver> {
    solver: S,
    pub(crate) queries: usize,
}

impl<S: SmtSolver> Prover<S> {
    pub(crate) fn new(solver: S) -> Self {
        Self { solver, queries: 0 }
    }

    pub(crate) fn with_scope<T, F>(&mut self, f: F) -> Result<T, PdrError>
    where
        F: FnOnce(&mut Self) -> Result<T, PdrError>,
    {
        self.solver.push().map_err(PdrError::solver)?;
        let result = f(self);
        close_scope(result, self.solver.pop().map_err(PdrError::solver))
    }

    pub(crate) fn declare_all(
        &mut self,
        declarations: &[(String, SmtSort)],
    ) -> Result<(), PdrError> {
        for (name, sort) in declarations {
            self.solver.declare_var(name, sort).map_err(PdrError::solver)?;
        }
        Ok(())
    }

    pub(crate) fn assert(&mut self, term: &SmtTerm) -> Result<(), PdrError> {
        self.solver.assert(term).map_err(PdrError::solver)
    }

    /// Assert the frame clauses over the pre-state of `block`.
    fn assert_frame(&mut self, frame: &[SmtTerm], block: &Block) -> Result<(), PdrError> {
        for clause in frame {
            self.assert(&block.unprimed.instantiate(clause))?;
        }
        Ok(())
    }

    /// `Ok(true)` when the assertions are unsatisfiable.
    fn is_unsat(&mut self) -> Result<bool, PdrError> {
        self.queries += 1;
        match self.solver.check_sat().map_err(PdrError::solver)? {
            SatResult::Unsat => Ok(true),
            SatResult::Sat => Ok(false),
            SatResult::Unknown(reason) => Err(PdrError::SolverUnknown(reason)),
        }
    }

    pub(crate) fn model_over(
        &mut self,
        names: &[(String, SmtSort)],
    ) -> Result<Option<Model>, PdrError> {
        self.queries += 1;
        let refs: Vec<(&str, &SmtSort)> = names.iter().map(|(n, s)| (n.as_str(), s)).collect();
        let (result, model) = self
            .solver
            .check_sat_with_model(&refs)
            .map_err(PdrError::solver)?;
        match result {
            SatResult::Unsat => Ok(None),
            SatResult::Sat => model
                .map(Some)
                .ok_or_else(|| PdrError::SolverUnknown("SAT without a model".into())),
            SatResult::Unknown(reason) => Err(PdrError::SolverUnknown(reason)),
        }
    }

    /// Names of `assumptions` in the unsat core, or `None` when satisfiable.
    fn core_of(&mut self, assumptions: &[String]) -> Result<Option<Vec<String>>, PdrError> {
        self.queries += 1;
        match self
            .solver
            .check_sat_assuming(assumptions)
            .map_err(PdrError::solver)?
        {
            SatResult::Unsat => Ok(Some(
                self.solver
                    .get_unsat_core_assumptions()
                    .map_err(PdrError::solver)?,
            )),
            SatResult::Sat => Ok(None),
            SatResult::Unknown(reason) => Err(PdrError::SolverUnknown(reason)),
        }
    }
}

pub(crate) fn unprimed_names(
    variables: &IndexMap<String, SmtSort>,
    context: &SsaMap,
) -> Vec<(String, SmtSort)> {
    variables
        .iter()
        .map(|(var, sort)| (context.current_name(var), sort.clone()))
        .collect()
}

/// The full valuation of the program variables in `model`. A variable
/// without a value of its sort is an error: the cube must describe exactly
/// one state.
pub(crate) fn satisfying_state(
    variables: &IndexMap<String, SmtSort>,
    model: &Model,
    context: &SsaMap,
) -> Result<SmtTerm, PdrError> {
    let mut literals = Vec::with_capacity(variables.len());
    for (var, sort) in variables {
        let name = context.current_name(var);
        let literal = match (sort, model.get(&name)) {
            (SmtSort::Int, Some(value @ ModelValue::Int(_))) => {
                SmtTerm::var(var.clone()).eq(value.to_term())
            }
            (SmtSort::Bool, Some(ModelValue::Bool(true))) => SmtTerm::var(var.clone()),
            (SmtSort::Bool, Some(ModelValue::Bool(false))) => SmtTerm::var(var.clone()).not(),
            _ => {
                return Err(PdrError::SolverUnknown(format!(
                    "model has no {sort} value for {name}"
                )))
            }
        };
        literals.push(literal);
    }
    Ok(SmtTerm::and_all(literals))
}

/// The SMT decision layer: CTIs, consecution with abstraction refinement,
/// propagation and subsumption.
pub struct PdrSat<S: SmtSolver> {
    prover: Prover<S>,
    interpolating_prover: Prover<S>,
    subsumption_prover: Prover<S>,
    precision: PredicatePrecisionManager<S>,
    variables: IndexMap<String, SmtSort>,
    generalize: bool,
    /// Assumption names `__pdr_lit_0 ..` already declared on `prover`.
    declared_literals: usize,
    refinements: usize,
}

impl<S: SmtSolver> PdrSat<S> {
    /// Build the layer from fresh solvers produced by `factory`.
    pub fn new<F>(
        factory: F,
        variables: &IndexMap<String, SmtSort>,
        options: &PdrOptions,
    ) -> Result<Self, PdrError>
    where
        F: Fn() -> S,
    {
        let program_vars: Vec<(String, SmtSort)> = variables
            .iter()
            .map(|(name, sort)| (name.clone(), sort.clone()))
            .collect();
        let mut subsumption_prover = Prover::new(factory());
        subsumption_prover.declare_all(&program_vars)?;
        Ok(Self {
            prover: Prover::new(factory()),
            interpolating_prover: Prover::new(factory()),
            subsumption_prover,
            precision: PredicatePrecisionManager::new(factory(), variables)?,
            variables: variables.clone(),
            generalize: options.generalize,
            declared_literals: 0,
            refinements: 0,
        })
    }

    pub fn precision(&self) -> &PredicatePrecisionManager<S> {
        &self.precision
    }

    /// Solver checks issued so far, abstraction checks excluded.
    pub fn queries(&self) -> usize {
        self.prover.queries + self.interpolating_prover.queries + self.subsumption_prover.queries
    }

    pub fn refinements(&self) -> usize {
        self.refinements
    }

    /// A state in the top frame of `block.from` with a `block` successor.
    pub fn get_cti(
        &mut self,
        frames: &dyn FrameSet,
        block: &Block,
    ) -> Result<Option<SmtTerm>, PdrError> {
        let frame = frames.constraints(block.from, frames.max_level())?;
        let names = unprimed_names(&self.variables, &block.unprimed);
        let variables = &self.variables;
        self.prover.with_scope(|p| {
            p.declare_all(&block.declarations)?;
            p.assert_frame(&frame, block)?;
            p.assert(&block.formula)?;
            p.model_over(&names)?
                .map(|model| satisfying_state(variables, &model, &block.unprimed))
                .transpose()
        })
    }

    /// Check that no state of `frame(level, block.from)` reaches `state`
    /// through `block`.
    pub fn consecution(
        &mut self,
        frames: &dyn FrameSet,
        level: usize,
        block: &Block,
        state: &SmtTerm,
    ) -> Result<ConsecutionResult, PdrError> {
        let location = block.to;
        let frame = frames.constraints(block.from, level)?;
        let mut abstraction = self.precision.compute_abstraction(location, state)?;
        let mut refined = false;
        loop {
            if abstraction.is_false() {
                return Ok(ConsecutionResult::Success(vec![SmtTerm::bool(false)]));
            }
            if let Some(cube) = self.abstract_consecution(&frame, block, &abstraction)? {
                trace!(location, level, literals = cube.len(), "PDR: consecution holds");
                return Ok(ConsecutionResult::Success(cube));
            }
            if refined {
                return Err(PdrError::RefinementStalled { location, level });
            }
            match self.concrete_consecution(&frame, block, state)? {
                Ok(predecessor) => return Ok(ConsecutionResult::Failure(predecessor)),
                Err(interpolant) => {
                    self.refinements += 1;
                    debug!(location, level, "PDR: spurious predecessor, refining");
                    abstraction =
                        self.precision
                            .refine_and_compute_abstraction(location, state, &interpolant)?;
                    refined = true;
                }
            }
        }
    }

    /// Generalized cube when `frame /\ T /\ abs'` is unsatisfiable.
    fn abstract_consecution(
        &mut self,
        frame: &[SmtTerm],
        block: &Block,
        abstraction: &Abstraction,
    ) -> Result<Option<Vec<SmtTerm>>, PdrError> {
        let literals = abstraction.literals();
        let assumptions = self.assumption_names(literals.len())?;

        let core = self.prover.with_scope(|p| {
            p.declare_all(&block.declarations)?;
            p.assert_frame(frame, block)?;
            p.assert(&block.formula)?;
            if block.is_self_loop() {
                p.assert(&block.unprimed.instantiate(&abstraction.to_term().negate()))?;
            }
            if !p.solver.supports_assumption_unsat_core() {
                for literal in literals {
                    p.assert(&block.primed.instantiate(literal))?;
                }
                return Ok(p.is_unsat()?.then(|| assumptions.clone()));
            }
            for (name, literal) in assumptions.iter().zip(literals) {
                p.assert(&SmtTerm::var(name.clone()).implies(block.primed.instantiate(literal)))?;
            }
            p.core_of(&assumptions)
        })?;
        Ok(core.map(|core| self.drop_unused_literals(literals, &assumptions, &core)))
    }

    /// Names guarding `count` abstraction literals. The names are reused by
    /// every query, so each is declared once.
    fn assumption_names(&mut self, count: usize) -> Result<Vec<String>, PdrError> {
        let names: Vec<String> = (0..count).map(|i| format!("__pdr_lit_{i}")).collect();
        if count > self.declared_literals {
            let fresh: Vec<(String, SmtSort)> = names[self.declared_literals..]
                .iter()
                .map(|name| (name.clone(), SmtSort::Bool))
                .collect();
            self.prover.declare_all(&fresh)?;
            self.declared_literals = count;
        }
        Ok(names)
    }

    /// `Ok(predecessor)` when the concrete query is satisfiable, otherwise
    /// `Err(interpolant)` over program variables.
    fn concrete_consecution(
        &mut self,
        frame: &[SmtTerm],
        block: &Block,
        state: &SmtTerm,
    ) -> Result<Result<SmtTerm, SmtTerm>, PdrError> {
        let mut a: Vec<SmtTerm> = frame
            .iter()
            .map(|clause| block.unprimed.instantiate(clause))
            .collect();
        a.push(block.formula.clone());
        if block.is_self_loop() {
            a.push(block.unprimed.instantiate(&state.negate()));
        }
        let b = vec![block.primed.instantiate(state)];
        let names = unprimed_names(&self.variables, &block.unprimed);
        let variables = &self.variables;

        let predecessor = self.interpolating_prover.with_scope(|p| {
            p.declare_all(&block.declarations)?;
            for term in a.iter().chain(&b) {
                p.assert(term)?;
            }
            p.model_over(&names)?
                .map(|model| satisfying_state(variables, &model, &block.unprimed))
                .transpose()
        })?;
        if let Some(predecessor) = predecessor {
            return Ok(Ok(predecessor));
        }

        let shared: BTreeSet<String> = self
            .variables
            .keys()
            .map(|var| block.primed.current_name(var))
            .collect();
        let prover = &mut self.interpolating_prover;
        prover.queries += 1;
        let reason = match interpolate(&mut prover.solver, &block.declarations, &a, &b, &shared)
            .map_err(PdrError::solver)?
        {
            InterpolationResult::Interpolant(itp) => return Ok(Err(SsaMap::uninstantiate(&itp))),
            InterpolationResult::Satisfiable => "interpolation query became satisfiable".to_string(),
            InterpolationResult::Unknown(reason) => reason,
        };
        trace!(
            query = %to_smtlib_script(&block.declarations, &[a, b].concat()),
            "PDR: interpolation failed"
        );
        Err(PdrError::SolverUnknown(reason))
    }

    /// Whether `clause` at `(block.to, level)` survives every `block` step
    /// from `frame(level, block.from)`.
    pub fn can_propagate(
        &mut self,
        frames: &dyn FrameSet,
        clause: &SmtTerm,
        level: usize,
        block: &Block,
    ) -> Result<bool, PdrError> {
        let frame = frames.constraints(block.from, level)?;
        self.prover.with_scope(|p| {
            p.declare_all(&block.declarations)?;
            p.assert_frame(&frame, block)?;
            p.assert(&block.formula)?;
            if block.is_self_loop() {
                p.assert(&block.unprimed.instantiate(clause))?;
            }
            p.assert(&block.primed.instantiate(&clause.negate()))?;
            p.is_unsat()
        })
    }

    /// Whether `stronger` implies `weaker`. Both range over program
    /// variables.
    pub fn subsumes(&mut self, stronger: &SmtTerm, weaker: &SmtTerm) -> Result<bool, PdrError> {
        if stronger == weaker || weaker.is_true() || stronger.is_false() {
            return Ok(true);
        }
        self.subsumption_prover.with_scope(|p| {
            p.assert(stronger)?;
            p.assert(&weaker.negate())?;
            p.is_unsat()
        })
    }

    /// The valuation `model` gives the `context` versions of the program
    /// variables, as a cube over program variables.
    pub fn get_satisfying_state(
        &self,
        model: &Model,
        context: &SsaMap,
    ) -> Result<SmtTerm, PdrError> {
        satisfying_state(&self.variables, model, context)
    }

    /// The literals whose assumption name is in `core`. Without
    /// generalization every literal is kept.
    pub fn drop_unused_literals(
        &self,
        literals: &[SmtTerm],
        assumptions: &[String],
        core: &[String],
    ) -> Vec<SmtTerm> {
        if !self.generalize {
            return literals.to_vec();
        }
        literals
            .iter()
            .zip(assumptions)
            .filter(|(_, name)| core.contains(name))
            .map(|(literal, _)| literal.clone())
            .collect()
    }
}
