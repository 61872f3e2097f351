//! The PDR driver loop.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use pdrkit_cfa::{Block, LocationId};
use pdrkit_smt::backends::z3_backend::Z3Solver;
use pdrkit_smt::solver::SmtSolver;
use pdrkit_smt::terms::SmtTerm;

use crate::analysis::ProgramAnalysis;
use crate::error::PdrError;
use crate::frames::{DynamicFrameSet, FrameSet, PropagationOracle};
use crate::obligation::{ObligationQueue, ProofObligation};
use crate::options::PdrOptions;
use crate::result::{Counterexample, CounterexampleStep, PdrResult, PdrStats};
use crate::sat::{satisfying_state, unprimed_names, ConsecutionResult, PdrSat, Prover};
use crate::shutdown::ShutdownNotifier;

/// Result of trying to block one obligation.
enum BlockAttempt {
    Blocked,
    Predecessor { location: LocationId, state: SmtTerm },
}

/// Answers propagation queries against the predecessor blocks of each
/// location.
struct BlockOracle<'s, S: SmtSolver> {
    sat: &'s mut PdrSat<S>,
    blocks: &'s HashMap<LocationId, Vec<Block>>,
}

impl<S: SmtSolver> PropagationOracle for BlockOracle<'_, S> {
    type Error = PdrError;

    fn can_propagate(
        &mut self,
        frames: &dyn FrameSet,
        clause: &SmtTerm,
        location: LocationId,
        level: usize,
    ) -> Result<bool, PdrError> {
        let Some(blocks) = self.blocks.get(&location) else {
            return Ok(true);
        };
        for block in blocks {
            if !self.sat.can_propagate(frames, clause, level, block)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn subsumes(&mut self, stronger: &SmtTerm, weaker: &SmtTerm) -> Result<bool, PdrError> {
        self.sat.subsumes(stronger, weaker)
    }
}

/// Property-directed reachability over a [`ProgramAnalysis`].
///
/// `factory` produces the solver instances of a run; each run builds fresh
/// ones, so a `PdrAlgorithm` can be run more than once.
pub struct PdrAlgorithm<'a, A, S, F>
where
    A: ProgramAnalysis,
    S: SmtSolver,
    F: Fn() -> S,
{
    analysis: &'a A,
    factory: F,
    options: PdrOptions,
    shutdown: ShutdownNotifier,
    frames: Option<DynamicFrameSet>,
    stats: PdrStats,
}

impl<'a, A, S, F> PdrAlgorithm<'a, A, S, F>
where
    A: ProgramAnalysis,
    S: SmtSolver,
    F: Fn() -> S,
{
    pub fn new(analysis: &'a A, factory: F, options: PdrOptions) -> Self {
        Self {
            analysis,
            factory,
            options,
            shutdown: ShutdownNotifier::new(),
            frames: None,
            stats: PdrStats::default(),
        }
    }

    /// Use `shutdown` instead of a private notifier. A notifier without a
    /// deadline still gets the one from `PdrOptions::timeout_secs`.
    pub fn with_shutdown(mut self, shutdown: ShutdownNotifier) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Handle that stops a run from another thread.
    pub fn shutdown_notifier(&self) -> ShutdownNotifier {
        self.shutdown.clone()
    }

    /// Frames of the last run; `None` if it ended before creating them.
    pub fn frames(&self) -> Option<&DynamicFrameSet> {
        self.frames.as_ref()
    }

    pub fn stats(&self) -> PdrStats {
        self.stats
    }

    /// Like [`PdrAlgorithm::run`], with solver failures and cancellation
    /// reported as [`PdrResult::Unknown`].
    pub fn verify(&mut self) -> Result<PdrResult, PdrError> {
        match self.run() {
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "PDR: inconclusive");
                Ok(PdrResult::Unknown {
                    reason: err.to_string(),
                })
            }
            other => other,
        }
    }

    pub fn run(&mut self) -> Result<PdrResult, PdrError> {
        let shutdown = if self.shutdown.has_deadline() {
            self.shutdown.clone()
        } else {
            self.shutdown
                .clone()
                .with_timeout_secs(self.options.timeout_secs)
        };
        self.frames = None;
        self.stats = PdrStats::default();
        shutdown.check()?;

        let errors = self.analysis.error_locations();
        info!(errors = errors.len(), "PDR: starting");
        if let Some(result) = self.trivial_reachability(&errors)? {
            return Ok(result);
        }

        let analysis = self.analysis;
        let mut sat = PdrSat::new(&self.factory, analysis.variables(), &self.options)?;
        let mut frames = DynamicFrameSet::new(analysis.entry());
        let outcome = self.search(&mut frames, &mut sat, &errors, &shutdown);
        self.stats.solver_queries += sat.queries();
        self.stats.refinements = sat.refinements();
        self.frames = Some(frames);
        if let Ok(result) = &outcome {
            info!(verdict = result.verdict_class(), "PDR: finished");
        }
        outcome
    }

    /// Zero- and one-step reachability of an error location.
    fn trivial_reachability(
        &mut self,
        errors: &[LocationId],
    ) -> Result<Option<PdrResult>, PdrError> {
        let analysis = self.analysis;
        let entry = analysis.entry();
        if errors.contains(&entry) {
            info!("PDR: entry is an error location");
            return Ok(Some(PdrResult::Unsafe {
                counterexample: Counterexample {
                    steps: vec![CounterexampleStep {
                        location: entry,
                        name: analysis.location_name(entry),
                        state: None,
                    }],
                },
            }));
        }

        let mut prover = Prover::new((self.factory)());
        let variables = analysis.variables();
        for block in analysis.successor_blocks(entry)? {
            if !errors.contains(&block.to) {
                continue;
            }
            let names = unprimed_names(variables, &block.unprimed);
            let state = prover.with_scope(|p| {
                p.declare_all(&block.declarations)?;
                p.assert(&block.formula)?;
                p.model_over(&names)?
                    .map(|model| satisfying_state(variables, &model, &block.unprimed))
                    .transpose()
            })?;
            if let Some(state) = state {
                self.stats.solver_queries += prover.queries;
                info!("PDR: error reachable in one step");
                return Ok(Some(PdrResult::Unsafe {
                    counterexample: Counterexample {
                        steps: vec![
                            CounterexampleStep {
                                location: entry,
                                name: analysis.location_name(entry),
                                state: Some(state),
                            },
                            CounterexampleStep {
                                location: block.to,
                                name: analysis.location_name(block.to),
                                state: None,
                            },
                        ],
                    },
                }));
            }
        }
        self.stats.solver_queries += prover.queries;
        Ok(None)
    }

    fn search(
        &mut self,
        frames: &mut DynamicFrameSet,
        sat: &mut PdrSat<S>,
        errors: &[LocationId],
        shutdown: &ShutdownNotifier,
    ) -> Result<PdrResult, PdrError> {
        loop {
            shutdown.check()?;
            let max_frames = self.options.max_frames;
            if max_frames != 0 && frames.max_level() >= max_frames {
                info!(frames = frames.max_level(), "PDR: frame bound reached");
                return Ok(PdrResult::Unknown {
                    reason: format!("frame bound {max_frames} reached"),
                });
            }

            frames.open_next_frame_set();
            self.stats.frames_opened += 1;
            info!(level = frames.max_level(), "PDR: opened frame");

            if let Some(counterexample) = self.strengthen(frames, sat, errors, shutdown)? {
                info!(steps = counterexample.len(), "PDR: counterexample found");
                return Ok(PdrResult::Unsafe { counterexample });
            }

            let pushed = self.propagate(frames, sat)?;
            self.stats.propagated_clauses += pushed;
            debug!(level = frames.max_level(), pushed, "PDR: propagation done");

            if let Some(level) = frames.fixpoint_level() {
                info!(level, frames = frames.max_level(), "PDR: fixpoint reached");
                return Ok(PdrResult::Safe { level });
            }
        }
    }

    /// Block every CTI in the top frame. Returns a counterexample when one of
    /// them reaches the entry.
    fn strengthen(
        &mut self,
        frames: &mut DynamicFrameSet,
        sat: &mut PdrSat<S>,
        errors: &[LocationId],
        shutdown: &ShutdownNotifier,
    ) -> Result<Option<Counterexample>, PdrError> {
        let analysis = self.analysis;
        for &error in errors {
            for block in analysis.predecessor_blocks(error)? {
                loop {
                    shutdown.check()?;
                    let Some(cti) = sat.get_cti(frames, &block)? else {
                        break;
                    };
                    self.stats.ctis += 1;
                    debug!(
                        location = block.from,
                        level = frames.max_level(),
                        "PDR: counterexample to induction"
                    );
                    if let Some(obligation) =
                        self.backward_block(frames, sat, block.from, cti, shutdown)?
                    {
                        return Ok(Some(Counterexample::from_obligation(
                            &obligation,
                            error,
                            |location| analysis.location_name(location),
                        )));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Discharge `state` at `location` and every obligation it spawns.
    /// Returns the obligation that reached the entry, if any.
    fn backward_block(
        &mut self,
        frames: &mut DynamicFrameSet,
        sat: &mut PdrSat<S>,
        location: LocationId,
        state: SmtTerm,
        shutdown: &ShutdownNotifier,
    ) -> Result<Option<ProofObligation>, PdrError> {
        let entry = self.analysis.entry();
        let mut queue = ObligationQueue::new(self.options.obligation_priority);
        queue.push(ProofObligation::new(frames.max_level(), location, state));

        while let Some(obligation) = queue.pop() {
            shutdown.check()?;
            self.stats.obligations += 1;
            if obligation.frame_level() == 0 || obligation.location() == entry {
                return Ok(Some(obligation));
            }
            let obligation = Arc::new(obligation);
            match self.try_block(frames, sat, &obligation, shutdown)? {
                BlockAttempt::Blocked => {}
                BlockAttempt::Predecessor { location, state } => {
                    queue.push(ProofObligation::with_cause(
                        obligation.frame_level() - 1,
                        location,
                        state,
                        Arc::clone(&obligation),
                    ));
                    queue.push((*obligation).clone());
                }
            }
        }
        Ok(None)
    }

    fn try_block(
        &mut self,
        frames: &mut DynamicFrameSet,
        sat: &mut PdrSat<S>,
        obligation: &ProofObligation,
        shutdown: &ShutdownNotifier,
    ) -> Result<BlockAttempt, PdrError> {
        let location = obligation.location();
        let level = obligation.frame_level();
        let blocks = self.analysis.predecessor_blocks(location)?;
        loop {
            let predicates = sat.precision().predicates(location).len();
            let mut literals: Vec<SmtTerm> = Vec::new();
            for block in &blocks {
                shutdown.check()?;
                match sat.consecution(frames, level - 1, block, obligation.state())? {
                    ConsecutionResult::Success(cube) => {
                        for literal in cube {
                            if !literals.contains(&literal) {
                                literals.push(literal);
                            }
                        }
                    }
                    ConsecutionResult::Failure(state) => {
                        return Ok(BlockAttempt::Predecessor {
                            location: block.from,
                            state,
                        });
                    }
                }
            }
            // Self-loop checks assumed the abstraction of the previous
            // pass; redo them once the predicates settle.
            if sat.precision().predicates(location).len() != predicates {
                continue;
            }
            let cube = SmtTerm::and_all(literals);
            debug!(location, level, cube = %cube, "PDR: blocking");
            frames.block_state(&cube, level, location)?;
            return Ok(BlockAttempt::Blocked);
        }
    }

    fn propagate(
        &mut self,
        frames: &mut DynamicFrameSet,
        sat: &mut PdrSat<S>,
    ) -> Result<usize, PdrError> {
        let mut blocks = HashMap::new();
        for location in frames.locations() {
            blocks.insert(location, self.analysis.predecessor_blocks(location)?);
        }
        let mut oracle = BlockOracle {
            sat,
            blocks: &blocks,
        };
        frames.propagate(&mut oracle)
    }
}

/// Run PDR on `analysis` with z3 solvers configured from `options`.
pub fn verify_with_z3<A: ProgramAnalysis>(
    analysis: &A,
    options: PdrOptions,
) -> Result<PdrResult, PdrError> {
    let solver_timeout_secs = options.solver_timeout_secs;
    PdrAlgorithm::new(
        analysis,
        move || Z3Solver::with_timeout_secs(solver_timeout_secs),
        options,
    )
    .verify()
}
