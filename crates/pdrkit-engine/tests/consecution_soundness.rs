use proptest::prelude::*;

use pdrkit_cfa::{Block, Cfa, CfaBuilder, Statement};
use pdrkit_engine::{ConsecutionResult, DynamicFrameSet, FrameSet, PdrOptions, PdrSat};
use pdrkit_smt::backends::z3_backend::Z3Solver;
use pdrkit_smt::solver::{check_conjunction, declare_all, SatResult};
use pdrkit_smt::terms::SmtTerm;

const VARS: [&str; 3] = ["a", "b", "c"];

fn var_strategy() -> impl Strategy<Value = SmtTerm> {
    (0..VARS.len()).prop_map(|i| SmtTerm::var(VARS[i]))
}

fn literal_strategy() -> impl Strategy<Value = SmtTerm> {
    (var_strategy(), any::<bool>()).prop_map(|(v, positive)| if positive { v } else { v.not() })
}

fn expr_strategy() -> impl Strategy<Value = SmtTerm> {
    prop_oneof![
        any::<bool>().prop_map(SmtTerm::bool),
        literal_strategy(),
        (literal_strategy(), literal_strategy()).prop_map(|(l, r)| SmtTerm::and(vec![l, r])),
        (literal_strategy(), literal_strategy()).prop_map(|(l, r)| SmtTerm::or(vec![l, r])),
    ]
}

fn cube_strategy() -> impl Strategy<Value = SmtTerm> {
    prop::collection::vec(literal_strategy(), 1..4).prop_map(SmtTerm::and_all)
}

/// Two-location system `pre -> post` whose edge assumes `guard` and then
/// assigns each variable in turn.
fn system(guard: SmtTerm, updates: Vec<SmtTerm>) -> (Cfa, Block) {
    let mut statements = vec![Statement::Assume(guard)];
    for (var, update) in VARS.iter().zip(updates) {
        statements.push(Statement::Assign((*var).to_string(), update));
    }
    let mut builder = CfaBuilder::new();
    for var in VARS {
        builder = builder.bool_var(var);
    }
    let cfa = builder
        .entry("l0")
        .location("pre")
        .location("post")
        .edge("l0", "pre", Vec::new())
        .edge("pre", "post", statements)
        .build()
        .expect("valid cfa");
    let post = cfa.find_location_by_name("post").expect("post");
    let block = cfa
        .blocks_into(post)
        .expect("blocks")
        .into_iter()
        .next()
        .expect("one block");
    (cfa, block)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// A successful consecution returns a cube that covers the state and
    /// has no predecessor in the frame; a failure returns a real
    /// predecessor.
    #[test]
    fn consecution_answers_are_sound(
        guard in expr_strategy(),
        updates in prop::collection::vec(expr_strategy(), VARS.len()),
        blocked in prop::collection::vec(cube_strategy(), 0..3),
        state in cube_strategy(),
    ) {
        let (cfa, block) = system(guard, updates);
        let pre = block.from;

        let mut frames = DynamicFrameSet::new(cfa.entry());
        frames.open_next_frame_set();
        frames.open_next_frame_set();
        for cube in &blocked {
            frames.block_state(cube, 1, pre).expect("block");
        }
        let frame = frames.constraints(pre, 1).expect("valid level");

        let mut sat = PdrSat::new(Z3Solver::new, cfa.variables(), &PdrOptions::default())
            .expect("solvers");
        let outcome = sat.consecution(&frames, 1, &block, &state).expect("consecution");

        let mut checker = Z3Solver::new();
        declare_all(&mut checker, &block.declarations).expect("declare");
        let mut query: Vec<SmtTerm> = frame
            .iter()
            .map(|clause| block.unprimed.instantiate(clause))
            .collect();
        query.push(block.formula.clone());

        match outcome {
            ConsecutionResult::Success(literals) => {
                let cube = SmtTerm::and_all(literals);
                query.push(block.primed.instantiate(&cube));
                prop_assert_eq!(check_conjunction(&mut checker, &query).expect("check"), SatResult::Unsat);
                prop_assert!(sat.subsumes(&state, &cube).expect("subsumption"));
            }
            ConsecutionResult::Failure(predecessor) => {
                query.push(block.unprimed.instantiate(&predecessor));
                query.push(block.primed.instantiate(&state));
                prop_assert_eq!(check_conjunction(&mut checker, &query).expect("check"), SatResult::Sat);
            }
        }
    }
}
