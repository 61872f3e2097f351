use proptest::prelude::*;

use pdrkit_cfa::{CfaBuilder, Statement};
use pdrkit_smt::backends::z3_backend::Z3Solver;
use pdrkit_smt::solver::{declare_all, SatResult, SmtSolver};
use pdrkit_smt::terms::SmtTerm;

#[derive(Debug, Clone)]
enum Step {
    Add(i64),
    CopyToY,
    Havoc,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (-3i64..4).prop_map(Step::Add),
        1 => Just(Step::CopyToY),
        1 => Just(Step::Havoc),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A path through internal locations computes what executing its
    /// statements one by one computes.
    #[test]
    fn summarized_block_matches_stepwise_execution(
        steps in prop::collection::vec(step_strategy(), 1..6),
        start in -10i64..10,
    ) {
        let mut builder = CfaBuilder::new().int_var("x").int_var("y").entry("l0");
        for i in 0..steps.len().saturating_sub(1) {
            builder = builder.internal(&format!("m{i}"));
        }
        builder = builder.location("end");

        let mut x = Some(start);
        let mut y = Some(0i64);
        for (i, step) in steps.iter().enumerate() {
            let from = if i == 0 { "l0".to_string() } else { format!("m{}", i - 1) };
            let to = if i + 1 == steps.len() { "end".to_string() } else { format!("m{i}") };
            let stmt = match step {
                Step::Add(k) => {
                    x = x.map(|v| v + k);
                    Statement::Assign("x".into(), SmtTerm::var("x").add(SmtTerm::int(*k)))
                }
                Step::CopyToY => {
                    y = x;
                    Statement::Assign("y".into(), SmtTerm::var("x"))
                }
                Step::Havoc => {
                    x = None;
                    Statement::Havoc("x".into())
                }
            };
            builder = builder.edge(&from, &to, vec![stmt]);
        }
        let cfa = builder.build().unwrap();
        let end = cfa.find_location_by_name("end").unwrap();
        let blocks = cfa.blocks_into(end).unwrap();
        prop_assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        prop_assert_eq!(block.from, cfa.entry());

        let mut solver = Z3Solver::new();
        declare_all(&mut solver, &block.declarations).unwrap();
        solver.assert(&block.formula).unwrap();
        solver.assert(&SmtTerm::var(block.unprimed.current_name("x")).eq(SmtTerm::int(start))).unwrap();
        solver.assert(&SmtTerm::var(block.unprimed.current_name("y")).eq(SmtTerm::int(0))).unwrap();

        // Deterministic outcomes are forced; a havocked x is unconstrained.
        for (var, expected) in [("x", x), ("y", y)] {
            let name = block.primed.current_name(var);
            if let Some(value) = expected {
                solver.push().unwrap();
                solver.assert(&SmtTerm::var(name).eq(SmtTerm::int(value)).not()).unwrap();
                prop_assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
                solver.pop().unwrap();
            }
        }
        prop_assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
    }
}
