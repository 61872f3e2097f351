use std::collections::HashSet;

use pdrkit_cfa::{Cfa, CfaBuilder, Statement};
use pdrkit_engine::{
    verify_with_z3, FrameSet, PdrAlgorithm, PdrError, PdrOptions, PdrResult, PdrSat,
    ShutdownNotifier,
};
use pdrkit_smt::backends::z3_backend::Z3Solver;
use pdrkit_smt::terms::SmtTerm;

fn x() -> SmtTerm {
    SmtTerm::var("x")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `assume x >= 0; while (x > 0) { if (x < 0) error; x = x - 1; }`
fn countdown() -> Cfa {
    CfaBuilder::new()
        .int_var("x")
        .entry("l0")
        .location("head")
        .location("body")
        .location("exit")
        .error("err")
        .edge("l0", "head", vec![Statement::Assume(x().ge(SmtTerm::int(0)))])
        .edge("head", "body", vec![Statement::Assume(x().gt(SmtTerm::int(0)))])
        .edge("body", "err", vec![Statement::Assume(x().lt(SmtTerm::int(0)))])
        .edge(
            "body",
            "head",
            vec![Statement::Assign("x".into(), x().sub(SmtTerm::int(1)))],
        )
        .edge(
            "head",
            "exit",
            vec![Statement::Assume(x().gt(SmtTerm::int(0)).not())],
        )
        .build()
        .expect("valid cfa")
}

/// `x := 0; x := x + 1; if (x > 0) error;`
fn straight_line_bug() -> Cfa {
    CfaBuilder::new()
        .int_var("x")
        .entry("l0")
        .location("l1")
        .location("l2")
        .error("err")
        .edge("l0", "l1", vec![Statement::Assign("x".into(), SmtTerm::int(0))])
        .edge(
            "l1",
            "l2",
            vec![Statement::Assign("x".into(), x().add(SmtTerm::int(1)))],
        )
        .edge("l2", "err", vec![Statement::Assume(x().gt(SmtTerm::int(0)))])
        .build()
        .expect("valid cfa")
}

#[test]
fn entry_error_location_is_unsafe_without_frames() {
    init_tracing();
    let cfa = CfaBuilder::new()
        .int_var("x")
        .error("err")
        .set_entry("err")
        .build()
        .expect("valid cfa");
    let mut pdr = PdrAlgorithm::new(&cfa, Z3Solver::new, PdrOptions::default());
    let result = pdr.run().expect("run");

    let cex = result.counterexample().expect("unsafe");
    assert_eq!(cex.locations(), vec![cfa.entry()]);
    assert!(pdr.frames().is_none());
    assert_eq!(pdr.stats().solver_queries, 0);
}

#[test]
fn direct_edge_to_error_is_unsafe_without_frames() {
    init_tracing();
    let cfa = CfaBuilder::new()
        .int_var("x")
        .entry("l0")
        .error("err")
        .edge("l0", "err", vec![Statement::Assume(SmtTerm::bool(true))])
        .build()
        .expect("valid cfa");
    let mut pdr = PdrAlgorithm::new(&cfa, Z3Solver::new, PdrOptions::default());
    let result = pdr.run().expect("run");

    let err = cfa.find_location_by_name("err").expect("err");
    let cex = result.counterexample().expect("unsafe");
    assert_eq!(cex.locations(), vec![cfa.entry(), err]);
    assert!(cex.steps[0].state.is_some());
    assert!(pdr.frames().is_none());
}

#[test]
fn countdown_loop_is_safe_with_two_equal_frames() {
    init_tracing();
    let cfa = countdown();
    let mut pdr = PdrAlgorithm::new(&cfa, Z3Solver::new, PdrOptions::default());
    let result = pdr.run().expect("run");

    let PdrResult::Safe { level } = result else {
        panic!("expected safe, got {result}");
    };
    let frames = pdr.frames().expect("frames");
    assert!(level >= 1 && level < frames.max_level());
    let at = |lvl| {
        frames
            .states_for_all_locations(lvl)
            .expect("valid level")
            .into_iter()
            .map(|(loc, clauses)| (loc, clauses.into_iter().collect::<HashSet<_>>()))
            .collect::<Vec<_>>()
    };
    assert_eq!(at(level), at(level + 1));
    assert!(pdr.stats().refinements >= 1);
}

#[test]
fn countdown_loop_is_safe_with_deepest_first_ordering() {
    let options = PdrOptions::from_json(r#"{ "obligation_priority": "frame_level_deepest_first" }"#)
        .expect("options");
    let result = verify_with_z3(&countdown(), options).expect("verify");
    assert!(result.is_safe(), "{result}");
}

#[test]
fn countdown_loop_is_safe_without_generalization() {
    let options = PdrOptions {
        generalize: false,
        ..PdrOptions::default()
    };
    let result = verify_with_z3(&countdown(), options).expect("verify");
    assert!(result.is_safe(), "{result}");
}

#[test]
fn cti_query_is_empty_when_top_frame_blocks_the_guard() {
    let cfa = countdown();
    let body = cfa.find_location_by_name("body").expect("body");
    let err = cfa.find_location_by_name("err").expect("err");
    let to_err = cfa
        .blocks_into(err)
        .expect("blocks")
        .into_iter()
        .next()
        .expect("one block");

    let mut frames = pdrkit_engine::DynamicFrameSet::new(cfa.entry());
    frames.open_next_frame_set();
    let mut sat = PdrSat::new(Z3Solver::new, cfa.variables(), &PdrOptions::default())
        .expect("solvers");
    assert!(sat.get_cti(&frames, &to_err).expect("query").is_some());

    frames
        .block_state(&x().lt(SmtTerm::int(0)), 1, body)
        .expect("block");
    assert_eq!(sat.get_cti(&frames, &to_err).expect("query"), None);
}

#[test]
fn multi_block_path_yields_ordered_counterexample() {
    init_tracing();
    let cfa = straight_line_bug();
    let mut pdr = PdrAlgorithm::new(&cfa, Z3Solver::new, PdrOptions::default());
    let result = pdr.run().expect("run");

    let cex = result.counterexample().expect("unsafe");
    let names: Vec<&str> = cex.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["l0", "l1", "l2", "err"]);
    assert_eq!(cex.steps[1].state, Some(x().eq(SmtTerm::int(0))));
    assert_eq!(cex.steps[2].state, Some(x().eq(SmtTerm::int(1))));
    assert!(pdr.stats().obligations >= 3);
    assert!(result.to_string().starts_with("RESULT: UNSAFE"));
}

#[test]
fn assignment_makes_guard_unreachable() {
    let cfa = CfaBuilder::new()
        .int_var("x")
        .entry("l0")
        .location("l1")
        .error("err")
        .edge("l0", "l1", vec![Statement::Assign("x".into(), SmtTerm::int(0))])
        .edge("l1", "err", vec![Statement::Assume(x().lt(SmtTerm::int(0)))])
        .build()
        .expect("valid cfa");
    let result = verify_with_z3(&cfa, PdrOptions::default()).expect("verify");
    assert_eq!(result, PdrResult::Safe { level: 1 });
}

#[test]
fn cancelled_run_is_unknown_never_safe() {
    let cfa = countdown();
    let shutdown = ShutdownNotifier::new();
    let mut pdr = PdrAlgorithm::new(&cfa, Z3Solver::new, PdrOptions::default())
        .with_shutdown(shutdown.clone());
    pdr.shutdown_notifier().request_shutdown("stopped by caller");

    assert!(matches!(pdr.run(), Err(PdrError::Cancelled(_))));
    let result = pdr.verify().expect("recoverable");
    assert!(
        matches!(&result, PdrResult::Unknown { reason } if reason.contains("stopped by caller")),
        "{result}"
    );
    assert!(shutdown.should_shutdown());
}

#[test]
fn frame_bound_reports_unknown() {
    let options = PdrOptions {
        max_frames: 1,
        ..PdrOptions::default()
    };
    let result = verify_with_z3(&straight_line_bug(), options).expect("verify");
    assert_eq!(result.verdict_class(), "unknown");
}
