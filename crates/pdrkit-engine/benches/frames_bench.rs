use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pdrkit_cfa::{CfaBuilder, Statement};
use pdrkit_engine::{
    verify_with_z3, DynamicFrameSet, FrameError, FrameSet, PdrOptions, PropagationOracle,
};
use pdrkit_smt::terms::SmtTerm;

const LOCATIONS: usize = 16;
const LEVELS: usize = 12;

/// `n` for a clause `not (x > n)`.
fn bound_of(clause: &SmtTerm) -> Option<i64> {
    let SmtTerm::Not(inner) = clause else {
        return None;
    };
    match inner.as_ref() {
        SmtTerm::Gt(_, rhs) => match **rhs {
            SmtTerm::IntLit(n) => Some(n),
            _ => None,
        },
        _ => None,
    }
}

/// Pushes clauses with an even bound; only equal clauses subsume.
struct EvenBounds;

impl PropagationOracle for EvenBounds {
    type Error = FrameError;

    fn can_propagate(
        &mut self,
        _frames: &dyn FrameSet,
        clause: &SmtTerm,
        _location: usize,
        _level: usize,
    ) -> Result<bool, FrameError> {
        Ok(bound_of(clause).is_some_and(|n| n % 2 == 0))
    }

    fn subsumes(&mut self, stronger: &SmtTerm, weaker: &SmtTerm) -> Result<bool, FrameError> {
        Ok(stronger == weaker)
    }
}

fn populated_frames() -> DynamicFrameSet {
    let mut frames = DynamicFrameSet::new(0);
    for _ in 0..LEVELS {
        frames.open_next_frame_set();
    }
    for level in 1..=LEVELS {
        for location in 1..LOCATIONS {
            let bound = (level * LOCATIONS + location) as i64;
            let state = SmtTerm::var("x").gt(SmtTerm::int(bound));
            frames.block_state(&state, level, location).unwrap();
        }
    }
    frames
}

fn bench_block_and_query(c: &mut Criterion) {
    c.bench_function("frames_block_and_query", |b| {
        b.iter(|| {
            let frames = populated_frames();
            black_box(frames.states_for_all_locations(1))
        })
    });
}

fn bench_propagate(c: &mut Criterion) {
    c.bench_function("frames_propagate", |b| {
        b.iter(|| {
            let mut frames = populated_frames();
            black_box(frames.propagate(&mut EvenBounds))
        })
    });
}

fn bench_fixpoint(c: &mut Criterion) {
    let frames = populated_frames();
    c.bench_function("frames_fixpoint_level", |b| {
        b.iter(|| black_box(&frames).fixpoint_level())
    });
}

fn bench_countdown(c: &mut Criterion) {
    let x = || SmtTerm::var("x");
    let cfa = CfaBuilder::new()
        .int_var("x")
        .entry("l0")
        .location("head")
        .location("body")
        .error("err")
        .edge("l0", "head", vec![Statement::Assume(x().ge(SmtTerm::int(0)))])
        .edge("head", "body", vec![Statement::Assume(x().gt(SmtTerm::int(0)))])
        .edge("body", "err", vec![Statement::Assume(x().lt(SmtTerm::int(0)))])
        .edge(
            "body",
            "head",
            vec![Statement::Assign("x".into(), x().sub(SmtTerm::int(1)))],
        )
        .build()
        .unwrap();
    c.bench_function("pdr_countdown_z3", |b| {
        b.iter(|| verify_with_z3(black_box(&cfa), PdrOptions::default()))
    });
}

criterion_group!(
    benches,
    bench_block_and_query,
    bench_propagate,
    bench_fixpoint,
    bench_countdown
);
criterion_main!(benches);
