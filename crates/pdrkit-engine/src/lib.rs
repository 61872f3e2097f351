#![doc = include_str!("../README.md")]

//! Crate layout:
//! - [`frames`]: delta-encoded per-location frames.
//! - [`obligation`]: proof obligations and their queue.
//! - [`precision`]: per-location abstraction predicates.
//! - [`sat`]: the SMT queries of the algorithm.
//! - [`algorithm`]: the driver loop and its verdicts.

pub mod algorithm;
pub mod analysis;
pub mod error;
pub mod frames;
pub mod obligation;
pub mod options;
pub mod precision;
pub mod result;
pub mod sat;
pub mod shutdown;

pub use algorithm::{verify_with_z3, PdrAlgorithm};
pub use analysis::{AnalysisError, ProgramAnalysis};
pub use error::PdrError;
pub use frames::{DynamicFrameSet, FrameError, FrameSet, PropagationOracle};
pub use obligation::{ObligationOrder, ObligationPriority, ObligationQueue, ProofObligation};
pub use options::PdrOptions;
pub use precision::PredicatePrecisionManager;
pub use result::{Counterexample, CounterexampleStep, PdrResult, PdrStats};
pub use sat::{ConsecutionResult, PdrSat};
pub use shutdown::ShutdownNotifier;
