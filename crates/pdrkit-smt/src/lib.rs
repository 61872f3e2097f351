#![doc = include_str!("../README.md")]

//! SMT terms, solver sessions, and the formula-level procedures used by the
//! PDR engine: SSA instantiation, predicate abstraction and interpolation.

pub mod abstraction;
pub mod backends;
pub mod interpolation;
pub mod solver;
pub mod sorts;
pub mod ssa;
pub mod terms;
