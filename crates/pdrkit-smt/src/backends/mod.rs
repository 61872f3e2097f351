//! Solver backends and SMT-LIB rendering.

pub mod smtlib_printer;
pub mod z3_backend;
