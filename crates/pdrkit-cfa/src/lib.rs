#![doc = include_str!("../README.md")]

//! Program model consumed by the PDR engine.

pub mod automaton;
pub mod block;
pub mod builder;

pub use automaton::{Cfa, CfaError, Edge, Location, LocationId, Statement};
pub use block::Block;
pub use builder::CfaBuilder;
