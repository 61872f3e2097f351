//! Blocks: transitions between block-start locations.
//!
//! A block summarizes one path `from -> i1 -> .. -> ik -> to` whose inner
//! locations are all internal. Its formula is the SSA encoding of the
//! statements along the path. Before the block every variable is at version
//! 0 (`unprimed`); after it, each variable is at the last version the path
//! assigned (`primed`). Variables the path never writes keep version 0 on
//! both sides.

use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

use pdrkit_smt::sorts::SmtSort;
use pdrkit_smt::ssa::SsaMap;
use pdrkit_smt::terms::SmtTerm;

use crate::automaton::{Cfa, CfaError, Edge, LocationId, Statement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub from: LocationId,
    pub to: LocationId,
    pub formula: SmtTerm,
    pub unprimed: SsaMap,
    pub primed: SsaMap,
    /// Every SSA version the formula, `unprimed` and `primed` can mention.
    pub declarations: Vec<(String, SmtSort)>,
}

impl Block {
    /// Encode the statements of `path`, in order, into one block.
    pub fn encode(
        from: LocationId,
        to: LocationId,
        path: &[&Edge],
        variables: &IndexMap<String, SmtSort>,
    ) -> Block {
        let unprimed = SsaMap::initial(variables.keys().map(String::as_str));
        let mut ssa = unprimed.clone();
        let mut conjuncts = Vec::new();
        for stmt in path.iter().flat_map(|edge| edge.statements.iter()) {
            match stmt {
                Statement::Assume(cond) => conjuncts.push(ssa.instantiate(cond)),
                Statement::Assign(var, expr) => {
                    let rhs = ssa.instantiate(expr);
                    ssa.fresh(var);
                    conjuncts.push(SmtTerm::var(ssa.current_name(var)).eq(rhs));
                }
                Statement::Havoc(var) => {
                    ssa.fresh(var);
                }
            }
        }
        let declarations = ssa.declarations(variables);
        Block {
            from,
            to,
            formula: SmtTerm::and_all(conjuncts),
            unprimed,
            primed: ssa,
            declarations,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} -> L{}: {}", self.from, self.to, self.formula)
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Backward,
    Forward,
}

impl Cfa {
    /// Blocks ending at `target`, one per path from a block start through
    /// internal locations.
    pub fn blocks_into(&self, target: LocationId) -> Result<Vec<Block>, CfaError> {
        self.summarize(target, Direction::Backward)
    }

    /// Blocks starting at `source`, one per path through internal locations
    /// to a block start.
    pub fn blocks_from(&self, source: LocationId) -> Result<Vec<Block>, CfaError> {
        self.summarize(source, Direction::Forward)
    }

    fn summarize(&self, anchor: LocationId, dir: Direction) -> Result<Vec<Block>, CfaError> {
        if self.location(anchor).is_none() {
            return Err(CfaError::UnknownLocation(format!("L{anchor}")));
        }
        let mut blocks = Vec::new();
        let mut path: Vec<&Edge> = Vec::new();
        let mut visiting: Vec<LocationId> = Vec::new();
        self.walk(anchor, anchor, dir, &mut path, &mut visiting, &mut blocks)?;
        trace!(
            location = %self.name_of(anchor),
            blocks = blocks.len(),
            "summarized blocks"
        );
        Ok(blocks)
    }

    fn walk<'a>(
        &'a self,
        anchor: LocationId,
        current: LocationId,
        dir: Direction,
        path: &mut Vec<&'a Edge>,
        visiting: &mut Vec<LocationId>,
        blocks: &mut Vec<Block>,
    ) -> Result<(), CfaError> {
        let edges: Vec<&Edge> = match dir {
            Direction::Backward => self.incoming(current).collect(),
            Direction::Forward => self.outgoing(current).collect(),
        };
        for edge in edges {
            let next = match dir {
                Direction::Backward => edge.from,
                Direction::Forward => edge.to,
            };
            path.push(edge);
            if self.is_block_start(next) {
                let mut ordered = path.clone();
                let (from, to) = match dir {
                    Direction::Backward => {
                        ordered.reverse();
                        (next, anchor)
                    }
                    Direction::Forward => (anchor, next),
                };
                blocks.push(Block::encode(from, to, &ordered, &self.variables));
            } else {
                if visiting.contains(&next) {
                    return Err(CfaError::InternalCycle(self.name_of(next).to_string()));
                }
                visiting.push(next);
                self.walk(anchor, next, dir, path, visiting, blocks)?;
                visiting.pop();
            }
            path.pop();
        }
        Ok(())
    }
}
