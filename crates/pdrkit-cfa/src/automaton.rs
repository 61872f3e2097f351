use indexmap::IndexMap;
use std::fmt;
use thiserror::Error;

use pdrkit_smt::sorts::SmtSort;
use pdrkit_smt::terms::SmtTerm;

/// A unique identifier for a location in the automaton.
pub type LocationId = usize;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CfaError {
    #[error("unknown location: {0}")]
    UnknownLocation(String),
    #[error("duplicate location: {0}")]
    DuplicateLocation(String),
    #[error("unknown variable `{variable}` on edge {from} -> {to}")]
    UnknownVariable {
        variable: String,
        from: String,
        to: String,
    },
    #[error("variable name `{0}` may not contain `@`")]
    InvalidVariableName(String),
    #[error("no entry location declared")]
    MissingEntry,
    #[error("location {0} must be a block start")]
    NotBlockStart(String),
    #[error("cycle through internal locations at {0}")]
    InternalCycle(String),
}

/// A node of the control-flow automaton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub is_error: bool,
    /// Block starts delimit the transitions the engine reasons about;
    /// internal locations are summarized away.
    pub is_block_start: bool,
}

/// A single statement on an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Continue only if the condition holds.
    Assume(SmtTerm),
    /// `var := expr`
    Assign(String, SmtTerm),
    /// `var := *`
    Havoc(String),
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assume(cond) => write!(f, "assume {cond}"),
            Statement::Assign(var, expr) => write!(f, "{var} := {expr}"),
            Statement::Havoc(var) => write!(f, "{var} := *"),
        }
    }
}

/// A CFA edge; statements execute in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: LocationId,
    pub to: LocationId,
    pub statements: Vec<Statement>,
}

/// Control-flow automaton over integer and Boolean program variables.
#[derive(Debug, Clone)]
pub struct Cfa {
    pub(crate) locations: Vec<Location>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) entry: LocationId,
    pub(crate) variables: IndexMap<String, SmtSort>,
}

impl Cfa {
    pub fn entry(&self) -> LocationId {
        self.entry
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.get(id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn variables(&self) -> &IndexMap<String, SmtSort> {
        &self.variables
    }

    pub fn find_location_by_name(&self, name: &str) -> Option<LocationId> {
        self.locations.iter().position(|l| l.name == name)
    }

    pub fn error_locations(&self) -> Vec<LocationId> {
        self.locations
            .iter()
            .filter(|l| l.is_error)
            .map(|l| l.id)
            .collect()
    }

    pub fn is_block_start(&self, id: LocationId) -> bool {
        self.locations.get(id).is_some_and(|l| l.is_block_start)
    }

    pub fn outgoing(&self, id: LocationId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.from == id)
    }

    pub fn incoming(&self, id: LocationId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.to == id)
    }

    pub fn successors(&self, id: LocationId) -> Vec<LocationId> {
        self.outgoing(id).map(|e| e.to).collect()
    }

    pub fn predecessors(&self, id: LocationId) -> Vec<LocationId> {
        self.incoming(id).map(|e| e.from).collect()
    }

    pub(crate) fn name_of(&self, id: LocationId) -> &str {
        self.locations
            .get(id)
            .map(|l| l.name.as_str())
            .unwrap_or("<unknown>")
    }
}

impl fmt::Display for Cfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CFA:")?;
        writeln!(f, "  Variables:")?;
        for (name, sort) in &self.variables {
            writeln!(f, "    {name}: {sort}")?;
        }
        writeln!(f, "  Locations:")?;
        for loc in &self.locations {
            let mut tags = Vec::new();
            if loc.id == self.entry {
                tags.push("entry");
            }
            if loc.is_error {
                tags.push("error");
            }
            if !loc.is_block_start {
                tags.push("internal");
            }
            if tags.is_empty() {
                writeln!(f, "    L{}: {}", loc.id, loc.name)?;
            } else {
                writeln!(f, "    L{}: {} ({})", loc.id, loc.name, tags.join(", "))?;
            }
        }
        writeln!(f, "  Edges:")?;
        for edge in &self.edges {
            writeln!(f, "    L{} -> L{}", edge.from, edge.to)?;
            for stmt in &edge.statements {
                writeln!(f, "      {stmt}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CfaBuilder;

    fn diamond() -> Cfa {
        CfaBuilder::new()
            .int_var("x")
            .entry("l0")
            .location("l1")
            .location("l2")
            .error("err")
            .edge("l0", "l1", vec![Statement::Assume(SmtTerm::var("x").gt(SmtTerm::int(0)))])
            .edge("l0", "l2", vec![Statement::Havoc("x".into())])
            .edge("l1", "err", Vec::new())
            .edge("l2", "err", Vec::new())
            .build()
            .expect("valid cfa")
    }

    #[test]
    fn successor_and_predecessor_queries() {
        let cfa = diamond();
        let l0 = cfa.find_location_by_name("l0").expect("l0");
        let err = cfa.find_location_by_name("err").expect("err");
        assert_eq!(cfa.entry(), l0);
        assert_eq!(cfa.successors(l0).len(), 2);
        assert_eq!(cfa.predecessors(err).len(), 2);
        assert_eq!(cfa.error_locations(), vec![err]);
        assert!(cfa.is_block_start(err));
        assert!(!cfa.is_block_start(99));
    }

    #[test]
    fn display_lists_tags_and_statements() {
        let rendered = diamond().to_string();
        assert!(rendered.contains("l0 (entry)"));
        assert!(rendered.contains("err (error)"));
        assert!(rendered.contains("x := *"));
        assert!(rendered.contains("assume (> x 0)"));
    }
}
