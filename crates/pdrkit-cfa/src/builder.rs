use indexmap::IndexMap;

use pdrkit_smt::sorts::SmtSort;
use pdrkit_smt::ssa::VERSION_SEPARATOR;

use crate::automaton::{Cfa, CfaError, Edge, Location, Statement};

/// Name-based builder for [`Cfa`]. Validation happens in [`CfaBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct CfaBuilder {
    variables: IndexMap<String, SmtSort>,
    locations: Vec<(String, bool, bool)>,
    entry: Option<String>,
    edges: Vec<(String, String, Vec<Statement>)>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_var(mut self, name: &str) -> Self {
        self.variables.insert(name.to_string(), SmtSort::Int);
        self
    }

    pub fn bool_var(mut self, name: &str) -> Self {
        self.variables.insert(name.to_string(), SmtSort::Bool);
        self
    }

    /// Declare a block-start location and make it the entry.
    pub fn entry(self, name: &str) -> Self {
        self.location(name).set_entry(name)
    }

    /// Make an already declared location the entry.
    pub fn set_entry(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    pub fn location(mut self, name: &str) -> Self {
        self.locations.push((name.to_string(), false, true));
        self
    }

    /// A location that is summarized into the blocks passing through it.
    pub fn internal(mut self, name: &str) -> Self {
        self.locations.push((name.to_string(), false, false));
        self
    }

    pub fn error(mut self, name: &str) -> Self {
        self.locations.push((name.to_string(), true, true));
        self
    }

    pub fn edge(mut self, from: &str, to: &str, statements: Vec<Statement>) -> Self {
        self.edges.push((from.to_string(), to.to_string(), statements));
        self
    }

    pub fn build(self) -> Result<Cfa, CfaError> {
        if let Some(bad) = self.variables.keys().find(|v| v.contains(VERSION_SEPARATOR)) {
            return Err(CfaError::InvalidVariableName(bad.clone()));
        }

        let mut locations: Vec<Location> = Vec::with_capacity(self.locations.len());
        for (name, is_error, is_block_start) in self.locations {
            if locations.iter().any(|l| l.name == name) {
                return Err(CfaError::DuplicateLocation(name));
            }
            locations.push(Location {
                id: locations.len(),
                name,
                is_error,
                is_block_start,
            });
        }
        let lookup = |name: &str| {
            locations
                .iter()
                .position(|l| l.name == name)
                .ok_or_else(|| CfaError::UnknownLocation(name.to_string()))
        };

        let entry_name = self.entry.ok_or(CfaError::MissingEntry)?;
        let entry = lookup(&entry_name)?;
        if !locations[entry].is_block_start {
            return Err(CfaError::NotBlockStart(entry_name));
        }
        if let Some(err) = locations.iter().find(|l| l.is_error && !l.is_block_start) {
            return Err(CfaError::NotBlockStart(err.name.clone()));
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for (from_name, to_name, statements) in self.edges {
            let from = lookup(&from_name)?;
            let to = lookup(&to_name)?;
            for stmt in &statements {
                let mut mentioned = Vec::new();
                match stmt {
                    Statement::Assume(cond) => mentioned.extend(cond.free_vars()),
                    Statement::Assign(var, expr) => {
                        mentioned.push(var.clone());
                        mentioned.extend(expr.free_vars());
                    }
                    Statement::Havoc(var) => mentioned.push(var.clone()),
                }
                if let Some(unknown) = mentioned
                    .into_iter()
                    .find(|v| !self.variables.contains_key(v))
                {
                    return Err(CfaError::UnknownVariable {
                        variable: unknown,
                        from: from_name,
                        to: to_name,
                    });
                }
            }
            edges.push(Edge {
                from,
                to,
                statements,
            });
        }

        Ok(Cfa {
            locations,
            edges,
            entry,
            variables: self.variables,
        })
    }
}
