//! SSA versioning contexts.
//!
//! A transition formula mentions each program variable under one or more
//! versions, written `x@0`, `x@1`, ... An [`SsaMap`] records the version in
//! effect at one point of a block: instantiating a program-level formula
//! against it renames `x` to `x@i`, and uninstantiating strips the version
//! suffix again. Program variable names must not contain the separator.

use indexmap::IndexMap;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

pub const VERSION_SEPARATOR: char = '@';

/// Current SSA version of every variable touched so far.
///
/// Variables never touched are at version 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsaMap {
    indices: IndexMap<String, u32>,
}

impl SsaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with every listed variable at version 0.
    pub fn initial<'a>(variables: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            indices: variables.into_iter().map(|v| (v.to_string(), 0)).collect(),
        }
    }

    pub fn index(&self, var: &str) -> u32 {
        self.indices.get(var).copied().unwrap_or(0)
    }

    /// Bump `var` to a fresh version and return it.
    pub fn fresh(&mut self, var: &str) -> u32 {
        let slot = self.indices.entry(var.to_string()).or_insert(0);
        *slot += 1;
        *slot
    }

    pub fn current_name(&self, var: &str) -> String {
        versioned_name(var, self.index(var))
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.indices.keys().map(String::as_str)
    }

    /// Rename every unversioned variable `x` in `term` to its current
    /// version. Already versioned names are left alone.
    pub fn instantiate(&self, term: &SmtTerm) -> SmtTerm {
        term.rename_vars(|name| {
            if split_versioned(name).is_some() {
                None
            } else {
                Some(self.current_name(name))
            }
        })
    }

    /// Strip version suffixes, mapping `x@i` back to `x`.
    pub fn uninstantiate(term: &SmtTerm) -> SmtTerm {
        term.rename_vars(|name| split_versioned(name).map(|(base, _)| base.to_string()))
    }

    /// Declarations for every version `0..=index(v)` of every variable in
    /// `sorts`.
    pub fn declarations(&self, sorts: &IndexMap<String, SmtSort>) -> Vec<(String, SmtSort)> {
        let mut out = Vec::new();
        for (var, sort) in sorts {
            for version in 0..=self.index(var) {
                out.push((versioned_name(var, version), sort.clone()));
            }
        }
        out
    }
}

pub fn versioned_name(var: &str, version: u32) -> String {
    format!("{var}{VERSION_SEPARATOR}{version}")
}

/// Split `x@3` into `("x", 3)`. Returns `None` for plain names.
pub fn split_versioned(name: &str) -> Option<(&str, u32)> {
    let (base, version) = name.rsplit_once(VERSION_SEPARATOR)?;
    let version = version.parse().ok()?;
    Some((base, version))
}
