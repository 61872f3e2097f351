use std::collections::BTreeSet;
use std::fmt;

use crate::backends::smtlib_printer::to_smtlib;

/// Abstract SMT term representation, solver-agnostic.
///
/// Terms are quantifier-free. Program-level formulas (frame clauses,
/// predicates, obligation states) mention plain variable names such as `x`;
/// transition formulas mention SSA-versioned names such as `x@1`
/// (see [`crate::ssa::SsaMap`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(self, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(self), Box::new(then), Box::new(els))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, SmtTerm::BoolLit(false))
    }

    /// Logical negation that folds literals and double negation.
    ///
    /// `negate(not p)` is `p`, so blocking the negation of a clause yields
    /// the original cube back.
    pub fn negate(&self) -> SmtTerm {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Not(inner) => (**inner).clone(),
            other => other.clone().not(),
        }
    }

    /// Conjunction of `terms`, flattening nested `And`s and folding literals.
    ///
    /// The empty conjunction is `true`; any `false` conjunct makes the whole
    /// conjunction `false`.
    pub fn and_all(terms: impl IntoIterator<Item = SmtTerm>) -> SmtTerm {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                SmtTerm::BoolLit(true) => {}
                SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                SmtTerm::And(inner) => match SmtTerm::and_all(inner) {
                    SmtTerm::BoolLit(true) => {}
                    SmtTerm::BoolLit(false) => return SmtTerm::BoolLit(false),
                    SmtTerm::And(parts) => flat.extend(parts),
                    single => flat.push(single),
                },
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => SmtTerm::BoolLit(true),
            1 => flat.pop().unwrap_or(SmtTerm::BoolLit(true)),
            _ => SmtTerm::And(flat),
        }
    }

    /// Top-level conjuncts, looking through nested `And` nodes.
    pub fn conjuncts(&self) -> Vec<&SmtTerm> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a SmtTerm>) {
        match self {
            SmtTerm::And(terms) => {
                for term in terms {
                    term.collect_conjuncts(out);
                }
            }
            SmtTerm::BoolLit(true) => {}
            other => out.push(other),
        }
    }

    /// Names of all variables occurring in the term.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            SmtTerm::Var(name) => {
                vars.insert(name.clone());
            }
            SmtTerm::IntLit(_) | SmtTerm::BoolLit(_) => {}
            SmtTerm::Add(lhs, rhs)
            | SmtTerm::Sub(lhs, rhs)
            | SmtTerm::Mul(lhs, rhs)
            | SmtTerm::Eq(lhs, rhs)
            | SmtTerm::Lt(lhs, rhs)
            | SmtTerm::Le(lhs, rhs)
            | SmtTerm::Gt(lhs, rhs)
            | SmtTerm::Ge(lhs, rhs)
            | SmtTerm::Implies(lhs, rhs) => {
                lhs.collect_vars(vars);
                rhs.collect_vars(vars);
            }
            SmtTerm::And(terms) | SmtTerm::Or(terms) => {
                for term in terms {
                    term.collect_vars(vars);
                }
            }
            SmtTerm::Not(inner) => inner.collect_vars(vars),
            SmtTerm::Ite(cond, then, els) => {
                cond.collect_vars(vars);
                then.collect_vars(vars);
                els.collect_vars(vars);
            }
        }
    }

    /// Rebuild the term, replacing every variable for which `f` returns
    /// `Some(replacement)`.
    pub fn map_vars<F>(&self, f: &mut F) -> SmtTerm
    where
        F: FnMut(&str) -> Option<SmtTerm>,
    {
        let bin = |lhs: &SmtTerm, rhs: &SmtTerm, f: &mut F| {
            (Box::new(lhs.map_vars(f)), Box::new(rhs.map_vars(f)))
        };
        match self {
            SmtTerm::Var(name) => f(name).unwrap_or_else(|| SmtTerm::Var(name.clone())),
            SmtTerm::IntLit(n) => SmtTerm::IntLit(*n),
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(*b),
            SmtTerm::Add(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Add(l, r)
            }
            SmtTerm::Sub(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Sub(l, r)
            }
            SmtTerm::Mul(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Mul(l, r)
            }
            SmtTerm::Eq(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Eq(l, r)
            }
            SmtTerm::Lt(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Lt(l, r)
            }
            SmtTerm::Le(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Le(l, r)
            }
            SmtTerm::Gt(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Gt(l, r)
            }
            SmtTerm::Ge(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Ge(l, r)
            }
            SmtTerm::Implies(lhs, rhs) => {
                let (l, r) = bin(lhs, rhs, f);
                SmtTerm::Implies(l, r)
            }
            SmtTerm::And(terms) => SmtTerm::And(terms.iter().map(|t| t.map_vars(f)).collect()),
            SmtTerm::Or(terms) => SmtTerm::Or(terms.iter().map(|t| t.map_vars(f)).collect()),
            SmtTerm::Not(inner) => SmtTerm::Not(Box::new(inner.map_vars(f))),
            SmtTerm::Ite(cond, then, els) => SmtTerm::Ite(
                Box::new(cond.map_vars(f)),
                Box::new(then.map_vars(f)),
                Box::new(els.map_vars(f)),
            ),
        }
    }

    /// Rename variables through `f`; names mapped to `None` are kept.
    pub fn rename_vars<F>(&self, mut f: F) -> SmtTerm
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.map_vars(&mut |name| f(name).map(SmtTerm::Var))
    }

    /// Replace every occurrence of variable `var` with `replacement`.
    pub fn substitute(&self, var: &str, replacement: &SmtTerm) -> SmtTerm {
        self.map_vars(&mut |name| (name == var).then(|| replacement.clone()))
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_smtlib(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> SmtTerm {
        SmtTerm::var("x")
    }

    #[test]
    fn negate_folds_double_negation_and_literals() {
        let atom = x().gt(SmtTerm::int(0));
        assert_eq!(atom.clone().not().negate(), atom);
        assert_eq!(SmtTerm::bool(true).negate(), SmtTerm::bool(false));
        assert_eq!(atom.negate(), SmtTerm::Not(Box::new(atom.clone())));
    }

    #[test]
    fn and_all_flattens_and_folds() {
        let a = x().gt(SmtTerm::int(0));
        let b = x().lt(SmtTerm::int(5));
        let nested = SmtTerm::and(vec![a.clone(), SmtTerm::and(vec![b.clone()])]);
        assert_eq!(
            SmtTerm::and_all(vec![nested, SmtTerm::bool(true)]),
            SmtTerm::and(vec![a.clone(), b])
        );
        assert_eq!(SmtTerm::and_all(Vec::new()), SmtTerm::bool(true));
        assert_eq!(SmtTerm::and_all(vec![a.clone()]), a);
        assert!(SmtTerm::and_all(vec![a, SmtTerm::bool(false)]).is_false());
    }

    #[test]
    fn free_vars_and_rename() {
        let term = SmtTerm::and(vec![
            SmtTerm::var("x@0").gt(SmtTerm::int(0)),
            SmtTerm::var("y@1").eq(SmtTerm::var("x@0").add(SmtTerm::int(1))),
        ]);
        let vars: Vec<_> = term.free_vars().into_iter().collect();
        assert_eq!(vars, vec!["x@0".to_string(), "y@1".to_string()]);

        let renamed = term.rename_vars(|name| name.split('@').next().map(str::to_string));
        let vars: Vec<_> = renamed.free_vars().into_iter().collect();
        assert_eq!(vars, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn substitute_replaces_only_named_variable() {
        let term = x().add(SmtTerm::var("y")).ge(SmtTerm::int(2));
        let replaced = term.substitute("x", &SmtTerm::int(7));
        assert_eq!(
            replaced,
            SmtTerm::int(7).add(SmtTerm::var("y")).ge(SmtTerm::int(2))
        );
    }

    #[test]
    fn conjuncts_look_through_nesting() {
        let a = x().gt(SmtTerm::int(0));
        let b = x().lt(SmtTerm::int(5));
        let term = SmtTerm::and(vec![a.clone(), SmtTerm::and(vec![SmtTerm::bool(true), b.clone()])]);
        assert_eq!(term.conjuncts(), vec![&a, &b]);
    }
}
