use std::fmt;

/// Sorts of program variables and their SSA versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    Int,
}

impl SmtSort {
    /// Name of the sort in SMT-LIB2 declarations.
    pub fn smtlib_name(&self) -> &'static str {
        match self {
            SmtSort::Bool => "Bool",
            SmtSort::Int => "Int",
        }
    }
}

impl fmt::Display for SmtSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.smtlib_name())
    }
}
