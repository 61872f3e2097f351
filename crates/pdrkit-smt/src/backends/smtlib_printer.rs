use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
///
/// SSA-versioned names such as `x@1` are quoted (`|x@1|`) so the output is
/// accepted by any SMT-LIB2 reader.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => symbol(name),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::BoolLit(b) => b.to_string(),
        SmtTerm::Add(lhs, rhs) => binary("+", lhs, rhs),
        SmtTerm::Sub(lhs, rhs) => binary("-", lhs, rhs),
        SmtTerm::Mul(lhs, rhs) => binary("*", lhs, rhs),
        SmtTerm::Eq(lhs, rhs) => binary("=", lhs, rhs),
        SmtTerm::Lt(lhs, rhs) => binary("<", lhs, rhs),
        SmtTerm::Le(lhs, rhs) => binary("<=", lhs, rhs),
        SmtTerm::Gt(lhs, rhs) => binary(">", lhs, rhs),
        SmtTerm::Ge(lhs, rhs) => binary(">=", lhs, rhs),
        SmtTerm::And(terms) => nary("and", "true", terms),
        SmtTerm::Or(terms) => nary("or", "false", terms),
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => binary("=>", lhs, rhs),
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

fn symbol(name: &str) -> String {
    let simple = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_.$".contains(c));
    if simple && !name.starts_with(|c: char| c.is_ascii_digit()) {
        name.to_string()
    } else {
        format!("|{name}|")
    }
}

fn binary(op: &str, lhs: &SmtTerm, rhs: &SmtTerm) -> String {
    format!("({op} {} {})", to_smtlib(lhs), to_smtlib(rhs))
}

fn nary(op: &str, unit: &str, terms: &[SmtTerm]) -> String {
    match terms {
        [] => unit.to_string(),
        [single] => to_smtlib(single),
        _ => {
            let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
            format!("({op} {})", inner.join(" "))
        }
    }
}

/// Render a self-contained `check-sat` script, used when dumping queries.
pub fn to_smtlib_script(declarations: &[(String, SmtSort)], assertions: &[SmtTerm]) -> String {
    let mut out = String::from("(set-logic QF_LIA)\n");
    for (name, sort) in declarations {
        out.push_str(&format!(
            "(declare-const {} {})\n",
            symbol(name),
            sort.smtlib_name()
        ));
    }
    for assertion in assertions {
        out.push_str(&format!("(assert {})\n", to_smtlib(assertion)));
    }
    out.push_str("(check-sat)\n");
    out
}
