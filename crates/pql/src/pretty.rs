//! Canonical rendering of the AST back to PQL.
//!
//! `Display` output reparses to a structurally identical tree, which is what
//! the compiler relies on for default column names (`summarize sum(x)` yields
//! a column named `sum(x)` regardless of the original spacing).

use std::fmt::{self, Display};

use crate::ast::{
    BinOp, Column, Expr, Ident, JoinKind, LitKind, QualifiedIdent, SortTerm, TableRef,
    TabularExpr, TabularOperator, UnaryOp,
};

impl Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "[{}]", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

impl Display for QualifiedIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Plus => f.write_str("+"),
            UnaryOp::Minus => f.write_str("-"),
            UnaryOp::Not => f.write_str("not "),
        }
    }
}

impl BinOp {
    /// Binding strength, loosest first. Mirrors the parser's levels.
    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq
            | BinOp::Ne
            | BinOp::Lt
            | BinOp::Le
            | BinOp::Gt
            | BinOp::Ge
            | BinOp::Like
            | BinOp::NotLike => 3,
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 5,
        }
    }

    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }
}

impl Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Like => "~",
            BinOp::NotLike => "!~",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        f.write_str(s)
    }
}

fn expr_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::In { .. } => 3,
        _ => u8::MAX,
    }
}

/// Write `expr` as an operand of a binary expression with the given
/// precedence, parenthesizing when the rendering would otherwise rebind.
fn fmt_operand(f: &mut fmt::Formatter<'_>, expr: &Expr, parent: u8, right: bool) -> fmt::Result {
    let own = expr_precedence(expr);
    let grouped = own < parent || (right && own == parent && parent > 2);
    if grouped {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { kind: LitKind::Str, text, .. } => {
                f.write_str("'")?;
                for c in text.chars() {
                    match c {
                        '\\' => f.write_str("\\\\")?,
                        '\'' => f.write_str("\\'")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        '\0' => f.write_str("\\0")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("'")
            }
            Expr::Literal { text, .. } => f.write_str(text),
            Expr::Ident(ident) => write!(f, "{ident}"),
            Expr::Unary { op, expr, .. } => {
                if matches!(expr.as_ref(), Expr::Binary { .. } | Expr::In { .. }) {
                    write!(f, "{op}({expr})")
                } else {
                    write!(f, "{op}{expr}")
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let prec = op.precedence();
                fmt_operand(f, lhs, prec, false)?;
                if op.is_arithmetic() {
                    write!(f, "{op}")?;
                } else {
                    write!(f, " {op} ")?;
                }
                fmt_operand(f, rhs, prec, true)
            }
            Expr::In { expr, vals, .. } => {
                fmt_operand(f, expr, 3, false)?;
                f.write_str(" in (")?;
                fmt_list(f, vals)?;
                f.write_str(")")
            }
            Expr::Paren { expr, .. } => write!(f, "({expr})"),
            Expr::Call { func, args, .. } => {
                write!(f, "{func}(")?;
                fmt_list(f, args)?;
                f.write_str(")")
            }
            Expr::Index { expr, index, .. } => {
                // The index came from a bracket-quoted token, so its raw text
                // goes back between brackets unquoted.
                write!(f, "{expr}[")?;
                match index.as_ref() {
                    Expr::Literal { text, .. } => f.write_str(text)?,
                    other => write!(f, "{other}")?,
                }
                f.write_str("]")
            }
            Expr::Error { .. } => f.write_str("<error>"),
        }
    }
}

fn fmt_list<T: Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for SortTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} nulls {}",
            self.expr,
            if self.ascending { "asc" } else { "desc" },
            if self.nulls_first { "first" } else { "last" },
        )
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}={}", self.expr)
        } else {
            write!(f, "{}", self.expr)
        }
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => f.write_str("join"),
            JoinKind::Left => f.write_str("left join"),
            JoinKind::Right => f.write_str("right join"),
            JoinKind::Full => f.write_str("full join"),
        }
    }
}

impl Display for TabularOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabularOperator::Count { .. } => f.write_str("count"),
            TabularOperator::Take { row_count, .. } => write!(f, "take {row_count}"),
            TabularOperator::Top { row_count, by, .. } => {
                write!(f, "top {row_count} by ")?;
                fmt_list(f, by)
            }
            TabularOperator::Where { predicate, .. } => write!(f, "where {predicate}"),
            TabularOperator::Sort { terms, .. } => {
                f.write_str("sort by ")?;
                fmt_list(f, terms)
            }
            TabularOperator::Project { columns, .. } => {
                f.write_str("project ")?;
                fmt_list(f, columns)
            }
            TabularOperator::Extend { columns, .. } => {
                f.write_str("extend ")?;
                fmt_list(f, columns)
            }
            TabularOperator::Summarize { aggregates, group_by, .. } => {
                f.write_str("summarize")?;
                if !aggregates.is_empty() {
                    f.write_str(" ")?;
                    fmt_list(f, aggregates)?;
                }
                if !group_by.is_empty() {
                    f.write_str(" by ")?;
                    fmt_list(f, group_by)?;
                }
                Ok(())
            }
            TabularOperator::Join { kind, right, on, .. } => {
                write!(f, "{kind} ({right}) on ")?;
                fmt_list(f, on)
            }
            TabularOperator::As { name, .. } => write!(f, "as {name}"),
            TabularOperator::Render { .. } => f.write_str("render"),
        }
    }
}

impl Display for TabularExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        for op in &self.operators {
            write!(f, " | {op}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parse::parse;

    fn roundtrip(input: &str) {
        let (expr, diags) = parse(input);
        assert!(diags.is_empty(), "diagnostics for {input:?}: {diags:?}");
        let printed = expr.expect("no tree").to_string();
        let (again, diags) = parse(&printed);
        assert!(diags.is_empty(), "reparse diagnostics for {printed:?}: {diags:?}");
        assert_eq!(printed, again.expect("no tree").to_string());
    }

    #[test]
    fn display_round_trips() {
        roundtrip("T | where a == 'x' and b > 2 | take 5");
        roundtrip("T | summarize c=count() by x, y | sort by c desc");
        roundtrip("T | project A=x+1, B=y | extend C=A*2");
        roundtrip("L | join (R | where k > 0) on k, L.a == R.b");
        roundtrip("T | where not (a == b) or c in (1, 2, 3)");
        roundtrip("[my table] | where [a b] != 'q'");
    }

    #[test]
    fn arithmetic_grouping_is_preserved() {
        let (expr, _) = parse("T | project A=(x+1)*2");
        assert_eq!(
            expr.unwrap().to_string(),
            "T | project A=(x+1)*2"
        );
    }

    #[test]
    fn sort_terms_print_explicit_defaults() {
        let (expr, _) = parse("T | sort by a, b desc");
        assert_eq!(
            expr.unwrap().to_string(),
            "T | sort by a asc nulls first, b desc nulls last"
        );
    }
}
