//! Minimal in-memory evaluator.
//!
//! Interprets `count`, `take`, and `where` against row-oriented tables where
//! every cell is a string. This exists as a debugging aid and a semantic
//! reference for a small operator subset, not as a query engine: anything
//! outside the subset is an error, and the first failure wins.

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::{BinOp, Expr, TabularExpr, TabularOperator, UnaryOp};

/// An in-memory table. `rows` is row-major; every cell is a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Table {
            name: name.into(),
            columns,
            rows,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("unknown table {0:?}")]
    UnknownTable(String),

    #[error("qualified identifiers not supported")]
    QualifiedIdent,

    #[error("unrecognized identifier {0:?}")]
    UnknownIdent(String),

    #[error("unknown function {0}")]
    UnknownFunction(String),

    #[error("negative row count")]
    NegativeRowCount,

    #[error("invalid row count {0:?}")]
    InvalidRowCount(String),

    #[error("{0}")]
    Argument(String),

    #[error("unhandled operator {0}")]
    UnsupportedOperator(&'static str),

    #[error("unhandled {0} expression")]
    UnsupportedExpr(&'static str),
}

type Result<T> = std::result::Result<T, EvalError>;

/// A cell value. Everything is a string underneath: `"1"`/`"0"` encode
/// booleans and `""` encodes null. Operator code goes through this type so
/// the representation can change without touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(String);

impl Value {
    pub fn new(s: impl Into<String>) -> Self {
        Value(s.into())
    }

    pub fn from_bool(b: bool) -> Self {
        Value(if b { "1" } else { "0" }.to_string())
    }

    /// Nonempty and not `"0"`.
    pub fn truthy(&self) -> bool {
        !self.0.is_empty() && self.0 != "0"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Flip the sign of a numeric spelling by toggling a `-` prefix.
    fn negate(self) -> Self {
        match self.0.strip_prefix('-') {
            Some(positive) => Value(positive.to_string()),
            None => Value(format!("-{}", self.0)),
        }
    }

    fn into_string(self) -> String {
        self.0
    }
}

/// Evaluate a parsed pipeline against the given tables.
pub(crate) fn eval_tabular_expr(expr: &TabularExpr, tables: &[Table]) -> Result<Table> {
    let source = expr
        .source
        .name
        .single()
        .ok_or(EvalError::QualifiedIdent)?;
    let mut current = tables
        .iter()
        .find(|t| t.name == source.name)
        .ok_or_else(|| EvalError::UnknownTable(source.name.clone()))?
        .clone();

    for op in &expr.operators {
        current = match op {
            TabularOperator::Count { .. } => Table {
                name: String::new(),
                columns: vec!["count()".to_string()],
                rows: vec![vec![current.rows.len().to_string()]],
            },
            TabularOperator::Take { row_count, .. } => {
                let count = eval_expr(row_count, None)?;
                let n: i64 = count
                    .as_str()
                    .parse()
                    .map_err(|_| EvalError::InvalidRowCount(count.as_str().to_string()))?;
                if n < 0 {
                    return Err(EvalError::NegativeRowCount);
                }
                let mut rows = current.rows;
                rows.truncate(n as usize);
                Table {
                    name: current.name,
                    columns: current.columns,
                    rows,
                }
            }
            TabularOperator::Where { predicate, .. } => {
                // TODO(someday): only bind these when the identifier is
                // unquoted.
                let mut idents: HashMap<&str, Value> = HashMap::from([
                    ("null", Value::new("")),
                    ("true", Value::new("1")),
                    ("false", Value::new("0")),
                ]);
                let mut rows = Vec::with_capacity(current.rows.len());
                for row in &current.rows {
                    for (column, cell) in current.columns.iter().zip(row) {
                        idents.insert(column, Value::new(cell.clone()));
                    }
                    if eval_expr(predicate, Some(&idents))?.truthy() {
                        rows.push(row.clone());
                    }
                }
                Table {
                    name: current.name.clone(),
                    columns: current.columns.clone(),
                    rows,
                }
            }
            TabularOperator::Top { .. } => return Err(EvalError::UnsupportedOperator("top")),
            TabularOperator::Sort { .. } => return Err(EvalError::UnsupportedOperator("sort")),
            TabularOperator::Project { .. } => {
                return Err(EvalError::UnsupportedOperator("project"));
            }
            TabularOperator::Extend { .. } => {
                return Err(EvalError::UnsupportedOperator("extend"));
            }
            TabularOperator::Summarize { .. } => {
                return Err(EvalError::UnsupportedOperator("summarize"));
            }
            TabularOperator::Join { .. } => return Err(EvalError::UnsupportedOperator("join")),
            TabularOperator::As { .. } => return Err(EvalError::UnsupportedOperator("as")),
            TabularOperator::Render { .. } => {
                return Err(EvalError::UnsupportedOperator("render"));
            }
        };
    }

    Ok(current)
}

fn eval_expr(expr: &Expr, idents: Option<&HashMap<&str, Value>>) -> Result<Value> {
    match expr {
        Expr::Paren { expr, .. } => eval_expr(expr, idents),
        Expr::Literal { text, .. } => Ok(Value::new(text.clone())),
        Expr::Ident(ident) => {
            let part = ident.single().ok_or(EvalError::QualifiedIdent)?;
            idents
                .and_then(|idents| idents.get(part.name.as_str()))
                .cloned()
                .ok_or_else(|| EvalError::UnknownIdent(part.name.clone()))
        }
        Expr::Unary { op, expr, .. } => {
            let inner = eval_expr(expr, idents)?;
            match op {
                UnaryOp::Plus => Ok(inner),
                UnaryOp::Minus => Ok(inner.negate()),
                UnaryOp::Not => Ok(Value::from_bool(!inner.truthy())),
            }
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let a = eval_expr(lhs, idents)?;
            // Short-circuit: and/or return one of their operands untouched.
            match op {
                BinOp::And if !a.truthy() => return Ok(a),
                BinOp::Or if a.truthy() => return Ok(a),
                _ => {}
            }
            let b = eval_expr(rhs, idents)?;
            match op {
                BinOp::Eq => Ok(Value::from_bool(a == b)),
                BinOp::Ne => Ok(Value::from_bool(a != b)),
                BinOp::And | BinOp::Or => Ok(b),
                _ => Err(EvalError::UnsupportedExpr("binary operator")),
            }
        }
        Expr::In { expr, vals, .. } => {
            let a = eval_expr(expr, idents)?;
            for val in vals {
                if a == eval_expr(val, idents)? {
                    return Ok(Value::from_bool(true));
                }
            }
            Ok(Value::from_bool(false))
        }
        Expr::Call { func, args, .. } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, idents)?);
            }
            call_function(&func.name, values)
        }
        Expr::Index { .. } => Err(EvalError::UnsupportedExpr("index")),
        Expr::Error { .. } => Err(EvalError::UnsupportedExpr("error")),
    }
}

fn call_function(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "not" => {
            let [arg] = args.as_slice() else {
                return Err(EvalError::Argument(
                    "not(x) takes exactly one argument".to_string(),
                ));
            };
            Ok(Value::from_bool(!arg.truthy()))
        }
        "strcat" => {
            if args.is_empty() {
                return Err(EvalError::Argument(
                    "strcat(x, ...) takes at least one argument".to_string(),
                ));
            }
            let mut out = String::new();
            for arg in args {
                out.push_str(&arg.into_string());
            }
            Ok(Value::new(out))
        }
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn table(name: &str, columns: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            name,
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn run(source: &str, tables: &[Table]) -> Result<Table> {
        let (expr, diags) = parse(source);
        assert!(diags.is_empty(), "diagnostics for {source:?}: {diags:?}");
        eval_tabular_expr(&expr.unwrap(), tables)
    }

    fn numbers() -> Table {
        table(
            "T",
            &["a", "b"],
            &[&["1", "2"], &["3", "0"], &["5", "4"]],
        )
    }

    #[test]
    fn where_filters_by_truthiness() {
        let result = run("T | where b | take 5", &[numbers()]).unwrap();
        assert_eq!(result.columns, vec!["a", "b"]);
        assert_eq!(
            result.rows,
            vec![vec!["1".to_string(), "2".to_string()], vec!["5".to_string(), "4".to_string()]]
        );
    }

    #[test]
    fn count_rows() {
        let result = run("T | count", &[numbers()]).unwrap();
        assert_eq!(result.columns, vec!["count()"]);
        assert_eq!(result.rows, vec![vec!["3".to_string()]]);
    }

    #[test]
    fn take_truncates() {
        let result = run("T | take 2", &[numbers()]).unwrap();
        assert_eq!(result.rows.len(), 2);
        let result = run("T | take 10", &[numbers()]).unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn take_negative_and_non_integer() {
        assert_eq!(
            run("T | take -1", &[numbers()]),
            Err(EvalError::NegativeRowCount)
        );
        assert_eq!(
            run("T | take 'x'", &[numbers()]),
            Err(EvalError::InvalidRowCount("x".to_string()))
        );
    }

    #[test]
    fn equality_is_byte_exact() {
        let t = table("T", &["s"], &[&["abc"], &["ABC"]]);
        let result = run("T | where s == 'abc'", &[t]).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn and_or_return_operands() {
        let t = table("T", &["a", "b"], &[&["x", ""]]);
        // `a or b` returns "x", which is truthy, so the row stays.
        let result = run("T | where a or b", &[t.clone()]).unwrap();
        assert_eq!(result.rows.len(), 1);
        // `a and b` returns "", which is falsy.
        let result = run("T | where a and b", &[t]).unwrap();
        assert_eq!(result.rows.len(), 0);
    }

    #[test]
    fn true_false_null_bind() {
        let t = table("T", &["a"], &[&["1"], &["0"], &[""]]);
        let result = run("T | where a == true", &[t.clone()]).unwrap();
        assert_eq!(result.rows.len(), 1);
        let result = run("T | where a == null", &[t]).unwrap();
        assert_eq!(result.rows, vec![vec![String::new()]]);
    }

    #[test]
    fn unary_minus_toggles_sign_prefix() {
        let t = table("T", &["a"], &[&["-5"], &["5"]]);
        let result = run("T | where a == -5", &[t]).unwrap();
        assert_eq!(result.rows, vec![vec!["-5".to_string()]]);
    }

    #[test]
    fn in_compares_by_string_equality() {
        let t = table("T", &["a"], &[&["1"], &["2"], &["3"]]);
        let result = run("T | where a in (1, 3)", &[t]).unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn not_and_strcat() {
        let t = table("T", &["a", "b"], &[&["x", "y"], &["", "y"]]);
        let result = run("T | where not(a)", &[t.clone()]).unwrap();
        assert_eq!(result.rows.len(), 1);
        let result = run("T | where strcat(a, b) == 'xy'", &[t]).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn unknown_table_and_identifier() {
        assert_eq!(
            run("Missing | count", &[numbers()]),
            Err(EvalError::UnknownTable("Missing".to_string()))
        );
        assert_eq!(
            run("T | where nope", &[numbers()]),
            Err(EvalError::UnknownIdent("nope".to_string()))
        );
    }

    #[test]
    fn unknown_function() {
        assert_eq!(
            run("T | where frob(a)", &[numbers()]),
            Err(EvalError::UnknownFunction("frob".to_string()))
        );
    }

    #[test]
    fn unsupported_operator() {
        assert_eq!(
            run("T | sort by a", &[numbers()]),
            Err(EvalError::UnsupportedOperator("sort"))
        );
    }

    #[test]
    fn tables_are_not_mutated() {
        let input = numbers();
        let _ = run("T | where b | count", &[input.clone()]).unwrap();
        assert_eq!(input, numbers());
    }
}
