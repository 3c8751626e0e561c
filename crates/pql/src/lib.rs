//! pql - Pipeline Query Language to SQL
//!
//! A source-to-source compiler from a pipe-composed query dialect into
//! standard SQL. Pipelines lower to a chain of common-table-expression
//! subqueries that conventional OLAP engines execute as-is.
//!
//! ## Quick Start
//!
//! ```
//! let sql = pql::compile("StormEvents | where State == 'TEXAS' | take 3").unwrap();
//! assert_eq!(sql, r#"SELECT * FROM "StormEvents" WHERE "State" = 'TEXAS' LIMIT 3;"#);
//! ```
//!
//! Compilation is a pure function of the input: no I/O, no shared state, and
//! no panics on user input. Problems come back as [`Diagnostic`]s with byte
//! spans into the source.
//!
//! ## Evaluating directly
//!
//! A small interpreter runs `count`, `take`, and `where` against in-memory
//! string tables, mainly as a debugging aid:
//!
//! ```
//! use pql::Table;
//!
//! let t = Table::new(
//!     "T",
//!     vec!["a".into(), "b".into()],
//!     vec![vec!["1".into(), "2".into()], vec!["3".into(), "0".into()]],
//! );
//! let result = pql::eval("T | where b", &[t]).unwrap();
//! assert_eq!(result.rows.len(), 1);
//! ```

pub mod ast;
mod compile;
mod eval;
mod lex;
mod parse;
mod pretty;
mod split;

use std::fmt;

use thiserror::Error;

pub use eval::{EvalError, Table, Value};
pub use lex::{Scanner, Span, Token, TokenKind, scan};
pub use parse::{Diagnostic, parse};
pub use split::split_statements;

/// Compilation failed; carries every diagnostic found.
///
/// No SQL is produced when any diagnostic is present.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{diag}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[derive(Error, Debug)]
pub enum PqlError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Translate one PQL statement into SQL.
///
/// Returns every diagnostic (lexical, syntactic, and semantic) on failure;
/// the output is byte-for-byte deterministic on success.
pub fn compile(source: &str) -> Result<String, CompileError> {
    let (expr, mut diagnostics) = parse::parse(source);
    if diagnostics.is_empty()
        && let Some(expr) = expr
    {
        match compile::compile_tabular_expr(&expr) {
            Ok(sql) => return Ok(sql),
            Err(mut semantic) => diagnostics.append(&mut semantic),
        }
    }
    Err(CompileError { diagnostics })
}

/// Evaluate one PQL statement against in-memory tables.
///
/// The input tables are never mutated. Evaluation stops at the first error.
pub fn eval(source: &str, tables: &[Table]) -> Result<Table, PqlError> {
    let (expr, diagnostics) = parse::parse(source);
    if !diagnostics.is_empty() {
        return Err(CompileError { diagnostics }.into());
    }
    match expr {
        Some(expr) => Ok(eval::eval_tabular_expr(&expr, tables)?),
        None => Err(CompileError {
            diagnostics: vec![Diagnostic::new(Span::new(0, 0), "expected table name")],
        }
        .into()),
    }
}
