//! Lowering from the pipeline AST to SQL.
//!
//! Each pipeline compiles to a chain of CTE stages. Operators either fold
//! into the in-flight stage (a `SELECT` under construction) or flush it: the
//! stage is appended to the `WITH` list as `"__subquery<i>"` and a fresh
//! stage starts reading from it. Aggregations always materialize as a CTE so
//! downstream operators can filter and order their output by name.

use std::fmt::Write as _;

use crate::ast::{
    Column, Expr, Ident, JoinKind, LitKind, QualifiedIdent, SortTerm, TabularExpr,
    TabularOperator, UnaryOp,
};
use crate::lex::Span;
use crate::parse::Diagnostic;

type Result<T> = std::result::Result<T, Diagnostic>;

/// Lower a pipeline to a complete SQL statement.
pub(crate) fn compile_tabular_expr(expr: &TabularExpr) -> std::result::Result<String, Vec<Diagnostic>> {
    translate(expr).map(|sql| format!("{sql};")).map_err(|d| vec![d])
}

fn translate(expr: &TabularExpr) -> Result<String> {
    let mut translator = Translator::new(&expr.source.name);
    for op in &expr.operators {
        translator.apply(op)?;
    }
    Ok(translator.finish())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn render_qualified(ident: &QualifiedIdent) -> String {
    ident
        .parts
        .iter()
        .map(|part| quote_ident(&part.name))
        .collect::<Vec<_>>()
        .join(".")
}

/// One `WHERE` conjunct; disjunctions get parenthesized when combined.
struct Conjunct {
    sql: String,
    disjunction: bool,
}

struct Limit {
    sql: String,
    /// Set when the row count is a plain long literal, enabling
    /// `take`-after-`take` folding.
    value: Option<i64>,
}

/// The `SELECT` currently being assembled.
struct Stage {
    from: String,
    /// Name later operators use to qualify this stage's columns.
    from_name: String,
    alias: Option<String>,
    joined: bool,
    select: Option<Vec<String>>,
    wheres: Vec<Conjunct>,
    group_by: Option<Vec<String>>,
    order_by: Option<Vec<String>>,
    limit: Option<Limit>,
}

impl Stage {
    fn new(from: String, from_name: String) -> Self {
        Stage {
            from,
            from_name,
            alias: None,
            joined: false,
            select: None,
            wheres: Vec::new(),
            group_by: None,
            order_by: None,
            limit: None,
        }
    }

    /// A pristine stage reads `SELECT *` from its source with nothing else
    /// applied; flushing it would only produce a pass-through CTE. An alias
    /// by itself does not count: it only matters for join qualification.
    fn is_pristine(&self) -> bool {
        self.select.is_none()
            && self.wheres.is_empty()
            && self.group_by.is_none()
            && self.order_by.is_none()
            && self.limit.is_none()
            && !self.joined
    }

    fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.from_name)
    }

    fn rendered_from(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.from, quote_ident(alias)),
            None => self.from.clone(),
        }
    }

    fn render(&self) -> String {
        let mut sql = String::from("SELECT ");
        match &self.select {
            None => sql.push('*'),
            Some(columns) => sql.push_str(&columns.join(", ")),
        }
        let _ = write!(sql, " FROM {}", self.rendered_from());
        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            if self.wheres.len() == 1 {
                sql.push_str(&self.wheres[0].sql);
            } else {
                let parts: Vec<String> = self
                    .wheres
                    .iter()
                    .map(|c| {
                        if c.disjunction {
                            format!("({})", c.sql)
                        } else {
                            c.sql.clone()
                        }
                    })
                    .collect();
                sql.push_str(&parts.join(" AND "));
            }
        }
        if let Some(group_by) = &self.group_by
            && !group_by.is_empty()
        {
            let _ = write!(sql, " GROUP BY {}", group_by.join(", "));
        }
        if let Some(order_by) = &self.order_by {
            let _ = write!(sql, " ORDER BY {}", order_by.join(", "));
        }
        if let Some(limit) = &self.limit {
            let _ = write!(sql, " LIMIT {}", limit.sql);
        }
        sql
    }
}

struct Translator {
    ctes: Vec<(String, String)>,
    counter: usize,
    stage: Stage,
}

impl Translator {
    fn new(source: &QualifiedIdent) -> Self {
        let from_name = source.parts.last().map(|p| p.name.clone()).unwrap_or_default();
        Translator {
            ctes: Vec::new(),
            counter: 0,
            stage: Stage::new(render_qualified(source), from_name),
        }
    }

    fn flush(&mut self) {
        if self.stage.is_pristine() {
            return;
        }
        let name = format!("__subquery{}", self.counter);
        self.counter += 1;
        let sql = self.stage.render();
        let next = Stage::new(quote_ident(&name), name.clone());
        self.ctes.push((name, sql));
        self.stage = next;
    }

    fn finish(self) -> String {
        let final_select = self.stage.render();
        if self.ctes.is_empty() {
            return final_select;
        }
        let mut sql = String::from("WITH ");
        for (i, (name, stage_sql)) in self.ctes.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} AS ({})", quote_ident(name), stage_sql);
        }
        sql.push(' ');
        sql.push_str(&final_select);
        sql
    }

    fn apply(&mut self, op: &TabularOperator) -> Result<()> {
        // Aggregations flush themselves, so no grouping ever survives into
        // the stage a later operator sees.
        debug_assert!(self.stage.group_by.is_none());
        match op {
            TabularOperator::Count { span } => {
                let count = Column {
                    name: None,
                    expr: Expr::Call {
                        func: Ident {
                            name: "count".to_string(),
                            quoted: false,
                            span: *span,
                        },
                        args: Vec::new(),
                        span: *span,
                    },
                    span: *span,
                };
                self.apply_summarize(std::slice::from_ref(&count), &[], *span)
            }
            TabularOperator::Take { row_count, .. } => self.apply_take(row_count),
            TabularOperator::Top { row_count, by, .. } => {
                self.flush_for_ordering();
                self.stage.order_by = Some(render_sort_terms(by)?);
                self.stage.limit = Some(Limit {
                    sql: render_expr(row_count)?,
                    value: long_literal(row_count),
                });
                Ok(())
            }
            TabularOperator::Where { predicate, .. } => {
                if self.stage.limit.is_some() {
                    self.flush();
                }
                self.stage.wheres.push(Conjunct {
                    sql: render_expr(predicate)?,
                    disjunction: matches!(
                        predicate,
                        Expr::Binary { op: crate::ast::BinOp::Or, .. }
                    ),
                });
                Ok(())
            }
            TabularOperator::Sort { terms, .. } => {
                self.flush_for_ordering();
                self.stage.order_by = Some(render_sort_terms(terms)?);
                Ok(())
            }
            TabularOperator::Project { columns, .. } => self.apply_project(columns),
            TabularOperator::Extend { columns, .. } => self.apply_extend(columns),
            TabularOperator::Summarize { aggregates, group_by, span } => {
                self.apply_summarize(aggregates, group_by, *span)
            }
            TabularOperator::Join { kind, right, on, .. } => self.apply_join(*kind, right, on),
            TabularOperator::As { name, .. } => {
                // A join clause cannot take an alias directly.
                if self.stage.joined {
                    self.flush();
                }
                self.stage.alias = Some(name.name.clone());
                Ok(())
            }
            TabularOperator::Render { .. } => Ok(()),
        }
    }

    /// Ordering and limiting restart the stage when one is already pending,
    /// so a later `sort` never reorders rows a `take` already cut.
    fn flush_for_ordering(&mut self) {
        if self.stage.order_by.is_some() || self.stage.limit.is_some() {
            self.flush();
        }
    }

    fn apply_take(&mut self, row_count: &Expr) -> Result<()> {
        let value = long_literal(row_count);
        if let Some(limit) = &mut self.stage.limit {
            if let (Some(old), Some(new)) = (limit.value, value) {
                if new < old {
                    *limit = Limit {
                        sql: render_expr(row_count)?,
                        value,
                    };
                }
                return Ok(());
            }
            self.flush();
        }
        self.stage.limit = Some(Limit {
            sql: render_expr(row_count)?,
            value,
        });
        Ok(())
    }

    fn apply_project(&mut self, columns: &[Column]) -> Result<()> {
        let mut select = Vec::with_capacity(columns.len());
        let mut seen: Vec<&str> = Vec::new();
        for column in columns {
            let sql = render_expr(&column.expr)?;
            let name = match (&column.name, &column.expr) {
                (Some(name), _) => {
                    select.push(format!("{sql} AS {}", quote_ident(&name.name)));
                    Some(name.name.as_str())
                }
                (None, Expr::Ident(ident)) => {
                    select.push(sql);
                    ident.parts.last().map(|p| p.name.as_str())
                }
                (None, expr) => {
                    return Err(Diagnostic::new(
                        expr.span(),
                        "computed project column requires a name",
                    ));
                }
            };
            if let Some(name) = name {
                if seen.contains(&name) {
                    return Err(Diagnostic::new(
                        column.span,
                        format!("duplicate column name {name:?}"),
                    ));
                }
                seen.push(name);
            }
        }
        self.stage.select = Some(select);
        Ok(())
    }

    fn apply_extend(&mut self, columns: &[Column]) -> Result<()> {
        let mut seen: Vec<&str> = Vec::new();
        let mut added = Vec::with_capacity(columns.len());
        for column in columns {
            // The parser diagnoses nameless extend columns, and compilation
            // never starts with diagnostics outstanding.
            let name = column.name.as_ref().expect("extend column has a name");
            if seen.contains(&name.name.as_str()) {
                return Err(Diagnostic::new(
                    column.span,
                    format!("duplicate column name {:?}", name.name),
                ));
            }
            seen.push(&name.name);
            added.push(format!(
                "{} AS {}",
                render_expr(&column.expr)?,
                quote_ident(&name.name)
            ));
        }
        self.stage
            .select
            .get_or_insert_with(|| vec!["*".to_string()])
            .extend(added);
        Ok(())
    }

    fn apply_summarize(
        &mut self,
        aggregates: &[Column],
        group_by: &[Column],
        span: Span,
    ) -> Result<()> {
        if aggregates.is_empty() && group_by.is_empty() {
            return Err(Diagnostic::new(
                span,
                "summarize requires at least one aggregate or group key",
            ));
        }
        if self.stage.select.is_some()
            || self.stage.order_by.is_some()
            || self.stage.limit.is_some()
        {
            self.flush();
        }

        let mut select = Vec::with_capacity(group_by.len() + aggregates.len());
        let mut group = Vec::with_capacity(group_by.len());
        for column in group_by {
            let sql = render_expr(&column.expr)?;
            select.push(format!("{sql} AS {}", summarize_alias(column)));
            group.push(sql);
        }
        for column in aggregates {
            let sql = render_expr(&column.expr)?;
            select.push(format!("{sql} AS {}", summarize_alias(column)));
        }
        self.stage.select = Some(select);
        self.stage.group_by = Some(group);
        // Materialize the aggregation so later operators see its output
        // columns by name.
        self.flush();
        Ok(())
    }

    fn apply_join(&mut self, kind: JoinKind, right: &TabularExpr, on: &[Expr]) -> Result<()> {
        self.flush();
        let left_name = self.stage.effective_name().to_string();
        let left_from = self.stage.rendered_from();
        let (right_sql, right_name) = compile_join_source(right)?;

        let mut conditions = Vec::with_capacity(on.len());
        for term in on {
            // A bare column name is equi-join shorthand.
            if let Expr::Ident(ident) = term
                && let Some(part) = ident.single()
            {
                conditions.push(format!(
                    "{}.{} = {}.{}",
                    quote_ident(&left_name),
                    quote_ident(&part.name),
                    quote_ident(&right_name),
                    quote_ident(&part.name),
                ));
            } else {
                conditions.push(render_expr(term)?);
            }
        }

        let keyword = match kind {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
            JoinKind::Right => "RIGHT",
            JoinKind::Full => "FULL",
        };
        self.stage.from = format!(
            "{left_from} {keyword} JOIN {right_sql} ON {}",
            conditions.join(" AND ")
        );
        self.stage.from_name = left_name;
        self.stage.alias = None;
        self.stage.joined = true;
        Ok(())
    }
}

/// Compile the right-hand side of a join: a bare table stays a table
/// reference, anything with operators becomes a parenthesized subquery with
/// its own CTE chain and a derived alias.
fn compile_join_source(expr: &TabularExpr) -> Result<(String, String)> {
    let name = expr
        .operators
        .iter()
        .rev()
        .find_map(|op| match op {
            TabularOperator::As { name, .. } => Some(name.name.clone()),
            _ => None,
        })
        .or_else(|| expr.source.name.parts.last().map(|p| p.name.clone()))
        .unwrap_or_default();

    if expr.operators.is_empty() {
        return Ok((render_qualified(&expr.source.name), name));
    }
    let inner = translate(expr)?;
    Ok((format!("({inner}) AS {}", quote_ident(&name)), name))
}

fn summarize_alias(column: &Column) -> String {
    match &column.name {
        Some(name) => quote_ident(&name.name),
        None => quote_ident(&column.expr.to_string()),
    }
}

fn long_literal(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Literal { kind: LitKind::Long, text, .. } => text.parse().ok(),
        _ => None,
    }
}

fn render_sort_terms(terms: &[SortTerm]) -> Result<Vec<String>> {
    terms
        .iter()
        .map(|term| {
            Ok(format!(
                "{} {} NULLS {}",
                render_expr(&term.expr)?,
                if term.ascending { "ASC" } else { "DESC" },
                if term.nulls_first { "FIRST" } else { "LAST" },
            ))
        })
        .collect()
}

// ---- expression rendering ---------------------------------------------

fn sql_bin_op(op: crate::ast::BinOp) -> &'static str {
    use crate::ast::BinOp;
    match op {
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Eq => "=",
        BinOp::Ne => "<>",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Like => "LIKE",
        BinOp::NotLike => "NOT LIKE",
        BinOp::And => "AND",
        BinOp::Or => "OR",
    }
}

fn precedence(op: crate::ast::BinOp) -> u8 {
    use crate::ast::BinOp;
    match op {
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

fn expr_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => precedence(*op),
        Expr::In { .. } => 3,
        _ => u8::MAX,
    }
}

fn render_operand(expr: &Expr, parent: u8, right: bool) -> Result<String> {
    let sql = render_expr(expr)?;
    let own = expr_precedence(expr);
    if own < parent || (right && own == parent && parent > 2) {
        Ok(format!("({sql})"))
    } else {
        Ok(sql)
    }
}

fn render_expr(expr: &Expr) -> Result<String> {
    Ok(match expr {
        Expr::Literal { kind: LitKind::Str, text, .. } => {
            format!("'{}'", text.replace('\'', "''"))
        }
        Expr::Literal { text, .. } => text.clone(),
        Expr::Ident(ident) => render_qualified(ident),
        Expr::Paren { expr, .. } => format!("({})", render_expr(expr)?),
        Expr::Unary { op: UnaryOp::Not, expr, .. } => {
            format!("NOT ({})", render_expr(expr)?)
        }
        Expr::Unary { op, expr: operand, .. } => {
            let sign = if *op == UnaryOp::Minus { "-" } else { "+" };
            if matches!(operand.as_ref(), Expr::Binary { .. } | Expr::In { .. }) {
                format!("{sign}({})", render_expr(operand)?)
            } else {
                format!("{sign}{}", render_expr(operand)?)
            }
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            let prec = precedence(*op);
            let lhs = render_operand(lhs, prec, false)?;
            let rhs = render_operand(rhs, prec, true)?;
            if matches!(
                op,
                crate::ast::BinOp::Add
                    | crate::ast::BinOp::Sub
                    | crate::ast::BinOp::Mul
                    | crate::ast::BinOp::Div
                    | crate::ast::BinOp::Mod
            ) {
                format!("{lhs}{}{rhs}", sql_bin_op(*op))
            } else {
                format!("{lhs} {} {rhs}", sql_bin_op(*op))
            }
        }
        Expr::In { expr, vals, .. } => {
            let lhs = render_operand(expr, 3, false)?;
            let vals = vals
                .iter()
                .map(render_expr)
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            format!("{lhs} IN ({vals})")
        }
        Expr::Call { func, args, span } => render_call(func, args, *span)?,
        Expr::Index { expr, index, .. } => {
            let base = render_operand(expr, u8::MAX, false)?;
            format!("{base}[{}]", render_expr(index)?)
        }
        Expr::Error { span } => {
            return Err(Diagnostic::new(*span, "cannot compile malformed expression"));
        }
    })
}

fn render_call(func: &Ident, args: &[Expr], span: Span) -> Result<String> {
    let rendered: Vec<String> = args.iter().map(render_expr).collect::<Result<Vec<_>>>()?;
    let arity = |n: usize, what: &str| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(Diagnostic::new(
                span,
                format!("{}() takes exactly {what}", func.name),
            ))
        }
    };
    Ok(match func.name.as_str() {
        "count" if args.is_empty() => "COUNT(*)".to_string(),
        "strcat" => {
            if args.is_empty() {
                return Err(Diagnostic::new(span, "strcat() takes at least one argument"));
            }
            format!("({})", rendered.join(" || "))
        }
        "tolower" => {
            arity(1, "one argument")?;
            format!("lower({})", rendered[0])
        }
        "toupper" => {
            arity(1, "one argument")?;
            format!("upper({})", rendered[0])
        }
        "strlen" | "length" => {
            arity(1, "one argument")?;
            format!("length({})", rendered[0])
        }
        "startswith" => {
            arity(2, "two arguments")?;
            format!("startsWith({}, {})", rendered[0], rendered[1])
        }
        "endswith" => {
            arity(2, "two arguments")?;
            format!("endsWith({}, {})", rendered[0], rendered[1])
        }
        "isnull" => {
            arity(1, "one argument")?;
            format!("({} IS NULL)", rendered[0])
        }
        "isnotnull" => {
            arity(1, "one argument")?;
            format!("({} IS NOT NULL)", rendered[0])
        }
        "iif" | "iff" => {
            arity(3, "three arguments")?;
            format!(
                "CASE WHEN {} THEN {} ELSE {} END",
                rendered[0], rendered[1], rendered[2]
            )
        }
        "not" => {
            arity(1, "one argument")?;
            format!("NOT ({})", rendered[0])
        }
        // Anything else passes through by name.
        _ => format!("{}({})", func.name, rendered.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn compile(input: &str) -> String {
        let (expr, diags) = parse(input);
        assert!(diags.is_empty(), "parse diagnostics for {input:?}: {diags:?}");
        compile_tabular_expr(&expr.unwrap()).unwrap_or_else(|d| panic!("compile {input:?}: {d:?}"))
    }

    fn compile_err(input: &str) -> Vec<Diagnostic> {
        let (expr, diags) = parse(input);
        assert!(diags.is_empty(), "parse diagnostics for {input:?}: {diags:?}");
        compile_tabular_expr(&expr.unwrap()).expect_err("expected failure")
    }

    #[test]
    fn bare_table() {
        assert_eq!(compile("StormEvents"), r#"SELECT * FROM "StormEvents";"#);
    }

    #[test]
    fn take_take_folds_to_min() {
        assert_eq!(compile("T | take 5 | take 3"), r#"SELECT * FROM "T" LIMIT 3;"#);
        assert_eq!(compile("T | take 3 | take 5"), r#"SELECT * FROM "T" LIMIT 3;"#);
    }

    #[test]
    fn where_after_take_flushes() {
        assert_eq!(
            compile("T | take 5 | where a == 1"),
            r#"WITH "__subquery0" AS (SELECT * FROM "T" LIMIT 5) SELECT * FROM "__subquery0" WHERE "a" = 1;"#
        );
    }

    #[test]
    fn sort_after_take_flushes() {
        assert_eq!(
            compile("T | take 5 | sort by a"),
            r#"WITH "__subquery0" AS (SELECT * FROM "T" LIMIT 5) SELECT * FROM "__subquery0" ORDER BY "a" ASC NULLS FIRST;"#
        );
    }

    #[test]
    fn successive_wheres_conjoin() {
        assert_eq!(
            compile("T | where a == 1 or b == 2 | where c == 3"),
            r#"SELECT * FROM "T" WHERE ("a" = 1 OR "b" = 2) AND "c" = 3;"#
        );
    }

    #[test]
    fn top_emits_order_and_limit() {
        assert_eq!(
            compile("T | top 3 by x desc"),
            r#"SELECT * FROM "T" ORDER BY "x" DESC NULLS LAST LIMIT 3;"#
        );
    }

    #[test]
    fn summarize_after_where_shares_the_stage() {
        assert_eq!(
            compile("T | where a > 0 | summarize c=count() by b"),
            r#"WITH "__subquery0" AS (SELECT "b" AS "b", COUNT(*) AS "c" FROM "T" WHERE "a" > 0 GROUP BY "b") SELECT * FROM "__subquery0";"#
        );
    }

    #[test]
    fn where_after_summarize_reads_the_cte() {
        assert_eq!(
            compile("T | summarize c=count() by b | where c > 5"),
            r#"WITH "__subquery0" AS (SELECT "b" AS "b", COUNT(*) AS "c" FROM "T" GROUP BY "b") SELECT * FROM "__subquery0" WHERE "c" > 5;"#
        );
    }

    #[test]
    fn default_summarize_alias_is_the_expression() {
        assert_eq!(
            compile("T | summarize sum(x) by b"),
            r#"WITH "__subquery0" AS (SELECT "b" AS "b", sum("x") AS "sum(x)" FROM "T" GROUP BY "b") SELECT * FROM "__subquery0";"#
        );
    }

    #[test]
    fn join_with_shorthand_and_expression_conditions() {
        assert_eq!(
            compile("L | join (R) on k"),
            r#"SELECT * FROM "L" INNER JOIN "R" ON "L"."k" = "R"."k";"#
        );
        assert_eq!(
            compile("L | left join (R | where x > 0) on k, L.a == R.b"),
            r#"SELECT * FROM "L" LEFT JOIN (SELECT * FROM "R" WHERE "x" > 0) AS "R" ON "L"."k" = "R"."k" AND "L"."a" = "R"."b";"#
        );
    }

    #[test]
    fn join_uses_alias_names() {
        assert_eq!(
            compile("L | as lhs | join (R | as rhs) on k"),
            r#"SELECT * FROM "L" AS "lhs" INNER JOIN (SELECT * FROM "R" AS "rhs") AS "rhs" ON "lhs"."k" = "rhs"."k";"#
        );
    }

    #[test]
    fn quoted_identifiers_are_sql_quoted() {
        assert_eq!(
            compile("[weird table] | where [a b] == 'x'"),
            r#"SELECT * FROM "weird table" WHERE "a b" = 'x';"#
        );
    }

    #[test]
    fn embedded_double_quotes_are_doubled() {
        assert_eq!(
            compile(r#"[a"b] | count"#),
            r#"WITH "__subquery0" AS (SELECT COUNT(*) AS "count()" FROM "a""b") SELECT * FROM "__subquery0";"#
        );
    }

    #[test]
    fn string_single_quotes_are_doubled() {
        assert_eq!(
            compile(r"T | where a == 'it\'s'"),
            r#"SELECT * FROM "T" WHERE "a" = 'it''s';"#
        );
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            compile("T | where a != 1 and b ~ 'x%' and c !~ 'y%'"),
            r#"SELECT * FROM "T" WHERE "a" <> 1 AND "b" LIKE 'x%' AND "c" NOT LIKE 'y%';"#
        );
    }

    #[test]
    fn arithmetic_keeps_grouping() {
        assert_eq!(
            compile("T | project A=(x+1)*2, B=x-(y-z)"),
            r#"SELECT ("x"+1)*2 AS "A", "x"-("y"-"z") AS "B" FROM "T";"#
        );
    }

    #[test]
    fn function_translations() {
        assert_eq!(
            compile("T | project a=strcat(x, '-', y), b=tolower(x), c=strlen(x), d=iif(x == 1, 'y', 'n'), e=isnull(x)"),
            r#"SELECT ("x" || '-' || "y") AS "a", lower("x") AS "b", length("x") AS "c", CASE WHEN "x" = 1 THEN 'y' ELSE 'n' END AS "d", ("x" IS NULL) AS "e" FROM "T";"#
        );
    }

    #[test]
    fn unknown_functions_pass_through() {
        assert_eq!(
            compile("T | project a=myFunc(x, 1)"),
            r#"SELECT myFunc("x", 1) AS "a" FROM "T";"#
        );
    }

    #[test]
    fn in_expression() {
        assert_eq!(
            compile("T | where x in (1, 2, 3)"),
            r#"SELECT * FROM "T" WHERE "x" IN (1, 2, 3);"#
        );
    }

    #[test]
    fn not_renders_parenthesized() {
        assert_eq!(
            compile("T | where not (a == 1)"),
            r#"SELECT * FROM "T" WHERE NOT (("a" = 1));"#
        );
    }

    #[test]
    fn index_lowering() {
        assert_eq!(
            compile("T | where xs[0] == 'a'"),
            r#"SELECT * FROM "T" WHERE "xs"[0] = 'a';"#
        );
    }

    #[test]
    fn render_is_a_no_op() {
        assert_eq!(
            compile("T | where a > 0 | render barchart"),
            r#"SELECT * FROM "T" WHERE "a" > 0;"#
        );
    }

    #[test]
    fn empty_summarize_is_rejected() {
        let diags = compile_err("T | summarize");
        assert_eq!(
            diags[0].message,
            "summarize requires at least one aggregate or group key"
        );
    }

    #[test]
    fn duplicate_project_columns_are_rejected() {
        let diags = compile_err("T | project a=1, a=2");
        assert_eq!(diags[0].message, r#"duplicate column name "a""#);
    }

    #[test]
    fn computed_project_column_needs_a_name() {
        let diags = compile_err("T | project x+1");
        assert_eq!(diags[0].message, "computed project column requires a name");
    }

    #[test]
    fn arity_mismatch_is_a_diagnostic() {
        let diags = compile_err("T | project a=tolower(x, y)");
        assert_eq!(diags[0].message, "tolower() takes exactly one argument");
    }
}
