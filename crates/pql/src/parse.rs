//! Recursive-descent parser for PQL pipelines.
//!
//! Parsing never aborts: syntax problems are recorded as [`Diagnostic`]s and
//! the parser resynchronizes at the next `|`, statement terminator, or the
//! close of the bracket it is inside, leaving [`Expr::Error`] placeholders at
//! the recovery points. Callers get back whatever tree could be built plus
//! every diagnostic, so editors can surface all of them at once.

use std::fmt;

use crate::ast::{
    BinOp, Column, Expr, Ident, JoinKind, LitKind, QualifiedIdent, SortTerm, TableRef,
    TabularExpr, TabularOperator, UnaryOp,
};
use crate::lex::{self, Span, Token, TokenKind};

/// A problem found while scanning, parsing, or lowering.
///
/// The span is a byte range into the original source; converting it to a
/// line/column position is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Span,
    pub message: String,
}

impl Diagnostic {
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.message)
    }
}

/// Parse a single pipeline statement.
///
/// Always returns every diagnostic found; returns `None` for the tree only
/// when not even a source table could be recognized. Trailing semicolons are
/// consumed.
pub fn parse(source: &str) -> (Option<TabularExpr>, Vec<Diagnostic>) {
    let mut diags = Vec::new();
    let tokens: Vec<Token> = lex::scan(source)
        .into_iter()
        .filter(|tok| {
            if tok.kind == TokenKind::Error {
                diags.push(Diagnostic::new(tok.span, tok.text.clone()));
                false
            } else {
                true
            }
        })
        .collect();

    let mut parser = Parser {
        tokens,
        pos: 0,
        diags,
    };
    let expr = parser.parse_pipeline(false);
    parser.finish();
    (expr, parser.diags)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diags: Vec<Diagnostic>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[i].kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        (self.kind() == kind).then(|| self.advance())
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        match self.eat(kind) {
            Some(tok) => Some(tok),
            None => {
                self.error_here(message);
                None
            }
        }
    }

    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.diags.push(Diagnostic::new(span, message));
    }

    fn error_here(&mut self, message: impl Into<String>) {
        let span = self.peek().span;
        self.error(span, message);
    }

    /// Skip forward to the next place parsing can restart: a top-level `|`,
    /// a statement terminator, or (inside a join subquery) the closing `)`.
    fn recover(&mut self, in_subquery: bool) {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof | TokenKind::Semi => return,
                TokenKind::Pipe if depth == 0 => return,
                TokenKind::LParen => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RParen => {
                    if depth == 0 {
                        if in_subquery {
                            return;
                        }
                        self.advance();
                    } else {
                        depth -= 1;
                        self.advance();
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn at_pipeline_end(&self, in_subquery: bool) -> bool {
        match self.kind() {
            TokenKind::Eof | TokenKind::Semi | TokenKind::Pipe => true,
            TokenKind::RParen => in_subquery,
            _ => false,
        }
    }

    fn finish(&mut self) {
        while self.kind() == TokenKind::Semi {
            self.advance();
        }
        if self.kind() != TokenKind::Eof {
            self.error_here("unexpected input after query");
        }
    }

    // ---- pipeline -----------------------------------------------------

    fn parse_pipeline(&mut self, in_subquery: bool) -> Option<TabularExpr> {
        let source = match self.parse_table_ref() {
            Some(source) => source,
            None => {
                self.error_here("expected table name");
                self.recover(in_subquery);
                return None;
            }
        };

        let mut span = source.span;
        let mut operators = Vec::new();
        loop {
            match self.kind() {
                TokenKind::Pipe => {
                    self.advance();
                    if let Some(op) = self.parse_operator(in_subquery) {
                        span = span.join(op.span());
                        operators.push(op);
                    }
                }
                TokenKind::Semi | TokenKind::Eof => break,
                TokenKind::RParen if in_subquery => break,
                _ => {
                    self.error_here("expected '|'");
                    self.recover(in_subquery);
                    if self.kind() != TokenKind::Pipe {
                        break;
                    }
                }
            }
        }

        Some(TabularExpr {
            source,
            operators,
            span,
        })
    }

    fn parse_table_ref(&mut self) -> Option<TableRef> {
        if !matches!(self.kind(), TokenKind::Ident | TokenKind::QuotedIdent) {
            return None;
        }
        let name = self.parse_qualified_ident();
        Some(TableRef {
            span: name.span,
            name,
        })
    }

    // ---- operators ----------------------------------------------------

    fn parse_operator(&mut self, in_subquery: bool) -> Option<TabularOperator> {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Ident {
            self.error(tok.span, "expected operator name");
            self.recover(in_subquery);
            return None;
        }
        let start = tok.span;

        match tok.text.as_str() {
            "count" => {
                self.advance();
                Some(TabularOperator::Count { span: start })
            }
            "take" | "limit" => {
                self.advance();
                let row_count = self.parse_expr();
                Some(TabularOperator::Take {
                    span: start.join(row_count.span()),
                    row_count,
                })
            }
            "top" => {
                self.advance();
                let row_count = self.parse_expr();
                if self.expect(TokenKind::By, "expected 'by' after row count").is_none() {
                    self.recover(in_subquery);
                    return None;
                }
                let by = self.parse_sort_terms();
                let end = by.last().map_or(row_count.span(), |t| t.span);
                Some(TabularOperator::Top {
                    span: start.join(end),
                    row_count,
                    by,
                })
            }
            "where" => {
                self.advance();
                let predicate = self.parse_expr();
                Some(TabularOperator::Where {
                    span: start.join(predicate.span()),
                    predicate,
                })
            }
            "sort" | "order" => {
                self.advance();
                if self.expect(TokenKind::By, "expected 'by' after sort").is_none() {
                    self.recover(in_subquery);
                    return None;
                }
                let terms = self.parse_sort_terms();
                let end = terms.last().map_or(start, |t| t.span);
                Some(TabularOperator::Sort {
                    span: start.join(end),
                    terms,
                })
            }
            "project" => {
                self.advance();
                let columns = self.parse_columns(false);
                let end = columns.last().map_or(start, |c| c.span);
                Some(TabularOperator::Project {
                    span: start.join(end),
                    columns,
                })
            }
            "extend" => {
                self.advance();
                let columns = self.parse_columns(true);
                let end = columns.last().map_or(start, |c| c.span);
                Some(TabularOperator::Extend {
                    span: start.join(end),
                    columns,
                })
            }
            "summarize" => {
                self.advance();
                let aggregates = if self.kind() == TokenKind::By || self.at_pipeline_end(in_subquery)
                {
                    Vec::new()
                } else {
                    self.parse_columns(false)
                };
                let group_by = if self.eat(TokenKind::By).is_some() {
                    self.parse_columns(false)
                } else {
                    Vec::new()
                };
                let end = group_by
                    .last()
                    .or(aggregates.last())
                    .map_or(start, |c| c.span);
                Some(TabularOperator::Summarize {
                    span: start.join(end),
                    aggregates,
                    group_by,
                })
            }
            "join" | "inner" | "left" | "right" | "full" => self.parse_join(&tok, in_subquery),
            "as" => {
                self.advance();
                if !matches!(self.kind(), TokenKind::Ident | TokenKind::QuotedIdent) {
                    self.error_here("expected name after 'as'");
                    self.recover(in_subquery);
                    return None;
                }
                let name = self.parse_ident_part();
                Some(TabularOperator::As {
                    span: start.join(name.span),
                    name,
                })
            }
            "render" => {
                self.advance();
                let mut span = start;
                // Optional chart type; the compiler ignores it either way.
                if self.kind() == TokenKind::Ident {
                    span = span.join(self.advance().span);
                }
                Some(TabularOperator::Render { span })
            }
            _ => {
                self.error(tok.span, format!("unknown operator {:?}", tok.text));
                self.recover(in_subquery);
                None
            }
        }
    }

    fn parse_join(&mut self, first: &Token, in_subquery: bool) -> Option<TabularOperator> {
        let start = first.span;
        let kind = match first.text.as_str() {
            "inner" => JoinKind::Inner,
            "left" => JoinKind::Left,
            "right" => JoinKind::Right,
            "full" => JoinKind::Full,
            _ => JoinKind::Inner,
        };
        self.advance();
        if first.text != "join" {
            if !(self.kind() == TokenKind::Ident && self.peek().text == "join") {
                self.error_here("expected 'join'");
                self.recover(in_subquery);
                return None;
            }
            self.advance();
        }

        if self.expect(TokenKind::LParen, "expected '(' after 'join'").is_none() {
            self.recover(in_subquery);
            return None;
        }
        let right = self.parse_pipeline(true);
        self.expect(TokenKind::RParen, "expected ')' after join source");
        let right = match right {
            Some(right) => right,
            None => {
                self.recover(in_subquery);
                return None;
            }
        };

        if self.kind() == TokenKind::Ident && self.peek().text == "on" {
            self.advance();
        } else {
            self.error_here("expected 'on' after join source");
            self.recover(in_subquery);
            return None;
        }

        let mut on = vec![self.parse_expr()];
        while self.eat(TokenKind::Comma).is_some() {
            on.push(self.parse_expr());
        }
        let end = on.last().map_or(start, |e| e.span());
        Some(TabularOperator::Join {
            span: start.join(end),
            kind,
            right: Box::new(right),
            on,
        })
    }

    fn parse_sort_terms(&mut self) -> Vec<SortTerm> {
        let mut terms = vec![self.parse_sort_term()];
        while self.eat(TokenKind::Comma).is_some() {
            terms.push(self.parse_sort_term());
        }
        terms
    }

    fn parse_sort_term(&mut self) -> SortTerm {
        let expr = self.parse_expr();
        let mut span = expr.span();
        let mut ascending = true;
        if let Some(tok) = self.eat(TokenKind::Asc) {
            span = span.join(tok.span);
        } else if let Some(tok) = self.eat(TokenKind::Desc) {
            ascending = false;
            span = span.join(tok.span);
        }
        let mut nulls_first = ascending;
        if let Some(tok) = self.eat(TokenKind::Nulls) {
            span = span.join(tok.span);
            if let Some(tok) = self.eat(TokenKind::First) {
                nulls_first = true;
                span = span.join(tok.span);
            } else if let Some(tok) = self.eat(TokenKind::Last) {
                nulls_first = false;
                span = span.join(tok.span);
            } else {
                self.error_here("expected 'first' or 'last' after 'nulls'");
            }
        }
        SortTerm {
            expr,
            ascending,
            nulls_first,
            span,
        }
    }

    fn parse_columns(&mut self, require_name: bool) -> Vec<Column> {
        let mut columns = vec![self.parse_column(require_name)];
        while self.eat(TokenKind::Comma).is_some() {
            columns.push(self.parse_column(require_name));
        }
        columns
    }

    fn parse_column(&mut self, require_name: bool) -> Column {
        if matches!(self.kind(), TokenKind::Ident | TokenKind::QuotedIdent)
            && self.kind_at(1) == TokenKind::Assign
        {
            let name = self.parse_ident_part();
            self.advance(); // '='
            let expr = self.parse_expr();
            Column {
                span: name.span.join(expr.span()),
                name: Some(name),
                expr,
            }
        } else {
            let expr = self.parse_expr();
            if require_name {
                self.error(expr.span(), "expected 'name =' before expression");
            }
            Column {
                span: expr.span(),
                name: None,
                expr,
            }
        }
    }

    // ---- expressions --------------------------------------------------

    fn parse_expr(&mut self) -> Expr {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Expr {
        let mut lhs = self.parse_and();
        while self.eat(TokenKind::Or).is_some() {
            let rhs = self.parse_and();
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        lhs
    }

    fn parse_and(&mut self) -> Expr {
        let mut lhs = self.parse_relational();
        while self.eat(TokenKind::And).is_some() {
            let rhs = self.parse_relational();
            lhs = binary(BinOp::And, lhs, rhs);
        }
        lhs
    }

    fn parse_relational(&mut self) -> Expr {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                // A bare `=` compares, same as `==`.
                TokenKind::Eq | TokenKind::Assign => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Tilde => BinOp::Like,
                TokenKind::NotTilde => BinOp::NotLike,
                TokenKind::In => {
                    self.advance();
                    lhs = self.parse_in_list(lhs);
                    continue;
                }
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            lhs = binary(op, lhs, rhs);
        }
        lhs
    }

    fn parse_in_list(&mut self, lhs: Expr) -> Expr {
        let mut span = lhs.span();
        if self.expect(TokenKind::LParen, "expected '(' after 'in'").is_none() {
            return Expr::In {
                expr: Box::new(lhs),
                vals: Vec::new(),
                span,
            };
        }
        let mut vals = vec![self.parse_expr()];
        while self.eat(TokenKind::Comma).is_some() {
            vals.push(self.parse_expr());
        }
        match self.expect(TokenKind::RParen, "expected ')'") {
            Some(tok) => span = span.join(tok.span),
            None => span = span.join(vals.last().map_or(span, |e| e.span())),
        }
        Expr::In {
            expr: Box::new(lhs),
            vals,
            span,
        }
    }

    fn parse_additive(&mut self) -> Expr {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            lhs = binary(op, lhs, rhs);
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> Expr {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            lhs = binary(op, lhs, rhs);
        }
        lhs
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.kind() {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let tok = self.advance();
        let expr = self.parse_unary();
        Expr::Unary {
            span: tok.span.join(expr.span()),
            op,
            expr: Box::new(expr),
        }
    }

    fn parse_postfix(&mut self) -> Expr {
        let mut expr = self.parse_primary();
        // An immediately adjacent bracket-quoted token indexes the value:
        // `xs[0]` scans as `xs` followed by the quoted identifier `0`.
        while self.kind() == TokenKind::QuotedIdent
            && self.peek().span.start == expr.span().end
        {
            let tok = self.advance();
            let kind = if !tok.text.is_empty() && tok.text.bytes().all(|b| b.is_ascii_digit()) {
                LitKind::Long
            } else {
                LitKind::Str
            };
            let index = Expr::Literal {
                kind,
                text: tok.text,
                span: tok.span,
            };
            expr = Expr::Index {
                span: expr.span().join(tok.span),
                expr: Box::new(expr),
                index: Box::new(index),
            };
        }
        expr
    }

    fn parse_primary(&mut self) -> Expr {
        match self.kind() {
            TokenKind::Long | TokenKind::Real | TokenKind::Str => {
                let tok = self.advance();
                let kind = match tok.kind {
                    TokenKind::Long => LitKind::Long,
                    TokenKind::Real => LitKind::Real,
                    _ => LitKind::Str,
                };
                Expr::Literal {
                    kind,
                    text: tok.text,
                    span: tok.span,
                }
            }
            TokenKind::Ident if self.kind_at(1) == TokenKind::LParen => {
                let func = self.parse_ident_part();
                self.advance(); // '('
                let mut args = Vec::new();
                if self.kind() != TokenKind::RParen {
                    args.push(self.parse_expr());
                    while self.eat(TokenKind::Comma).is_some() {
                        args.push(self.parse_expr());
                    }
                }
                let mut span = func.span;
                match self.expect(TokenKind::RParen, "expected ')'") {
                    Some(tok) => span = span.join(tok.span),
                    None => span = span.join(args.last().map_or(span, |e| e.span())),
                }
                Expr::Call { func, args, span }
            }
            TokenKind::Ident | TokenKind::QuotedIdent => {
                Expr::Ident(self.parse_qualified_ident())
            }
            TokenKind::LParen => {
                let open = self.advance();
                let expr = self.parse_expr();
                let mut span = open.span.join(expr.span());
                if let Some(tok) = self.expect(TokenKind::RParen, "expected ')'") {
                    span = span.join(tok.span);
                }
                Expr::Paren {
                    expr: Box::new(expr),
                    span,
                }
            }
            _ => {
                self.error_here("expected expression");
                let span = self.peek().span;
                // Leave pipeline structure alone; swallow anything else so
                // parsing makes progress.
                if !matches!(
                    self.kind(),
                    TokenKind::Pipe
                        | TokenKind::Semi
                        | TokenKind::Eof
                        | TokenKind::RParen
                        | TokenKind::Comma
                        | TokenKind::By
                ) {
                    self.advance();
                }
                Expr::Error { span }
            }
        }
    }

    fn parse_qualified_ident(&mut self) -> QualifiedIdent {
        let first = self.parse_ident_part();
        let mut span = first.span;
        let mut parts = vec![first];
        while self.kind() == TokenKind::Dot
            && matches!(self.kind_at(1), TokenKind::Ident | TokenKind::QuotedIdent)
        {
            self.advance(); // '.'
            let part = self.parse_ident_part();
            span = span.join(part.span);
            parts.push(part);
        }
        QualifiedIdent { parts, span }
    }

    fn parse_ident_part(&mut self) -> Ident {
        let tok = self.advance();
        Ident {
            quoted: tok.kind == TokenKind::QuotedIdent,
            name: tok.text,
            span: tok.span,
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        span: lhs.span().join(rhs.span()),
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> TabularExpr {
        let (expr, diags) = parse(input);
        assert!(diags.is_empty(), "diagnostics for {input:?}: {diags:?}");
        expr.expect("no tree")
    }

    #[test]
    fn bare_source() {
        let expr = parse_ok("StormEvents");
        assert_eq!(expr.source.name.parts[0].name, "StormEvents");
        assert!(expr.operators.is_empty());
    }

    #[test]
    fn pipeline_order_is_preserved() {
        let expr = parse_ok("T | where a > 1 | project a | take 5");
        assert!(matches!(expr.operators[0], TabularOperator::Where { .. }));
        assert!(matches!(expr.operators[1], TabularOperator::Project { .. }));
        assert!(matches!(expr.operators[2], TabularOperator::Take { .. }));
    }

    #[test]
    fn precedence() {
        let expr = parse_ok("T | where a + b * c == d and e or f");
        let TabularOperator::Where { predicate, .. } = &expr.operators[0] else {
            panic!("expected where");
        };
        // or at the top
        let Expr::Binary { op: BinOp::Or, lhs, .. } = predicate else {
            panic!("expected or at top: {predicate:?}");
        };
        // and beneath it
        let Expr::Binary { op: BinOp::And, lhs, .. } = lhs.as_ref() else {
            panic!("expected and: {lhs:?}");
        };
        // == beneath that, with + on its left and * nested under +
        let Expr::Binary { op: BinOp::Eq, lhs, .. } = lhs.as_ref() else {
            panic!("expected ==: {lhs:?}");
        };
        let Expr::Binary { op: BinOp::Add, rhs, .. } = lhs.as_ref() else {
            panic!("expected +: {lhs:?}");
        };
        assert!(matches!(rhs.as_ref(), Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn single_equals_compares() {
        let expr = parse_ok("T | where a = 1");
        let TabularOperator::Where { predicate, .. } = &expr.operators[0] else {
            panic!("expected where");
        };
        assert!(matches!(predicate, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn assignment_vs_equality() {
        let expr = parse_ok("T | project a = 1, b == 2");
        let TabularOperator::Project { columns, .. } = &expr.operators[0] else {
            panic!("expected project");
        };
        assert_eq!(columns[0].name.as_ref().unwrap().name, "a");
        assert!(columns[1].name.is_none());
        assert!(matches!(columns[1].expr, Expr::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn sort_term_defaults() {
        let expr = parse_ok("T | sort by a, b desc, c asc nulls last");
        let TabularOperator::Sort { terms, .. } = &expr.operators[0] else {
            panic!("expected sort");
        };
        assert!(terms[0].ascending && terms[0].nulls_first);
        assert!(!terms[1].ascending && !terms[1].nulls_first);
        assert!(terms[2].ascending && !terms[2].nulls_first);
    }

    #[test]
    fn order_by_is_sort_by() {
        let expr = parse_ok("T | order by a desc");
        assert!(matches!(expr.operators[0], TabularOperator::Sort { .. }));
    }

    #[test]
    fn limit_is_take() {
        let expr = parse_ok("T | limit 10");
        assert!(matches!(expr.operators[0], TabularOperator::Take { .. }));
    }

    #[test]
    fn summarize_with_assigned_group_key() {
        let expr = parse_ok("T | summarize Total=sum(x) by Dir, IsTest=endsWith(f,'_t')");
        let TabularOperator::Summarize { aggregates, group_by, .. } = &expr.operators[0] else {
            panic!("expected summarize");
        };
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].name.as_ref().unwrap().name, "Total");
        assert_eq!(group_by.len(), 2);
        assert!(group_by[0].name.is_none());
        assert_eq!(group_by[1].name.as_ref().unwrap().name, "IsTest");
    }

    #[test]
    fn join_with_kind() {
        let expr = parse_ok("L | left join (R | where x > 0) on k, L.a == R.b");
        let TabularOperator::Join { kind, right, on, .. } = &expr.operators[0] else {
            panic!("expected join");
        };
        assert_eq!(*kind, JoinKind::Left);
        assert_eq!(right.operators.len(), 1);
        assert_eq!(on.len(), 2);
    }

    #[test]
    fn in_expression() {
        let expr = parse_ok("T | where x in (1, 2, 3)");
        let TabularOperator::Where { predicate, .. } = &expr.operators[0] else {
            panic!("expected where");
        };
        let Expr::In { vals, .. } = predicate else {
            panic!("expected in: {predicate:?}");
        };
        assert_eq!(vals.len(), 3);
    }

    #[test]
    fn index_expression() {
        let expr = parse_ok("T | where xs[0] == 'a'");
        let TabularOperator::Where { predicate, .. } = &expr.operators[0] else {
            panic!("expected where");
        };
        let Expr::Binary { lhs, .. } = predicate else {
            panic!("expected binary");
        };
        assert!(matches!(lhs.as_ref(), Expr::Index { .. }));
    }

    #[test]
    fn quoted_identifier_with_space_is_not_an_index() {
        let expr = parse_ok("T | project [a b]");
        let TabularOperator::Project { columns, .. } = &expr.operators[0] else {
            panic!("expected project");
        };
        let Expr::Ident(ident) = &columns[0].expr else {
            panic!("expected ident: {:?}", columns[0].expr);
        };
        assert!(ident.parts[0].quoted);
        assert_eq!(ident.parts[0].name, "a b");
    }

    #[test]
    fn trailing_semicolon_is_consumed() {
        parse_ok("T | count;");
    }

    #[test]
    fn unknown_operator_recovers() {
        let (expr, diags) = parse("T | frobnicate x y | take 3");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("frobnicate"));
        let expr = expr.unwrap();
        assert_eq!(expr.operators.len(), 1);
        assert!(matches!(expr.operators[0], TabularOperator::Take { .. }));
    }

    #[test]
    fn multiple_diagnostics_from_one_input() {
        let (expr, diags) = parse("T | where | bogus | take 2");
        assert!(diags.len() >= 2, "want at least two diagnostics: {diags:?}");
        let expr = expr.unwrap();
        assert!(matches!(
            expr.operators.last(),
            Some(TabularOperator::Take { .. })
        ));
    }

    #[test]
    fn missing_predicate_yields_error_expr() {
        let (expr, diags) = parse("T | where | count");
        assert!(!diags.is_empty());
        let expr = expr.unwrap();
        let TabularOperator::Where { predicate, .. } = &expr.operators[0] else {
            panic!("expected where");
        };
        assert!(matches!(predicate, Expr::Error { .. }));
    }

    #[test]
    fn lexical_errors_become_diagnostics() {
        let (_, diags) = parse("T | where a == 'oops");
        assert!(diags.iter().any(|d| d.message == "unterminated string literal"));
    }

    #[test]
    fn spans_are_contained() {
        let src = "T | summarize c=count() by x | sort by c desc | take 10";
        let (expr, diags) = parse(src);
        assert!(diags.is_empty());
        let expr = expr.unwrap();
        assert!(expr.span.end <= src.len());
        for op in &expr.operators {
            assert!(op.span().start >= expr.source.span.start);
            assert!(op.span().end <= src.len());
        }
    }

    #[test]
    fn empty_input_reports_missing_table() {
        let (expr, diags) = parse("   // just a comment\n");
        assert!(expr.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "expected table name");
    }
}
