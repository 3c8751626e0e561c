//! Scanner for PQL source text.
//!
//! Produces a flat token stream tagged with byte spans into the original
//! source. The scanner never fails: malformed input turns into [`TokenKind::Error`]
//! tokens whose text carries the message, and scanning continues.

use std::fmt;

/// A half-open byte range `[start, end)` into the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Identifiers and literals
    Ident,
    QuotedIdent,
    Long,
    Real,
    Str,

    // Keywords
    And,
    Or,
    In,
    Not,
    By,
    Asc,
    Desc,
    Nulls,
    First,
    Last,

    // Punctuation
    Pipe,
    LParen,
    RParen,
    Comma,
    Semi,
    Dot,
    /// A single `=`, equivalent to `==` in expression position.
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Tilde,
    NotTilde,

    /// Malformed input; the token text holds the message.
    Error,
    Eof,
}

/// A single token: kind, byte span, and literal text.
///
/// For identifiers the text is the (unquoted) name, for literals the decoded
/// value, for error tokens the message. Punctuation and keywords carry their
/// lexeme.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, span: Span, text: impl Into<String>) -> Self {
        Token {
            kind,
            span,
            text: text.into(),
        }
    }

    fn error(span: Span, message: impl Into<String>) -> Self {
        Token::new(TokenKind::Error, span, message)
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "in" => Some(TokenKind::In),
        "not" => Some(TokenKind::Not),
        "by" => Some(TokenKind::By),
        "asc" => Some(TokenKind::Asc),
        "desc" => Some(TokenKind::Desc),
        "nulls" => Some(TokenKind::Nulls),
        "first" => Some(TokenKind::First),
        "last" => Some(TokenKind::Last),
        _ => None,
    }
}

/// Tokenize the entire input.
///
/// The returned vector always ends with a single [`TokenKind::Eof`] sentinel.
pub fn scan(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut scanner = Scanner::new(source);
    loop {
        let tok = scanner.next_token();
        let done = tok.kind == TokenKind::Eof;
        tokens.push(tok);
        if done {
            break;
        }
    }
    tokens
}

/// A restartable, pull-based tokenizer over a source string.
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner {
            src,
            pos: 0,
            done: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    /// Skip whitespace and comments. Returns an error token when a block
    /// comment runs off the end of the input.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None => {
                                return Some(Token::error(
                                    Span::new(start, self.pos),
                                    "unterminated block comment",
                                ));
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            _ => self.pos += 1,
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    pub fn next_token(&mut self) -> Token {
        if let Some(err) = self.skip_trivia() {
            return err;
        }

        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, Span::new(start, start), ""),
        };

        match c {
            b'\'' | b'"' => self.read_string(c),
            b'[' => self.read_quoted_ident(b']'),
            b'`' => self.read_quoted_ident(b'`'),
            b'0'..=b'9' => self.read_number(),
            b'.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.read_word(),
            _ => self.read_punct(),
        }
    }

    fn read_word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
        {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let kind = keyword(word).unwrap_or(TokenKind::Ident);
        Token::new(kind, Span::new(start, self.pos), word)
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        let mut real = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            real = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let digit_at = |n: usize| self.peek_at(n).is_some_and(|c| c.is_ascii_digit());
            let signed = matches!(self.peek_at(1), Some(b'+' | b'-'));
            if digit_at(1) || (signed && digit_at(2)) {
                real = true;
                self.pos += if signed { 2 } else { 1 };
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let kind = if real { TokenKind::Real } else { TokenKind::Long };
        Token::new(kind, Span::new(start, self.pos), &self.src[start..self.pos])
    }

    fn read_string(&mut self, quote: u8) -> Token {
        let start = self.pos;
        self.pos += 1;
        let mut text = String::new();
        let mut seg = self.pos;
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    // Resume scanning at the end of the line so the rest of
                    // the input still tokenizes.
                    return Token::error(
                        Span::new(start, self.pos),
                        "unterminated string literal",
                    );
                }
                Some(c) if c == quote => {
                    text.push_str(&self.src[seg..self.pos]);
                    self.pos += 1;
                    return Token::new(TokenKind::Str, Span::new(start, self.pos), text);
                }
                Some(b'\\') => {
                    text.push_str(&self.src[seg..self.pos]);
                    self.pos += 1;
                    if matches!(self.peek(), None | Some(b'\n')) {
                        return Token::error(
                            Span::new(start, self.pos),
                            "unterminated string literal",
                        );
                    }
                    self.read_escape(&mut text);
                    seg = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Decode one escape sequence (cursor is on the character after `\`).
    /// Unknown escapes pass the escaped character through unchanged.
    fn read_escape(&mut self, text: &mut String) {
        let hex = |c: u8| (c as char).to_digit(16);
        match self.peek() {
            Some(b'\\') => {
                text.push('\\');
                self.pos += 1;
            }
            Some(b'\'') => {
                text.push('\'');
                self.pos += 1;
            }
            Some(b'"') => {
                text.push('"');
                self.pos += 1;
            }
            Some(b'n') => {
                text.push('\n');
                self.pos += 1;
            }
            Some(b'r') => {
                text.push('\r');
                self.pos += 1;
            }
            Some(b't') => {
                text.push('\t');
                self.pos += 1;
            }
            Some(b'0') => {
                text.push('\0');
                self.pos += 1;
            }
            Some(b'x')
                if self.peek_at(1).and_then(hex).is_some()
                    && self.peek_at(2).and_then(hex).is_some() =>
            {
                let value = hex(self.peek_at(1).unwrap()).unwrap() * 16
                    + hex(self.peek_at(2).unwrap()).unwrap();
                text.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
                self.pos += 3;
            }
            Some(b'u')
                if (1..=4).all(|n| self.peek_at(n).and_then(hex).is_some()) =>
            {
                let mut value = 0;
                for n in 1..=4 {
                    value = value * 16 + hex(self.peek_at(n).unwrap()).unwrap();
                }
                text.push(char::from_u32(value).unwrap_or('\u{FFFD}'));
                self.pos += 5;
            }
            _ => {
                let ch = self.src[self.pos..].chars().next().unwrap();
                text.push(ch);
                self.pos += ch.len_utf8();
            }
        }
    }

    fn read_quoted_ident(&mut self, close: u8) -> Token {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c == close {
                let text = self.src[start + 1..self.pos].to_string();
                self.pos += 1;
                return Token::new(TokenKind::QuotedIdent, Span::new(start, self.pos), text);
            }
            self.pos += 1;
        }
        Token::error(Span::new(start, self.pos), "unterminated quoted identifier")
    }

    fn read_punct(&mut self) -> Token {
        let start = self.pos;
        let c = self.peek().unwrap();
        // Longest match first for the two-character operators.
        let two = |this: &mut Self, kind| {
            this.pos += 2;
            Token::new(kind, Span::new(start, start + 2), &this.src[start..start + 2])
        };
        let one = |this: &mut Self, kind| {
            this.pos += 1;
            Token::new(kind, Span::new(start, start + 1), &this.src[start..start + 1])
        };
        match (c, self.peek_at(1)) {
            (b'=', Some(b'=')) => two(self, TokenKind::Eq),
            (b'!', Some(b'=')) => two(self, TokenKind::Ne),
            (b'!', Some(b'~')) => two(self, TokenKind::NotTilde),
            (b'<', Some(b'=')) => two(self, TokenKind::Le),
            (b'>', Some(b'=')) => two(self, TokenKind::Ge),
            (b'=', _) => one(self, TokenKind::Assign),
            (b'<', _) => one(self, TokenKind::Lt),
            (b'>', _) => one(self, TokenKind::Gt),
            (b'~', _) => one(self, TokenKind::Tilde),
            (b'|', _) => one(self, TokenKind::Pipe),
            (b'(', _) => one(self, TokenKind::LParen),
            (b')', _) => one(self, TokenKind::RParen),
            (b',', _) => one(self, TokenKind::Comma),
            (b';', _) => one(self, TokenKind::Semi),
            (b'.', _) => one(self, TokenKind::Dot),
            (b'+', _) => one(self, TokenKind::Plus),
            (b'-', _) => one(self, TokenKind::Minus),
            (b'*', _) => one(self, TokenKind::Star),
            (b'/', _) => one(self, TokenKind::Slash),
            (b'%', _) => one(self, TokenKind::Percent),
            _ => {
                let ch = self.src[self.pos..].chars().next().unwrap();
                self.pos += ch.len_utf8();
                Token::error(
                    Span::new(start, self.pos),
                    format!("unexpected character {ch:?}"),
                )
            }
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let tok = self.next_token();
        if tok.kind == TokenKind::Eof {
            self.done = true;
        }
        Some(tok)
    }
}
