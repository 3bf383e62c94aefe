use crate::RuntimeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    DoubleSlash,
    Percent,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

const TAB_WIDTH: usize = 8;

/// Split source text into tokens, synthesizing `Indent`/`Dedent` from leading
/// whitespace the way the block structure of the language requires.
pub fn tokenize(source: &str, origin: &str) -> Result<Vec<Token>, RuntimeError> {
    Lexer::new(source, origin).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    origin: &'a str,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    fn new(source: &str, origin: &'a str) -> Self {
        Self {
            chars: source.trim_start_matches('\u{feff}').chars().collect(),
            pos: 0,
            line: 1,
            origin,
            tokens: Vec::new(),
            indents: vec![0],
            depth: 0,
            at_line_start: true,
        }
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Syntax {
            origin: self.origin.to_owned(),
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, RuntimeError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.depth == 0 {
                if self.handle_indentation()? {
                    continue;
                }
            }
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push_newline();
                        self.at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\'' | '"' => self.lex_string(c)?,
                c if c.is_ascii_digit() => self.lex_number()?,
                c if c == '_' || c.is_alphabetic() => self.lex_name(),
                _ => self.lex_operator(c)?,
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected EOF: unclosed bracket"));
        }
        self.push_newline();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn push_newline(&mut self) {
        let needs = !matches!(
            self.tokens.last().map(|t| &t.kind),
            None | Some(TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
        );
        if needs {
            self.push(TokenKind::Newline);
        }
    }

    /// Measure leading whitespace of a logical line. Returns `true` when the
    /// line was blank or comment-only and has been consumed entirely.
    fn handle_indentation(&mut self) -> Result<bool, RuntimeError> {
        let mut width = 0;
        let mut cursor = self.pos;
        while let Some(&c) = self.chars.get(cursor) {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' | '\r' => {}
                _ => break,
            }
            cursor += 1;
        }
        match self.chars.get(cursor) {
            None => {
                self.pos = cursor;
                return Ok(true);
            }
            Some('\n') => {
                self.pos = cursor + 1;
                self.line += 1;
                return Ok(true);
            }
            Some('#') => {
                self.pos = cursor;
                self.skip_comment();
                return Ok(true);
            }
            Some(_) => {}
        }

        self.pos = cursor;
        self.at_line_start = false;
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent);
        } else {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                self.push(TokenKind::Dedent);
            }
            if width != self.indents.last().copied().unwrap_or(0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(false)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn lex_name(&mut self) {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Name(name));
    }

    fn lex_number(&mut self) -> Result<(), RuntimeError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.peek().is_some_and(|c| c == '.' || c.is_alphabetic()) {
            return Err(self.error("only integer literals are supported"));
        }
        let digits: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error(format!("integer literal too large: {digits}")))?;
        self.push(TokenKind::Int(value));
        Ok(())
    }

    fn lex_string(&mut self, quote: char) -> Result<(), RuntimeError> {
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let start_line = self.line;
        self.pos += if triple { 3 } else { 1 };

        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                self.line = start_line;
                return Err(self.error("unterminated string literal"));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return Err(self.error("unterminated string literal"));
                }
                self.line += 1;
            }
            if c == '\\' {
                self.pos += 1;
                let Some(escaped) = self.peek() else {
                    return Err(self.error("unterminated string literal"));
                };
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' => value.push('\\'),
                    '\'' => value.push('\''),
                    '"' => value.push('"'),
                    '\n' => self.line += 1,
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.pos += 1;
                continue;
            }
            value.push(c);
            self.pos += 1;
        }

        let token = Token {
            kind: TokenKind::Str(value),
            line: start_line,
        };
        self.tokens.push(token);
        Ok(())
    }

    fn lex_operator(&mut self, c: char) -> Result<(), RuntimeError> {
        let next = self.peek_at(1);
        let (kind, width) = match (c, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('<', Some('=')) => (TokenKind::LtEq, 2),
            ('>', Some('=')) => (TokenKind::GtEq, 2),
            ('/', Some('/')) => (TokenKind::DoubleSlash, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('%', _) => (TokenKind::Percent, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('(', _) => {
                self.depth += 1;
                (TokenKind::LParen, 1)
            }
            ('[', _) => {
                self.depth += 1;
                (TokenKind::LBracket, 1)
            }
            (')' | ']', _) => {
                if self.depth == 0 {
                    return Err(self.error(format!("unmatched '{c}'")));
                }
                self.depth -= 1;
                let kind = if c == ')' {
                    TokenKind::RParen
                } else {
                    TokenKind::RBracket
                };
                (kind, 1)
            }
            _ => return Err(self.error(format!("invalid character '{c}'"))),
        };
        self.pos += width;
        self.push(kind);
        Ok(())
    }
}
