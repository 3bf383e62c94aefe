use crate::ast::{
    BinOp, BoolOp, CmpOp, Expr, FromClause, ImportClause, Literal, Stmt, StmtKind, Target, UnaryOp,
};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::RuntimeError;

/// Keywords recognized by the grammar.
const KEYWORDS: &[&str] = &[
    "and", "as", "elif", "else", "from", "if", "import", "in", "not", "or", "pass", "None",
    "True", "False",
];

/// Keywords of the full language that this interpreter does not implement.
const UNSUPPORTED: &[&str] = &[
    "assert", "async", "await", "break", "class", "continue", "def", "del", "except", "finally",
    "for", "global", "is", "lambda", "nonlocal", "raise", "return", "try", "while", "with",
    "yield",
];

/// A compiled module body, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeUnit {
    origin: String,
    body: Vec<Stmt>,
}

impl CodeUnit {
    /// Where the source came from; used in error messages and as `__file__`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn body(&self) -> &[Stmt] {
        &self.body
    }
}

/// Compile source text into a [`CodeUnit`]. Syntax errors carry `origin` and
/// the offending line.
pub fn compile(source: &str, origin: &str) -> Result<CodeUnit, RuntimeError> {
    let tokens = tokenize(source, origin)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        origin,
    };
    let mut body = Vec::new();
    while *parser.peek() != TokenKind::Eof {
        body.push(parser.statement()?);
    }
    Ok(CodeUnit {
        origin: origin.to_owned(),
        body,
    })
}

static EOF: TokenKind = TokenKind::Eof;

/// Deepest nesting of brackets, unary operators and blocks the parser
/// accepts. Every level costs stack in both the parser and the evaluator.
pub const MAX_NESTING: usize = 100;

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    origin: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map_or(&EOF, |t| &t.kind)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::Syntax {
            origin: self.origin.to_owned(),
            line: self.line(),
            message: message.into(),
        }
    }

    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(format!("too many nested {what}")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Name(n) if n == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), RuntimeError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {}", describe(self.peek()))))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), RuntimeError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{keyword}', found {}", describe(self.peek()))))
        }
    }

    fn identifier(&mut self) -> Result<String, RuntimeError> {
        match self.peek() {
            TokenKind::Name(n) if !is_reserved(n) => {
                let n = n.clone();
                self.pos += 1;
                Ok(n)
            }
            other => Err(self.error(format!("expected identifier, found {}", describe(other)))),
        }
    }

    fn dotted_name(&mut self) -> Result<String, RuntimeError> {
        let mut name = self.identifier()?;
        while self.eat(&TokenKind::Dot) {
            name.push('.');
            name.push_str(&self.identifier()?);
        }
        Ok(name)
    }

    fn alias(&mut self) -> Result<Option<String>, RuntimeError> {
        if self.eat_keyword("as") {
            Ok(Some(self.identifier()?))
        } else {
            Ok(None)
        }
    }

    fn end_of_statement(&mut self) -> Result<(), RuntimeError> {
        if self.eat(&TokenKind::Newline) || *self.peek() == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected end of statement, found {}",
                describe(self.peek())
            )))
        }
    }

    // --- statements ---

    fn statement(&mut self) -> Result<Stmt, RuntimeError> {
        if self.at_keyword("if") {
            return self.if_statement();
        }
        if *self.peek() == TokenKind::Indent {
            return Err(self.error("unexpected indent"));
        }
        self.simple_statement()
    }

    fn simple_statement(&mut self) -> Result<Stmt, RuntimeError> {
        let line = self.line();
        if let TokenKind::Name(n) = self.peek() {
            if UNSUPPORTED.contains(&n.as_str()) {
                return Err(self.error(format!("'{n}' statements are not supported")));
            }
        }

        let kind = if self.eat_keyword("pass") {
            StmtKind::Pass
        } else if self.eat_keyword("import") {
            self.import_statement()?
        } else if self.eat_keyword("from") {
            self.from_import_statement()?
        } else {
            let expr = self.expression()?;
            if self.eat(&TokenKind::Assign) {
                let target = self.assignment_target(expr)?;
                let value = self.expression()?;
                StmtKind::Assign(target, value)
            } else {
                StmtKind::Expr(expr)
            }
        };
        self.end_of_statement()?;
        Ok(Stmt { line, kind })
    }

    fn assignment_target(&self, expr: Expr) -> Result<Target, RuntimeError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attribute(object, attr) => Ok(Target::Attribute(*object, attr)),
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn import_statement(&mut self) -> Result<StmtKind, RuntimeError> {
        let mut clauses = Vec::new();
        loop {
            let module = self.dotted_name()?;
            let alias = self.alias()?;
            clauses.push(ImportClause { module, alias });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(StmtKind::Import(clauses))
    }

    fn from_import_statement(&mut self) -> Result<StmtKind, RuntimeError> {
        let mut level = 0;
        while self.eat(&TokenKind::Dot) {
            level += 1;
        }
        let module = if self.at_keyword("import") {
            None
        } else {
            Some(self.dotted_name()?)
        };
        if level == 0 && module.is_none() {
            return Err(self.error("expected module name after 'from'"));
        }
        self.expect_keyword("import")?;

        let parenthesized = self.eat(&TokenKind::LParen);
        let mut names = Vec::new();
        loop {
            if parenthesized && *self.peek() == TokenKind::RParen && !names.is_empty() {
                break;
            }
            if *self.peek() == TokenKind::Star {
                return Err(self.error("wildcard imports are not supported"));
            }
            let name = self.identifier()?;
            let alias = self.alias()?;
            names.push(FromClause { name, alias });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if parenthesized {
            self.expect(&TokenKind::RParen, "')'")?;
        }
        Ok(StmtKind::FromImport {
            level,
            module,
            names,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt, RuntimeError> {
        let line = self.line();
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        let condition = self.expression()?;
        branches.push((condition, self.block()?));

        let mut orelse = Vec::new();
        loop {
            if self.eat_keyword("elif") {
                let condition = self.expression()?;
                branches.push((condition, self.block()?));
            } else if self.eat_keyword("else") {
                orelse = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(Stmt {
            line,
            kind: StmtKind::If { branches, orelse },
        })
    }

    /// `: NEWLINE INDENT stmt+ DEDENT` or `: simple_stmt` on the same line.
    fn block(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        self.nested("blocks", Self::block_body)
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, RuntimeError> {
        self.expect(&TokenKind::Colon, "':'")?;
        if !self.eat(&TokenKind::Newline) {
            return Ok(vec![self.simple_statement()?]);
        }
        if !self.eat(&TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if *self.peek() == TokenKind::Eof {
                break;
            }
            body.push(self.statement()?);
        }
        Ok(body)
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr, RuntimeError> {
        self.nested("expressions", Self::or_expr)
    }

    fn or_expr(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Bool(BoolOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::Bool(BoolOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, RuntimeError> {
        if self.eat_keyword("not") {
            let operand = self.nested("expressions", Self::not_expr)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison_op(&mut self) -> Result<Option<CmpOp>, RuntimeError> {
        let op = match self.peek() {
            TokenKind::Eq => CmpOp::Eq,
            TokenKind::NotEq => CmpOp::NotEq,
            TokenKind::Lt => CmpOp::Lt,
            TokenKind::LtEq => CmpOp::LtEq,
            TokenKind::Gt => CmpOp::Gt,
            TokenKind::GtEq => CmpOp::GtEq,
            TokenKind::Name(n) if n == "in" => CmpOp::In,
            TokenKind::Name(n) if n == "not" => {
                self.pos += 1;
                self.expect_keyword("in")?;
                return Ok(Some(CmpOp::NotIn));
            }
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(op))
    }

    fn comparison(&mut self) -> Result<Expr, RuntimeError> {
        let left = self.arith()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op()? {
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare(Box::new(left), rest))
        }
    }

    fn arith(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, RuntimeError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, RuntimeError> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.nested("expressions", Self::unary)?;
            return Ok(match operand {
                Expr::Literal(Literal::Int(n)) => Expr::Literal(Literal::Int(-n)),
                other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
            });
        }
        if self.eat(&TokenKind::Plus) {
            return self.nested("expressions", Self::unary);
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, RuntimeError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat(&TokenKind::LParen) {
                let args = self.sequence(&TokenKind::RParen, "')'")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat(&TokenKind::Dot) {
                let attr = self.identifier()?;
                expr = Expr::Attribute(Box::new(expr), attr);
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket, "']'")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`, allowing a trailing comma.
    fn sequence(&mut self, close: &TokenKind, what: &str) -> Result<Vec<Expr>, RuntimeError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close, what)?;
                break;
            }
        }
        Ok(items)
    }

    fn atom(&mut self) -> Result<Expr, RuntimeError> {
        match self.advance() {
            TokenKind::Int(n) => Ok(Expr::Literal(Literal::Int(n))),
            TokenKind::Str(mut s) => {
                while let TokenKind::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Literal::Str(s)))
            }
            TokenKind::Name(n) => match n.as_str() {
                "None" => Ok(Expr::Literal(Literal::None)),
                "True" => Ok(Expr::Literal(Literal::Bool(true))),
                "False" => Ok(Expr::Literal(Literal::Bool(false))),
                _ if is_reserved(&n) => {
                    self.pos -= 1;
                    Err(self.error(format!("unexpected keyword '{n}'")))
                }
                _ => Ok(Expr::Name(n)),
            },
            TokenKind::LParen => {
                let inner = self.expression()?;
                if *self.peek() == TokenKind::Comma {
                    return Err(self.error("tuples are not supported"));
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => Ok(Expr::List(self.sequence(&TokenKind::RBracket, "']'")?)),
            other => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error(format!("invalid syntax near {}", describe(&other))))
            }
        }
    }
}

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || UNSUPPORTED.contains(&name)
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Name(n) => format!("'{n}'"),
        TokenKind::Int(n) => format!("'{n}'"),
        TokenKind::Str(_) => "string literal".to_owned(),
        TokenKind::Newline => "end of line".to_owned(),
        TokenKind::Indent => "indent".to_owned(),
        TokenKind::Dedent => "dedent".to_owned(),
        TokenKind::Eof => "end of file".to_owned(),
        other => format!("{other:?}"),
    }
}
