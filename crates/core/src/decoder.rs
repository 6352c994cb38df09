//! Source text decoding: lexer and recursive-descent parser.
//!
//! Implements the Parser collaborator contract: `text -> AST`, failing with a
//! labeled syntax error on malformed input. The grammar is the ECMAScript 5
//! style subset the pipeline operates on; constructs the upstream desugarer is
//! expected to remove (arrow functions, classes, template literals, regex
//! literals, destructuring) are rejected rather than guessed at.

use crate::ast::{
    Arena, AssignOp, BinaryOp, Lit, LogicalOp, NodeId, NodeKind, UnaryOp, UpdateOp,
};
use crate::result::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Str(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    column: usize,
}

/// Multi-character punctuators first so maximal munch wins.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", ">>>", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "<<", ">>", "+=", "-=",
    "*=", "/=", "%=", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "~", "?", ":", "=", ".",
];

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, line: 1, column: 1 }
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        Error::Syntax { line: self.line, column: self.column, msg: msg.into() }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let column = self.column;
            let Some(c) = self.peek() else {
                tokens.push(Token { tok: Tok::Eof, line, column });
                return Ok(tokens);
            };

            let tok = if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
                self.lex_ident()
            } else if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
                self.lex_number()?
            } else if c == b'"' || c == b'\'' {
                self.lex_string()?
            } else {
                self.lex_punct()?
            };
            tokens.push(Token { tok, line, column });
        }
    }

    fn lex_ident(&mut self) -> Tok {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'$' {
                name.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
        Tok::Ident(name)
    }

    fn lex_number(&mut self) -> Result<Tok> {
        let mut text = String::new();
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.bump();
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    text.push(c as char);
                    self.bump();
                } else {
                    break;
                }
            }
            if text.is_empty() {
                return Err(self.error("missing hex digits"));
            }
            let value = u64::from_str_radix(&text, 16)
                .map_err(|_| self.error("hex literal out of range"))?;
            return Ok(Tok::Num(value as f64));
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c as char);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some(b'.') {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c as char);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            text.push('e');
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                text.push(self.bump().unwrap_or(b'+') as char);
            }
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    text.push(c as char);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        text.parse::<f64>()
            .map(Tok::Num)
            .map_err(|_| self.error(format!("bad number literal '{text}'")))
    }

    fn lex_string(&mut self) -> Result<Tok> {
        let quote = self.bump().unwrap_or(b'"');
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            if c == quote {
                return Ok(Tok::Str(value));
            }
            if c == b'\n' {
                return Err(self.error("newline in string literal"));
            }
            if c != b'\\' {
                value.push(c as char);
                continue;
            }
            let Some(esc) = self.bump() else {
                return Err(self.error("unterminated escape sequence"));
            };
            match esc {
                b'n' => value.push('\n'),
                b't' => value.push('\t'),
                b'r' => value.push('\r'),
                b'b' => value.push('\u{8}'),
                b'f' => value.push('\u{c}'),
                b'v' => value.push('\u{b}'),
                b'0' => value.push('\0'),
                b'x' => {
                    let code = self.lex_hex_digits(2)?;
                    value.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                }
                b'u' => {
                    let code = self.lex_hex_digits(4)?;
                    value.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                }
                b'\n' => {}
                other => value.push(other as char),
            }
        }
    }

    fn lex_hex_digits(&mut self, count: usize) -> Result<u32> {
        let mut out = 0u32;
        for _ in 0..count {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated escape sequence"));
            };
            let digit = (c as char)
                .to_digit(16)
                .ok_or_else(|| self.error("bad hex digit in escape sequence"))?;
            out = out * 16 + digit;
        }
        Ok(out)
    }

    fn lex_punct(&mut self) -> Result<Tok> {
        for punct in PUNCTUATORS {
            if self.src[self.pos..].starts_with(punct.as_bytes()) {
                for _ in 0..punct.len() {
                    self.bump();
                }
                return Ok(Tok::Punct(punct));
            }
        }
        Err(self.error(format!(
            "unexpected character '{}'",
            self.peek().map(|c| c as char).unwrap_or('?')
        )))
    }
}

/// Parse source text into an arena-allocated tree, returning the arena and
/// the `Program` root.
pub fn parse(source: &str) -> Result<(Arena, NodeId)> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0, arena: Arena::new() };
    let root = parser.parse_program()?;
    Ok((parser.arena, root))
}

/// Parse source text into an existing arena (used to synthesize fragments).
pub fn parse_into(arena: &mut Arena, source: &str) -> Result<NodeId> {
    let (other, root) = parse(source)?;
    Ok(arena.import(&other, root))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    arena: Arena,
}

impl Parser {
    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Tok {
        &self.current().tok
    }

    fn peek_ahead(&self, offset: usize) -> &Tok {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].tok
    }

    fn bump(&mut self) -> Tok {
        let tok = self.current().tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, msg: impl Into<String>) -> Error {
        let token = self.current();
        Error::Syntax { line: token.line, column: token.column, msg: msg.into() }
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Tok::Punct(q) if *q == p)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{p}', found {}", describe(self.peek()))))
        }
    }

    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Tok::Ident(name) if name == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Tok::Ident(name) => Ok(name),
            other => Err(self.error(format!("expected identifier, found {}", describe(&other)))),
        }
    }

    /// Consume a statement terminator: an explicit semicolon, or nothing when
    /// the statement is visibly closed by `}` or end of input.
    fn eat_semi(&mut self) -> Result<()> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.at_punct("}") || matches!(self.peek(), Tok::Eof) {
            return Ok(());
        }
        Err(self.error(format!("expected ';', found {}", describe(self.peek()))))
    }

    fn parse_program(&mut self) -> Result<NodeId> {
        let mut body = Vec::new();
        while !matches!(self.peek(), Tok::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(self.arena.alloc(NodeKind::Program { body }))
    }

    fn parse_statement(&mut self) -> Result<NodeId> {
        match self.peek().clone() {
            Tok::Punct("{") => self.parse_block(),
            Tok::Punct(";") => {
                self.bump();
                Ok(self.arena.alloc(NodeKind::Empty))
            }
            Tok::Ident(name) => match name.as_str() {
                "var" | "let" | "const" => {
                    self.bump();
                    let decl = self.parse_var_decl(false)?;
                    self.eat_semi()?;
                    Ok(decl)
                }
                "function" => self.parse_function(true),
                "if" => self.parse_if(),
                "while" => self.parse_while(),
                "do" => self.parse_do_while(),
                "for" => self.parse_for(),
                "switch" => self.parse_switch(),
                "try" => self.parse_try(),
                "return" => {
                    self.bump();
                    let argument = if self.at_punct(";") || self.at_punct("}") || matches!(self.peek(), Tok::Eof)
                    {
                        None
                    } else {
                        Some(self.parse_expression(false)?)
                    };
                    self.eat_semi()?;
                    Ok(self.arena.alloc(NodeKind::Return { argument }))
                }
                "break" | "continue" => {
                    self.bump();
                    let label = match self.peek() {
                        Tok::Ident(l) if !is_reserved(l) => {
                            let l = l.clone();
                            self.bump();
                            Some(l)
                        }
                        _ => None,
                    };
                    self.eat_semi()?;
                    Ok(if name == "break" {
                        self.arena.alloc(NodeKind::Break { label })
                    } else {
                        self.arena.alloc(NodeKind::Continue { label })
                    })
                }
                "throw" => {
                    self.bump();
                    let argument = self.parse_expression(false)?;
                    self.eat_semi()?;
                    Ok(self.arena.alloc(NodeKind::Throw { argument }))
                }
                _ => {
                    if !is_reserved(&name) && matches!(self.peek_ahead(1), Tok::Punct(":")) {
                        self.bump();
                        self.bump();
                        let body = self.parse_statement()?;
                        return Ok(self.arena.alloc(NodeKind::Labeled { label: name, body }));
                    }
                    self.parse_expression_statement()
                }
            },
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId> {
        let expression = self.parse_expression(false)?;
        self.eat_semi()?;
        Ok(self.arena.alloc(NodeKind::ExprStmt { expression }))
    }

    fn parse_block(&mut self) -> Result<NodeId> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.at_punct("}") {
            if matches!(self.peek(), Tok::Eof) {
                return Err(self.error("unterminated block"));
            }
            body.push(self.parse_statement()?);
        }
        self.expect_punct("}")?;
        Ok(self.arena.alloc(NodeKind::Block { body }))
    }

    /// Parse declarators after the `var` keyword has been consumed.
    fn parse_var_decl(&mut self, no_in: bool) -> Result<NodeId> {
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_ident()?;
            let id = self.arena.alloc(NodeKind::Ident { name });
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment(no_in)?)
            } else {
                None
            };
            declarations.push(self.arena.alloc(NodeKind::VarDeclarator { id, init }));
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(self.arena.alloc(NodeKind::VarDecl { declarations }))
    }

    fn parse_function(&mut self, declaration: bool) -> Result<NodeId> {
        self.bump(); // function
        let id = match self.peek() {
            Tok::Ident(name) if !is_reserved(name) => {
                let name = name.clone();
                self.bump();
                Some(self.arena.alloc(NodeKind::Ident { name }))
            }
            _ => None,
        };
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.at_punct(")") {
            let name = self.expect_ident()?;
            params.push(self.arena.alloc(NodeKind::Ident { name }));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        let body = self.parse_block()?;
        if declaration {
            let id = id.ok_or_else(|| self.error("function declaration requires a name"))?;
            Ok(self.arena.alloc(NodeKind::FunctionDecl { id, params, body }))
        } else {
            Ok(self.arena.alloc(NodeKind::FunctionExpr { id, params, body }))
        }
    }

    fn parse_if(&mut self) -> Result<NodeId> {
        self.bump();
        self.expect_punct("(")?;
        let test = self.parse_expression(false)?;
        self.expect_punct(")")?;
        let consequent = self.parse_statement()?;
        let alternate = if self.eat_kw("else") { Some(self.parse_statement()?) } else { None };
        Ok(self.arena.alloc(NodeKind::If { test, consequent, alternate }))
    }

    fn parse_while(&mut self) -> Result<NodeId> {
        self.bump();
        self.expect_punct("(")?;
        let test = self.parse_expression(false)?;
        self.expect_punct(")")?;
        let body = self.parse_statement()?;
        Ok(self.arena.alloc(NodeKind::While { test, body }))
    }

    fn parse_do_while(&mut self) -> Result<NodeId> {
        self.bump();
        let body = self.parse_statement()?;
        if !self.eat_kw("while") {
            return Err(self.error("expected 'while' after do body"));
        }
        self.expect_punct("(")?;
        let test = self.parse_expression(false)?;
        self.expect_punct(")")?;
        self.eat_semi()?;
        Ok(self.arena.alloc(NodeKind::DoWhile { body, test }))
    }

    fn parse_for(&mut self) -> Result<NodeId> {
        self.bump();
        self.expect_punct("(")?;

        let init = if self.at_punct(";") {
            None
        } else if self.at_kw("var") || self.at_kw("let") || self.at_kw("const") {
            self.bump();
            Some(self.parse_var_decl(true)?)
        } else {
            let expression = self.parse_expression(true)?;
            Some(self.arena.alloc(NodeKind::ExprStmt { expression }))
        };

        if self.eat_kw("in") {
            let left = init.ok_or_else(|| self.error("for-in requires a target"))?;
            // Unwrap the expression-statement shell for plain `for (x in y)`.
            let left = match *self.arena.kind(left) {
                NodeKind::ExprStmt { expression } => expression,
                _ => left,
            };
            let right = self.parse_expression(false)?;
            self.expect_punct(")")?;
            let body = self.parse_statement()?;
            return Ok(self.arena.alloc(NodeKind::ForIn { left, right, body }));
        }

        self.expect_punct(";")?;
        let test = if self.at_punct(";") { None } else { Some(self.parse_expression(false)?) };
        self.expect_punct(";")?;
        let update = if self.at_punct(")") { None } else { Some(self.parse_expression(false)?) };
        self.expect_punct(")")?;
        let body = self.parse_statement()?;
        Ok(self.arena.alloc(NodeKind::For { init, test, update, body }))
    }

    fn parse_switch(&mut self) -> Result<NodeId> {
        self.bump();
        self.expect_punct("(")?;
        let discriminant = self.parse_expression(false)?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.at_punct("}") {
            let test = if self.eat_kw("case") {
                let test = self.parse_expression(false)?;
                Some(test)
            } else if self.eat_kw("default") {
                None
            } else {
                return Err(self.error("expected 'case' or 'default'"));
            };
            self.expect_punct(":")?;
            let mut consequent = Vec::new();
            while !self.at_punct("}") && !self.at_kw("case") && !self.at_kw("default") {
                consequent.push(self.parse_statement()?);
            }
            cases.push(self.arena.alloc(NodeKind::SwitchCase { test, consequent }));
        }
        self.expect_punct("}")?;
        Ok(self.arena.alloc(NodeKind::Switch { discriminant, cases }))
    }

    fn parse_try(&mut self) -> Result<NodeId> {
        self.bump();
        let block = self.parse_block()?;
        let handler = if self.eat_kw("catch") {
            self.expect_punct("(")?;
            let name = self.expect_ident()?;
            let param = self.arena.alloc(NodeKind::Ident { name });
            self.expect_punct(")")?;
            let body = self.parse_block()?;
            Some(self.arena.alloc(NodeKind::Catch { param, body }))
        } else {
            None
        };
        let finalizer = if self.eat_kw("finally") { Some(self.parse_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("try requires catch or finally"));
        }
        Ok(self.arena.alloc(NodeKind::Try { block, handler, finalizer }))
    }

    fn parse_expression(&mut self, no_in: bool) -> Result<NodeId> {
        let first = self.parse_assignment(no_in)?;
        if !self.at_punct(",") {
            return Ok(first);
        }
        let mut expressions = vec![first];
        while self.eat_punct(",") {
            expressions.push(self.parse_assignment(no_in)?);
        }
        Ok(self.arena.alloc(NodeKind::Sequence { expressions }))
    }

    fn parse_assignment(&mut self, no_in: bool) -> Result<NodeId> {
        let left = self.parse_conditional(no_in)?;
        let op = match self.peek() {
            Tok::Punct("=") => Some(AssignOp::Assign),
            Tok::Punct("+=") => Some(AssignOp::Add),
            Tok::Punct("-=") => Some(AssignOp::Sub),
            Tok::Punct("*=") => Some(AssignOp::Mul),
            Tok::Punct("/=") => Some(AssignOp::Div),
            Tok::Punct("%=") => Some(AssignOp::Mod),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        if !matches!(self.arena.kind(left), NodeKind::Ident { .. } | NodeKind::Member { .. }) {
            return Err(self.error("invalid assignment target"));
        }
        self.bump();
        let right = self.parse_assignment(no_in)?;
        Ok(self.arena.alloc(NodeKind::Assign { op, left, right }))
    }

    fn parse_conditional(&mut self, no_in: bool) -> Result<NodeId> {
        let test = self.parse_binary(4, no_in)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment(false)?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment(no_in)?;
        Ok(self.arena.alloc(NodeKind::Conditional { test, consequent, alternate }))
    }

    /// Precedence-climbing over binary and logical operators.
    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> Result<NodeId> {
        let mut left = self.parse_unary(no_in)?;
        loop {
            let (prec, op) = match self.peek() {
                Tok::Punct("||") => (LogicalOp::Or.precedence(), None),
                Tok::Punct("&&") => (LogicalOp::And.precedence(), None),
                Tok::Punct(p) => match binary_op_for(p) {
                    Some(op) => (op.precedence(), Some(op)),
                    None => break,
                },
                Tok::Ident(name) if name == "in" && !no_in => {
                    (BinaryOp::In.precedence(), Some(BinaryOp::In))
                }
                Tok::Ident(name) if name == "instanceof" => {
                    (BinaryOp::InstanceOf.precedence(), Some(BinaryOp::InstanceOf))
                }
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            let logical = match self.peek() {
                Tok::Punct("||") => Some(LogicalOp::Or),
                Tok::Punct("&&") => Some(LogicalOp::And),
                _ => None,
            };
            self.bump();
            let right = self.parse_binary(prec + 1, no_in)?;
            left = match (logical, op) {
                (Some(op), _) => self.arena.alloc(NodeKind::Logical { op, left, right }),
                (None, Some(op)) => self.arena.alloc(NodeKind::Binary { op, left, right }),
                (None, None) => return Err(self.error("unreachable operator state")),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self, no_in: bool) -> Result<NodeId> {
        let op = match self.peek() {
            Tok::Punct("-") => Some(UnaryOp::Minus),
            Tok::Punct("+") => Some(UnaryOp::Plus),
            Tok::Punct("!") => Some(UnaryOp::Not),
            Tok::Punct("~") => Some(UnaryOp::BitNot),
            Tok::Ident(name) if name == "typeof" => Some(UnaryOp::TypeOf),
            Tok::Ident(name) if name == "void" => Some(UnaryOp::Void),
            Tok::Ident(name) if name == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let argument = self.parse_unary(no_in)?;
            return Ok(self.arena.alloc(NodeKind::Unary { op, argument }));
        }

        let update = match self.peek() {
            Tok::Punct("++") => Some(UpdateOp::Inc),
            Tok::Punct("--") => Some(UpdateOp::Dec),
            _ => None,
        };
        if let Some(op) = update {
            self.bump();
            let argument = self.parse_unary(no_in)?;
            return Ok(self.arena.alloc(NodeKind::Update { op, argument, prefix: true }));
        }

        let expr = self.parse_call_member(no_in)?;
        let postfix = match self.peek() {
            Tok::Punct("++") => Some(UpdateOp::Inc),
            Tok::Punct("--") => Some(UpdateOp::Dec),
            _ => None,
        };
        if let Some(op) = postfix {
            self.bump();
            return Ok(self.arena.alloc(NodeKind::Update { op, argument: expr, prefix: false }));
        }
        Ok(expr)
    }

    fn parse_call_member(&mut self, no_in: bool) -> Result<NodeId> {
        let mut expr = if self.at_kw("new") {
            self.parse_new(no_in)?
        } else {
            self.parse_primary(no_in)?
        };
        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                let property = self.arena.alloc(NodeKind::Ident { name });
                expr = self.arena.alloc(NodeKind::Member { object: expr, property, computed: false });
            } else if self.eat_punct("[") {
                let property = self.parse_expression(false)?;
                self.expect_punct("]")?;
                expr = self.arena.alloc(NodeKind::Member { object: expr, property, computed: true });
            } else if self.at_punct("(") {
                let arguments = self.parse_arguments()?;
                expr = self.arena.alloc(NodeKind::Call { callee: expr, arguments });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_new(&mut self, no_in: bool) -> Result<NodeId> {
        self.bump(); // new
        let mut callee = if self.at_kw("new") {
            self.parse_new(no_in)?
        } else {
            self.parse_primary(no_in)?
        };
        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                let property = self.arena.alloc(NodeKind::Ident { name });
                callee = self.arena.alloc(NodeKind::Member { object: callee, property, computed: false });
            } else if self.eat_punct("[") {
                let property = self.parse_expression(false)?;
                self.expect_punct("]")?;
                callee = self.arena.alloc(NodeKind::Member { object: callee, property, computed: true });
            } else {
                break;
            }
        }
        let arguments = if self.at_punct("(") { self.parse_arguments()? } else { Vec::new() };
        Ok(self.arena.alloc(NodeKind::New { callee, arguments }))
    }

    fn parse_arguments(&mut self) -> Result<Vec<NodeId>> {
        self.expect_punct("(")?;
        let mut arguments = Vec::new();
        while !self.at_punct(")") {
            arguments.push(self.parse_assignment(false)?);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self, _no_in: bool) -> Result<NodeId> {
        match self.peek().clone() {
            Tok::Punct("(") => {
                self.bump();
                let expr = self.parse_expression(false)?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => {
                self.bump();
                let mut elements = Vec::new();
                while !self.at_punct("]") {
                    elements.push(self.parse_assignment(false)?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(self.arena.alloc(NodeKind::Array { elements }))
            }
            Tok::Punct("{") => self.parse_object(),
            Tok::Num(value) => {
                self.bump();
                Ok(self.arena.alloc(NodeKind::Literal { value: Lit::Num(value) }))
            }
            Tok::Str(value) => {
                self.bump();
                Ok(self.arena.alloc(NodeKind::Literal { value: Lit::Str(value) }))
            }
            Tok::Ident(name) => match name.as_str() {
                "true" | "false" => {
                    self.bump();
                    Ok(self.arena.alloc(NodeKind::Literal { value: Lit::Bool(name == "true") }))
                }
                "null" => {
                    self.bump();
                    Ok(self.arena.alloc(NodeKind::Literal { value: Lit::Null }))
                }
                "undefined" => {
                    self.bump();
                    Ok(self.arena.alloc(NodeKind::Ident { name }))
                }
                "this" => {
                    self.bump();
                    Ok(self.arena.alloc(NodeKind::This))
                }
                "function" => self.parse_function(false),
                _ if is_reserved(&name) => {
                    Err(self.error(format!("unexpected keyword '{name}'")))
                }
                _ => {
                    self.bump();
                    Ok(self.arena.alloc(NodeKind::Ident { name }))
                }
            },
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    fn parse_object(&mut self) -> Result<NodeId> {
        self.expect_punct("{")?;
        let mut properties = Vec::new();
        while !self.at_punct("}") {
            let key = match self.bump() {
                Tok::Ident(name) => self.arena.alloc(NodeKind::Ident { name }),
                Tok::Str(value) => self.arena.alloc(NodeKind::Literal { value: Lit::Str(value) }),
                Tok::Num(value) => self.arena.alloc(NodeKind::Literal { value: Lit::Num(value) }),
                other => return Err(self.error(format!("bad property key: {}", describe(&other)))),
            };
            self.expect_punct(":")?;
            let value = self.parse_assignment(false)?;
            properties.push(self.arena.alloc(NodeKind::Property { key, value }));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(self.arena.alloc(NodeKind::ObjectLit { properties }))
    }
}

fn binary_op_for(punct: &str) -> Option<BinaryOp> {
    Some(match punct {
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        "%" => BinaryOp::Mod,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::NotEq,
        "===" => BinaryOp::StrictEq,
        "!==" => BinaryOp::StrictNotEq,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::LtEq,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::GtEq,
        "&" => BinaryOp::BitAnd,
        "|" => BinaryOp::BitOr,
        "^" => BinaryOp::BitXor,
        "<<" => BinaryOp::Shl,
        ">>" => BinaryOp::Shr,
        ">>>" => BinaryOp::UShr,
        _ => return None,
    })
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "break"
            | "case"
            | "catch"
            | "const"
            | "continue"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "in"
            | "instanceof"
            | "let"
            | "new"
            | "return"
            | "switch"
            | "throw"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
    )
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("identifier '{name}'"),
        Tok::Num(value) => format!("number {value}"),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Punct(p) => format!("'{p}'"),
        Tok::Eof => "end of input".to_string(),
    }
}
