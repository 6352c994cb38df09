//! Source text re-emission.
//!
//! Implements the Printer collaborator contract: `AST -> text` with the
//! standard format knobs (literal renumbering, hexadecimal preference, quote
//! style, compact whitespace). Operator precedence drives parenthesization so
//! the output re-parses to the same tree.

use crate::ast::{Arena, Lit, NodeId, NodeKind, UnaryOp};

/// Quote style for string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// Pick whichever quote needs fewer escapes (double on ties).
    #[default]
    Auto,
    Single,
    Double,
}

/// Printer configuration.
#[derive(Debug, Clone, Default)]
pub struct EmitOptions {
    /// Re-render numeric literals in their shortest form.
    pub renumber: bool,
    /// Allow hexadecimal renderings of integer literals.
    pub hexadecimal: bool,
    /// String quote style.
    pub quotes: QuoteStyle,
    /// Suppress all cosmetic whitespace.
    pub compact: bool,
}

impl EmitOptions {
    /// The configuration the `compress` feature maps to.
    pub fn compressed() -> Self {
        Self { renumber: true, hexadecimal: true, quotes: QuoteStyle::Auto, compact: true }
    }
}

/// Render the tree rooted at `root` as source text.
pub fn emit(arena: &Arena, root: NodeId, options: &EmitOptions) -> String {
    let mut emitter = Emitter { arena, options, out: String::new(), indent: 0 };
    emitter.emit_statement(root);
    if !options.compact && !emitter.out.ends_with('\n') {
        emitter.out.push('\n');
    }
    emitter.out
}

struct Emitter<'a> {
    arena: &'a Arena,
    options: &'a EmitOptions,
    out: String,
    indent: usize,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

impl<'a> Emitter<'a> {
    /// Append a token, inserting a space when two word-like tokens would
    /// otherwise fuse.
    fn tok(&mut self, s: &str) {
        if let (Some(last), Some(first)) = (self.out.chars().last(), s.chars().next()) {
            if is_word_char(last) && is_word_char(first) {
                self.out.push(' ');
            }
        }
        self.out.push_str(s);
    }

    /// Cosmetic space, dropped in compact mode.
    fn sp(&mut self) {
        if !self.options.compact && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
    }

    /// Newline plus indentation, dropped in compact mode.
    fn nl(&mut self) {
        if !self.options.compact {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
        }
    }

    fn emit_statements(&mut self, stmts: &[NodeId]) {
        for (i, stmt) in stmts.iter().enumerate() {
            if i > 0 {
                self.nl();
            }
            self.emit_statement(*stmt);
        }
    }

    fn emit_statement(&mut self, id: NodeId) {
        match self.arena.kind(id) {
            NodeKind::Program { body } => {
                let body = body.clone();
                self.emit_statements(&body);
            }
            NodeKind::Block { body } => {
                let body = body.clone();
                self.tok("{");
                self.indent += 1;
                if !body.is_empty() {
                    self.nl();
                    self.emit_statements(&body);
                }
                self.indent -= 1;
                self.nl();
                self.tok("}");
            }
            NodeKind::VarDecl { .. } => {
                self.emit_var_decl(id);
                self.tok(";");
            }
            NodeKind::ExprStmt { expression } => {
                let expression = *expression;
                if self.needs_statement_parens(expression) {
                    self.tok("(");
                    self.emit_expr(expression, 1);
                    self.tok(")");
                } else {
                    self.emit_expr(expression, 1);
                }
                self.tok(";");
            }
            NodeKind::If { test, consequent, alternate } => {
                let (test, consequent, alternate) = (*test, *consequent, *alternate);
                self.tok("if");
                self.sp();
                self.tok("(");
                self.emit_expr(test, 1);
                self.tok(")");
                self.sp();
                self.emit_statement(consequent);
                if let Some(alternate) = alternate {
                    self.sp();
                    self.tok("else");
                    self.sp();
                    self.emit_statement(alternate);
                }
            }
            NodeKind::While { test, body } => {
                let (test, body) = (*test, *body);
                self.tok("while");
                self.sp();
                self.tok("(");
                self.emit_expr(test, 1);
                self.tok(")");
                self.sp();
                self.emit_statement(body);
            }
            NodeKind::DoWhile { body, test } => {
                let (body, test) = (*body, *test);
                self.tok("do");
                self.sp();
                self.emit_statement(body);
                self.sp();
                self.tok("while");
                self.sp();
                self.tok("(");
                self.emit_expr(test, 1);
                self.tok(")");
                self.tok(";");
            }
            NodeKind::For { init, test, update, body } => {
                let (init, test, update, body) = (*init, *test, *update, *body);
                self.tok("for");
                self.sp();
                self.tok("(");
                if let Some(init) = init {
                    match self.arena.kind(init) {
                        NodeKind::VarDecl { .. } => self.emit_var_decl(init),
                        NodeKind::ExprStmt { expression } => self.emit_expr(*expression, 1),
                        _ => self.emit_expr(init, 1),
                    }
                }
                self.tok(";");
                if let Some(test) = test {
                    self.sp();
                    self.emit_expr(test, 1);
                }
                self.tok(";");
                if let Some(update) = update {
                    self.sp();
                    self.emit_expr(update, 1);
                }
                self.tok(")");
                self.sp();
                self.emit_statement(body);
            }
            NodeKind::ForIn { left, right, body } => {
                let (left, right, body) = (*left, *right, *body);
                self.tok("for");
                self.sp();
                self.tok("(");
                match self.arena.kind(left) {
                    NodeKind::VarDecl { .. } => self.emit_var_decl(left),
                    _ => self.emit_expr(left, 15),
                }
                self.tok("in");
                self.emit_expr(right, 1);
                self.tok(")");
                self.sp();
                self.emit_statement(body);
            }
            NodeKind::Switch { discriminant, cases } => {
                let (discriminant, cases) = (*discriminant, cases.clone());
                self.tok("switch");
                self.sp();
                self.tok("(");
                self.emit_expr(discriminant, 1);
                self.tok(")");
                self.sp();
                self.tok("{");
                self.indent += 1;
                for case in cases {
                    self.nl();
                    self.emit_switch_case(case);
                }
                self.indent -= 1;
                self.nl();
                self.tok("}");
            }
            NodeKind::Try { block, handler, finalizer } => {
                let (block, handler, finalizer) = (*block, *handler, *finalizer);
                self.tok("try");
                self.sp();
                self.emit_statement(block);
                if let Some(handler) = handler {
                    if let NodeKind::Catch { param, body } = self.arena.kind(handler) {
                        let (param, body) = (*param, *body);
                        self.sp();
                        self.tok("catch");
                        self.sp();
                        self.tok("(");
                        self.emit_expr(param, 1);
                        self.tok(")");
                        self.sp();
                        self.emit_statement(body);
                    }
                }
                if let Some(finalizer) = finalizer {
                    self.sp();
                    self.tok("finally");
                    self.sp();
                    self.emit_statement(finalizer);
                }
            }
            NodeKind::Labeled { label, body } => {
                let (label, body) = (label.clone(), *body);
                self.tok(&label);
                self.tok(":");
                self.sp();
                self.emit_statement(body);
            }
            NodeKind::Return { argument } => {
                let argument = *argument;
                self.tok("return");
                if let Some(argument) = argument {
                    self.emit_expr(argument, 2);
                }
                self.tok(";");
            }
            NodeKind::Break { label } => {
                let label = label.clone();
                self.tok("break");
                if let Some(label) = label {
                    self.tok(&label);
                }
                self.tok(";");
            }
            NodeKind::Continue { label } => {
                let label = label.clone();
                self.tok("continue");
                if let Some(label) = label {
                    self.tok(&label);
                }
                self.tok(";");
            }
            NodeKind::Throw { argument } => {
                let argument = *argument;
                self.tok("throw");
                self.emit_expr(argument, 1);
                self.tok(";");
            }
            NodeKind::Empty => self.tok(";"),
            NodeKind::FunctionDecl { id, params, body } => {
                let (id, params, body) = (*id, params.clone(), *body);
                self.tok("function");
                self.emit_expr(id, 19);
                self.emit_params(&params);
                self.sp();
                self.emit_statement(body);
            }
            _ => {
                // Expression in a statement slot; degrade gracefully.
                self.emit_expr(id, 1);
                self.tok(";");
            }
        }
    }

    fn emit_switch_case(&mut self, id: NodeId) {
        if let NodeKind::SwitchCase { test, consequent } = self.arena.kind(id) {
            let (test, consequent) = (*test, consequent.clone());
            match test {
                Some(test) => {
                    self.tok("case");
                    self.emit_expr(test, 2);
                }
                None => self.tok("default"),
            }
            self.tok(":");
            self.indent += 1;
            for stmt in consequent {
                self.nl();
                self.emit_statement(stmt);
            }
            self.indent -= 1;
        }
    }

    fn emit_var_decl(&mut self, id: NodeId) {
        if let NodeKind::VarDecl { declarations } = self.arena.kind(id) {
            let declarations = declarations.clone();
            self.tok("var");
            for (i, declarator) in declarations.iter().enumerate() {
                if i > 0 {
                    self.tok(",");
                    self.sp();
                }
                if let NodeKind::VarDeclarator { id, init } = self.arena.kind(*declarator) {
                    let (id, init) = (*id, *init);
                    self.emit_expr(id, 19);
                    if let Some(init) = init {
                        self.sp();
                        self.tok("=");
                        self.sp();
                        self.emit_expr(init, 2);
                    }
                }
            }
        }
    }

    fn emit_params(&mut self, params: &[NodeId]) {
        self.tok("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.tok(",");
                self.sp();
            }
            self.emit_expr(*param, 2);
        }
        self.tok(")");
    }

    /// True when an expression statement would otherwise begin with `function`
    /// or `{` and be misparsed.
    fn needs_statement_parens(&self, id: NodeId) -> bool {
        match self.arena.kind(id) {
            NodeKind::FunctionExpr { .. } | NodeKind::ObjectLit { .. } => true,
            NodeKind::Member { object, .. } => self.needs_statement_parens(*object),
            NodeKind::Call { callee, .. } => self.needs_statement_parens(*callee),
            NodeKind::Binary { left, .. }
            | NodeKind::Logical { left, .. }
            | NodeKind::Assign { left, .. } => self.needs_statement_parens(*left),
            NodeKind::Conditional { test, .. } => self.needs_statement_parens(*test),
            NodeKind::Sequence { expressions } => expressions
                .first()
                .map(|first| self.needs_statement_parens(*first))
                .unwrap_or(false),
            NodeKind::Update { argument, prefix: false, .. } => self.needs_statement_parens(*argument),
            _ => false,
        }
    }

    fn precedence(&self, id: NodeId) -> u8 {
        match self.arena.kind(id) {
            NodeKind::Sequence { .. } => 1,
            NodeKind::Assign { .. } => 2,
            NodeKind::Conditional { .. } => 3,
            NodeKind::Logical { op, .. } => op.precedence(),
            NodeKind::Binary { op, .. } => op.precedence(),
            NodeKind::Unary { .. } => 14,
            NodeKind::Update { prefix, .. } => {
                if *prefix {
                    14
                } else {
                    15
                }
            }
            NodeKind::Call { .. } | NodeKind::New { .. } => 17,
            NodeKind::Member { .. } => 18,
            _ => 19,
        }
    }

    fn emit_expr(&mut self, id: NodeId, min_prec: u8) {
        let prec = self.precedence(id);
        if prec < min_prec {
            self.tok("(");
            self.emit_expr_inner(id, prec);
            self.tok(")");
        } else {
            self.emit_expr_inner(id, prec);
        }
    }

    fn emit_expr_inner(&mut self, id: NodeId, prec: u8) {
        match self.arena.kind(id) {
            NodeKind::Ident { name } => {
                let name = name.clone();
                self.tok(&name);
            }
            NodeKind::Literal { value } => {
                let value = value.clone();
                self.emit_literal(&value);
            }
            NodeKind::This => self.tok("this"),
            NodeKind::Array { elements } => {
                let elements = elements.clone();
                self.tok("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.tok(",");
                        self.sp();
                    }
                    self.emit_expr(*element, 2);
                }
                self.tok("]");
            }
            NodeKind::ObjectLit { properties } => {
                let properties = properties.clone();
                self.tok("{");
                for (i, property) in properties.iter().enumerate() {
                    if i > 0 {
                        self.tok(",");
                        self.sp();
                    }
                    if let NodeKind::Property { key, value } = self.arena.kind(*property) {
                        let (key, value) = (*key, *value);
                        self.emit_expr(key, 19);
                        self.tok(":");
                        self.sp();
                        self.emit_expr(value, 2);
                    }
                }
                self.tok("}");
            }
            NodeKind::Member { object, property, computed } => {
                let (object, property, computed) = (*object, *property, *computed);
                let object_min = if matches!(self.arena.kind(object), NodeKind::Literal { value: Lit::Num(_) }) {
                    // `5.x` is a lexing hazard; force parens around the number.
                    19
                } else {
                    17
                };
                if object_min == 19 && self.precedence(object) == 19 {
                    self.tok("(");
                    self.emit_expr(object, 1);
                    self.tok(")");
                } else {
                    self.emit_expr(object, object_min);
                }
                if computed {
                    self.tok("[");
                    self.emit_expr(property, 1);
                    self.tok("]");
                } else {
                    self.tok(".");
                    self.emit_expr(property, 19);
                }
            }
            NodeKind::Call { callee, arguments } => {
                let (callee, arguments) = (*callee, arguments.clone());
                if matches!(self.arena.kind(callee), NodeKind::FunctionExpr { .. }) {
                    self.tok("(");
                    self.emit_expr(callee, 1);
                    self.tok(")");
                } else {
                    self.emit_expr(callee, 17);
                }
                self.emit_args(&arguments);
            }
            NodeKind::New { callee, arguments } => {
                let (callee, arguments) = (*callee, arguments.clone());
                self.tok("new");
                self.emit_expr(callee, 18);
                self.emit_args(&arguments);
            }
            NodeKind::FunctionExpr { id, params, body } => {
                let (id, params, body) = (*id, params.clone(), *body);
                self.tok("function");
                if let Some(id) = id {
                    self.emit_expr(id, 19);
                }
                self.emit_params(&params);
                self.sp();
                self.emit_statement(body);
            }
            NodeKind::Unary { op, argument } => {
                let (op, argument) = (*op, *argument);
                self.tok(op.as_str());
                let guard = matches!(op, UnaryOp::Minus | UnaryOp::Plus);
                let before = self.out.len();
                self.emit_expr(argument, 14);
                if guard && self.out[before..].starts_with(op.as_str()) {
                    self.out.insert(before, ' ');
                }
            }
            NodeKind::Update { op, argument, prefix } => {
                let (op, argument, prefix) = (*op, *argument, *prefix);
                if prefix {
                    self.tok(op.as_str());
                    self.emit_expr(argument, 15);
                } else {
                    self.emit_expr(argument, 15);
                    self.tok(op.as_str());
                }
            }
            NodeKind::Binary { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                self.emit_expr(left, prec);
                self.sp();
                self.tok(op.as_str());
                self.sp();
                self.emit_expr(right, prec + 1);
            }
            NodeKind::Logical { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                self.emit_expr(left, prec);
                self.sp();
                self.tok(op.as_str());
                self.sp();
                self.emit_expr(right, prec + 1);
            }
            NodeKind::Assign { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                self.emit_expr(left, 15);
                self.sp();
                self.tok(op.as_str());
                self.sp();
                self.emit_expr(right, 2);
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                let (test, consequent, alternate) = (*test, *consequent, *alternate);
                self.emit_expr(test, 4);
                self.sp();
                self.tok("?");
                self.sp();
                self.emit_expr(consequent, 2);
                self.sp();
                self.tok(":");
                self.sp();
                self.emit_expr(alternate, 2);
            }
            NodeKind::Sequence { expressions } => {
                let expressions = expressions.clone();
                for (i, expression) in expressions.iter().enumerate() {
                    if i > 0 {
                        self.tok(",");
                        self.sp();
                    }
                    self.emit_expr(*expression, 2);
                }
            }
            other => {
                // Statement kind in expression position; emit nothing visible.
                tracing::warn!("cannot emit {} as an expression", other.name());
                self.tok("undefined");
            }
        }
    }

    fn emit_args(&mut self, arguments: &[NodeId]) {
        self.tok("(");
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.tok(",");
                self.sp();
            }
            self.emit_expr(*argument, 2);
        }
        self.tok(")");
    }

    fn emit_literal(&mut self, value: &Lit) {
        match value {
            Lit::Null => self.tok("null"),
            Lit::Bool(true) => self.tok("true"),
            Lit::Bool(false) => self.tok("false"),
            Lit::Num(value) => {
                let rendered = self.render_number(*value);
                self.tok(&rendered);
            }
            Lit::Str(value) => {
                let rendered = self.render_string(value);
                self.out.push_str(&rendered);
            }
        }
    }

    fn render_number(&self, value: f64) -> String {
        if value.fract() == 0.0 && value.abs() < 9.007_199_254_740_992e15 {
            let int = value as i64;
            let mut best = int.to_string();
            if self.options.renumber && int != 0 && int % 10 == 0 {
                let mut mantissa = int;
                let mut zeros = 0;
                while mantissa % 10 == 0 {
                    mantissa /= 10;
                    zeros += 1;
                }
                let exponent = format!("{mantissa}e{zeros}");
                if exponent.len() < best.len() {
                    best = exponent;
                }
            }
            if self.options.hexadecimal && int >= 0 {
                let hex = format!("0x{int:x}");
                if hex.len() <= best.len() {
                    best = hex;
                }
            }
            best
        } else {
            format!("{value}")
        }
    }

    fn render_string(&self, value: &str) -> String {
        let quote = match self.options.quotes {
            QuoteStyle::Single => '\'',
            QuoteStyle::Double => '"',
            QuoteStyle::Auto => {
                let singles = value.matches('\'').count();
                let doubles = value.matches('"').count();
                if singles < doubles {
                    '\''
                } else {
                    '"'
                }
            }
        };
        let mut out = String::with_capacity(value.len() + 2);
        out.push(quote);
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\0' => out.push_str("\\0"),
                c if c == quote => {
                    out.push('\\');
                    out.push(c);
                }
                c if (c as u32) < 0x20 => {
                    out.push_str(&format!("\\x{:02x}", c as u32));
                }
                c => out.push(c),
            }
        }
        out.push(quote);
        out
    }
}
