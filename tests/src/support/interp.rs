//! Tree-walking interpreter for the supported source subset.
//!
//! This is the execution harness behind the behavioral equivalence tests,
//! covering the language features the pipeline emits: function-scoped `var`,
//! closures, exceptions, `arguments`, and the handful of natives the runtime
//! helpers rely on (`Array.prototype.slice`/`concat`/`push`,
//! `String.fromCharCode`, `Object.keys`, `fn.apply`/`fn.call`). Programs
//! report through a global `log(...)` which appends to the outcome.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use veil_core::ast::{
    Arena, AssignOp, BinaryOp, Lit, LogicalOp, NodeId, NodeKind, UnaryOp, UpdateOp,
};

/// Observable result of one program run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub output: Vec<String>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<String>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Vec<(String, Value)>>>),
    Func(Rc<Function>),
    Native(Native),
    /// `f.call` / `f.apply` accessor over a callable.
    Bound(Rc<Value>, CallMode),
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    Call,
    Apply,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Native {
    ArraySlice,
    ArrayConcat,
    ArrayPush,
    ArrayJoin,
    StringFromCharCode,
    ObjectKeys,
    Log,
}

pub struct Function {
    params: Vec<String>,
    body: NodeId,
    env: Env,
    props: RefCell<Vec<(String, Value)>>,
}

type Thrown = Value;

enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

type EResult = Result<Value, Thrown>;
type SResult = Result<Completion, Thrown>;

#[derive(Clone)]
struct Env(Rc<RefCell<EnvData>>);

struct EnvData {
    vars: HashMap<String, Value>,
    parent: Option<Env>,
}

impl Env {
    fn new(parent: Option<Env>) -> Self {
        Env(Rc::new(RefCell::new(EnvData { vars: HashMap::new(), parent })))
    }

    fn declare(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    fn declare_if_absent(&self, name: &str) {
        let mut data = self.0.borrow_mut();
        if !data.vars.contains_key(name) {
            data.vars.insert(name.to_string(), Value::Undefined);
        }
    }

    fn get(&self, name: &str) -> Option<Value> {
        let data = self.0.borrow();
        if let Some(value) = data.vars.get(name) {
            return Some(value.clone());
        }
        data.parent.as_ref().and_then(|parent| parent.get(name))
    }

    fn set(&self, name: &str, value: Value) -> bool {
        let mut data = self.0.borrow_mut();
        if let Some(slot) = data.vars.get_mut(name) {
            *slot = value;
            return true;
        }
        match data.parent.clone() {
            Some(parent) => {
                drop(data);
                parent.set(name, value)
            }
            None => false,
        }
    }
}

/// Execute the program rooted at `root`.
pub fn run(arena: &Arena, root: NodeId) -> Outcome {
    let mut interp = Interp { arena, output: Vec::new(), this_stack: Vec::new() };
    let global = interp.make_global_env();
    interp.hoist(root, &global);

    let mut error = None;
    for stmt in arena.body(root).to_vec() {
        match interp.eval_statement(stmt, &global) {
            Ok(Completion::Normal) => {}
            Ok(_) => break,
            Err(thrown) => {
                error = Some(interp.to_display(&thrown));
                break;
            }
        }
    }
    Outcome { output: interp.output, error }
}

struct Interp<'a> {
    arena: &'a Arena,
    output: Vec<String>,
    this_stack: Vec<Value>,
}

impl<'a> Interp<'a> {
    fn make_global_env(&mut self) -> Env {
        let global = Env::new(None);
        global.declare("undefined", Value::Undefined);
        global.declare("log", Value::Native(Native::Log));

        let array_proto = vec![
            ("slice".to_string(), Value::Native(Native::ArraySlice)),
            ("concat".to_string(), Value::Native(Native::ArrayConcat)),
            ("push".to_string(), Value::Native(Native::ArrayPush)),
            ("join".to_string(), Value::Native(Native::ArrayJoin)),
        ];
        let array_global = vec![(
            "prototype".to_string(),
            Value::Object(Rc::new(RefCell::new(array_proto))),
        )];
        global.declare("Array", Value::Object(Rc::new(RefCell::new(array_global))));

        let string_global =
            vec![("fromCharCode".to_string(), Value::Native(Native::StringFromCharCode))];
        global.declare("String", Value::Object(Rc::new(RefCell::new(string_global))));

        let object_global = vec![("keys".to_string(), Value::Native(Native::ObjectKeys))];
        global.declare("Object", Value::Object(Rc::new(RefCell::new(object_global))));

        global
    }

    /// Hoist `var` declarations and function declarations into `env`,
    /// stopping at function boundaries.
    fn hoist(&mut self, node: NodeId, env: &Env) {
        match self.arena.kind(node) {
            NodeKind::FunctionDecl { id, params, body } => {
                let name = self.ident_name(*id);
                let function = self.make_function(params, *body, env);
                env.declare(&name, function);
            }
            NodeKind::FunctionExpr { .. } => {}
            NodeKind::VarDeclarator { id, init } => {
                env.declare_if_absent(&self.ident_name(*id));
                if let Some(init) = init {
                    self.hoist(*init, env);
                }
            }
            NodeKind::Catch { body, .. } => self.hoist(*body, env),
            _ => {
                for child in self.arena.children(node) {
                    self.hoist(child, env);
                }
            }
        }
    }

    fn make_function(&self, params: &[NodeId], body: NodeId, env: &Env) -> Value {
        let params = params.iter().map(|param| self.ident_name(*param)).collect();
        Value::Func(Rc::new(Function {
            params,
            body,
            env: env.clone(),
            props: RefCell::new(Vec::new()),
        }))
    }

    fn ident_name(&self, id: NodeId) -> String {
        match self.arena.kind(id) {
            NodeKind::Ident { name } => name.clone(),
            _ => String::new(),
        }
    }

    fn throw_str(&self, msg: impl Into<String>) -> Thrown {
        Value::Str(Rc::new(msg.into()))
    }

    // ----- statements -------------------------------------------------

    fn eval_statement(&mut self, node: NodeId, env: &Env) -> SResult {
        match self.arena.kind(node).clone() {
            NodeKind::Program { body } | NodeKind::Block { body } => {
                for stmt in body {
                    match self.eval_statement(stmt, env)? {
                        Completion::Normal => {}
                        other => return Ok(other),
                    }
                }
                Ok(Completion::Normal)
            }
            NodeKind::VarDecl { declarations } => {
                for declarator in declarations {
                    let NodeKind::VarDeclarator { id, init } = self.arena.kind(declarator).clone()
                    else {
                        continue;
                    };
                    if let Some(init) = init {
                        let value = self.eval_expr(init, env)?;
                        let name = self.ident_name(id);
                        if !env.set(&name, value.clone()) {
                            env.declare(&name, value);
                        }
                    }
                }
                Ok(Completion::Normal)
            }
            NodeKind::ExprStmt { expression } => {
                self.eval_expr(expression, env)?;
                Ok(Completion::Normal)
            }
            NodeKind::If { test, consequent, alternate } => {
                let test = self.eval_expr(test, env)?;
                if self.truthy(&test) {
                    self.eval_statement(consequent, env)
                } else if let Some(alternate) = alternate {
                    self.eval_statement(alternate, env)
                } else {
                    Ok(Completion::Normal)
                }
            }
            NodeKind::While { .. }
            | NodeKind::DoWhile { .. }
            | NodeKind::For { .. }
            | NodeKind::ForIn { .. } => self.eval_loop(node, env, None),
            NodeKind::Labeled { label, body } => {
                if matches!(
                    self.arena.kind(body),
                    NodeKind::While { .. }
                        | NodeKind::DoWhile { .. }
                        | NodeKind::For { .. }
                        | NodeKind::ForIn { .. }
                ) {
                    self.eval_loop(body, env, Some(label))
                } else {
                    match self.eval_statement(body, env)? {
                        Completion::Break(Some(l)) if l == label => Ok(Completion::Normal),
                        other => Ok(other),
                    }
                }
            }
            NodeKind::Switch { discriminant, cases } => {
                self.eval_switch(discriminant, &cases, env)
            }
            NodeKind::Try { block, handler, finalizer } => {
                self.eval_try(block, handler, finalizer, env)
            }
            NodeKind::Return { argument } => {
                let value = match argument {
                    Some(argument) => self.eval_expr(argument, env)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            NodeKind::Break { label } => Ok(Completion::Break(label)),
            NodeKind::Continue { label } => Ok(Completion::Continue(label)),
            NodeKind::Throw { argument } => {
                let value = self.eval_expr(argument, env)?;
                Err(value)
            }
            NodeKind::Empty | NodeKind::FunctionDecl { .. } => Ok(Completion::Normal),
            other => Err(self.throw_str(format!("cannot execute {}", other.name()))),
        }
    }

    fn loop_body(&mut self, body: NodeId, env: &Env, label: &Option<String>) -> SResult {
        match self.eval_statement(body, env)? {
            Completion::Normal | Completion::Continue(None) => Ok(Completion::Normal),
            Completion::Continue(Some(l)) if Some(&l) == label.as_ref() => Ok(Completion::Normal),
            Completion::Break(None) => Ok(Completion::Break(None)),
            Completion::Break(Some(l)) if Some(&l) == label.as_ref() => {
                Ok(Completion::Break(None))
            }
            other => Ok(other),
        }
    }

    fn eval_loop(&mut self, node: NodeId, env: &Env, label: Option<String>) -> SResult {
        match self.arena.kind(node).clone() {
            NodeKind::While { test, body } => loop {
                let condition = self.eval_expr(test, env)?;
                if !self.truthy(&condition) {
                    return Ok(Completion::Normal);
                }
                match self.loop_body(body, env, &label)? {
                    Completion::Normal => {}
                    Completion::Break(None) => return Ok(Completion::Normal),
                    other => return Ok(other),
                }
            },
            NodeKind::DoWhile { body, test } => loop {
                match self.loop_body(body, env, &label)? {
                    Completion::Normal => {}
                    Completion::Break(None) => return Ok(Completion::Normal),
                    other => return Ok(other),
                }
                let condition = self.eval_expr(test, env)?;
                if !self.truthy(&condition) {
                    return Ok(Completion::Normal);
                }
            },
            NodeKind::For { init, test, update, body } => {
                if let Some(init) = init {
                    match self.arena.kind(init) {
                        NodeKind::VarDecl { .. } => {
                            self.eval_statement(init, env)?;
                        }
                        NodeKind::ExprStmt { expression } => {
                            self.eval_expr(*expression, env)?;
                        }
                        _ => {
                            self.eval_expr(init, env)?;
                        }
                    }
                }
                loop {
                    if let Some(test) = test {
                        let condition = self.eval_expr(test, env)?;
                        if !self.truthy(&condition) {
                            return Ok(Completion::Normal);
                        }
                    }
                    match self.loop_body(body, env, &label)? {
                        Completion::Normal => {}
                        Completion::Break(None) => return Ok(Completion::Normal),
                        other => return Ok(other),
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, env)?;
                    }
                }
            }
            NodeKind::ForIn { left, right, body } => {
                let target = self.eval_expr(right, env)?;
                let keys = self.enumerable_keys(&target);
                for key in keys {
                    let key_value = Value::Str(Rc::new(key));
                    match self.arena.kind(left).clone() {
                        NodeKind::VarDecl { declarations } => {
                            if let Some(declarator) = declarations.first() {
                                if let NodeKind::VarDeclarator { id, .. } =
                                    self.arena.kind(*declarator)
                                {
                                    let name = self.ident_name(*id);
                                    if !env.set(&name, key_value.clone()) {
                                        env.declare(&name, key_value.clone());
                                    }
                                }
                            }
                        }
                        _ => {
                            self.assign_target(left, key_value.clone(), env)?;
                        }
                    }
                    match self.loop_body(body, env, &label)? {
                        Completion::Normal => {}
                        Completion::Break(None) => return Ok(Completion::Normal),
                        other => return Ok(other),
                    }
                }
                Ok(Completion::Normal)
            }
            _ => Ok(Completion::Normal),
        }
    }

    fn eval_switch(&mut self, discriminant: NodeId, cases: &[NodeId], env: &Env) -> SResult {
        let subject = self.eval_expr(discriminant, env)?;

        let mut start = None;
        let mut default = None;
        for (i, case) in cases.iter().enumerate() {
            if let NodeKind::SwitchCase { test, .. } = self.arena.kind(*case) {
                match test {
                    Some(test) => {
                        let test = *test;
                        let candidate = self.eval_expr(test, env)?;
                        if self.strict_equals(&subject, &candidate) {
                            start = Some(i);
                            break;
                        }
                    }
                    None => default = Some(i),
                }
            }
        }
        let Some(start) = start.or(default) else {
            return Ok(Completion::Normal);
        };

        for case in &cases[start..] {
            if let NodeKind::SwitchCase { consequent, .. } = self.arena.kind(*case).clone() {
                for stmt in consequent {
                    match self.eval_statement(stmt, env)? {
                        Completion::Normal => {}
                        Completion::Break(None) => return Ok(Completion::Normal),
                        other => return Ok(other),
                    }
                }
            }
        }
        Ok(Completion::Normal)
    }

    fn eval_try(
        &mut self,
        block: NodeId,
        handler: Option<NodeId>,
        finalizer: Option<NodeId>,
        env: &Env,
    ) -> SResult {
        let mut outcome = self.eval_statement(block, env);

        if let (Err(thrown), Some(handler)) = (&outcome, handler) {
            if let NodeKind::Catch { param, body } = self.arena.kind(handler).clone() {
                let catch_env = Env::new(Some(env.clone()));
                catch_env.declare(&self.ident_name(param), thrown.clone());
                outcome = self.eval_statement(body, &catch_env);
            }
        }

        if let Some(finalizer) = finalizer {
            match self.eval_statement(finalizer, env)? {
                Completion::Normal => {}
                // An abrupt finalizer overrides the try/catch outcome.
                abrupt => return Ok(abrupt),
            }
        }
        outcome
    }

    // ----- expressions ------------------------------------------------

    fn eval_expr(&mut self, node: NodeId, env: &Env) -> EResult {
        match self.arena.kind(node).clone() {
            NodeKind::Ident { name } => env
                .get(&name)
                .ok_or_else(|| self.throw_str(format!("{name} is not defined"))),
            NodeKind::Literal { value } => Ok(match value {
                Lit::Null => Value::Null,
                Lit::Bool(b) => Value::Bool(b),
                Lit::Num(n) => Value::Num(n),
                Lit::Str(s) => Value::Str(Rc::new(s)),
            }),
            NodeKind::This => Ok(self.this_stack.last().cloned().unwrap_or(Value::Undefined)),
            NodeKind::Array { elements } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval_expr(element, env)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            NodeKind::ObjectLit { properties } => {
                let mut entries = Vec::with_capacity(properties.len());
                for property in properties {
                    let NodeKind::Property { key, value } = self.arena.kind(property).clone()
                    else {
                        continue;
                    };
                    let key = match self.arena.kind(key) {
                        NodeKind::Ident { name } => name.clone(),
                        NodeKind::Literal { value } => self.lit_key(value),
                        _ => continue,
                    };
                    let value = self.eval_expr(value, env)?;
                    entries.push((key, value));
                }
                Ok(Value::Object(Rc::new(RefCell::new(entries))))
            }
            NodeKind::FunctionExpr { params, body, .. } => {
                Ok(self.make_function(&params, body, env))
            }
            NodeKind::Member { object, property, computed } => {
                let object = self.eval_expr(object, env)?;
                let key = self.member_key(property, computed, env)?;
                self.get_member(&object, &key)
            }
            NodeKind::Call { callee, arguments } => {
                let mut values = Vec::with_capacity(arguments.len());
                let (function, this) = match self.arena.kind(callee).clone() {
                    NodeKind::Member { object, property, computed } => {
                        let object = self.eval_expr(object, env)?;
                        let key = self.member_key(property, computed, env)?;
                        let function = self.get_member(&object, &key)?;
                        (function, object)
                    }
                    _ => (self.eval_expr(callee, env)?, Value::Undefined),
                };
                for argument in arguments {
                    values.push(self.eval_expr(argument, env)?);
                }
                self.call_value(&function, this, values)
            }
            NodeKind::New { callee, arguments } => {
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.eval_expr(argument, env)?);
                }
                if matches!(self.arena.kind(callee), NodeKind::Ident { name } if name == "Array") {
                    let len = match values.first() {
                        Some(Value::Num(n)) if values.len() == 1 => *n as usize,
                        _ => values.len(),
                    };
                    return Ok(Value::Array(Rc::new(RefCell::new(vec![
                        Value::Undefined;
                        len
                    ]))));
                }
                let function = self.eval_expr(callee, env)?;
                let instance = Value::Object(Rc::new(RefCell::new(Vec::new())));
                let result = self.call_value(&function, instance.clone(), values)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) => result,
                    _ => instance,
                })
            }
            NodeKind::Unary { op, argument } => self.eval_unary(op, argument, env),
            NodeKind::Update { op, argument, prefix } => {
                let evaluated = self.eval_expr(argument, env)?;
                let old = self.to_number(&evaluated);
                let new = match op {
                    UpdateOp::Inc => old + 1.0,
                    UpdateOp::Dec => old - 1.0,
                };
                self.assign_target(argument, Value::Num(new), env)?;
                Ok(Value::Num(if prefix { new } else { old }))
            }
            NodeKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, env)?;
                let right = self.eval_expr(right, env)?;
                self.eval_binary(op, left, right)
            }
            NodeKind::Logical { op, left, right } => {
                let left_value = self.eval_expr(left, env)?;
                match op {
                    LogicalOp::And => {
                        if self.truthy(&left_value) {
                            self.eval_expr(right, env)
                        } else {
                            Ok(left_value)
                        }
                    }
                    LogicalOp::Or => {
                        if self.truthy(&left_value) {
                            Ok(left_value)
                        } else {
                            self.eval_expr(right, env)
                        }
                    }
                }
            }
            NodeKind::Assign { op, left, right } => {
                let value = self.eval_expr(right, env)?;
                let value = match op {
                    AssignOp::Assign => value,
                    compound => {
                        let current = self.eval_expr(left, env)?;
                        let binary = match compound {
                            AssignOp::Add => BinaryOp::Add,
                            AssignOp::Sub => BinaryOp::Sub,
                            AssignOp::Mul => BinaryOp::Mul,
                            AssignOp::Div => BinaryOp::Div,
                            _ => BinaryOp::Mod,
                        };
                        self.eval_binary(binary, current, value)?
                    }
                };
                self.assign_target(left, value.clone(), env)?;
                Ok(value)
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                let test = self.eval_expr(test, env)?;
                if self.truthy(&test) {
                    self.eval_expr(consequent, env)
                } else {
                    self.eval_expr(alternate, env)
                }
            }
            NodeKind::Sequence { expressions } => {
                let mut last = Value::Undefined;
                for expression in expressions {
                    last = self.eval_expr(expression, env)?;
                }
                Ok(last)
            }
            other => Err(self.throw_str(format!("cannot evaluate {}", other.name()))),
        }
    }

    fn member_key(&mut self, property: NodeId, computed: bool, env: &Env) -> Result<String, Thrown> {
        if computed {
            let key = self.eval_expr(property, env)?;
            Ok(self.to_display(&key))
        } else {
            Ok(self.ident_name(property))
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, argument: NodeId, env: &Env) -> EResult {
        if op == UnaryOp::TypeOf {
            // typeof tolerates undeclared names.
            if let NodeKind::Ident { name } = self.arena.kind(argument) {
                let value = env.get(name).unwrap_or(Value::Undefined);
                return Ok(Value::Str(Rc::new(self.type_of(&value).to_string())));
            }
        }
        if op == UnaryOp::Delete {
            if let NodeKind::Member { object, property, computed } =
                self.arena.kind(argument).clone()
            {
                let object = self.eval_expr(object, env)?;
                let key = self.member_key(property, computed, env)?;
                if let Value::Object(entries) = &object {
                    entries.borrow_mut().retain(|(name, _)| *name != key);
                }
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(true));
        }

        let value = self.eval_expr(argument, env)?;
        Ok(match op {
            UnaryOp::Minus => Value::Num(-self.to_number(&value)),
            UnaryOp::Plus => Value::Num(self.to_number(&value)),
            UnaryOp::Not => Value::Bool(!self.truthy(&value)),
            UnaryOp::BitNot => Value::Num(!(self.to_int32(&value)) as f64),
            UnaryOp::TypeOf => Value::Str(Rc::new(self.type_of(&value).to_string())),
            UnaryOp::Void => Value::Undefined,
            UnaryOp::Delete => Value::Bool(true),
        })
    }

    fn eval_binary(&mut self, op: BinaryOp, left: Value, right: Value) -> EResult {
        use BinaryOp::*;
        Ok(match op {
            Add => match (&left, &right) {
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    let mut s = self.to_display(&left);
                    s.push_str(&self.to_display(&right));
                    Value::Str(Rc::new(s))
                }
                _ => Value::Num(self.to_number(&left) + self.to_number(&right)),
            },
            Sub => Value::Num(self.to_number(&left) - self.to_number(&right)),
            Mul => Value::Num(self.to_number(&left) * self.to_number(&right)),
            Div => Value::Num(self.to_number(&left) / self.to_number(&right)),
            Mod => Value::Num(self.to_number(&left) % self.to_number(&right)),
            Eq => Value::Bool(self.loose_equals(&left, &right)),
            NotEq => Value::Bool(!self.loose_equals(&left, &right)),
            StrictEq => Value::Bool(self.strict_equals(&left, &right)),
            StrictNotEq => Value::Bool(!self.strict_equals(&left, &right)),
            Lt | LtEq | Gt | GtEq => {
                let result = match (&left, &right) {
                    (Value::Str(a), Value::Str(b)) => match op {
                        Lt => a < b,
                        LtEq => a <= b,
                        Gt => a > b,
                        _ => a >= b,
                    },
                    _ => {
                        let a = self.to_number(&left);
                        let b = self.to_number(&right);
                        match op {
                            Lt => a < b,
                            LtEq => a <= b,
                            Gt => a > b,
                            _ => a >= b,
                        }
                    }
                };
                Value::Bool(result)
            }
            BitAnd => Value::Num((self.to_int32(&left) & self.to_int32(&right)) as f64),
            BitOr => Value::Num((self.to_int32(&left) | self.to_int32(&right)) as f64),
            BitXor => Value::Num((self.to_int32(&left) ^ self.to_int32(&right)) as f64),
            Shl => Value::Num(
                (self.to_int32(&left) << (self.to_uint32(&right) & 31)) as f64,
            ),
            Shr => Value::Num(
                (self.to_int32(&left) >> (self.to_uint32(&right) & 31)) as f64,
            ),
            UShr => Value::Num(
                (self.to_uint32(&left) >> (self.to_uint32(&right) & 31)) as f64,
            ),
            In => {
                let key = self.to_display(&left);
                match &right {
                    Value::Object(entries) => {
                        Value::Bool(entries.borrow().iter().any(|(name, _)| *name == key))
                    }
                    Value::Array(items) => {
                        let index = key.parse::<usize>().ok();
                        Value::Bool(index.is_some_and(|i| i < items.borrow().len()))
                    }
                    _ => Value::Bool(false),
                }
            }
            InstanceOf => Value::Bool(false),
        })
    }

    fn assign_target(&mut self, target: NodeId, value: Value, env: &Env) -> Result<(), Thrown> {
        match self.arena.kind(target).clone() {
            NodeKind::Ident { name } => {
                if !env.set(&name, value.clone()) {
                    // Sloppy-mode global creation.
                    let mut root = env.clone();
                    while let Some(parent) = {
                        let parent = root.0.borrow().parent.clone();
                        parent
                    } {
                        root = parent;
                    }
                    root.declare(&name, value);
                }
                Ok(())
            }
            NodeKind::Member { object, property, computed } => {
                let object = self.eval_expr(object, env)?;
                let key = self.member_key(property, computed, env)?;
                self.set_member(&object, &key, value)
            }
            other => Err(self.throw_str(format!("invalid assignment target {}", other.name()))),
        }
    }

    // ----- values -----------------------------------------------------

    fn call_value(&mut self, function: &Value, this: Value, args: Vec<Value>) -> EResult {
        match function {
            Value::Func(f) => {
                let env = Env::new(Some(f.env.clone()));
                for (i, param) in f.params.iter().enumerate() {
                    env.declare(param, args.get(i).cloned().unwrap_or(Value::Undefined));
                }
                let arguments = Value::Array(Rc::new(RefCell::new(args)));
                env.declare("arguments", arguments);
                self.hoist(f.body, &env);

                self.this_stack.push(this);
                let outcome = self.eval_statement(f.body, &env);
                self.this_stack.pop();

                match outcome? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
            Value::Native(native) => self.call_native(*native, this, args),
            Value::Bound(target, mode) => {
                let this = args.first().cloned().unwrap_or(Value::Undefined);
                match mode {
                    CallMode::Call => {
                        let rest = args.into_iter().skip(1).collect();
                        self.call_value(target, this, rest)
                    }
                    CallMode::Apply => {
                        let rest = match args.get(1) {
                            Some(Value::Array(items)) => items.borrow().clone(),
                            _ => Vec::new(),
                        };
                        self.call_value(target, this, rest)
                    }
                }
            }
            other => Err(self.throw_str(format!("{} is not a function", self.to_display(other)))),
        }
    }

    fn call_native(&mut self, native: Native, this: Value, args: Vec<Value>) -> EResult {
        match native {
            Native::Log => {
                let line = args
                    .iter()
                    .map(|value| self.to_display(value))
                    .collect::<Vec<_>>()
                    .join(" ");
                self.output.push(line);
                Ok(Value::Undefined)
            }
            Native::ArraySlice => {
                let items = self.as_array(&this)?;
                let len = items.borrow().len() as i64;
                let start = args
                    .first()
                    .map(|value| self.to_number(value) as i64)
                    .unwrap_or(0)
                    .clamp(0, len) as usize;
                let end = args
                    .get(1)
                    .map(|value| self.to_number(value) as i64)
                    .unwrap_or(len)
                    .clamp(0, len) as usize;
                let sliced: Vec<Value> = items.borrow()[start..end.max(start)].to_vec();
                Ok(Value::Array(Rc::new(RefCell::new(sliced))))
            }
            Native::ArrayConcat => {
                let items = self.as_array(&this)?;
                let mut merged = items.borrow().clone();
                for arg in args {
                    match arg {
                        Value::Array(more) => merged.extend(more.borrow().iter().cloned()),
                        other => merged.push(other),
                    }
                }
                Ok(Value::Array(Rc::new(RefCell::new(merged))))
            }
            Native::ArrayPush => {
                let items = self.as_array(&this)?;
                items.borrow_mut().extend(args);
                let len = items.borrow().len();
                Ok(Value::Num(len as f64))
            }
            Native::ArrayJoin => {
                let items = self.as_array(&this)?;
                let sep = args
                    .first()
                    .map(|value| self.to_display(value))
                    .unwrap_or_else(|| ",".to_string());
                let joined = items
                    .borrow()
                    .iter()
                    .map(|value| self.to_display(value))
                    .collect::<Vec<_>>()
                    .join(&sep);
                Ok(Value::Str(Rc::new(joined)))
            }
            Native::StringFromCharCode => {
                let mut out = String::new();
                for arg in &args {
                    let code = self.to_number(arg) as u32;
                    out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                }
                Ok(Value::Str(Rc::new(out)))
            }
            Native::ObjectKeys => {
                let keys: Vec<Value> = match args.first() {
                    Some(Value::Object(entries)) => entries
                        .borrow()
                        .iter()
                        .map(|(name, _)| Value::Str(Rc::new(name.clone())))
                        .collect(),
                    Some(Value::Array(items)) => (0..items.borrow().len())
                        .map(|i| Value::Str(Rc::new(i.to_string())))
                        .collect(),
                    _ => Vec::new(),
                };
                Ok(Value::Array(Rc::new(RefCell::new(keys))))
            }
        }
    }

    fn as_array(&self, value: &Value) -> Result<Rc<RefCell<Vec<Value>>>, Thrown> {
        match value {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(self.throw_str("value is not an array")),
        }
    }

    fn get_member(&mut self, object: &Value, key: &str) -> EResult {
        if key == "call" || key == "apply" {
            if matches!(object, Value::Func(_) | Value::Native(_) | Value::Bound(..)) {
                let mode = if key == "call" { CallMode::Call } else { CallMode::Apply };
                return Ok(Value::Bound(Rc::new(object.clone()), mode));
            }
        }
        match object {
            Value::Array(items) => {
                if key == "length" {
                    return Ok(Value::Num(items.borrow().len() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(items.borrow().get(index).cloned().unwrap_or(Value::Undefined));
                }
                match key {
                    "slice" => Ok(Value::Native(Native::ArraySlice)),
                    "concat" => Ok(Value::Native(Native::ArrayConcat)),
                    "push" => Ok(Value::Native(Native::ArrayPush)),
                    "join" => Ok(Value::Native(Native::ArrayJoin)),
                    _ => Ok(Value::Undefined),
                }
            }
            Value::Str(text) => {
                if key == "length" {
                    return Ok(Value::Num(text.chars().count() as f64));
                }
                if let Ok(index) = key.parse::<usize>() {
                    return Ok(text
                        .chars()
                        .nth(index)
                        .map(|c| Value::Str(Rc::new(c.to_string())))
                        .unwrap_or(Value::Undefined));
                }
                Ok(Value::Undefined)
            }
            Value::Object(entries) => Ok(entries
                .borrow()
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Undefined)),
            Value::Func(f) => Ok(f
                .props
                .borrow()
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
                .unwrap_or(Value::Undefined)),
            Value::Undefined | Value::Null => {
                Err(self.throw_str(format!("cannot read property '{key}' of undefined")))
            }
            _ => Ok(Value::Undefined),
        }
    }

    fn set_member(&mut self, object: &Value, key: &str, value: Value) -> Result<(), Thrown> {
        match object {
            Value::Array(items) => {
                if let Ok(index) = key.parse::<usize>() {
                    let mut items = items.borrow_mut();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                    return Ok(());
                }
                Ok(())
            }
            Value::Object(entries) => {
                let mut entries = entries.borrow_mut();
                if let Some(slot) = entries.iter_mut().find(|(name, _)| name == key) {
                    slot.1 = value;
                } else {
                    entries.push((key.to_string(), value));
                }
                Ok(())
            }
            Value::Func(f) => {
                let mut props = f.props.borrow_mut();
                if let Some(slot) = props.iter_mut().find(|(name, _)| name == key) {
                    slot.1 = value;
                } else {
                    props.push((key.to_string(), value));
                }
                Ok(())
            }
            Value::Undefined | Value::Null => {
                Err(self.throw_str(format!("cannot set property '{key}' of undefined")))
            }
            _ => Ok(()),
        }
    }

    fn enumerable_keys(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Object(entries) => {
                entries.borrow().iter().map(|(name, _)| name.clone()).collect()
            }
            Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    // ----- coercions --------------------------------------------------

    fn truthy(&self, value: &Value) -> bool {
        match value {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Num(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    fn to_int32(&self, value: &Value) -> i32 {
        let n = self.to_number(value);
        if !n.is_finite() {
            return 0;
        }
        n as i64 as u32 as i32
    }

    fn to_uint32(&self, value: &Value) -> u32 {
        let n = self.to_number(value);
        if !n.is_finite() {
            return 0;
        }
        n as i64 as u32
    }

    fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) | Value::Object(_) => "object",
            Value::Func(_) | Value::Native(_) | Value::Bound(..) => "function",
        }
    }

    fn strict_equals(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Num(x), Value::Num(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Array(x), Value::Array(y)) => Rc::ptr_eq(x, y),
            (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
            (Value::Func(x), Value::Func(y)) => Rc::ptr_eq(x, y),
            (Value::Native(x), Value::Native(y)) => x == y,
            _ => false,
        }
    }

    fn loose_equals(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Num(_), Value::Num(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_)) => self.strict_equals(a, b),
            (Value::Num(_), Value::Str(_))
            | (Value::Str(_), Value::Num(_))
            | (Value::Bool(_), _)
            | (_, Value::Bool(_)) => {
                let (x, y) = (self.to_number(a), self.to_number(b));
                x == y
            }
            _ => self.strict_equals(a, b),
        }
    }

    fn lit_key(&self, value: &Lit) -> String {
        match value {
            Lit::Null => "null".to_string(),
            Lit::Bool(b) => b.to_string(),
            Lit::Num(n) => self.num_display(*n),
            Lit::Str(s) => s.clone(),
        }
    }

    fn num_display(&self, n: f64) -> String {
        if n.is_nan() {
            "NaN".to_string()
        } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
            format!("{}", n as i64)
        } else {
            format!("{n}")
        }
    }

    fn to_display(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => self.num_display(*n),
            Value::Str(s) => s.as_ref().clone(),
            Value::Array(items) => items
                .borrow()
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => self.to_display(other),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Func(_) | Value::Native(_) | Value::Bound(..) => "function".to_string(),
        }
    }
}
