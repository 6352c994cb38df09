//! Arena-allocated AST for the supported ECMAScript-style source language.
//!
//! Nodes live in one [`Arena`] and are addressed by stable [`NodeId`] handles.
//! Every node stores its parent handle; all tree surgery goes through arena
//! operations that update both directions, and `check::check_tree` walks the
//! tree to confirm the invariant instead of trusting it. Bookkeeping that the
//! passes need to communicate across stages lives in [`Marks`] rather than in
//! the node kinds themselves.

pub mod build;

use std::fmt;

/// Stable handle into an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    In,
    InstanceOf,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
            BinaryOp::InstanceOf => "instanceof",
        }
    }

    /// Binding power used by both the parser and the printer.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::BitOr => 6,
            BinaryOp::BitXor => 7,
            BinaryOp::BitAnd => 8,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 9,
            BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq
            | BinaryOp::In
            | BinaryOp::InstanceOf => 10,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 11,
            BinaryOp::Add | BinaryOp::Sub => 12,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 13,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }

    pub fn precedence(self) -> u8 {
        match self {
            LogicalOp::Or => 4,
            LogicalOp::And => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::TypeOf => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Inc => "++",
            UpdateOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
        }
    }
}

/// Pass bookkeeping carried on nodes across pipeline stages, standing in for
/// the dynamic expando properties the tree would otherwise grow.
#[derive(Debug, Clone, Default)]
pub struct Marks {
    /// Declaration of a materialized scope frame (`var $$scope$x = [];`).
    pub scope_object: bool,
    /// Indexed access into a materialized scope frame.
    pub scope_object_ref: bool,
    /// Per-method `var $$veil$arguments = arguments;` prologue.
    pub reassigning_arguments: bool,
    /// The prologue above follows an argument-slicing statement.
    pub follows_slicing_arguments: bool,
    /// Literal holding a slice count that must track argument-index bumps.
    pub slice_count_literal: bool,
    /// Module path this embedded wrapper was merged from.
    pub module_path: Option<String>,
}

/// Closed sum of every node kind the pipeline understands.
#[derive(Debug, Clone)]
pub enum NodeKind {
    // Statements and declarations
    Program { body: Vec<NodeId> },
    Block { body: Vec<NodeId> },
    VarDecl { declarations: Vec<NodeId> },
    VarDeclarator { id: NodeId, init: Option<NodeId> },
    ExprStmt { expression: NodeId },
    If { test: NodeId, consequent: NodeId, alternate: Option<NodeId> },
    While { test: NodeId, body: NodeId },
    DoWhile { body: NodeId, test: NodeId },
    For { init: Option<NodeId>, test: Option<NodeId>, update: Option<NodeId>, body: NodeId },
    ForIn { left: NodeId, right: NodeId, body: NodeId },
    Switch { discriminant: NodeId, cases: Vec<NodeId> },
    SwitchCase { test: Option<NodeId>, consequent: Vec<NodeId> },
    Try { block: NodeId, handler: Option<NodeId>, finalizer: Option<NodeId> },
    Catch { param: NodeId, body: NodeId },
    Labeled { label: String, body: NodeId },
    Return { argument: Option<NodeId> },
    Break { label: Option<String> },
    Continue { label: Option<String> },
    Throw { argument: NodeId },
    Empty,
    FunctionDecl { id: NodeId, params: Vec<NodeId>, body: NodeId },

    // Expressions
    FunctionExpr { id: Option<NodeId>, params: Vec<NodeId>, body: NodeId },
    Ident { name: String },
    Literal { value: Lit },
    Array { elements: Vec<NodeId> },
    ObjectLit { properties: Vec<NodeId> },
    Property { key: NodeId, value: NodeId },
    Member { object: NodeId, property: NodeId, computed: bool },
    Call { callee: NodeId, arguments: Vec<NodeId> },
    New { callee: NodeId, arguments: Vec<NodeId> },
    Unary { op: UnaryOp, argument: NodeId },
    Update { op: UpdateOp, argument: NodeId, prefix: bool },
    Binary { op: BinaryOp, left: NodeId, right: NodeId },
    Logical { op: LogicalOp, left: NodeId, right: NodeId },
    Assign { op: AssignOp, left: NodeId, right: NodeId },
    Conditional { test: NodeId, consequent: NodeId, alternate: NodeId },
    Sequence { expressions: Vec<NodeId> },
    This,
}

impl NodeKind {
    /// Variant name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program { .. } => "Program",
            NodeKind::Block { .. } => "Block",
            NodeKind::VarDecl { .. } => "VarDecl",
            NodeKind::VarDeclarator { .. } => "VarDeclarator",
            NodeKind::ExprStmt { .. } => "ExprStmt",
            NodeKind::If { .. } => "If",
            NodeKind::While { .. } => "While",
            NodeKind::DoWhile { .. } => "DoWhile",
            NodeKind::For { .. } => "For",
            NodeKind::ForIn { .. } => "ForIn",
            NodeKind::Switch { .. } => "Switch",
            NodeKind::SwitchCase { .. } => "SwitchCase",
            NodeKind::Try { .. } => "Try",
            NodeKind::Catch { .. } => "Catch",
            NodeKind::Labeled { .. } => "Labeled",
            NodeKind::Return { .. } => "Return",
            NodeKind::Break { .. } => "Break",
            NodeKind::Continue { .. } => "Continue",
            NodeKind::Throw { .. } => "Throw",
            NodeKind::Empty => "Empty",
            NodeKind::FunctionDecl { .. } => "FunctionDecl",
            NodeKind::FunctionExpr { .. } => "FunctionExpr",
            NodeKind::Ident { .. } => "Ident",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::Array { .. } => "Array",
            NodeKind::ObjectLit { .. } => "ObjectLit",
            NodeKind::Property { .. } => "Property",
            NodeKind::Member { .. } => "Member",
            NodeKind::Call { .. } => "Call",
            NodeKind::New { .. } => "New",
            NodeKind::Unary { .. } => "Unary",
            NodeKind::Update { .. } => "Update",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::Logical { .. } => "Logical",
            NodeKind::Assign { .. } => "Assign",
            NodeKind::Conditional { .. } => "Conditional",
            NodeKind::Sequence { .. } => "Sequence",
            NodeKind::This => "This",
        }
    }

    fn child_slots(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut push = |id: &NodeId| out.push(*id);
        match self {
            NodeKind::Program { body } | NodeKind::Block { body } => body.iter().for_each(&mut push),
            NodeKind::VarDecl { declarations } => declarations.iter().for_each(&mut push),
            NodeKind::VarDeclarator { id, init } => {
                push(id);
                init.iter().for_each(&mut push);
            }
            NodeKind::ExprStmt { expression } => push(expression),
            NodeKind::If { test, consequent, alternate } => {
                push(test);
                push(consequent);
                alternate.iter().for_each(&mut push);
            }
            NodeKind::While { test, body } => {
                push(test);
                push(body);
            }
            NodeKind::DoWhile { body, test } => {
                push(body);
                push(test);
            }
            NodeKind::For { init, test, update, body } => {
                init.iter().for_each(&mut push);
                test.iter().for_each(&mut push);
                update.iter().for_each(&mut push);
                push(body);
            }
            NodeKind::ForIn { left, right, body } => {
                push(left);
                push(right);
                push(body);
            }
            NodeKind::Switch { discriminant, cases } => {
                push(discriminant);
                cases.iter().for_each(&mut push);
            }
            NodeKind::SwitchCase { test, consequent } => {
                test.iter().for_each(&mut push);
                consequent.iter().for_each(&mut push);
            }
            NodeKind::Try { block, handler, finalizer } => {
                push(block);
                handler.iter().for_each(&mut push);
                finalizer.iter().for_each(&mut push);
            }
            NodeKind::Catch { param, body } => {
                push(param);
                push(body);
            }
            NodeKind::Labeled { body, .. } => push(body),
            NodeKind::Return { argument } => argument.iter().for_each(&mut push),
            NodeKind::Break { .. } | NodeKind::Continue { .. } | NodeKind::Empty | NodeKind::This => {}
            NodeKind::Throw { argument } => push(argument),
            NodeKind::FunctionDecl { id, params, body } => {
                push(id);
                params.iter().for_each(&mut push);
                push(body);
            }
            NodeKind::FunctionExpr { id, params, body } => {
                id.iter().for_each(&mut push);
                params.iter().for_each(&mut push);
                push(body);
            }
            NodeKind::Ident { .. } | NodeKind::Literal { .. } => {}
            NodeKind::Array { elements } => elements.iter().for_each(&mut push),
            NodeKind::ObjectLit { properties } => properties.iter().for_each(&mut push),
            NodeKind::Property { key, value } => {
                push(key);
                push(value);
            }
            NodeKind::Member { object, property, .. } => {
                push(object);
                push(property);
            }
            NodeKind::Call { callee, arguments } | NodeKind::New { callee, arguments } => {
                push(callee);
                arguments.iter().for_each(&mut push);
            }
            NodeKind::Unary { argument, .. } | NodeKind::Update { argument, .. } => push(argument),
            NodeKind::Binary { left, right, .. }
            | NodeKind::Logical { left, right, .. }
            | NodeKind::Assign { left, right, .. } => {
                push(left);
                push(right);
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                push(test);
                push(consequent);
                push(alternate);
            }
            NodeKind::Sequence { expressions } => expressions.iter().for_each(&mut push),
        }
        out
    }

    fn replace_slot(&mut self, old: NodeId, new: NodeId) -> bool {
        fn swap_in(slot: &mut NodeId, old: NodeId, new: NodeId, hit: &mut bool) {
            if *slot == old && !*hit {
                *slot = new;
                *hit = true;
            }
        }
        fn swap_opt_in(slot: &mut Option<NodeId>, old: NodeId, new: NodeId, hit: &mut bool) {
            if *slot == Some(old) && !*hit {
                *slot = Some(new);
                *hit = true;
            }
        }
        fn swap_vec_in(slots: &mut [NodeId], old: NodeId, new: NodeId, hit: &mut bool) {
            for slot in slots.iter_mut() {
                swap_in(slot, old, new, hit);
            }
        }

        let mut hit = false;
        let h = &mut hit;
        match self {
            NodeKind::Program { body } | NodeKind::Block { body } => swap_vec_in(body, old, new, h),
            NodeKind::VarDecl { declarations } => swap_vec_in(declarations, old, new, h),
            NodeKind::VarDeclarator { id, init } => {
                swap_in(id, old, new, h);
                swap_opt_in(init, old, new, h);
            }
            NodeKind::ExprStmt { expression } => swap_in(expression, old, new, h),
            NodeKind::If { test, consequent, alternate } => {
                swap_in(test, old, new, h);
                swap_in(consequent, old, new, h);
                swap_opt_in(alternate, old, new, h);
            }
            NodeKind::While { test, body } => {
                swap_in(test, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::DoWhile { body, test } => {
                swap_in(body, old, new, h);
                swap_in(test, old, new, h);
            }
            NodeKind::For { init, test, update, body } => {
                swap_opt_in(init, old, new, h);
                swap_opt_in(test, old, new, h);
                swap_opt_in(update, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::ForIn { left, right, body } => {
                swap_in(left, old, new, h);
                swap_in(right, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::Switch { discriminant, cases } => {
                swap_in(discriminant, old, new, h);
                swap_vec_in(cases, old, new, h);
            }
            NodeKind::SwitchCase { test, consequent } => {
                swap_opt_in(test, old, new, h);
                swap_vec_in(consequent, old, new, h);
            }
            NodeKind::Try { block, handler, finalizer } => {
                swap_in(block, old, new, h);
                swap_opt_in(handler, old, new, h);
                swap_opt_in(finalizer, old, new, h);
            }
            NodeKind::Catch { param, body } => {
                swap_in(param, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::Labeled { body, .. } => swap_in(body, old, new, h),
            NodeKind::Return { argument } => swap_opt_in(argument, old, new, h),
            NodeKind::Break { .. } | NodeKind::Continue { .. } | NodeKind::Empty | NodeKind::This => {}
            NodeKind::Throw { argument } => swap_in(argument, old, new, h),
            NodeKind::FunctionDecl { id, params, body } => {
                swap_in(id, old, new, h);
                swap_vec_in(params, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::FunctionExpr { id, params, body } => {
                swap_opt_in(id, old, new, h);
                swap_vec_in(params, old, new, h);
                swap_in(body, old, new, h);
            }
            NodeKind::Ident { .. } | NodeKind::Literal { .. } => {}
            NodeKind::Array { elements } => swap_vec_in(elements, old, new, h),
            NodeKind::ObjectLit { properties } => swap_vec_in(properties, old, new, h),
            NodeKind::Property { key, value } => {
                swap_in(key, old, new, h);
                swap_in(value, old, new, h);
            }
            NodeKind::Member { object, property, .. } => {
                swap_in(object, old, new, h);
                swap_in(property, old, new, h);
            }
            NodeKind::Call { callee, arguments } | NodeKind::New { callee, arguments } => {
                swap_in(callee, old, new, h);
                swap_vec_in(arguments, old, new, h);
            }
            NodeKind::Unary { argument, .. } | NodeKind::Update { argument, .. } => {
                swap_in(argument, old, new, h)
            }
            NodeKind::Binary { left, right, .. }
            | NodeKind::Logical { left, right, .. }
            | NodeKind::Assign { left, right, .. } => {
                swap_in(left, old, new, h);
                swap_in(right, old, new, h);
            }
            NodeKind::Conditional { test, consequent, alternate } => {
                swap_in(test, old, new, h);
                swap_in(consequent, old, new, h);
                swap_in(alternate, old, new, h);
            }
            NodeKind::Sequence { expressions } => swap_vec_in(expressions, old, new, h),
        }
        hit
    }
}

/// One arena entry.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub marks: Marks,
}

/// Owning store for one tree (plus any detached templates built along the way).
#[derive(Debug, Default, Clone)]
pub struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocated nodes (detached templates included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and claim its children.
    pub fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let children = kind.child_slots();
        self.nodes.push(Node { kind, parent: None, marks: Marks::default() });
        for child in children {
            self.nodes[child.index()].parent = Some(id);
        }
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Raw mutable access to a node's kind. The caller is responsible for
    /// re-wiring parent links when child slots change; prefer the dedicated
    /// surgery helpers.
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn marks(&self, id: NodeId) -> &Marks {
        &self.nodes[id.index()].marks
    }

    pub fn marks_mut(&mut self, id: NodeId) -> &mut Marks {
        &mut self.nodes[id.index()].marks
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.nodes[id.index()].parent = parent;
    }

    /// Children of `id` in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).child_slots()
    }

    /// Swap `old` for `new` in the child slots of `parent`, updating parent
    /// links on both children. Panic-free: a miss is reported by return value
    /// so callers can surface it as a structural violation.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let hit = self.nodes[parent.index()].kind.replace_slot(old, new);
        if hit {
            self.nodes[new.index()].parent = Some(parent);
            if self.nodes[old.index()].parent == Some(parent) {
                self.nodes[old.index()].parent = None;
            }
        }
        hit
    }

    /// Statement list of a `Program` or `Block` node.
    pub fn body(&self, block: NodeId) -> &[NodeId] {
        match self.kind(block) {
            NodeKind::Program { body } | NodeKind::Block { body } => body,
            _ => &[],
        }
    }

    /// Insert `stmt` into a `Program`/`Block` body at `idx`.
    pub fn insert_into_body(&mut self, block: NodeId, idx: usize, stmt: NodeId) {
        if let NodeKind::Program { body } | NodeKind::Block { body } = &mut self.nodes[block.index()].kind {
            let idx = idx.min(body.len());
            body.insert(idx, stmt);
            self.nodes[stmt.index()].parent = Some(block);
        }
    }

    pub fn push_body(&mut self, block: NodeId, stmt: NodeId) {
        let idx = self.body(block).len();
        self.insert_into_body(block, idx, stmt);
    }

    /// Detach and return the statement list of a `Program`/`Block`.
    pub fn take_body(&mut self, block: NodeId) -> Vec<NodeId> {
        if let NodeKind::Program { body } | NodeKind::Block { body } = &mut self.nodes[block.index()].kind {
            let taken = std::mem::take(body);
            for stmt in &taken {
                self.nodes[stmt.index()].parent = None;
            }
            taken
        } else {
            Vec::new()
        }
    }

    /// Replace the statement list of a `Program`/`Block`.
    pub fn set_body(&mut self, block: NodeId, stmts: Vec<NodeId>) {
        for stmt in &stmts {
            self.nodes[stmt.index()].parent = Some(block);
        }
        if let NodeKind::Program { body } | NodeKind::Block { body } = &mut self.nodes[block.index()].kind {
            *body = stmts;
        }
    }

    /// Deep-copy the subtree rooted at `id`; the copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.kind(id).clone();
        let marks = self.marks(id).clone();
        let children = kind.child_slots();
        let mut mapped = kind;
        for child in children {
            let copy = self.clone_subtree(child);
            mapped.replace_slot(child, copy);
        }
        let new_id = self.alloc(mapped);
        self.nodes[new_id.index()].marks = marks;
        new_id
    }

    /// Graft the subtree rooted at `root` of `other` into this arena,
    /// remapping handles. The grafted root is detached.
    pub fn import(&mut self, other: &Arena, root: NodeId) -> NodeId {
        let kind = other.kind(root).clone();
        let marks = other.marks(root).clone();
        let children = kind.child_slots();
        let mut mapped = kind;
        for child in children {
            let copy = self.import(other, child);
            mapped.replace_slot(child, copy);
        }
        let new_id = self.alloc(mapped);
        self.nodes[new_id.index()].marks = marks;
        new_id
    }
}

/// True for node kinds that may occupy a statement-list slot.
pub fn is_statement(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Program { .. }
            | NodeKind::Block { .. }
            | NodeKind::VarDecl { .. }
            | NodeKind::ExprStmt { .. }
            | NodeKind::If { .. }
            | NodeKind::While { .. }
            | NodeKind::DoWhile { .. }
            | NodeKind::For { .. }
            | NodeKind::ForIn { .. }
            | NodeKind::Switch { .. }
            | NodeKind::Try { .. }
            | NodeKind::Labeled { .. }
            | NodeKind::Return { .. }
            | NodeKind::Break { .. }
            | NodeKind::Continue { .. }
            | NodeKind::Throw { .. }
            | NodeKind::Empty
            | NodeKind::FunctionDecl { .. }
    )
}

/// True for statements that contain nested control structure and must be
/// split out of simple runs during flattening.
pub fn is_compound_statement(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Block { .. }
            | NodeKind::If { .. }
            | NodeKind::Switch { .. }
            | NodeKind::Try { .. }
            | NodeKind::While { .. }
            | NodeKind::DoWhile { .. }
            | NodeKind::For { .. }
            | NodeKind::ForIn { .. }
            | NodeKind::Labeled { .. }
    )
}

pub fn is_expression(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::FunctionExpr { .. }
            | NodeKind::Ident { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Array { .. }
            | NodeKind::ObjectLit { .. }
            | NodeKind::Member { .. }
            | NodeKind::Call { .. }
            | NodeKind::New { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Update { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Logical { .. }
            | NodeKind::Assign { .. }
            | NodeKind::Conditional { .. }
            | NodeKind::Sequence { .. }
            | NodeKind::This
    )
}

pub fn is_function(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::FunctionDecl { .. } | NodeKind::FunctionExpr { .. })
}

/// Depth-first post-order rewrite: children are processed before their parent,
/// and a callback may return a different node to occupy the slot. Replacement
/// subtrees are not revisited.
pub fn rewrite_postorder<F>(arena: &mut Arena, root: NodeId, f: &mut F) -> NodeId
where
    F: FnMut(&mut Arena, NodeId) -> NodeId,
{
    let children = arena.children(root);
    for child in children {
        let replacement = rewrite_postorder(arena, child, f);
        if replacement != child {
            arena.replace_child(root, child, replacement);
        }
    }
    f(arena, root)
}

/// Read-only depth-first pre-order walk.
pub fn walk_preorder<F>(arena: &Arena, root: NodeId, f: &mut F)
where
    F: FnMut(&Arena, NodeId),
{
    f(arena, root);
    for child in arena.children(root) {
        walk_preorder(arena, child, f);
    }
}
