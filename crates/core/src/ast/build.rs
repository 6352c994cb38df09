//! Shorthand constructors for synthesized AST fragments.
//!
//! Passes build a lot of small expressions (state assignments, frame slots,
//! bind calls); these helpers keep that code readable. Every constructor
//! allocates into the arena and wires parent links via [`Arena::alloc`].

use super::{Arena, AssignOp, BinaryOp, Lit, NodeId, NodeKind};

pub fn ident(arena: &mut Arena, name: &str) -> NodeId {
    arena.alloc(NodeKind::Ident { name: name.to_string() })
}

pub fn num(arena: &mut Arena, value: f64) -> NodeId {
    arena.alloc(NodeKind::Literal { value: Lit::Num(value) })
}

pub fn str_lit(arena: &mut Arena, value: &str) -> NodeId {
    arena.alloc(NodeKind::Literal { value: Lit::Str(value.to_string()) })
}

pub fn bool_lit(arena: &mut Arena, value: bool) -> NodeId {
    arena.alloc(NodeKind::Literal { value: Lit::Bool(value) })
}

pub fn null_lit(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::Literal { value: Lit::Null })
}

pub fn array(arena: &mut Arena, elements: Vec<NodeId>) -> NodeId {
    arena.alloc(NodeKind::Array { elements })
}

pub fn object(arena: &mut Arena, properties: Vec<NodeId>) -> NodeId {
    arena.alloc(NodeKind::ObjectLit { properties })
}

/// `object.name` (static member access).
pub fn member(arena: &mut Arena, object: NodeId, name: &str) -> NodeId {
    let property = ident(arena, name);
    arena.alloc(NodeKind::Member { object, property, computed: false })
}

/// `object[property]` (computed member access).
pub fn member_computed(arena: &mut Arena, object: NodeId, property: NodeId) -> NodeId {
    arena.alloc(NodeKind::Member { object, property, computed: true })
}

/// `frame[index]` — indexed access into a materialized scope frame.
pub fn frame_slot(arena: &mut Arena, frame_name: &str, index: usize) -> NodeId {
    let object = ident(arena, frame_name);
    let property = num(arena, index as f64);
    let slot = arena.alloc(NodeKind::Member { object, property, computed: true });
    arena.marks_mut(slot).scope_object_ref = true;
    slot
}

pub fn call(arena: &mut Arena, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
    arena.alloc(NodeKind::Call { callee, arguments })
}

pub fn call_named(arena: &mut Arena, callee: &str, arguments: Vec<NodeId>) -> NodeId {
    let callee = ident(arena, callee);
    call(arena, callee, arguments)
}

pub fn new_expr(arena: &mut Arena, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
    arena.alloc(NodeKind::New { callee, arguments })
}

pub fn assign(arena: &mut Arena, left: NodeId, right: NodeId) -> NodeId {
    arena.alloc(NodeKind::Assign { op: AssignOp::Assign, left, right })
}

pub fn binary(arena: &mut Arena, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
    arena.alloc(NodeKind::Binary { op, left, right })
}

pub fn conditional(arena: &mut Arena, test: NodeId, consequent: NodeId, alternate: NodeId) -> NodeId {
    arena.alloc(NodeKind::Conditional { test, consequent, alternate })
}

pub fn expr_stmt(arena: &mut Arena, expression: NodeId) -> NodeId {
    arena.alloc(NodeKind::ExprStmt { expression })
}

pub fn block(arena: &mut Arena, body: Vec<NodeId>) -> NodeId {
    arena.alloc(NodeKind::Block { body })
}

pub fn empty(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::Empty)
}

pub fn ret(arena: &mut Arena, argument: Option<NodeId>) -> NodeId {
    arena.alloc(NodeKind::Return { argument })
}

pub fn brk(arena: &mut Arena) -> NodeId {
    arena.alloc(NodeKind::Break { label: None })
}

pub fn throw(arena: &mut Arena, argument: NodeId) -> NodeId {
    arena.alloc(NodeKind::Throw { argument })
}

/// `var name = init;` (single declarator).
pub fn var_decl(arena: &mut Arena, name: &str, init: Option<NodeId>) -> NodeId {
    let id = ident(arena, name);
    let declarator = arena.alloc(NodeKind::VarDeclarator { id, init });
    arena.alloc(NodeKind::VarDecl { declarations: vec![declarator] })
}

/// `state = <value>;` as a statement.
pub fn state_assign(arena: &mut Arena, state_name: &str, value: u32) -> NodeId {
    let left = ident(arena, state_name);
    let right = num(arena, value as f64);
    let assignment = assign(arena, left, right);
    expr_stmt(arena, assignment)
}

/// `function name(params) { body }` as a declaration.
pub fn function_decl(arena: &mut Arena, name: &str, params: Vec<NodeId>, body: NodeId) -> NodeId {
    let id = ident(arena, name);
    arena.alloc(NodeKind::FunctionDecl { id, params, body })
}

/// `function (params) { body }` as an expression.
pub fn function_expr(arena: &mut Arena, params: Vec<NodeId>, body: NodeId) -> NodeId {
    arena.alloc(NodeKind::FunctionExpr { id: None, params, body })
}
