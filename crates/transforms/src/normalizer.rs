//! Control-construct normalization.
//!
//! Desugars `for`, `for-in`, `switch` and `try/finally` into the primitive
//! set the flattener understands: blocks, `if`, `while`, `try/catch` and the
//! terminal statements. Nested blocks are merged along the way. Re-running
//! the pass on its own output is a no-op.

use crate::Result;
use tracing::warn;
use veil_core::ast::{self, build, Arena, BinaryOp, LogicalOp, NodeId, NodeKind};
use veil_core::seed::NameAllocator;

const RETURN_TEMP: &str = "$$veil$return";
const CAUGHT_TEMP: &str = "$$veil$e";
const PENDING_TEMP: &str = "$$veil$_e";

pub struct Normalizer {
    names: NameAllocator,
}

impl Normalizer {
    pub fn new(names: NameAllocator) -> Self {
        Self { names }
    }

    /// Simplify the tree rooted at `root`, returning the (possibly replaced)
    /// root.
    pub fn simplify(&mut self, arena: &mut Arena, root: NodeId) -> Result<NodeId> {
        let mut failure: Option<crate::Error> = None;
        let result = ast::rewrite_postorder(arena, root, &mut |arena, node| {
            if failure.is_some() {
                return node;
            }
            let replaced = match arena.kind(node) {
                NodeKind::Program { .. } | NodeKind::Block { .. } => {
                    Ok(self.merge_nested_blocks(arena, node))
                }
                NodeKind::For { .. } => self.simplify_for(arena, node),
                NodeKind::ForIn { .. } => match self.simplify_for_in(arena, node) {
                    Ok(desugared) => self.simplify_for(arena, desugared),
                    Err(error) => Err(error),
                },
                NodeKind::Switch { .. } => self.simplify_switch(arena, node),
                NodeKind::Try { .. } => self.simplify_try(arena, node),
                _ => Ok(node),
            };
            match replaced {
                Ok(id) => id,
                Err(error) => {
                    failure = Some(error);
                    node
                }
            }
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(result),
        }
    }

    /// Inline nested block statements into their parent statement list.
    fn merge_nested_blocks(&mut self, arena: &mut Arena, node: NodeId) -> NodeId {
        fn flatten(arena: &mut Arena, block: NodeId, out: &mut Vec<NodeId>) {
            for stmt in arena.take_body(block) {
                if matches!(arena.kind(stmt), NodeKind::Block { .. } | NodeKind::Program { .. }) {
                    flatten(arena, stmt, out);
                } else {
                    out.push(stmt);
                }
            }
        }
        let mut stmts = Vec::new();
        flatten(arena, node, &mut stmts);
        arena.set_body(node, stmts);
        node
    }

    /// `for (init; test; update) body` -> `{ init; while (test) { body; update; } }`
    fn simplify_for(&mut self, arena: &mut Arena, node: NodeId) -> Result<NodeId> {
        let NodeKind::For { init, test, update, body } = arena.kind(node).clone() else {
            return Ok(node);
        };

        let mut out = Vec::new();
        if let Some(init) = init {
            match arena.kind(init) {
                NodeKind::VarDecl { .. } | NodeKind::ExprStmt { .. } => out.push(init),
                kind if ast::is_expression(kind) => out.push(build::expr_stmt(arena, init)),
                kind => {
                    return Err(veil_core::Error::UnexpectedNode {
                        kind: kind.name(),
                        context: "for initializer",
                    }
                    .into())
                }
            }
        }

        let mut loop_body = match arena.kind(body) {
            NodeKind::Block { .. } => arena.take_body(body),
            _ => vec![body],
        };
        if let Some(update) = update {
            loop_body.push(build::expr_stmt(arena, update));
        }
        let loop_block = build::block(arena, loop_body);
        let test = match test {
            Some(test) => test,
            None => build::bool_lit(arena, true),
        };
        out.push(arena.alloc(NodeKind::While { test, body: loop_block }));
        Ok(build::block(arena, out))
    }

    /// `for (k in o) body` -> an index-driven `for` over `Object.keys(o)`.
    fn simplify_for_in(&mut self, arena: &mut Arena, node: NodeId) -> Result<NodeId> {
        let NodeKind::ForIn { left, right, body } = arena.kind(node).clone() else {
            return Ok(node);
        };

        let props_name = format!("$$forin$props${}", self.names.get()?);
        let iter_name = format!("$$forin$iter${}", self.names.get()?);

        // var $$forin$props = Object.keys(right), $$forin$iter = 0;
        let object = build::ident(arena, "Object");
        let keys = build::member(arena, object, "keys");
        let keys_call = build::call(arena, keys, vec![right]);
        let props_id = build::ident(arena, &props_name);
        let props_declarator =
            arena.alloc(NodeKind::VarDeclarator { id: props_id, init: Some(keys_call) });
        let iter_id = build::ident(arena, &iter_name);
        let zero = build::num(arena, 0.0);
        let iter_declarator =
            arena.alloc(NodeKind::VarDeclarator { id: iter_id, init: Some(zero) });
        let init =
            arena.alloc(NodeKind::VarDecl { declarations: vec![props_declarator, iter_declarator] });

        // $$forin$iter < $$forin$props.length
        let iter_ref = build::ident(arena, &iter_name);
        let props_ref = build::ident(arena, &props_name);
        let length = build::member(arena, props_ref, "length");
        let test = build::binary(arena, BinaryOp::Lt, iter_ref, length);

        // ++$$forin$iter
        let iter_ref = build::ident(arena, &iter_name);
        let update = arena.alloc(NodeKind::Update {
            op: ast::UpdateOp::Inc,
            argument: iter_ref,
            prefix: true,
        });

        // key := $$forin$props[$$forin$iter]
        let props_ref = build::ident(arena, &props_name);
        let iter_ref = build::ident(arena, &iter_name);
        let key = build::member_computed(arena, props_ref, iter_ref);
        let bind = match arena.kind(left).clone() {
            NodeKind::VarDecl { declarations } => {
                let target = declarations
                    .first()
                    .and_then(|declarator| match arena.kind(*declarator) {
                        NodeKind::VarDeclarator { id, .. } => Some(*id),
                        _ => None,
                    })
                    .ok_or(veil_core::Error::UnexpectedNode {
                        kind: "VarDecl",
                        context: "for-in target",
                    })?;
                let declarator =
                    arena.alloc(NodeKind::VarDeclarator { id: target, init: Some(key) });
                arena.alloc(NodeKind::VarDecl { declarations: vec![declarator] })
            }
            _ => {
                let assignment = build::assign(arena, left, key);
                build::expr_stmt(arena, assignment)
            }
        };

        let for_body = build::block(arena, vec![bind, body]);
        Ok(arena.alloc(NodeKind::For {
            init: Some(init),
            test: Some(test),
            update: Some(update),
            body: for_body,
        }))
    }

    /// `switch` -> nested `if` chain preserving fall-through groups.
    fn simplify_switch(&mut self, arena: &mut Arena, node: NodeId) -> Result<NodeId> {
        let NodeKind::Switch { discriminant, cases } = arena.kind(node).clone() else {
            return Ok(node);
        };

        struct CaseInfo {
            test: Option<NodeId>,
            stmts: Vec<NodeId>,
        }

        // Split each consequent at its first top-level break; what follows a
        // break is unreachable and dropped.
        let mut groups: Vec<Vec<CaseInfo>> = Vec::new();
        let mut pending: Vec<CaseInfo> = Vec::new();
        for case in cases {
            let NodeKind::SwitchCase { test, consequent } = arena.kind(case).clone() else {
                continue;
            };
            let break_at = consequent
                .iter()
                .position(|stmt| matches!(arena.kind(*stmt), NodeKind::Break { label: None }));
            let breaks = break_at.is_some();
            let stmts: Vec<NodeId> =
                consequent[..break_at.unwrap_or(consequent.len())].to_vec();
            for stmt in &stmts {
                arena.set_parent(*stmt, None);
            }
            pending.push(CaseInfo { test, stmts });
            if breaks {
                groups.push(std::mem::take(&mut pending));
            }
        }
        if !pending.is_empty() {
            groups.push(pending);
        }

        // Build each fall-through group as a nested accumulation: entering at
        // case j executes the statements of j, j+1, ... to the group's end.
        let mut built: Vec<NodeId> = Vec::new();
        for group in &groups {
            let mut acc: Option<NodeId> = None;
            for j in 0..group.len() {
                let mut body: Vec<NodeId> = acc.into_iter().collect();
                body.extend(group[j].stmts.iter().copied());
                let all_tested = group[..=j].iter().all(|case| case.test.is_some());
                if all_tested {
                    let mut condition: Option<NodeId> = None;
                    for case in &group[..=j] {
                        let Some(test) = case.test else { continue };
                        // Tests recur in the conditions of every later case
                        // of the group, so each use clones.
                        let test = arena.clone_subtree(test);
                        let discriminant_clone = arena.clone_subtree(discriminant);
                        let comparison =
                            build::binary(arena, BinaryOp::Eq, test, discriminant_clone);
                        condition = Some(match condition {
                            Some(left) => arena.alloc(NodeKind::Logical {
                                op: LogicalOp::Or,
                                left,
                                right: comparison,
                            }),
                            None => comparison,
                        });
                    }
                    let test = condition.unwrap_or_else(|| build::bool_lit(arena, true));
                    let consequent = build::block(arena, body);
                    acc = Some(arena.alloc(NodeKind::If { test, consequent, alternate: None }));
                } else {
                    acc = Some(build::block(arena, body));
                }
            }
            if let Some(group_node) = acc {
                built.push(group_node);
            }
        }

        // Chain groups with `else`; a default-bearing group closes the chain.
        let mut combined: Option<NodeId> = None;
        for group_node in built.into_iter().rev() {
            match arena.kind(group_node) {
                NodeKind::If { .. } => {
                    if let Some(tail) = combined {
                        if let NodeKind::If { alternate, .. } = arena.kind_mut(group_node) {
                            *alternate = Some(tail);
                        }
                        arena.set_parent(tail, Some(group_node));
                    }
                    combined = Some(group_node);
                }
                _ => {
                    if combined.is_some() {
                        warn!(
                            "switch groups after a default group are unreachable in the lowered form"
                        );
                    }
                    combined = Some(group_node);
                }
            }
        }

        Ok(match combined {
            Some(chain) => chain,
            None => build::empty(arena),
        })
    }

    /// Eliminate `finally` clauses; only plain `try/catch` survives.
    fn simplify_try(&mut self, arena: &mut Arena, node: NodeId) -> Result<NodeId> {
        let NodeKind::Try { block, handler, finalizer } = arena.kind(node).clone() else {
            return Ok(node);
        };
        let Some(finalizer) = finalizer else {
            return Ok(node);
        };

        if let Some(handler) = handler {
            // try/catch/finally splits into try { try/catch } finally.
            let inner = arena.alloc(NodeKind::Try { block, handler: Some(handler), finalizer: None });
            let outer_block = build::block(arena, vec![inner]);
            let outer = arena.alloc(NodeKind::Try {
                block: outer_block,
                handler: None,
                finalizer: Some(finalizer),
            });
            return self.simplify_try(arena, outer);
        }

        // Finalizer only: stage every return through a temporary so the
        // return expression still evaluates before the finalizer runs.
        self.stage_returns(arena, block, finalizer);

        // try { block } catch ($$veil$e) { var $$veil$_e = $$veil$e; }
        let caught_ref = build::ident(arena, CAUGHT_TEMP);
        let pending_decl = build::var_decl(arena, PENDING_TEMP, Some(caught_ref));
        let handler_body = build::block(arena, vec![pending_decl]);
        let param = build::ident(arena, CAUGHT_TEMP);
        let catch = arena.alloc(NodeKind::Catch { param, body: handler_body });
        let lowered = arena.alloc(NodeKind::Try { block, handler: Some(catch), finalizer: None });

        // if ($$veil$_e) throw $$veil$_e;
        let pending_ref = build::ident(arena, PENDING_TEMP);
        let rethrow_value = build::ident(arena, PENDING_TEMP);
        let rethrow = build::throw(arena, rethrow_value);
        let redeliver = arena.alloc(NodeKind::If {
            test: pending_ref,
            consequent: rethrow,
            alternate: None,
        });

        Ok(build::block(arena, vec![lowered, finalizer, redeliver]))
    }

    /// Rewrite `return x` inside `block` (not crossing function boundaries)
    /// into `{ var $$veil$return = x; <finalizer>; return $$veil$return; }`.
    fn stage_returns(&mut self, arena: &mut Arena, block: NodeId, finalizer: NodeId) {
        let children = arena.children(block);
        for child in children {
            if ast::is_function(arena.kind(child)) {
                continue;
            }
            if let NodeKind::Return { argument } = arena.kind(child).clone() {
                let staged = build::var_decl(arena, RETURN_TEMP, argument);
                let finalizer_copy = arena.clone_subtree(finalizer);
                let staged_ref = build::ident(arena, RETURN_TEMP);
                let rewritten_return = build::ret(arena, Some(staged_ref));
                let replacement =
                    build::block(arena, vec![staged, finalizer_copy, rewritten_return]);
                arena.replace_child(block, child, replacement);
            } else {
                self.stage_returns(arena, child, finalizer);
            }
        }
    }
}
