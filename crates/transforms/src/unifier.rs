//! Dispatch-table unification.
//!
//! After every method has been flattened into the shared dispatcher, the
//! per-method frame declarations and argument-array prologues are superseded
//! by two program-wide declarations at the top of the dispatcher body. Frame
//! storage is unioned in id-space only: the unified declaration executes per
//! invocation, so recursive calls into the dispatcher get disjoint frames
//! while sharing one slot layout.

use crate::flattener::STATE_VAR;
use crate::methods::{ARGUMENTS_VAR, DISPATCHER_NAME};
use crate::Result;
use veil_core::ast::{self, build, Arena, Lit, NodeId, NodeKind};

pub const UNIFIED_SCOPE: &str = "$$unifiedScope";

pub struct Unifier;

impl Unifier {
    /// Merge per-method frame and argument bookkeeping into the unified
    /// declarations inside the dispatcher.
    pub fn unify(arena: &mut Arena, program: NodeId) -> Result<()> {
        let mut max_slot: usize = 0;

        ast::rewrite_postorder(arena, program, &mut |arena, node| {
            let marks = arena.marks(node).clone();
            if marks.scope_object {
                // Superseded by the unified frame declaration.
                return build::empty(arena);
            }
            if marks.reassigning_arguments && !marks.follows_slicing_arguments {
                // Superseded by the unified argument alias.
                return build::empty(arena);
            }
            if marks.scope_object_ref {
                if let NodeKind::Member { property, .. } = arena.kind(node) {
                    if let NodeKind::Literal { value: Lit::Num(index) } = arena.kind(*property) {
                        max_slot = max_slot.max(*index as usize);
                    }
                }
            }
            if let NodeKind::Ident { name } = arena.kind_mut(node) {
                if name.starts_with("$$scope") {
                    *name = UNIFIED_SCOPE.to_string();
                }
            }
            node
        });

        let Some(dispatcher_body) = find_dispatcher_body(arena, program) else {
            return Err(veil_core::Error::Structural(
                "unified program has no dispatcher function".to_string(),
            )
            .into());
        };

        // var $$unifiedScope = new Array(maxSlot + 1);
        let array_ctor = build::ident(arena, "Array");
        let capacity = build::num(arena, (max_slot + 1) as f64);
        let frame = build::new_expr(arena, array_ctor, vec![capacity]);
        let frame_decl = build::var_decl(arena, UNIFIED_SCOPE, Some(frame));
        arena.insert_into_body(dispatcher_body, 0, frame_decl);

        // var $$veil$arguments = arguments;
        let args = build::ident(arena, "arguments");
        let args_decl = build::var_decl(arena, ARGUMENTS_VAR, Some(args));
        arena.insert_into_body(dispatcher_body, 1, args_decl);

        Ok(())
    }
}

fn find_dispatcher_body(arena: &Arena, program: NodeId) -> Option<NodeId> {
    for stmt in arena.body(program) {
        if let NodeKind::FunctionDecl { id, params, body } = arena.kind(*stmt) {
            let named_main = matches!(arena.kind(*id), NodeKind::Ident { name } if name == DISPATCHER_NAME);
            let state_param = params.first().is_some_and(
                |param| matches!(arena.kind(*param), NodeKind::Ident { name } if name == STATE_VAR),
            );
            if named_main && state_param {
                return Some(*body);
            }
        }
    }
    None
}
