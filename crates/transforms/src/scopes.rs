//! Scope materialization.
//!
//! Every scope's variables move into an explicit indexed frame:
//!
//! ```text
//! var a = 1, b = 2;        var $$scope$abc = [];
//!                     ->   $$scope$abc[0] = 1;
//!                          $$scope$abc[1] = 2;
//! ```
//!
//! References become indexed frame accesses, catch bindings are captured into
//! their scope's frame, and nested functions receive the enclosing frame as a
//! prepended parameter (every function expression is wrapped in a
//! `$$veil$bind` call that supplies it). Closure capture thereby becomes
//! explicit data flow that survives relocation.
//!
//! Slot indices are assigned in discovery order and never reused. Catch
//! scopes continue the numbering of their enclosing function frame, so the
//! id-space union the unifier later performs cannot alias a live local.

use crate::Result;
use veil_core::ast::{self, build, Arena, NodeId, NodeKind};
use veil_core::resolver::{DefKind, ScopeGraph, ScopeKind};
use veil_core::seed::NameAllocator;

pub const BIND_HELPER: &str = "$$veil$bind";

pub struct Scopes;

impl Scopes {
    /// Materialize every scope in `graph` into an indexed frame.
    pub fn create_scope_objects(
        arena: &mut Arena,
        graph: &ScopeGraph,
        names: &mut NameAllocator,
    ) -> Result<()> {
        // Slot bases, outer scopes first: function and program frames start
        // at zero, catch frames extend their parent's numbering.
        let mut bases: Vec<usize> = Vec::with_capacity(graph.scopes.len());
        for scope in &graph.scopes {
            let base = match (scope.kind, scope.parent) {
                (ScopeKind::Catch, Some(parent)) => {
                    bases[parent.0] + graph.scope(parent).variables.len()
                }
                _ => 0,
            };
            bases.push(base);
        }

        for scope in &graph.scopes {
            let frame_name = format!("$$scope${}", names.get()?);

            let array = build::array(arena, Vec::new());
            let frame_decl = build::var_decl(arena, &frame_name, Some(array));
            arena.marks_mut(frame_decl).scope_object = true;
            arena.insert_into_body(scope.body, 0, frame_decl);

            for (offset, variable) in scope.variables.iter().enumerate() {
                let index = bases[scope.id.0] + offset;
                for def in &variable.defs {
                    match def.kind {
                        DefKind::Var => {
                            Self::materialize_declarator(arena, &frame_name, index, def.node);
                            Self::redirect_references(
                                arena,
                                &frame_name,
                                index,
                                &variable.references,
                            );
                        }
                        DefKind::CatchParam => {
                            let param_name = match arena.kind(def.ident) {
                                NodeKind::Ident { name } => name.clone(),
                                _ => continue,
                            };
                            let slot = build::frame_slot(arena, &frame_name, index);
                            let caught = build::ident(arena, &param_name);
                            let capture = build::assign(arena, slot, caught);
                            let capture = build::expr_stmt(arena, capture);
                            arena.insert_into_body(scope.body, 1, capture);
                            Self::redirect_references(
                                arena,
                                &frame_name,
                                index,
                                &variable.references,
                            );
                        }
                        DefKind::FunctionName => {
                            // The name stays a plain callable; references get
                            // bound to the frame so the callable can reach its
                            // captured variables wherever it ends up.
                            for reference in &variable.references {
                                let Some(parent) = arena.parent(*reference) else {
                                    continue;
                                };
                                let callee = build::ident(arena, BIND_HELPER);
                                let frame_ref = build::ident(arena, &frame_name);
                                let bound = arena.alloc(NodeKind::Call {
                                    callee,
                                    arguments: vec![*reference, frame_ref],
                                });
                                arena.replace_child(parent, *reference, bound);
                            }
                        }
                        // Parameters keep their slot (burned, never read);
                        // their references were redirected to `$$arg` copies
                        // earlier.
                        DefKind::Parameter => {}
                    }
                }
            }

            Self::thread_frame_through_functions(arena, scope.body, &frame_name);
        }
        Ok(())
    }

    /// Remove one declarator and leave `frame[index] = init;` behind.
    fn materialize_declarator(arena: &mut Arena, frame_name: &str, index: usize, declarator: NodeId) {
        let Some(declaration) = arena.parent(declarator) else {
            return;
        };
        let init = match arena.kind(declarator) {
            NodeKind::VarDeclarator { init, .. } => *init,
            _ => return,
        };

        let remaining = {
            let NodeKind::VarDecl { declarations } = arena.kind_mut(declaration) else {
                return;
            };
            declarations.retain(|d| *d != declarator);
            declarations.len()
        };
        arena.set_parent(declarator, None);

        let assignment = init.map(|init| {
            let slot = build::frame_slot(arena, frame_name, index);
            let assignment = build::assign(arena, slot, init);
            build::expr_stmt(arena, assignment)
        });

        let Some(decl_parent) = arena.parent(declaration) else {
            return;
        };
        match (assignment, remaining) {
            (None, 0) => {
                let placeholder = build::empty(arena);
                arena.replace_child(decl_parent, declaration, placeholder);
            }
            // No initializer, other declarators left: nothing to write.
            (None, _) => {}
            (Some(assignment), 0) => {
                arena.replace_child(decl_parent, declaration, assignment);
            }
            (Some(assignment), _) => {
                let combined = build::block(arena, vec![assignment]);
                arena.replace_child(decl_parent, declaration, combined);
                arena.push_body(combined, declaration);
            }
        }
    }

    fn redirect_references(
        arena: &mut Arena,
        frame_name: &str,
        index: usize,
        references: &[NodeId],
    ) {
        for reference in references {
            let Some(parent) = arena.parent(*reference) else {
                continue;
            };
            let slot = build::frame_slot(arena, frame_name, index);
            arena.replace_child(parent, *reference, slot);
        }
    }

    /// Prepend the frame as a parameter of every function in the subtree and
    /// wrap function expressions in `$$veil$bind(fn, frame)` so invoking them
    /// later supplies the captured frame.
    fn thread_frame_through_functions(arena: &mut Arena, body: NodeId, frame_name: &str) {
        ast::rewrite_postorder(arena, body, &mut |arena, node| {
            if !ast::is_function(arena.kind(node)) {
                return node;
            }
            let frame_param = build::ident(arena, frame_name);
            arena.set_parent(frame_param, Some(node));
            if let NodeKind::FunctionDecl { params, .. } | NodeKind::FunctionExpr { params, .. } =
                arena.kind_mut(node)
            {
                params.insert(0, frame_param);
            }

            if matches!(arena.kind(node), NodeKind::FunctionExpr { .. }) {
                let callee = build::ident(arena, BIND_HELPER);
                let frame_ref = build::ident(arena, frame_name);
                arena.alloc(NodeKind::Call { callee, arguments: vec![node, frame_ref] })
            } else {
                node
            }
        });
    }
}
