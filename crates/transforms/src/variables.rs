//! Identifier preparation ahead of scope materialization: function
//! declarations become `var f = function () {}` expressions, every resolved
//! binding gets a globally unique name, and parameters are copied into
//! ordinary locals so later passes can treat them like any other variable.

use crate::Result;
use veil_core::ast::{self, build, Arena, NodeId, NodeKind};
use veil_core::resolver::{DefKind, ScopeGraph};
use veil_core::seed::NameAllocator;

pub struct Variables;

impl Variables {
    /// Strip ids from function expressions. They confuse the
    /// declaration-to-expression conversion and scope analysis, and nothing
    /// downstream needs them.
    pub fn remove_function_expression_ids(arena: &mut Arena, root: NodeId) {
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            if let NodeKind::FunctionExpr { id, .. } = arena.kind_mut(node) {
                *id = None;
            }
            node
        });
    }

    /// Convert `function f() { ... }` declarations into
    /// `var f = function () { ... };` at the top of their scope.
    pub fn function_declaration_to_expression(
        arena: &mut Arena,
        graph: &ScopeGraph,
    ) {
        for scope in &graph.scopes {
            for variable in &scope.variables {
                for def in &variable.defs {
                    if def.kind != DefKind::FunctionName {
                        continue;
                    }
                    let NodeKind::FunctionDecl { id, params, body } = arena.kind(def.node).clone()
                    else {
                        continue;
                    };
                    let Some(parent) = arena.parent(def.node) else {
                        continue;
                    };
                    let placeholder = build::empty(arena);
                    arena.replace_child(parent, def.node, placeholder);

                    let function = arena.alloc(NodeKind::FunctionExpr { id: None, params, body });
                    let declarator =
                        arena.alloc(NodeKind::VarDeclarator { id, init: Some(function) });
                    let declaration =
                        arena.alloc(NodeKind::VarDecl { declarations: vec![declarator] });
                    arena.insert_into_body(scope.body, 0, declaration);
                }
            }
        }
    }

    /// Rename every resolved binding to a unique `$$var$<n>$<name>` form so
    /// later passes can key on names without collisions.
    pub fn obfuscate_identifiers(
        arena: &mut Arena,
        graph: &ScopeGraph,
        names: &mut NameAllocator,
    ) -> Result<()> {
        for scope in &graph.scopes {
            for variable in &scope.variables {
                if variable.defs.is_empty() {
                    continue;
                }
                let fresh = format!("$$var${}${}", names.get()?, variable.name);
                for def in &variable.defs {
                    rename(arena, def.ident, &fresh);
                }
                for reference in &variable.references {
                    rename(arena, *reference, &fresh);
                }
            }
        }
        Ok(())
    }

    /// Copy each parameter into a `$$arg$<n>` local and point references at
    /// the copy, leaving the parameter itself referenced exactly once.
    pub fn redefine_parameters(
        arena: &mut Arena,
        graph: &ScopeGraph,
        names: &mut NameAllocator,
    ) -> Result<()> {
        for scope in &graph.scopes {
            for variable in &scope.variables {
                for def in &variable.defs {
                    if def.kind != DefKind::Parameter {
                        continue;
                    }
                    let fresh = format!("$$arg${}", names.get()?);
                    let param_name = match arena.kind(def.ident) {
                        NodeKind::Ident { name } => name.clone(),
                        _ => continue,
                    };
                    let init = build::ident(arena, &param_name);
                    let copy = build::var_decl(arena, &fresh, Some(init));
                    arena.insert_into_body(scope.body, 0, copy);

                    for reference in &variable.references {
                        rename(arena, *reference, &fresh);
                    }
                }
            }
        }
        Ok(())
    }
}

fn rename(arena: &mut Arena, ident: NodeId, to: &str) {
    if let NodeKind::Ident { name } = arena.kind_mut(ident) {
        *name = to.to_string();
    }
}
