//! Tree cleanup after the main pipeline: nested `$$veil$bind` calls merge
//! into one variadic call, and the empty statements earlier passes left as
//! placeholders are swept out of statement lists.

use crate::scopes::BIND_HELPER;
use veil_core::ast::{self, Arena, NodeId, NodeKind};

pub struct Postprocess;

impl Postprocess {
    pub fn run(arena: &mut Arena, root: NodeId) -> NodeId {
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            if is_bind_call(arena, node) {
                merge_nested_binds(arena, node);
            }
            node
        });
        sweep_empties(arena, root);
        root
    }
}

/// `$$veil$bind($$veil$bind(f, a), b)` -> `$$veil$bind(f, a, b)`.
fn merge_nested_binds(arena: &mut Arena, node: NodeId) {
    loop {
        let NodeKind::Call { arguments, .. } = arena.kind(node) else {
            return;
        };
        let Some(&head) = arguments.first() else {
            return;
        };
        if !is_bind_call(arena, head) {
            return;
        }
        let NodeKind::Call { arguments: inner_args, .. } = arena.kind(head).clone() else {
            return;
        };
        let NodeKind::Call { arguments, .. } = arena.kind_mut(node) else {
            return;
        };
        let mut merged = inner_args.clone();
        merged.extend(arguments.iter().skip(1).copied());
        *arguments = merged;
        for argument in inner_args {
            arena.set_parent(argument, Some(node));
        }
    }
}

fn is_bind_call(arena: &Arena, node: NodeId) -> bool {
    match arena.kind(node) {
        NodeKind::Call { callee, .. } => {
            matches!(arena.kind(*callee), NodeKind::Ident { name } if name == BIND_HELPER)
        }
        _ => false,
    }
}

/// Drop `Empty` statements from statement lists and case consequents.
fn sweep_empties(arena: &mut Arena, root: NodeId) {
    let mut lists: Vec<NodeId> = Vec::new();
    ast::walk_preorder(arena, root, &mut |arena, node| {
        if matches!(
            arena.kind(node),
            NodeKind::Program { .. } | NodeKind::Block { .. } | NodeKind::SwitchCase { .. }
        ) {
            lists.push(node);
        }
    });
    for list in lists {
        let keep: Vec<NodeId> = match arena.kind(list) {
            NodeKind::Program { body } | NodeKind::Block { body } => body
                .iter()
                .copied()
                .filter(|stmt| !matches!(arena.kind(*stmt), NodeKind::Empty))
                .collect(),
            NodeKind::SwitchCase { consequent, .. } => consequent
                .iter()
                .copied()
                .filter(|stmt| !matches!(arena.kind(*stmt), NodeKind::Empty))
                .collect(),
            _ => continue,
        };
        match arena.kind_mut(list) {
            NodeKind::Program { body } | NodeKind::Block { body } => *body = keep,
            NodeKind::SwitchCase { consequent, .. } => *consequent = keep,
            _ => {}
        }
    }
}
