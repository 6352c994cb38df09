//! Identifier-level obfuscation: property accesses become computed, object
//! literals become `$$veil$toObject` calls over flat key/value arrays, and
//! literals are hoisted into one shared `$$veil$literals` pool.

use veil_core::ast::{self, build, Arena, Lit, NodeId, NodeKind};

const LITERALS_POOL: &str = "$$veil$literals";
const TO_OBJECT_HELPER: &str = "$$veil$toObject";

pub struct Identifiers;

impl Identifiers {
    /// `obj.prop` -> `obj["prop"]`.
    pub fn compute_properties(arena: &mut Arena, root: NodeId) -> NodeId {
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            let property = match arena.kind(node) {
                NodeKind::Member { property, computed: false, .. } => *property,
                _ => return node,
            };
            let name = match arena.kind(property) {
                NodeKind::Ident { name } => name.clone(),
                _ => return node,
            };
            let literal = build::str_lit(arena, &name);
            arena.set_parent(literal, Some(node));
            if let NodeKind::Member { property, computed, .. } = arena.kind_mut(node) {
                *property = literal;
                *computed = true;
            }
            arena.set_parent(property, None);
            node
        })
    }

    /// `{ a: 1, b: 2 }` -> `$$veil$toObject(["a", 1, "b", 2])`.
    pub fn arrayize_objects(arena: &mut Arena, root: NodeId) -> NodeId {
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            let NodeKind::ObjectLit { properties } = arena.kind(node).clone() else {
                return node;
            };
            let mut elements = Vec::with_capacity(properties.len() * 2);
            for property in properties {
                let (key, value) = match arena.kind(property) {
                    NodeKind::Property { key, value } => (*key, *value),
                    _ => continue,
                };
                let key = match arena.kind(key) {
                    NodeKind::Ident { name } => {
                        let name = name.clone();
                        build::str_lit(arena, &name)
                    }
                    _ => key,
                };
                elements.push(key);
                elements.push(value);
            }
            let flat = build::array(arena, elements);
            build::call_named(arena, TO_OBJECT_HELPER, vec![flat])
        })
    }

    /// Move literal values into the shared pool and rewrite uses as indexed
    /// reads. Values deduplicate by equality.
    pub fn move_literals(arena: &mut Arena, root: NodeId) -> NodeId {
        let mut pool: Vec<Lit> = Vec::new();
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            let NodeKind::Literal { value } = arena.kind(node) else {
                return node;
            };
            if matches!(value, Lit::Null) {
                return node;
            }
            if let Some(parent) = arena.parent(node) {
                if matches!(arena.kind(parent), NodeKind::Property { .. }) {
                    return node;
                }
            } else {
                return node;
            }
            let value = value.clone();
            let index = match pool.iter().position(|seen| *seen == value) {
                Some(index) => index,
                None => {
                    pool.push(value);
                    pool.len() - 1
                }
            };
            let object = build::ident(arena, LITERALS_POOL);
            let property = build::num(arena, index as f64);
            arena.alloc(NodeKind::Member { object, property, computed: true })
        });

        if !pool.is_empty() {
            let elements: Vec<NodeId> = pool
                .into_iter()
                .map(|value| arena.alloc(NodeKind::Literal { value }))
                .collect();
            let array = build::array(arena, elements);
            let declaration = build::var_decl(arena, LITERALS_POOL, Some(array));
            arena.insert_into_body(root, 0, declaration);
        }
        root
    }
}
