//! Method extraction.
//!
//! Pulls every function out of the tree it was found in (deepest first) into
//! a flat top-level list with synthetic names and numeric entry points,
//! leaving `$$veil$bind` stubs at the original sites so identity and call
//! timing are preserved. Parameter access is rewritten into indexed access
//! against the call-time argument array, after which extracted methods take
//! no fixed parameters at all.

use crate::scopes::BIND_HELPER;
use crate::Result;
use std::collections::HashMap;
use tracing::warn;
use veil_core::ast::{self, build, Arena, Lit, NodeId, NodeKind};
use veil_core::decoder;
use veil_core::seed::{IdAllocator, NameAllocator};

pub const ARGUMENTS_VAR: &str = "$$veil$arguments";
pub const SLICE_HELPER: &str = "$$veil$sliceArguments";
pub const DISPATCHER_NAME: &str = "main";

/// Runtime support injected into every obfuscated program. Kept as source so
/// the front end stays the single authority on tree shapes.
const HELPERS: &str = r#"
function $$veil$mergeArguments(a, b) {
    return Array.prototype.slice.call(a).concat(Array.prototype.slice.call(b));
}

function $$veil$bind() {
    var fn = arguments[0], prepend = Array.prototype.slice.call(arguments, 1);
    var wrapper = function () {
        return fn.apply(this, prepend.concat(Array.prototype.slice.call(arguments)));
    };
    wrapper.prototype = fn.prototype;
    return wrapper;
}

function $$veil$sliceArguments(args, num) {
    return Array.prototype.slice.call(args, num);
}

function $$veil$toObject(arr) {
    var obj = {};
    for (var i = 0; i < arr.length; i += 2) {
        obj[arr[i]] = arr[i + 1];
    }
    return obj;
}

function $$veil$decodeString(arr) {
    return arr.map(function (x) {
        return String.fromCharCode(x & ~0 >>> 16) + String.fromCharCode(x >> 16);
    }).join("");
}

function $$veil$fromCharCodes() {
    return String.fromCharCode.apply(null, arguments);
}
"#;

/// Entry-point record for one listed method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub name: String,
    pub entry: u32,
}

pub struct Methods;

impl Methods {
    /// Parse the runtime helpers and return their declarations, ready to be
    /// placed wherever the caller assembles the program.
    pub fn helper_declarations(arena: &mut Arena) -> Result<Vec<NodeId>> {
        let fragment = decoder::parse_into(arena, HELPERS)?;
        Ok(arena.take_body(fragment))
    }

    /// Prepend the runtime helpers to `root`'s body.
    pub fn inject_helpers(arena: &mut Arena, root: NodeId) -> Result<()> {
        let declarations = Self::helper_declarations(arena)?;
        for (i, declaration) in declarations.into_iter().enumerate() {
            arena.insert_into_body(root, i, declaration);
        }
        Ok(())
    }

    /// Assign every function in the tree a synthetic name and a fresh entry
    /// id from the shuffled pool.
    pub fn list_methods(
        arena: &Arena,
        root: NodeId,
        ids: &mut IdAllocator,
        names: &mut NameAllocator,
    ) -> Result<HashMap<NodeId, MethodInfo>> {
        let mut functions: Vec<(NodeId, Option<String>)> = Vec::new();
        ast::walk_preorder(arena, root, &mut |arena, node| match arena.kind(node) {
            NodeKind::FunctionDecl { id, .. } => {
                let declared = match arena.kind(*id) {
                    NodeKind::Ident { name } => Some(name.clone()),
                    _ => None,
                };
                functions.push((node, declared));
            }
            NodeKind::FunctionExpr { .. } => functions.push((node, None)),
            _ => {}
        });

        let mut table = HashMap::new();
        for (node, declared) in functions {
            let name = match declared {
                Some(name) => name,
                None => format!("$$anon${}", names.get()?),
            };
            table.insert(node, MethodInfo { name, entry: ids.next()? });
        }
        Ok(table)
    }

    /// Extract every function (deepest first) into the returned list,
    /// replacing each site with a zero-argument `$$veil$bind` stub.
    pub fn extract_methods(
        arena: &mut Arena,
        root: NodeId,
        table: &HashMap<NodeId, MethodInfo>,
    ) -> Vec<NodeId> {
        let mut extracted = Vec::new();
        ast::rewrite_postorder(arena, root, &mut |arena, node| match arena.kind(node) {
            NodeKind::FunctionExpr { .. } => {
                let Some(info) = table.get(&node) else {
                    warn!("function expression missing from the entry-point table");
                    return node;
                };
                let NodeKind::FunctionExpr { params, body, .. } = arena.kind(node).clone() else {
                    return node;
                };
                let id = build::ident(arena, &info.name);
                *arena.kind_mut(node) = NodeKind::FunctionDecl { id, params, body };
                arena.set_parent(id, Some(node));
                extracted.push(node);
                method_stub(arena, &info.name)
            }
            NodeKind::FunctionDecl { .. } if node != root => {
                let Some(info) = table.get(&node) else {
                    return node;
                };
                extracted.push(node);
                let stub = method_stub(arena, &info.name);
                build::expr_stmt(arena, stub)
            }
            _ => node,
        });
        extracted
    }

    /// Whether the method observes the dynamic `arguments` object. Nested
    /// functions have their own `arguments` and do not count. There is no
    /// "probably unused" answer: any free reference makes this true.
    pub fn method_refers_to_arguments(arena: &Arena, method: NodeId) -> bool {
        fn scan(arena: &Arena, node: NodeId, root: NodeId) -> bool {
            if node != root && ast::is_function(arena.kind(node)) {
                return false;
            }
            if let NodeKind::Ident { name } = arena.kind(node) {
                if name == "arguments" {
                    return true;
                }
            }
            arena.children(node).iter().any(|child| scan(arena, *child, root))
        }
        scan(arena, method, method)
    }

    /// Insert the argument prologue:
    ///
    /// ```text
    /// var $$veil$arguments = arguments;
    /// arguments = $$veil$sliceArguments(arguments, <num>);   // if num > 0
    /// ```
    ///
    /// The slice hides the `num` prepended frame parameters from code that
    /// reads the dynamic `arguments` object.
    pub fn remove_first_arguments(arena: &mut Arena, method: NodeId, num: usize) {
        let body = match arena.kind(method) {
            NodeKind::FunctionDecl { body, .. } | NodeKind::FunctionExpr { body, .. } => *body,
            _ => return,
        };

        if num > 0 {
            let target = build::ident(arena, "arguments");
            let source = build::ident(arena, "arguments");
            let count = build::num(arena, num as f64);
            arena.marks_mut(count).slice_count_literal = true;
            let sliced = build::call_named(arena, SLICE_HELPER, vec![source, count]);
            let slice_stmt = build::assign(arena, target, sliced);
            let slice_stmt = build::expr_stmt(arena, slice_stmt);
            arena.insert_into_body(body, 0, slice_stmt);
        }

        let init = build::ident(arena, "arguments");
        let prologue = build::var_decl(arena, ARGUMENTS_VAR, Some(init));
        {
            let marks = arena.marks_mut(prologue);
            marks.reassigning_arguments = true;
            marks.follows_slicing_arguments = num > 0;
        }
        arena.insert_into_body(body, 0, prologue);
    }

    /// Rewrite parameter references to `$$veil$arguments[i]` and drop the
    /// static parameter list.
    pub fn replace_argument_references(arena: &mut Arena, method: NodeId) {
        let (params, body) = match arena.kind(method) {
            NodeKind::FunctionDecl { params, body, .. }
            | NodeKind::FunctionExpr { params, body, .. } => (params.clone(), *body),
            _ => return,
        };
        let mut indices: HashMap<String, usize> = HashMap::new();
        for (i, param) in params.iter().enumerate() {
            if let NodeKind::Ident { name } = arena.kind(*param) {
                indices.insert(name.clone(), i);
            }
        }

        ast::rewrite_postorder(arena, body, &mut |arena, node| {
            let NodeKind::Ident { name } = arena.kind(node) else {
                return node;
            };
            let Some(&index) = indices.get(name.as_str()) else {
                return node;
            };
            if !is_reference_position(arena, node) {
                return node;
            }
            let object = build::ident(arena, ARGUMENTS_VAR);
            let property = build::num(arena, index as f64);
            arena.alloc(NodeKind::Member { object, property, computed: true })
        });

        let dropped = match arena.kind_mut(method) {
            NodeKind::FunctionDecl { params, .. } | NodeKind::FunctionExpr { params, .. } => {
                std::mem::take(params)
            }
            _ => Vec::new(),
        };
        for param in dropped {
            arena.set_parent(param, None);
        }
    }

    /// Rewrite stub references through the entry-point table:
    /// `$$veil$bind($$anon$x)` becomes `$$veil$bind($$veil$bind(main, <entry>))`
    /// before bind-merging collapses the nesting.
    pub fn replace_function_calls(
        arena: &mut Arena,
        scope: NodeId,
        entries: &HashMap<String, u32>,
    ) {
        ast::rewrite_postorder(arena, scope, &mut |arena, node| {
            let NodeKind::Ident { name } = arena.kind(node) else {
                return node;
            };
            let Some(&entry) = entries.get(name.as_str()) else {
                return node;
            };
            if !is_reference_position(arena, node) {
                return node;
            }
            let dispatcher = build::ident(arena, DISPATCHER_NAME);
            let state = build::num(arena, entry as f64);
            build::call_named(arena, BIND_HELPER, vec![dispatcher, state])
        });
    }

    /// Shift every `$$veil$arguments[i]` index (and recorded slice counts) by
    /// `inc`; the unified dispatcher's state argument occupies index zero.
    pub fn bump_arguments_indices(arena: &mut Arena, method: NodeId, inc: f64) {
        let mut bumps: Vec<NodeId> = Vec::new();
        ast::walk_preorder(arena, method, &mut |arena, node| {
            match arena.kind(node) {
                NodeKind::Member { object, property, computed: true } => {
                    if let NodeKind::Ident { name } = arena.kind(*object) {
                        if name == ARGUMENTS_VAR
                            && matches!(arena.kind(*property), NodeKind::Literal { value: Lit::Num(_) })
                        {
                            bumps.push(*property);
                        }
                    }
                }
                NodeKind::Literal { value: Lit::Num(_) } if arena.marks(node).slice_count_literal => {
                    bumps.push(node);
                }
                _ => {}
            }
        });
        for literal in bumps {
            if let NodeKind::Literal { value: Lit::Num(value) } = arena.kind_mut(literal) {
                *value += inc;
            }
        }
    }
}

fn method_stub(arena: &mut Arena, name: &str) -> NodeId {
    let reference = build::ident(arena, name);
    build::call_named(arena, BIND_HELPER, vec![reference])
}

/// True when an identifier is a real reference rather than a property name
/// or object-literal key.
fn is_reference_position(arena: &Arena, ident: NodeId) -> bool {
    let Some(parent) = arena.parent(ident) else {
        return true;
    };
    match arena.kind(parent) {
        NodeKind::Member { property, computed: false, .. } => *property != ident,
        NodeKind::Property { key, .. } => *key != ident,
        _ => true,
    }
}
