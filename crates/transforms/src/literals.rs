//! String-literal obfuscation: every string becomes a self-assembling
//! generator that concatenates randomly sized `$$veil$fromCharCodes`
//! fragments at run time.

use rand::rngs::StdRng;
use rand::Rng;
use veil_core::ast::{self, build, Arena, AssignOp, Lit, NodeId, NodeKind};

const FROM_CHAR_CODES_HELPER: &str = "$$veil$fromCharCodes";

pub struct Literals;

impl Literals {
    /// Replace string literals (outside object properties) with generator
    /// expressions.
    pub fn generate_strings(arena: &mut Arena, root: NodeId, rng: &mut StdRng) -> NodeId {
        ast::rewrite_postorder(arena, root, &mut |arena, node| {
            let NodeKind::Literal { value: Lit::Str(text) } = arena.kind(node) else {
                return node;
            };
            let Some(parent) = arena.parent(node) else {
                return node;
            };
            if matches!(arena.kind(parent), NodeKind::Property { .. }) {
                return node;
            }
            let text = text.clone();
            make_string_generator(arena, &text, rng)
        })
    }
}

/// `(function () { var str = ""; str += $$veil$fromCharCodes(...); ...;
/// return str; })()`
fn make_string_generator(arena: &mut Arena, text: &str, rng: &mut StdRng) -> NodeId {
    let chars: Vec<char> = text.chars().collect();

    let empty = build::str_lit(arena, "");
    let mut body = vec![build::var_decl(arena, "str", Some(empty))];

    let mut rest = chars.as_slice();
    while !rest.is_empty() {
        let len = (1 + rng.random_range(0..4)).min(rest.len());
        let (fragment, tail) = rest.split_at(len);
        rest = tail;

        let codes: Vec<NodeId> = fragment
            .iter()
            .map(|c| build::num(arena, *c as u32 as f64))
            .collect();
        let decoded = build::call_named(arena, FROM_CHAR_CODES_HELPER, codes);
        let target = build::ident(arena, "str");
        let append = arena.alloc(NodeKind::Assign { op: AssignOp::Add, left: target, right: decoded });
        body.push(build::expr_stmt(arena, append));
    }

    let result = build::ident(arena, "str");
    body.push(build::ret(arena, Some(result)));

    let block = build::block(arena, body);
    let generator = build::function_expr(arena, Vec::new(), block);
    build::call(arena, generator, Vec::new())
}
