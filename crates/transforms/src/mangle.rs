//! Identifier shortening.
//!
//! The whole program is wrapped in an immediately-invoked function so every
//! top-level binding becomes mangleable, then each resolved variable gets the
//! next short alphabetic name. Names are unique program-wide: reuse across
//! sibling scopes would be shorter, but a single sequence can never capture a
//! free reference from an inner scope.

use crate::Result;
use std::collections::HashSet;
use veil_core::ast::{build, Arena, NodeId, NodeKind};
use veil_core::resolver;

pub struct Mangle;

impl Mangle {
    /// Shorten every resolved identifier; returns the new program root.
    pub fn mangle(arena: &mut Arena, root: NodeId) -> Result<NodeId> {
        // (function () { <program> })();
        let body = arena.take_body(root);
        let block = build::block(arena, body);
        let wrapper = build::function_expr(arena, Vec::new(), block);
        let call = build::call(arena, wrapper, Vec::new());
        let stmt = build::expr_stmt(arena, call);
        arena.set_body(root, vec![stmt]);

        let graph = resolver::analyze(arena, root);

        // Free names stay untouchable; mangled names must not collide with
        // them.
        let mut reserved: HashSet<String> = HashSet::new();
        for scope in &graph.scopes {
            for unresolved in &scope.unresolved {
                if let NodeKind::Ident { name } = arena.kind(*unresolved) {
                    reserved.insert(name.clone());
                }
            }
        }
        reserved.insert("arguments".to_string());

        let mut generator = ShortNames::new(reserved);
        for scope in &graph.scopes {
            for variable in &scope.variables {
                if variable.defs.is_empty() {
                    continue;
                }
                let fresh = generator.next_name();
                for def in &variable.defs {
                    if let NodeKind::Ident { name } = arena.kind_mut(def.ident) {
                        *name = fresh.clone();
                    }
                }
                for reference in &variable.references {
                    if let NodeKind::Ident { name } = arena.kind_mut(*reference) {
                        *name = fresh.clone();
                    }
                }
            }
        }
        Ok(root)
    }
}

struct ShortNames {
    counter: usize,
    reserved: HashSet<String>,
}

impl ShortNames {
    fn new(reserved: HashSet<String>) -> Self {
        Self { counter: 0, reserved }
    }

    fn next_name(&mut self) -> String {
        loop {
            let name = encode(self.counter);
            self.counter += 1;
            if !self.reserved.contains(&name) && !is_keyword(&name) {
                return name;
            }
        }
    }
}

/// 0 -> "a", 25 -> "z", 26 -> "aa", ...
fn encode(mut n: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'a' + (n % 26) as u8);
        n /= 26;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    out.reverse();
    out.iter().map(|b| *b as char).collect()
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "do" | "if" | "in" | "for" | "let" | "new" | "try" | "var")
}
