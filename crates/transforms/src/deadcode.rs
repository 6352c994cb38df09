//! Dead-code insertion: random statement runs get wrapped into always-true
//! opaque conditionals so the control-flow flattener has more shapes to grind
//! through.

use rand::rngs::StdRng;
use rand::Rng;
use veil_core::ast::{self, build, Arena, BinaryOp, NodeId, NodeKind};

const KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "finally", "for", "function", "if",
    "implements", "import", "in", "instanceof", "interface", "let", "new", "package", "private",
    "protected", "public", "return", "static", "super", "switch", "this", "throw", "try",
    "typeof", "var", "void", "while", "with", "yield",
];

pub struct DeadCode;

impl DeadCode {
    /// Wrap runs of statements in opaque conditionals. `probability` is the
    /// expected number of insertions per block; the fractional tail applies
    /// probabilistically.
    pub fn insert(arena: &mut Arena, root: NodeId, probability: f64, rng: &mut StdRng) -> NodeId {
        let mut blocks: Vec<NodeId> = Vec::new();
        ast::walk_preorder(arena, root, &mut |arena, node| {
            if matches!(arena.kind(node), NodeKind::Block { .. }) {
                blocks.push(node);
            }
        });

        for block in blocks {
            let mut i = 0.0;
            while i < probability {
                if probability - i < rng.random::<f64>() {
                    i += 1.0;
                    continue;
                }
                i += 1.0;

                let len = arena.body(block).len();
                if len == 0 {
                    continue;
                }
                let pos = rng.random_range(0..len);
                let take = 1 + rng.random_range(0..(len - pos));

                let mut body = arena.take_body(block);
                let spliced: Vec<NodeId> = body.drain(pos..pos + take).collect();

                let word = KEYWORDS[rng.random_range(0..KEYWORDS.len())];
                let left = build::str_lit(arena, word);
                let right = build::str_lit(arena, word);
                let test = build::binary(arena, BinaryOp::Eq, left, right);
                let consequent = build::block(arena, spliced);
                let wrapped =
                    arena.alloc(NodeKind::If { test, consequent, alternate: None });

                body.insert(pos, wrapped);
                arena.set_body(block, body);
            }
        }
        root
    }
}
