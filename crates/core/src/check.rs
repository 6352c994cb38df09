//! Structural health checks over a rewritten tree.
//!
//! The passes do a lot of in-place surgery; this module is the safety net that
//! proves the invariants afterwards instead of trusting the parent links that
//! surgery maintained: every reachable node has exactly one parent, parent
//! back-references match the slot a node actually occupies, and statement
//! lists hold only statements.

use crate::ast::{self, Arena, NodeId, NodeKind};
use crate::result::{Error, Result};
use std::collections::HashSet;
use tracing::warn;

/// Outcome of a consistency walk.
#[derive(Debug, Default)]
pub struct Report {
    pub violations: Vec<String>,
}

impl Report {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Walk the tree rooted at `root` and collect structural violations.
///
/// In strict mode the first violation aborts the run; otherwise each is
/// logged and a best-effort report is returned (diagnostic use only).
pub fn check_tree(arena: &Arena, root: NodeId, strict: bool) -> Result<Report> {
    let mut report = Report::default();
    let mut visited: HashSet<NodeId> = HashSet::new();
    visit(arena, root, None, &mut visited, &mut report);

    if strict {
        if let Some(first) = report.violations.first() {
            return Err(Error::Structural(first.clone()));
        }
    } else {
        for violation in &report.violations {
            warn!("{}", violation);
        }
    }
    Ok(report)
}

fn visit(
    arena: &Arena,
    node: NodeId,
    parent: Option<NodeId>,
    visited: &mut HashSet<NodeId>,
    report: &mut Report,
) {
    if !visited.insert(node) {
        report.violations.push(format!(
            "node {:?} ({}) has multiple parents",
            node,
            arena.kind(node).name()
        ));
        return;
    }

    if let Some(parent) = parent {
        if arena.parent(node) != Some(parent) {
            report.violations.push(format!(
                "node {:?} ({}) records parent {:?} but occupies a slot of {:?}",
                node,
                arena.kind(node).name(),
                arena.parent(node),
                parent
            ));
        }
    }

    match arena.kind(node) {
        NodeKind::Program { body } | NodeKind::Block { body } => {
            for stmt in body {
                if !ast::is_statement(arena.kind(*stmt)) {
                    report.violations.push(format!(
                        "non-statement {} in statement list of {:?}",
                        arena.kind(*stmt).name(),
                        node
                    ));
                }
            }
        }
        NodeKind::SwitchCase { consequent, .. } => {
            for stmt in consequent {
                if !ast::is_statement(arena.kind(*stmt)) {
                    report.violations.push(format!(
                        "non-statement {} in case consequent of {:?}",
                        arena.kind(*stmt).name(),
                        node
                    ));
                }
            }
        }
        _ => {}
    }

    for child in arena.children(node) {
        visit(arena, child, Some(node), visited, report);
    }
}
