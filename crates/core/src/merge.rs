//! Dependency-driven merging of multiple source modules into one tree.
//!
//! Relative `require("...")` paths are resolved against the requiring module,
//! dependencies are walked depth-first, and each reached module is embedded
//! as an immediately-invoked function writing into a synthetic
//! `$$module$<suffix>` object that replaces its `exports`. Cyclic imports are
//! warned about and the cyclic edge is left unresolved; merging proceeds.

use crate::ast::{build, Arena, Lit, NodeId, NodeKind};
use crate::resolver;
use crate::result::Result;
use crate::seed::NameAllocator;
use std::collections::HashMap;
use tracing::warn;

/// One parsed module awaiting merging.
pub struct Module {
    pub arena: Arena,
    pub root: NodeId,
}

/// Merge `modules` into the module named by `entry`, returning the combined
/// tree.
pub fn merge(
    entry: &str,
    modules: HashMap<String, Module>,
    names: &mut NameAllocator,
) -> Result<Module> {
    let mut merger = Merger {
        modules: modules
            .into_iter()
            .map(|(key, module)| (normalize_path(&key), module))
            .collect(),
        names,
        processed: HashMap::new(),
        order: Vec::new(),
    };
    let entry = normalize_path(entry);
    merger.walk_deps(&entry, &mut vec![entry.clone()])?;
    merger.assemble(&entry)
}

struct Merger<'a> {
    modules: HashMap<String, Module>,
    names: &'a mut NameAllocator,
    /// Module path -> synthetic module-object identifier.
    processed: HashMap<String, String>,
    /// Embedding order (dependencies first).
    order: Vec<String>,
}

impl<'a> Merger<'a> {
    fn walk_deps(&mut self, key: &str, stack: &mut Vec<String>) -> Result<()> {
        let Some(module) = self.modules.get(key) else {
            return Ok(());
        };

        // Collect call sites first so recursion below holds no borrows.
        let mut sites: Vec<(NodeId, String)> = Vec::new();
        crate::ast::walk_preorder(&module.arena, module.root, &mut |arena, node| {
            if let NodeKind::Call { callee, arguments } = arena.kind(node) {
                if let NodeKind::Ident { name } = arena.kind(*callee) {
                    if name == "require" {
                        if let Some(first) = arguments.first() {
                            if let NodeKind::Literal { value: Lit::Str(path) } = arena.kind(*first) {
                                sites.push((node, path.clone()));
                            }
                        }
                    }
                }
            }
        });

        for (site, raw_path) in sites {
            if !["/", "./", "../"].iter().any(|prefix| raw_path.starts_with(prefix)) {
                continue;
            }
            let mut path = resolve_path(key, &raw_path);
            if let Some(stripped) = path.strip_suffix(".js") {
                path = stripped.to_string();
            }
            if !self.modules.contains_key(&path) {
                path.push_str(".js");
            }
            if !self.modules.contains_key(&path) {
                warn!("Local module not found: {path}");
                continue;
            }

            if stack.contains(&path) {
                warn!("Skipping cyclic dependency: {path}");
                continue;
            }

            if !self.processed.contains_key(&path) {
                stack.push(path.clone());
                self.walk_deps(&path, stack)?;
                stack.pop();

                let id = format!("$$module${}", self.names.get()?);
                self.processed.insert(path.clone(), id.clone());
                self.order.push(path.clone());
                self.replace_exports_references(&path, &id);
            }

            let id = self.processed[&path].clone();
            if let Some(module) = self.modules.get_mut(key) {
                if let Some(parent) = module.arena.parent(site) {
                    let replacement = build::ident(&mut module.arena, &id);
                    module.arena.replace_child(parent, site, replacement);
                }
            }
        }
        Ok(())
    }

    /// Rewrite `exports` and `module.exports` inside one module to its
    /// synthetic module object.
    fn replace_exports_references(&mut self, key: &str, object_name: &str) {
        let Some(module) = self.modules.get_mut(key) else {
            return;
        };
        let graph = resolver::analyze(&module.arena, module.root);
        let mut free: Vec<NodeId> = Vec::new();
        for scope in &graph.scopes {
            free.extend(scope.unresolved.iter().copied());
        }

        for reference in free {
            let arena = &mut module.arena;
            let name = match arena.kind(reference) {
                NodeKind::Ident { name } => name.clone(),
                _ => continue,
            };
            if name == "exports" {
                if let Some(parent) = arena.parent(reference) {
                    let replacement = build::ident(arena, object_name);
                    arena.replace_child(parent, reference, replacement);
                }
            } else if name == "module" {
                let Some(parent) = arena.parent(reference) else {
                    continue;
                };
                let is_exports_member = match arena.kind(parent) {
                    NodeKind::Member { object, property, computed } if *object == reference => {
                        match (arena.kind(*property), computed) {
                            (NodeKind::Ident { name }, false) => name == "exports",
                            (NodeKind::Literal { value: Lit::Str(s) }, true) => s == "exports",
                            _ => false,
                        }
                    }
                    _ => false,
                };
                if is_exports_member {
                    if let Some(grandparent) = arena.parent(parent) {
                        let replacement = build::ident(arena, object_name);
                        arena.replace_child(grandparent, parent, replacement);
                    }
                }
            }
        }
    }

    fn assemble(mut self, entry: &str) -> Result<Module> {
        let Some(mut main) = self.modules.remove(entry) else {
            return Err(crate::result::Error::ModuleNotFound(entry.to_string()));
        };

        if self.order.is_empty() {
            return Ok(main);
        }

        let mut declarators = Vec::new();
        let mut embeds = Vec::new();
        for path in &self.order {
            let Some(module) = self.modules.remove(path) else {
                continue;
            };
            let name = &self.processed[path];

            let id = build::ident(&mut main.arena, name);
            let init = build::object(&mut main.arena, Vec::new());
            declarators
                .push(main.arena.alloc(NodeKind::VarDeclarator { id, init: Some(init) }));

            let imported = main.arena.import(&module.arena, module.root);
            let body = main.arena.take_body(imported);
            let block = build::block(&mut main.arena, body);
            let wrapper = build::function_expr(&mut main.arena, Vec::new(), block);
            let call = build::call(&mut main.arena, wrapper, Vec::new());
            let stmt = build::expr_stmt(&mut main.arena, call);
            main.arena.marks_mut(stmt).module_path = Some(path.clone());
            embeds.push(stmt);
        }

        let declaration = main.arena.alloc(NodeKind::VarDecl { declarations: declarators });
        let mut body = vec![declaration];
        body.extend(embeds);
        body.extend(main.arena.take_body(main.root));
        main.arena.set_body(main.root, body);
        Ok(main)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|part| !part.is_empty()).collect()
}

/// Collapse `.` and `..` segments.
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = split_path(path);
    let mut i = parts.len();
    while i > 0 {
        i -= 1;
        if parts[i] == "." {
            parts.remove(i);
        } else if parts[i] == ".." {
            parts.remove(i);
            if i > 0 {
                parts.remove(i - 1);
                i -= 1;
            }
        }
    }
    parts.join("/")
}

fn path_dir(path: &str) -> String {
    let parts = split_path(path);
    parts[..parts.len().saturating_sub(1)].join("/")
}

/// Resolve `target` relative to the module `curr`.
fn resolve_path(curr: &str, target: &str) -> String {
    normalize_path(&format!("{}/{}", path_dir(curr), target))
}
