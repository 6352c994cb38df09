//! Static scope resolution.
//!
//! Implements the scope-graph collaborator contract: every identifier
//! reference is either bound to a declaration in some scope or recorded as
//! unresolved (free/global). The passes never relocate unresolved references.
//!
//! Scoping follows the source language: `var` declarations and function
//! declarations hoist to the nearest function (or program) scope, parameters
//! bind in their function scope, and a catch clause opens a one-binding scope
//! for its parameter.

use crate::ast::{Arena, NodeId, NodeKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Function,
    Catch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    /// `var` declarator.
    Var,
    /// Function parameter.
    Parameter,
    /// Function declaration name.
    FunctionName,
    /// Catch-clause exception binding.
    CatchParam,
}

#[derive(Debug, Clone)]
pub struct Def {
    pub kind: DefKind,
    /// The defining identifier node.
    pub ident: NodeId,
    /// The declaring construct (declarator, function, or catch clause).
    pub node: NodeId,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub defs: Vec<Def>,
    /// Identifier nodes referring to this variable, in source order.
    pub references: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    /// The node that opens the scope (Program, function, or Catch).
    pub node: NodeId,
    /// The block whose statement list materializes the scope: the Program
    /// node itself, a function's body block, or a catch clause's body block.
    pub body: NodeId,
    pub parent: Option<ScopeId>,
    pub variables: Vec<Variable>,
    /// Free references encountered directly in this scope.
    pub unresolved: Vec<NodeId>,
}

impl Scope {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// Resolved scope graph for one tree.
#[derive(Debug, Default)]
pub struct ScopeGraph {
    pub scopes: Vec<Scope>,
}

impl ScopeGraph {
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// The scope opened by `node`, if any.
    pub fn scope_of(&self, node: NodeId) -> Option<&Scope> {
        self.scopes.iter().find(|s| s.node == node)
    }
}

/// Analyze the tree rooted at `root` (a Program node).
pub fn analyze(arena: &Arena, root: NodeId) -> ScopeGraph {
    let mut analyzer = Analyzer { arena, graph: ScopeGraph::default(), index: Vec::new() };
    let program = analyzer.open_scope(ScopeKind::Program, root, root, None);
    analyzer.collect(root, program);
    analyzer.resolve(root, program);
    analyzer.graph
}

struct Analyzer<'a> {
    arena: &'a Arena,
    graph: ScopeGraph,
    /// Per-scope name -> variable index, parallel to `graph.scopes`.
    index: Vec<HashMap<String, usize>>,
}

impl<'a> Analyzer<'a> {
    fn open_scope(
        &mut self,
        kind: ScopeKind,
        node: NodeId,
        body: NodeId,
        parent: Option<ScopeId>,
    ) -> ScopeId {
        let id = ScopeId(self.graph.scopes.len());
        self.graph.scopes.push(Scope {
            id,
            kind,
            node,
            body,
            parent,
            variables: Vec::new(),
            unresolved: Vec::new(),
        });
        self.index.push(HashMap::new());
        id
    }

    fn define(&mut self, scope: ScopeId, name: &str, def: Def) {
        let slot = match self.index[scope.0].get(name) {
            Some(&slot) => slot,
            None => {
                let slot = self.graph.scopes[scope.0].variables.len();
                self.index[scope.0].insert(name.to_string(), slot);
                self.graph.scopes[scope.0].variables.push(Variable {
                    name: name.to_string(),
                    defs: Vec::new(),
                    references: Vec::new(),
                });
                slot
            }
        };
        self.graph.scopes[scope.0].variables[slot].defs.push(def);
    }

    fn ident_name(&self, id: NodeId) -> Option<&str> {
        match self.arena.kind(id) {
            NodeKind::Ident { name } => Some(name),
            _ => None,
        }
    }

    /// Hoisting pass: collect defs into the scope they belong to, opening
    /// child scopes along the way.
    fn collect(&mut self, node: NodeId, scope: ScopeId) {
        match self.arena.kind(node) {
            NodeKind::FunctionDecl { id, params, body } => {
                let (id, params, body) = (*id, params.clone(), *body);
                if let Some(name) = self.ident_name(id).map(str::to_string) {
                    let target = self.hoist_target(scope);
                    self.define(
                        target,
                        &name,
                        Def { kind: DefKind::FunctionName, ident: id, node },
                    );
                }
                self.collect_function(node, params, body, scope);
            }
            NodeKind::FunctionExpr { id, params, body } => {
                let (id, params, body) = (*id, params.clone(), *body);
                // A named function expression binds its own name inside
                // itself; the pipeline strips those names early, but resolve
                // them correctly anyway.
                let inner = self.collect_function(node, params, body, scope);
                if let Some(id) = id {
                    if let Some(name) = self.ident_name(id).map(str::to_string) {
                        self.define(
                            inner,
                            &name,
                            Def { kind: DefKind::FunctionName, ident: id, node },
                        );
                    }
                }
            }
            NodeKind::Catch { param, body } => {
                let (param, body) = (*param, *body);
                let inner = self.open_scope(ScopeKind::Catch, node, body, Some(scope));
                if let Some(name) = self.ident_name(param).map(str::to_string) {
                    self.define(
                        inner,
                        &name,
                        Def { kind: DefKind::CatchParam, ident: param, node },
                    );
                }
                self.collect(body, inner);
            }
            NodeKind::VarDeclarator { id, .. } => {
                let id = *id;
                if let Some(name) = self.ident_name(id).map(str::to_string) {
                    let target = self.hoist_target(scope);
                    self.define(
                        target,
                        &name,
                        Def { kind: DefKind::Var, ident: id, node },
                    );
                }
                for child in self.arena.children(node) {
                    if child != id {
                        self.collect(child, scope);
                    }
                }
            }
            _ => {
                for child in self.arena.children(node) {
                    self.collect(child, scope);
                }
            }
        }
    }

    fn collect_function(
        &mut self,
        node: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
        parent: ScopeId,
    ) -> ScopeId {
        let inner = self.open_scope(ScopeKind::Function, node, body, Some(parent));
        for param in params {
            if let Some(name) = self.ident_name(param).map(str::to_string) {
                self.define(
                    inner,
                    &name,
                    Def { kind: DefKind::Parameter, ident: param, node },
                );
            }
        }
        self.collect(body, inner);
        inner
    }

    /// `var` and function declarations skip catch scopes.
    fn hoist_target(&self, mut scope: ScopeId) -> ScopeId {
        while self.graph.scopes[scope.0].kind == ScopeKind::Catch {
            match self.graph.scopes[scope.0].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    /// Resolution pass: bind identifier references through the scope chain.
    fn resolve(&mut self, node: NodeId, scope: ScopeId) {
        match self.arena.kind(node) {
            NodeKind::Ident { name } => {
                let name = name.clone();
                self.record_reference(scope, &name, node);
            }
            NodeKind::Member { object, property, computed } => {
                let (object, property, computed) = (*object, *property, *computed);
                self.resolve(object, scope);
                if computed {
                    self.resolve(property, scope);
                }
            }
            NodeKind::Property { value, .. } => {
                let value = *value;
                self.resolve(value, scope);
            }
            NodeKind::VarDeclarator { init, .. } => {
                let init = *init;
                if let Some(init) = init {
                    self.resolve(init, scope);
                }
            }
            NodeKind::FunctionDecl { body, .. } | NodeKind::FunctionExpr { body, .. } => {
                let body = *body;
                let inner = self
                    .graph
                    .scopes
                    .iter()
                    .find(|s| s.node == node)
                    .map(|s| s.id)
                    .unwrap_or(scope);
                self.resolve(body, inner);
            }
            NodeKind::Catch { body, .. } => {
                let body = *body;
                let inner = self
                    .graph
                    .scopes
                    .iter()
                    .find(|s| s.node == node)
                    .map(|s| s.id)
                    .unwrap_or(scope);
                self.resolve(body, inner);
            }
            _ => {
                for child in self.arena.children(node) {
                    self.resolve(child, scope);
                }
            }
        }
    }

    fn record_reference(&mut self, mut scope: ScopeId, name: &str, node: NodeId) {
        loop {
            if let Some(&slot) = self.index[scope.0].get(name) {
                self.graph.scopes[scope.0].variables[slot].references.push(node);
                return;
            }
            match self.graph.scopes[scope.0].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        // Free reference; leave it alone.
        let origin = scope;
        self.graph.scopes[origin.0].unresolved.push(node);
    }
}
