//! Control-flow flattening.
//!
//! Lowers each method's normalized, materialized, parameter-free body into a
//! table of numbered dispatch cases executed by one loop over a `state`
//! variable, guarded by a try/catch that redelivers exceptions into numbered
//! handler cases. Tables for every method accumulate in one flattener and
//! assemble into a single program-wide dispatcher.
//!
//! Invariants the construction maintains:
//! - every emitted case id is drawn once from the shuffled pool;
//! - break/continue resolve against an explicit target stack, innermost
//!   (or nearest matching label) first; failure to resolve is fatal;
//! - while flattening a protected block, every emitted case registers as a
//!   catch-delivery target of the innermost active exception region, never
//!   twice for one id;
//! - case order is shuffled only at maximal fall-through-group granularity.

use crate::methods::{Methods, DISPATCHER_NAME};
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use tracing::warn;
use veil_core::ast::{self, build, Arena, NodeId, NodeKind};
use veil_core::seed::IdAllocator;

/// The dispatch loop's state variable. A parameter of the dispatcher, so each
/// invocation owns an independent copy; it must never migrate into the
/// unified frame.
pub const STATE_VAR: &str = "state";
const CAUGHT_NAME: &str = "e";

struct DispatchCase {
    state: u32,
    stmts: Vec<NodeId>,
}

struct JumpTarget {
    label: Option<String>,
    state: u32,
}

/// Active exception region: cases emitted while one is on the stack deliver
/// exceptions to `catch_entry` after re-establishing the catch frame.
struct ExceptionRegion {
    catch_entry: u32,
    /// `var $$scope$x = [];` template for the catch frame.
    frame_decl: NodeId,
    /// `$$scope$x[i]` template for the materialized exception binding.
    exception_slot: NodeId,
}

pub struct Flattener {
    ids: IdAllocator,
    output: Vec<DispatchCase>,
    handlers: Vec<DispatchCase>,
    handler_states: HashSet<u32>,
    breaks: Vec<JumpTarget>,
    continues: Vec<JumpTarget>,
    regions: Vec<ExceptionRegion>,
    pending_label: Option<String>,
}

impl Flattener {
    /// The allocator is owned by the run: ids stay unique across every
    /// method added to this flattener.
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            ids,
            output: Vec::new(),
            handlers: Vec::new(),
            handler_states: HashSet::new(),
            breaks: Vec::new(),
            continues: Vec::new(),
            regions: Vec::new(),
            pending_label: None,
        }
    }

    /// Number of dispatch cases emitted so far.
    pub fn case_count(&self) -> usize {
        self.output.len()
    }

    /// Lower one method body into the accumulated dispatch table.
    pub fn add_method(
        &mut self,
        arena: &mut Arena,
        body: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        self.transform_statement(arena, body, entry, exit)
    }

    fn transform_statement(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        if !matches!(
            arena.kind(node),
            NodeKind::While { .. } | NodeKind::DoWhile { .. } | NodeKind::Labeled { .. }
        ) {
            self.pending_label = None;
        }
        match arena.kind(node).clone() {
            NodeKind::Program { .. } | NodeKind::Block { .. } => {
                self.transform_block(arena, node, entry, exit)
            }
            NodeKind::If { .. } => self.transform_if(arena, node, entry, exit),
            NodeKind::While { .. } => self.transform_while(arena, node, entry, exit),
            NodeKind::DoWhile { .. } => self.transform_do_while(arena, node, entry, exit),
            NodeKind::Labeled { label, body } => {
                self.pending_label = Some(label);
                self.transform_statement(arena, body, entry, exit)
            }
            NodeKind::Try { handler, finalizer, .. } => {
                if handler.is_some() && finalizer.is_none() {
                    self.transform_try_catch(arena, node, entry, exit)
                } else {
                    Err(Error::NotNormalized("try with finalizer"))
                }
            }
            NodeKind::Empty => {
                // Nothing to run, but the entry state must still reach exit.
                let stmts = self.sealed(arena, Vec::new(), exit);
                self.emit_case(arena, entry, stmts);
                Ok(())
            }
            other if ast::is_compound_statement(&other) => {
                // Unknown compound shape: keep it opaque inside a single case
                // rather than aborting the whole pass.
                warn!("Unsupported statement kind {} during flattening", other.name());
                let stmts = self.sealed(arena, vec![node], exit);
                self.emit_case(arena, entry, stmts);
                Ok(())
            }
            _ => self.transform_sequence(arena, vec![node], entry, exit),
        }
    }

    fn transform_block(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let stmts = flatten_nested_blocks(arena, node);
        let items = split_runs(arena, stmts);

        if items.is_empty() {
            let stmts = self.sealed(arena, Vec::new(), exit);
            self.emit_case(arena, entry, stmts);
            return Ok(());
        }

        let mut entry = entry;
        let last = items.len() - 1;
        for (i, item) in items.into_iter().enumerate() {
            let part_exit = if i == last { exit } else { self.ids.next()? };
            match item {
                Item::Run(stmts) => self.transform_sequence(arena, stmts, entry, part_exit)?,
                Item::Compound(stmt) => {
                    self.transform_statement(arena, stmt, entry, part_exit)?
                }
            }
            entry = part_exit;
        }
        Ok(())
    }

    /// Lower a maximal run of simple statements into one case.
    fn transform_sequence(
        &mut self,
        arena: &mut Arena,
        stmts: Vec<NodeId>,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let mut out: Vec<NodeId> = Vec::new();
        let mut terminated = false;

        for stmt in stmts {
            match arena.kind(stmt).clone() {
                NodeKind::Break { label } => {
                    let target = self.resolve_jump(&self.breaks, label.as_deref(), "break")?;
                    out.push(build::state_assign(arena, STATE_VAR, target));
                    out.push(build::brk(arena));
                    terminated = true;
                    break;
                }
                NodeKind::Continue { label } => {
                    let target =
                        self.resolve_jump(&self.continues, label.as_deref(), "continue")?;
                    out.push(build::state_assign(arena, STATE_VAR, target));
                    out.push(build::brk(arena));
                    terminated = true;
                    break;
                }
                NodeKind::Return { .. } => {
                    out.push(stmt);
                    terminated = true;
                    break;
                }
                NodeKind::Empty => {}
                _ => out.push(stmt),
            }
        }

        if !terminated {
            out.push(build::state_assign(arena, STATE_VAR, exit));
            out.push(build::brk(arena));
        }
        self.emit_case(arena, entry, out);
        Ok(())
    }

    fn resolve_jump(
        &self,
        targets: &[JumpTarget],
        label: Option<&str>,
        kind: &'static str,
    ) -> Result<u32> {
        let found = match label {
            Some(label) => targets
                .iter()
                .rev()
                .find(|target| target.label.as_deref() == Some(label)),
            None => targets.last(),
        };
        found.map(|target| target.state).ok_or_else(|| Error::UnresolvedJumpTarget {
            kind,
            label: label.map(|l| format!(" '{l}'")).unwrap_or_default(),
        })
    }

    fn transform_if(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let NodeKind::If { test, consequent, alternate } = arena.kind(node).clone() else {
            return Ok(());
        };
        let then_entry = self.ids.next()?;
        let else_entry = if alternate.is_some() { self.ids.next()? } else { exit };

        let stmts = self.branch_case(arena, test, then_entry, else_entry);
        self.emit_case(arena, entry, stmts);

        self.transform_statement(arena, consequent, then_entry, exit)?;
        if let Some(alternate) = alternate {
            self.transform_statement(arena, alternate, else_entry, exit)?;
        }
        Ok(())
    }

    fn transform_while(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let label = self.pending_label.take();
        let NodeKind::While { test, body } = arena.kind(node).clone() else {
            return Ok(());
        };
        let body_entry = self.ids.next()?;

        let stmts = self.branch_case(arena, test, body_entry, exit);
        self.emit_case(arena, entry, stmts);

        self.breaks.push(JumpTarget { label: label.clone(), state: exit });
        self.continues.push(JumpTarget { label, state: entry });
        let body = ensure_block(arena, body);
        let result = self.transform_block(arena, body, body_entry, entry);
        self.breaks.pop();
        self.continues.pop();
        result
    }

    /// Like `while`, but the condition case id differs from the loop's entry
    /// so the body runs once before the first test.
    fn transform_do_while(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let label = self.pending_label.take();
        let NodeKind::DoWhile { body, test } = arena.kind(node).clone() else {
            return Ok(());
        };
        let test_entry = self.ids.next()?;

        let stmts = self.branch_case(arena, test, entry, exit);
        self.emit_case(arena, test_entry, stmts);

        self.breaks.push(JumpTarget { label: label.clone(), state: exit });
        self.continues.push(JumpTarget { label, state: test_entry });
        let body = ensure_block(arena, body);
        let result = self.transform_block(arena, body, entry, test_entry);
        self.breaks.pop();
        self.continues.pop();
        result
    }

    fn transform_try_catch(
        &mut self,
        arena: &mut Arena,
        node: NodeId,
        entry: u32,
        exit: u32,
    ) -> Result<()> {
        let NodeKind::Try { block, handler, .. } = arena.kind(node).clone() else {
            return Ok(());
        };
        let Some(handler) = handler else {
            return Ok(());
        };
        let NodeKind::Catch { body: catch_body, .. } = arena.kind(handler).clone() else {
            return Err(Error::NotNormalized("try without catch clause"));
        };

        let catch_entry = self.ids.next()?;
        let (frame_decl, exception_slot) = self.split_catch_prologue(arena, catch_body)?;

        self.regions.push(ExceptionRegion { catch_entry, frame_decl, exception_slot });
        let protected = self.transform_block(arena, block, entry, exit);
        self.regions.pop();
        protected?;

        self.transform_block(arena, catch_body, catch_entry, exit)
    }

    /// Detach and validate the two materialization statements every catch
    /// body must start with: the frame declaration and the exception-capture
    /// assignment.
    fn split_catch_prologue(
        &mut self,
        arena: &mut Arena,
        catch_body: NodeId,
    ) -> Result<(NodeId, NodeId)> {
        let body = arena.body(catch_body);
        if body.len() < 2 {
            return Err(Error::MissingCatchPrologue(format!(
                "catch body has {} statements",
                body.len()
            )));
        }
        let frame_decl = body[0];
        let capture = body[1];

        let frame_ok = arena.marks(frame_decl).scope_object
            && matches!(arena.kind(frame_decl), NodeKind::VarDecl { declarations } if declarations.len() == 1);
        if !frame_ok {
            return Err(Error::MissingCatchPrologue(
                "first statement is not a scope frame declaration".to_string(),
            ));
        }

        let exception_slot = match arena.kind(capture) {
            NodeKind::ExprStmt { expression } => match arena.kind(*expression) {
                NodeKind::Assign { left, right, .. }
                    if arena.marks(*left).scope_object_ref
                        && matches!(
                            arena.kind(*right),
                            NodeKind::Ident { name } if name.starts_with("$$var")
                        ) =>
                {
                    *left
                }
                _ => {
                    return Err(Error::MissingCatchPrologue(
                        "second statement is not an exception capture".to_string(),
                    ))
                }
            },
            _ => {
                return Err(Error::MissingCatchPrologue(
                    "second statement is not an exception capture".to_string(),
                ))
            }
        };

        let mut remaining = arena.take_body(catch_body);
        remaining.drain(..2);
        arena.set_body(catch_body, remaining);
        Ok((frame_decl, exception_slot))
    }

    /// `state = test ? a : b; break;`
    fn branch_case(&mut self, arena: &mut Arena, test: NodeId, a: u32, b: u32) -> Vec<NodeId> {
        let state = build::ident(arena, STATE_VAR);
        let then_state = build::num(arena, a as f64);
        let else_state = build::num(arena, b as f64);
        let pick = build::conditional(arena, test, then_state, else_state);
        let assignment = build::assign(arena, state, pick);
        let assignment = build::expr_stmt(arena, assignment);
        let brk = build::brk(arena);
        vec![assignment, brk]
    }

    /// Close a case body with its successor assignment.
    fn sealed(&mut self, arena: &mut Arena, mut stmts: Vec<NodeId>, exit: u32) -> Vec<NodeId> {
        stmts.push(build::state_assign(arena, STATE_VAR, exit));
        stmts.push(build::brk(arena));
        stmts
    }

    /// Record a finished case and register it with the innermost active
    /// exception region. A state id is never registered twice: recurring ids
    /// reuse the region already looked up.
    fn emit_case(&mut self, arena: &mut Arena, state: u32, stmts: Vec<NodeId>) {
        if let Some(region) = self.regions.last() {
            if !self.handler_states.contains(&state) {
                self.handler_states.insert(state);
                let catch_entry = region.catch_entry;
                let frame_decl = region.frame_decl;
                let exception_slot = region.exception_slot;

                let frame = arena.clone_subtree(frame_decl);
                let slot = arena.clone_subtree(exception_slot);
                let caught = build::ident(arena, CAUGHT_NAME);
                let capture = build::assign(arena, slot, caught);
                let capture = build::expr_stmt(arena, capture);
                let goto_handler = build::state_assign(arena, STATE_VAR, catch_entry);
                let brk = build::brk(arena);
                self.handlers.push(DispatchCase {
                    state,
                    stmts: vec![frame, capture, goto_handler, brk],
                });
            }
        }
        self.output.push(DispatchCase { state, stmts });
    }

    /// Assemble the guarded dispatch switch for every case emitted so far.
    fn dispatch_body(&mut self, arena: &mut Arena, exit: u32, rng: &mut StdRng) -> NodeId {
        let exit_stmt = build::ret(arena, None);
        let mut cases = std::mem::take(&mut self.output);
        cases.push(DispatchCase { state: exit, stmts: vec![exit_stmt] });
        let cases = shuffle_cases(arena, cases, rng);

        let case_nodes: Vec<NodeId> = cases
            .into_iter()
            .map(|case| {
                let test = build::num(arena, case.state as f64);
                arena.alloc(NodeKind::SwitchCase { test: Some(test), consequent: case.stmts })
            })
            .collect();
        let discriminant = build::ident(arena, STATE_VAR);
        let dispatch = arena.alloc(NodeKind::Switch { discriminant, cases: case_nodes });

        let mut handler_nodes: Vec<NodeId> = std::mem::take(&mut self.handlers)
            .into_iter()
            .map(|case| {
                let test = build::num(arena, case.state as f64);
                arena.alloc(NodeKind::SwitchCase { test: Some(test), consequent: case.stmts })
            })
            .collect();
        let caught = build::ident(arena, CAUGHT_NAME);
        let rethrow = build::throw(arena, caught);
        handler_nodes
            .push(arena.alloc(NodeKind::SwitchCase { test: None, consequent: vec![rethrow] }));
        let discriminant = build::ident(arena, STATE_VAR);
        let redeliver = arena.alloc(NodeKind::Switch { discriminant, cases: handler_nodes });

        let param = build::ident(arena, CAUGHT_NAME);
        let handler_body = build::block(arena, vec![redeliver]);
        let catch = arena.alloc(NodeKind::Catch { param, body: handler_body });
        let protected = build::block(arena, vec![dispatch]);
        arena.alloc(NodeKind::Try { block: protected, handler: Some(catch), finalizer: None })
    }

    /// Build the whole-program dispatcher: runtime helpers, one `main`
    /// driving the unified table, and the initial call at the program's
    /// entry id.
    pub fn into_program(
        mut self,
        arena: &mut Arena,
        entry: u32,
        exit: u32,
        rng: &mut StdRng,
    ) -> Result<NodeId> {
        let guarded = self.dispatch_body(arena, exit, rng);
        let test = build::bool_lit(arena, true);
        let body = build::block(arena, vec![guarded]);
        let dispatch_loop = arena.alloc(NodeKind::While { test, body });

        let state_param = build::ident(arena, STATE_VAR);
        let main_body = build::block(arena, vec![dispatch_loop]);
        let main = build::function_decl(arena, DISPATCHER_NAME, vec![state_param], main_body);

        let mut body = Methods::helper_declarations(arena)?;
        body.push(main);
        let dispatcher = build::ident(arena, DISPATCHER_NAME);
        let start = build::num(arena, entry as f64);
        let kickoff = build::call(arena, dispatcher, vec![start]);
        body.push(build::expr_stmt(arena, kickoff));

        Ok(arena.alloc(NodeKind::Program { body }))
    }
}

enum Item {
    Run(Vec<NodeId>),
    Compound(NodeId),
}

/// Merge nested block statements into one flat run of statements.
fn flatten_nested_blocks(arena: &mut Arena, node: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for stmt in arena.take_body(node) {
        if matches!(arena.kind(stmt), NodeKind::Block { .. } | NodeKind::Program { .. }) {
            out.extend(flatten_nested_blocks(arena, stmt));
        } else {
            out.push(stmt);
        }
    }
    out
}

/// Split a statement list into maximal simple runs and compound statements.
fn split_runs(arena: &Arena, stmts: Vec<NodeId>) -> Vec<Item> {
    let mut items = Vec::new();
    let mut run: Vec<NodeId> = Vec::new();
    for stmt in stmts {
        if ast::is_compound_statement(arena.kind(stmt)) {
            if !run.is_empty() {
                items.push(Item::Run(std::mem::take(&mut run)));
            }
            items.push(Item::Compound(stmt));
        } else {
            if !ast::is_statement(arena.kind(stmt)) {
                warn!("Unexpected {} in statement run", arena.kind(stmt).name());
            }
            run.push(stmt);
        }
    }
    if !run.is_empty() {
        items.push(Item::Run(run));
    }
    items
}

fn ensure_block(arena: &mut Arena, stmt: NodeId) -> NodeId {
    if matches!(arena.kind(stmt), NodeKind::Block { .. } | NodeKind::Program { .. }) {
        stmt
    } else {
        build::block(arena, vec![stmt])
    }
}

/// Shuffle dispatch cases without separating fall-through groups: a case
/// with no top-level `break` stays glued to the case that follows it.
fn shuffle_cases(
    arena: &Arena,
    cases: Vec<DispatchCase>,
    rng: &mut StdRng,
) -> Vec<DispatchCase> {
    let mut groups: Vec<Vec<DispatchCase>> = Vec::new();
    let mut open: Vec<DispatchCase> = Vec::new();
    for case in cases {
        let breaks = case
            .stmts
            .iter()
            .any(|stmt| matches!(arena.kind(*stmt), NodeKind::Break { label: None }));
        open.push(case);
        if breaks {
            groups.push(std::mem::take(&mut open));
        }
    }
    if !open.is_empty() {
        groups.push(open);
    }
    groups.shuffle(rng);
    groups.into_iter().flatten().collect()
}
