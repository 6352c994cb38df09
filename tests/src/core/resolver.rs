use veil_core::decoder;
use veil_core::resolver::{analyze, DefKind, ScopeKind};

const FIXTURE: &str = r#"
var a = 1;
function f(x) {
    var b = a + x;
    try {
        throw b;
    } catch (e) {
        var c = e;
        log(c);
    }
    return b;
}
f(a);
"#;

#[test]
fn scopes_are_discovered_outer_first() {
    let (arena, root) = decoder::parse(FIXTURE).unwrap();
    let graph = analyze(&arena, root);
    let kinds: Vec<ScopeKind> = graph.scopes.iter().map(|scope| scope.kind).collect();
    assert_eq!(kinds, vec![ScopeKind::Program, ScopeKind::Function, ScopeKind::Catch]);
}

#[test]
fn vars_hoist_to_function_scope() {
    let (arena, root) = decoder::parse(FIXTURE).unwrap();
    let graph = analyze(&arena, root);

    let program = &graph.scopes[0];
    assert!(program.variable("a").is_some());
    assert!(program.variable("f").is_some());
    assert_eq!(
        program.variable("f").unwrap().defs[0].kind,
        DefKind::FunctionName
    );

    let function = &graph.scopes[1];
    assert_eq!(function.variable("x").unwrap().defs[0].kind, DefKind::Parameter);
    assert_eq!(function.variable("b").unwrap().defs[0].kind, DefKind::Var);
    // `var c` sits inside the catch block but belongs to the function.
    assert_eq!(function.variable("c").unwrap().defs[0].kind, DefKind::Var);

    let catch = &graph.scopes[2];
    assert_eq!(catch.variable("e").unwrap().defs[0].kind, DefKind::CatchParam);
    assert!(catch.variable("c").is_none());
}

#[test]
fn references_bind_to_their_declaring_scope() {
    let (arena, root) = decoder::parse(FIXTURE).unwrap();
    let graph = analyze(&arena, root);

    // `a` is read in f's body and in the top-level call.
    assert_eq!(graph.scopes[0].variable("a").unwrap().references.len(), 2);
    // `b` is written once implicitly via its declarator (not a reference),
    // then read in the throw and the return.
    assert_eq!(graph.scopes[1].variable("b").unwrap().references.len(), 2);
    // `e` is read once inside the catch body.
    assert_eq!(graph.scopes[2].variable("e").unwrap().references.len(), 1);
}

#[test]
fn free_references_stay_unresolved() {
    let (arena, root) = decoder::parse(FIXTURE).unwrap();
    let graph = analyze(&arena, root);
    let unresolved: Vec<String> = graph
        .scopes
        .iter()
        .flat_map(|scope| scope.unresolved.iter())
        .map(|id| match arena.kind(*id) {
            veil_core::ast::NodeKind::Ident { name } => name.clone(),
            _ => String::new(),
        })
        .collect();
    assert_eq!(unresolved, vec!["log"]);
}

#[test]
fn parameters_and_vars_keep_discovery_order() {
    let (arena, root) = decoder::parse("function g(p, q) { var u; var v; }").unwrap();
    let graph = analyze(&arena, root);
    let names: Vec<&str> = graph.scopes[1]
        .variables
        .iter()
        .map(|variable| variable.name.as_str())
        .collect();
    assert_eq!(names, vec!["p", "q", "u", "v"]);
}

#[test]
fn shadowing_binds_to_the_inner_scope() {
    let source = "var n = 1; function h() { var n = 2; return n; } h();";
    let (arena, root) = decoder::parse(source).unwrap();
    let graph = analyze(&arena, root);
    assert_eq!(graph.scopes[0].variable("n").unwrap().references.len(), 0);
    assert_eq!(graph.scopes[1].variable("n").unwrap().references.len(), 1);
}
