use veil_core::ast::{self, Arena, NodeId, NodeKind};
use veil_core::decoder;

fn parse(source: &str) -> (Arena, NodeId) {
    decoder::parse(source).expect("fixture should parse")
}

fn count_kind(arena: &Arena, root: NodeId, name: &str) -> usize {
    let mut count = 0;
    ast::walk_preorder(arena, root, &mut |arena, node| {
        if arena.kind(node).name() == name {
            count += 1;
        }
    });
    count
}

#[test]
fn parses_statements_and_expressions() {
    let (arena, root) = parse(
        r#"
        var a = 1, b = "two";
        function f(x, y) { return x + y * 2; }
        if (a < 2) { a = f(a, 3); } else { a = 0; }
        while (a > 0) { a--; }
        do { a += 1; } while (a < 1);
        for (var i = 0; i < 3; ++i) { b += "!"; }
        for (var k in { p: 1 }) { log(k); }
        switch (a) { case 1: log("one"); break; default: log("other"); }
        try { throw a; } catch (e) { log(e); } finally { log("done"); }
        outer: while (true) { break outer; }
        "#,
    );
    assert_eq!(count_kind(&arena, root, "FunctionDecl"), 1);
    assert_eq!(count_kind(&arena, root, "If"), 1);
    assert_eq!(count_kind(&arena, root, "While"), 2);
    assert_eq!(count_kind(&arena, root, "DoWhile"), 1);
    assert_eq!(count_kind(&arena, root, "For"), 1);
    assert_eq!(count_kind(&arena, root, "ForIn"), 1);
    assert_eq!(count_kind(&arena, root, "Switch"), 1);
    assert_eq!(count_kind(&arena, root, "Try"), 1);
    assert_eq!(count_kind(&arena, root, "Labeled"), 1);
}

#[test]
fn precedence_shapes_the_tree() {
    let (arena, root) = parse("var r = 1 + 2 * 3;");
    // The root of the initializer must be the addition.
    let mut found_add_of_mul = false;
    ast::walk_preorder(&arena, root, &mut |arena, node| {
        if let NodeKind::Binary { op: ast::BinaryOp::Add, right, .. } = arena.kind(node) {
            found_add_of_mul =
                matches!(arena.kind(*right), NodeKind::Binary { op: ast::BinaryOp::Mul, .. });
        }
    });
    assert!(found_add_of_mul, "1 + 2 * 3 must parse as 1 + (2 * 3)");
}

#[test]
fn string_escapes_decode() {
    let (arena, root) = parse(r#"var s = "a\n\t\"b\x41B";"#);
    let mut text = None;
    ast::walk_preorder(&arena, root, &mut |arena, node| {
        if let NodeKind::Literal { value: ast::Lit::Str(s) } = arena.kind(node) {
            text = Some(s.clone());
        }
    });
    assert_eq!(text.as_deref(), Some("a\n\t\"bAB"));
}

#[test]
fn hex_and_float_literals() {
    let (arena, root) = parse("var a = 0xff; var b = 1.5e2; var c = .25;");
    let mut values = Vec::new();
    ast::walk_preorder(&arena, root, &mut |arena, node| {
        if let NodeKind::Literal { value: ast::Lit::Num(n) } = arena.kind(node) {
            values.push(*n);
        }
    });
    assert_eq!(values, vec![255.0, 150.0, 0.25]);
}

#[test]
fn syntax_errors_carry_position() {
    let err = decoder::parse("var a = ;").unwrap_err();
    match err {
        veil_core::Error::Syntax { line, .. } => assert_eq!(line, 1),
        other => panic!("expected syntax error, got {other}"),
    }
}

#[test]
fn rejects_unterminated_block() {
    assert!(decoder::parse("function f() { return 1;").is_err());
}

#[test]
fn parsed_tree_is_structurally_sound() {
    let (arena, root) = parse("function f(a) { if (a) { return 1; } return 2; } f(1);");
    let report = veil_core::check::check_tree(&arena, root, true).expect("clean tree");
    assert!(report.is_clean());
}
