use std::collections::HashMap;
use veil_core::preprocess::{process, Defines};

fn defines(pairs: &[(&str, Option<&str>)]) -> Defines {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
        .collect()
}

#[test]
fn keeps_plain_text_untouched() {
    let code = "var a = 1;\nlog(a);";
    assert_eq!(process(code, &HashMap::new()).unwrap(), code);
}

#[test]
fn ifdef_selects_branch() {
    let code = "\
// #ifdef DEBUG
log(\"debug\");
// #else
log(\"release\");
// #endif";
    let with = process(code, &defines(&[("DEBUG", None)])).unwrap();
    assert!(with.contains("debug"));
    assert!(!with.contains("release"));

    let without = process(code, &HashMap::new()).unwrap();
    assert!(!without.contains("debug"));
    assert!(without.contains("release"));
}

#[test]
fn define_directive_feeds_later_conditions() {
    let code = "\
// #define MODE=2
// #if MODE >= 2
log(\"fast\");
// #endif";
    let out = process(code, &HashMap::new()).unwrap();
    assert!(out.contains("fast"));
}

#[test]
fn defines_inside_dead_branches_do_not_apply() {
    let code = "\
// #ifdef NEVER
// #define MODE=2
// #endif
// #if defined(MODE)
log(\"on\");
// #endif";
    let out = process(code, &HashMap::new()).unwrap();
    assert!(!out.contains("on"));
}

#[test]
fn condition_operators() {
    let code = "\
// #if defined(A) && !defined(B) && 1 + 1 == 2
log(\"yes\");
// #endif";
    let out = process(code, &defines(&[("A", None)])).unwrap();
    assert!(out.contains("yes"));

    let out = process(code, &defines(&[("A", None), ("B", None)])).unwrap();
    assert!(!out.contains("yes"));
}

#[test]
fn error_directive_is_fatal_only_when_reached() {
    let live = "// #error broken build";
    assert!(process(live, &HashMap::new()).is_err());

    let dead = "\
// #ifdef NEVER
// #error broken build
// #endif
log(1);";
    assert!(process(dead, &HashMap::new()).is_ok());
}

#[test]
fn unterminated_if_warns_but_succeeds() {
    let code = "\
// #ifdef DEBUG
log(\"debug\");";
    let out = process(code, &defines(&[("DEBUG", None)])).unwrap();
    assert!(out.contains("debug"));
}

#[test]
fn dropped_lines_preserve_numbering() {
    let code = "\
var a = 1;
// #ifdef NEVER
log(\"dead\");
// #endif
var b = 2;";
    let out = process(code, &HashMap::new()).unwrap();
    assert_eq!(out.lines().count(), code.lines().count());
    assert_eq!(out.lines().nth(4), Some("var b = 2;"));
}

#[test]
fn shebang_is_removed() {
    let code = "#!/usr/bin/env node\nlog(1);";
    let out = process(code, &HashMap::new()).unwrap();
    assert_eq!(out, "log(1);");
}
