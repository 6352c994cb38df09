//! End-to-end behavioral equivalence: a corpus of programs exercising loops,
//! labeled break/continue, nested try/catch, closures and switch
//! fall-through runs through the full pipeline, and the obfuscated program
//! must produce identical observable output and identical thrown-error
//! behavior.

use crate::support::{interp, run_source};
use veil_core::seed::Seed;
use veil_transform::obfuscator::{obfuscate_source, ObfuscationConfig};
use veil_transform::FeatureSet;

fn obfuscated_run(source: &str, features: &str) -> interp::Outcome {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .try_init();
    let config = ObfuscationConfig {
        features: FeatureSet::parse(features).expect("valid feature list"),
        strict: true,
        ..ObfuscationConfig::with_seed(Seed::generate())
    };
    let result = obfuscate_source(source, config).expect("pipeline succeeds");
    run_source(&result.code)
}

fn assert_equivalent(source: &str, features: &str) -> interp::Outcome {
    let expected = run_source(source);
    let actual = obfuscated_run(source, features);
    assert_eq!(expected, actual, "obfuscation changed behavior (features: {features})");
    expected
}

const FULL: &str = "dead_code,scope,control_flow,identifiers,literals,mangle,compress";

#[test]
fn branch_returns_survive_flattening() {
    let source = r#"
function f(a) {
    if (a) {
        return 1;
    } else {
        return 2;
    }
}
log(f(0));
log(f(5));
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["2", "1"]);
    let outcome = assert_equivalent(source, FULL);
    assert_eq!(outcome.output, vec!["2", "1"]);
}

#[test]
fn summing_loop_with_continue_and_labeled_break() {
    let source = r#"
var sum = 0;
var i = 0;
var iterations = 0;
outer: while (true) {
    iterations = iterations + 1;
    if (iterations > 10) { break outer; }
    if (i >= 5) { break; }
    var cur = i;
    i = i + 1;
    if (cur % 2 == 0) { continue; }
    sum = sum + cur;
}
log(sum);
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["4"]);
    assert_equivalent(source, FULL);
}

#[test]
fn closures_capture_frames_across_extraction() {
    let source = r#"
function counter(start) {
    var value = start;
    function add(n) {
        value = value + n;
        return value;
    }
    function get() {
        return value;
    }
    log(add(5));
    log(add(7));
    log(get());
    return get;
}
var snapshot = counter(100);
log(snapshot());
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["105", "112", "112", "112"]);
    assert_equivalent(source, FULL);
}

#[test]
fn arguments_object_sees_only_real_arguments() {
    let source = r#"
function tally(first) {
    var total = first;
    var extras = arguments.length;
    var i = 1;
    while (i < extras) {
        total = total + arguments[i];
        i = i + 1;
    }
    return total + ":" + extras;
}
log(tally(1, 2, 3));
log(tally(10));
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["6:3", "10:1"]);
}

#[test]
fn nested_try_catch_rethrow_and_finally() {
    let source = r#"
function risky(n) {
    try {
        if (n > 1) { throw "big"; }
        return "small";
    } catch (e) {
        log("caught " + e);
        throw "re" + e;
    } finally {
        log("cleanup");
    }
}
try {
    log(risky(0));
    log(risky(2));
} catch (e) {
    log("outer " + e);
}
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(
        outcome.output,
        vec!["cleanup", "small", "caught big", "cleanup", "outer rebig"]
    );
    assert_equivalent(source, FULL);
}

#[test]
fn uncaught_errors_stay_uncaught() {
    let source = r#"
function explode() {
    throw "kaboom";
}
log("before");
explode();
log("after");
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["before"]);
    assert_eq!(outcome.error.as_deref(), Some("kaboom"));
}

#[test]
fn exceptions_cross_extracted_call_boundaries() {
    let source = r#"
function inner(n) {
    if (n == 2) { throw "two"; }
    return n;
}
function middle(n) {
    return inner(n) * 10;
}
var i = 0;
while (i < 4) {
    try {
        log(middle(i));
    } catch (e) {
        log("skip " + e);
    }
    i = i + 1;
}
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["0", "10", "skip two", "30"]);
    assert_equivalent(source, FULL);
}

#[test]
fn normalized_constructs_run_through_the_whole_pipeline() {
    let source = r#"
var total = 0;
for (var i = 0; i < 4; i++) { total += i; }
var names = "";
var box = { a: 1, b: 2 };
for (var k in box) { names += k; }
switch (total) {
    case 5: log("five");
    case 6: log("six"); break;
    default: log("other");
}
do { total = total - 1; } while (total > 4);
log(total);
log(names);
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["six", "4", "ab"]);
    assert_equivalent(source, FULL);
}

#[test]
fn recursion_gets_a_fresh_frame_per_invocation() {
    let source = r#"
function fib(n) {
    var a = n;
    if (a < 2) { return a; }
    return fib(a - 1) + fib(a - 2);
}
log(fib(10));
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["55"]);
    assert_equivalent(source, FULL);
}

#[test]
fn mutual_recursion_through_the_unified_dispatcher() {
    let source = r#"
function isEven(n) {
    if (n == 0) { return true; }
    return isOdd(n - 1);
}
function isOdd(n) {
    if (n == 0) { return false; }
    return isEven(n - 1);
}
log(isEven(8));
log(isOdd(8));
log(isEven(3));
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["true", "false", "false"]);
}

#[test]
fn higher_order_functions_and_bound_identity() {
    let source = r#"
function apply(fn, x) {
    return fn(x);
}
function double(n) { return n * 2; }
log(apply(double, 21));
var same = double;
log(same(4));
"#;
    let outcome = assert_equivalent(source, "control_flow,compress");
    assert_eq!(outcome.output, vec!["42", "8"]);
}
