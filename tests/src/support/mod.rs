pub mod interp;

use self::interp::Outcome;
use veil_core::decoder;

/// Parse and execute a source program, collecting its `log(...)` output and
/// any uncaught error.
pub fn run_source(source: &str) -> Outcome {
    match decoder::parse(source) {
        Ok((arena, root)) => interp::run(&arena, root),
        Err(e) => Outcome { output: Vec::new(), error: Some(format!("parse error: {e}")) },
    }
}
