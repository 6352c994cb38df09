//! Core data model and front-end collaborators for the Veil obfuscator:
//! the AST arena, source decoding and re-emission, static scope resolution,
//! the text preprocessor, module merging, structural health checks, and the
//! seeded allocators every pass draws from.

pub mod ast;
pub mod check;
pub mod decoder;
pub mod encoder;
pub mod merge;
pub mod preprocess;
pub mod resolver;
pub mod result;
pub mod seed;

pub use result::{Error, Result};

use std::collections::HashMap;

/// High-level convenience function: preprocess and parse one source text.
///
/// This covers the common single-module path; multi-module inputs go through
/// [`preprocess`], [`decoder`] and [`merge`] individually.
pub fn process_source(
    source: &str,
    variables: &preprocess::Defines,
) -> Result<(ast::Arena, ast::NodeId)> {
    let clean = preprocess::process(source, variables)?;
    decoder::parse(&clean)
}

/// Preprocess and parse every module of a project, keyed by path.
pub fn process_modules(
    sources: &HashMap<String, String>,
    variables: &preprocess::Defines,
) -> Result<HashMap<String, merge::Module>> {
    let mut modules = HashMap::new();
    for (path, source) in sources {
        let clean = preprocess::process(source, variables)?;
        let (arena, root) = decoder::parse(&clean)?;
        modules.insert(path.clone(), merge::Module { arena, root });
    }
    Ok(modules)
}
