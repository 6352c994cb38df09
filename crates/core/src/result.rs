//! Core results and error types

use thiserror::Error;

/// Core error type encompassing all core module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A tree-consistency invariant was violated.
    #[error("structural violation: {0}")]
    Structural(String),

    /// Failed to read file at the specified path.
    #[error("could not read file '{path}': {source}")]
    FileRead {
        /// The path to the file that could not be read.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid hexadecimal in seed.
    #[error("invalid hexadecimal in seed")]
    InvalidSeedHex,

    /// Invalid seed length.
    #[error("invalid seed length: expected 64 hex chars, got {0}")]
    InvalidSeedLength(usize),

    /// The state-id pool has no numbers left.
    #[error("id space exhausted after {0} allocations")]
    IdSpaceExhausted(usize),

    /// Source text could not be parsed.
    #[error("syntax error at line {line}, column {column}: {msg}")]
    Syntax {
        /// 1-based line of the offending token.
        line: usize,
        /// 1-based column of the offending token.
        column: usize,
        /// Description of the parsing error.
        msg: String,
    },

    /// A preprocessor `#error` directive fired, or a directive was malformed.
    #[error("preprocessor error: {0}")]
    Preprocessor(String),

    /// A required module could not be located during merging.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The node kind cannot appear in this position.
    #[error("unexpected node kind {kind} in {context}")]
    UnexpectedNode {
        /// The offending node kind.
        kind: &'static str,
        /// Where it was encountered.
        context: &'static str,
    },
}

/// Core result type
pub type Result<T> = std::result::Result<T, Error>;
