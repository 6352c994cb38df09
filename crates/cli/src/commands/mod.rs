use clap::Subcommand;
use std::error::Error;

pub mod check;
pub mod obfuscate;
pub mod preprocess;

use thiserror::Error;

/// Errors that can occur while driving the pipeline from the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Invalid feature list.
    #[error("invalid feature list: {0}")]
    Features(String),
    /// Invalid preprocessor variable declaration.
    #[error("invalid preprocessor declaration: {0}")]
    Preprocessor(String),
    /// No entry file could be determined from the inputs.
    #[error("no entry file found among the inputs")]
    NoEntryFile,
    /// One or more files failed to obfuscate in a batch run.
    #[error("{0} file(s) failed")]
    BatchFailures(usize),
    /// Pipeline failure.
    #[error(transparent)]
    Transform(#[from] veil_transform::Error),
    /// Core failure.
    #[error(transparent)]
    Core(#[from] veil_core::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// CLI subcommands for Veil.
#[derive(Subcommand)]
pub enum Cmd {
    /// Obfuscate one or more entry files with the selected features.
    Obfuscate(obfuscate::ObfuscateArgs),
    /// Run only the conditional-compilation preprocessor.
    Preprocess(preprocess::PreprocessArgs),
    /// Parse a file and report structural health of its tree.
    Check(check::CheckArgs),
}

/// Trait for executing CLI subcommands.
pub trait Command {
    /// Executes the subcommand.
    ///
    /// # Returns
    /// A `Result` indicating success or an error if execution fails.
    fn execute(self) -> Result<(), Box<dyn Error>>;
}

impl Command for Cmd {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Obfuscate(args) => args.execute(),
            Cmd::Preprocess(args) => args.execute(),
            Cmd::Check(args) => args.execute(),
        }
    }
}
