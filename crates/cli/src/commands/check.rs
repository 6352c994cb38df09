use super::{CliError, Command};
use clap::Args;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use veil_core::{check, decoder};

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the input file.
    #[arg(long)]
    pub input: PathBuf,

    /// Fail on the first structural violation.
    #[arg(long)]
    pub strict: bool,
}

impl Command for CheckArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let text = fs::read_to_string(&self.input).map_err(|source| {
            CliError::Core(veil_core::Error::FileRead {
                path: self.input.display().to_string(),
                source,
            })
        })?;
        let (arena, root) = decoder::parse(&text).map_err(CliError::Core)?;
        let report = check::check_tree(&arena, root, self.strict).map_err(CliError::Core)?;
        if report.is_clean() {
            println!("{}: ok ({} nodes)", self.input.display(), arena.len());
        } else {
            for violation in &report.violations {
                println!("{}: {violation}", self.input.display());
            }
        }
        Ok(())
    }
}
