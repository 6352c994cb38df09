use super::{CliError, Command};
use crate::commands::obfuscate::parse_preprocessor_declarations;
use clap::Args;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use veil_core::preprocess;

#[derive(Args)]
pub struct PreprocessArgs {
    /// Path to the input file.
    #[arg(long)]
    pub input: PathBuf,

    /// Preprocessor variable declaration or assignment (NAME or NAME=VALUE).
    /// Can be repeated.
    #[arg(long = "preprocessor")]
    pub preprocessor: Vec<String>,
}

impl Command for PreprocessArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let variables = parse_preprocessor_declarations(&self.preprocessor)?;
        let text = fs::read_to_string(&self.input).map_err(|source| {
            CliError::Core(veil_core::Error::FileRead {
                path: self.input.display().to_string(),
                source,
            })
        })?;
        let processed = preprocess::process(&text, &variables).map_err(CliError::Core)?;
        print!("{processed}");
        Ok(())
    }
}
