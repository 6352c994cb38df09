use super::{CliError, Command};
use clap::Args;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use veil_core::preprocess::Defines;
use veil_core::seed::Seed;
use veil_transform::obfuscator::{self, ObfuscationConfig};
use veil_transform::FeatureSet;

/// Names tried as the entry module when only directories are given.
const DEFAULT_ENTRY_NAMES: &[&str] = &["app.js", "main.js", "index.js"];

#[derive(Args)]
pub struct ObfuscateArgs {
    /// Path to an input file or directory. Can be repeated; files become
    /// entry points, directories contribute modules.
    #[arg(long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to the output directory.
    #[arg(long)]
    pub output: PathBuf,

    /// Comma-separated feature list (e.g. scope,control_flow,compress).
    /// Each feature enables the features it depends on.
    #[arg(long)]
    pub features: Option<String>,

    /// Preprocessor variable declaration or assignment (NAME or NAME=VALUE).
    /// Can be repeated.
    #[arg(long = "preprocessor")]
    pub preprocessor: Vec<String>,

    /// Hex seed for reproducible output (0x + 64 hex chars). Random if
    /// omitted.
    #[arg(long)]
    pub seed: Option<String>,

    /// Abort on structural violations instead of warning.
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON summary of each run next to the output file.
    #[arg(long)]
    pub summary: bool,
}

impl Command for ObfuscateArgs {
    fn execute(self) -> Result<(), Box<dyn Error>> {
        let features = match &self.features {
            Some(list) => FeatureSet::parse(list).map_err(CliError::Features)?,
            None => FeatureSet::all(),
        };
        let variables = parse_preprocessor_declarations(&self.preprocessor)?;
        let seed = match &self.seed {
            Some(hex) => Seed::from_hex(hex).map_err(CliError::Core)?,
            None => Seed::generate(),
        };

        let (sources, entries) = collect_sources(&self.inputs)?;
        if entries.is_empty() {
            return Err(Box::new(CliError::NoEntryFile));
        }

        let mut failures = 0usize;
        for entry in &entries {
            info!("Obfuscating {entry} ...");
            let config = ObfuscationConfig {
                seed: seed.clone(),
                features: features.clone(),
                preprocessor_variables: variables.clone(),
                emit: None,
                strict: self.strict,
            };
            // Every other source file is a candidate module for this entry.
            let modules: HashMap<String, String> = sources
                .iter()
                .filter(|(path, _)| {
                    path.as_str() == entry.as_str()
                        || !entries.iter().any(|other| other.as_str() == path.as_str())
                })
                .map(|(path, text)| (path.clone(), text.clone()))
                .collect();

            match obfuscator::obfuscate(entry, &modules, config) {
                Ok(result) => {
                    let target = self.output.join(entry);
                    if let Some(dir) = target.parent() {
                        fs::create_dir_all(dir).map_err(CliError::File)?;
                    }
                    fs::write(&target, &result.code).map_err(CliError::File)?;
                    info!(
                        "{entry}: {} -> {} bytes ({:+.1}%)",
                        result.original_size, result.obfuscated_size, result.size_delta_percentage
                    );
                    if self.summary {
                        let summary_path = target.with_extension("veil.json");
                        fs::write(&summary_path, serde_json::to_string_pretty(&result)?)
                            .map_err(CliError::File)?;
                    }
                }
                Err(e) => {
                    // A batch keeps going; the exit status reports the damage.
                    error!("{entry}: {e}");
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            return Err(Box::new(CliError::BatchFailures(failures)));
        }
        Ok(())
    }
}

/// Read every input; explicit files double as entry points.
fn collect_sources(inputs: &[PathBuf]) -> Result<(HashMap<String, String>, Vec<String>), CliError> {
    let mut sources = HashMap::new();
    let mut entries = Vec::new();

    for input in inputs {
        let meta = fs::metadata(input).map_err(|source| veil_core::Error::FileRead {
            path: input.display().to_string(),
            source,
        })?;
        if meta.is_dir() {
            collect_dir(input, Path::new(""), &mut sources)?;
        } else {
            let key = input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string());
            let text = fs::read_to_string(input).map_err(|source| veil_core::Error::FileRead {
                path: input.display().to_string(),
                source,
            })?;
            sources.insert(key.clone(), text);
            entries.push(key);
        }
    }

    if entries.is_empty() {
        for name in DEFAULT_ENTRY_NAMES {
            if sources.contains_key(*name) {
                entries.push((*name).to_string());
                break;
            }
        }
    }
    Ok((sources, entries))
}

fn collect_dir(
    base: &Path,
    relative: &Path,
    sources: &mut HashMap<String, String>,
) -> Result<(), CliError> {
    let dir = base.join(relative);
    for item in fs::read_dir(&dir).map_err(CliError::File)? {
        let item = item.map_err(CliError::File)?;
        let name = item.file_name().to_string_lossy().into_owned();
        if name == ".git" || name == "node_modules" {
            continue;
        }
        let rel = relative.join(&name);
        let path = item.path();
        if path.is_dir() {
            collect_dir(base, &rel, sources)?;
        } else if path.extension().is_some_and(|ext| ext == "js") {
            let text = fs::read_to_string(&path).map_err(|source| veil_core::Error::FileRead {
                path: path.display().to_string(),
                source,
            })?;
            sources.insert(rel.to_string_lossy().replace('\\', "/"), text);
        }
    }
    Ok(())
}

/// Parse repeatable `NAME` / `NAME=VALUE` declarations.
pub fn parse_preprocessor_declarations(declarations: &[String]) -> Result<Defines, CliError> {
    let mut variables = Defines::new();
    for declaration in declarations {
        let (name, value) = match declaration.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim().to_string())),
            None => (declaration.trim(), None),
        };
        let valid = !name.is_empty()
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(CliError::Preprocessor(declaration.clone()));
        }
        variables.insert(name.to_string(), value);
    }
    Ok(variables)
}
