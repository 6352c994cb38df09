//! Main obfuscation pipeline.
//!
//! Stage order follows the dependency chain: preprocess, parse and merge the
//! modules; insert dead code; normalize control constructs; obscure
//! identifiers and literals; materialize scopes and extract methods; flatten
//! control flow into the unified dispatcher; clean up, health-check, mangle
//! and re-emit. Every stage failure is labeled `[stage] error`.

use crate::deadcode::DeadCode;
use crate::flattener::Flattener;
use crate::identifiers::Identifiers;
use crate::literals::Literals;
use crate::mangle::Mangle;
use crate::methods::{MethodInfo, Methods};
use crate::normalizer::Normalizer;
use crate::postprocess::Postprocess;
use crate::scopes::Scopes;
use crate::unifier::Unifier;
use crate::variables::Variables;
use crate::{stage, Feature, FeatureSet, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use veil_core::ast::{Arena, NodeId, NodeKind};
use veil_core::encoder::{self, EmitOptions};
use veil_core::preprocess::Defines;
use veil_core::seed::{IdAllocator, NameAllocator, Seed};
use veil_core::{check, merge, resolver};

/// Size of the pre-shuffled state-id pool for one run.
const STATE_ID_SPACE: u32 = 32768;

/// Configuration for the obfuscation pipeline
pub struct ObfuscationConfig {
    /// Cryptographic seed for deterministic obfuscation
    pub seed: Seed,
    /// Enabled features (with implications resolved)
    pub features: FeatureSet,
    /// Preprocessor variable declarations
    pub preprocessor_variables: Defines,
    /// Printer options; defaults derive from the `compress` feature
    pub emit: Option<EmitOptions>,
    /// Abort on structural violations instead of warning
    pub strict: bool,
}

impl ObfuscationConfig {
    /// Create config with a specific seed and every feature enabled.
    pub fn with_seed(seed: Seed) -> Self {
        Self {
            seed,
            features: FeatureSet::all(),
            preprocessor_variables: Defines::new(),
            emit: None,
            strict: false,
        }
    }
}

impl Default for ObfuscationConfig {
    fn default() -> Self {
        Self::with_seed(Seed::generate())
    }
}

impl std::fmt::Debug for ObfuscationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationConfig")
            .field("features", &self.features.names())
            .field("strict", &self.strict)
            .finish()
    }
}

/// Result of the obfuscation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationResult {
    /// The obfuscated program text
    pub code: String,
    /// Input size in bytes (all modules)
    pub original_size: usize,
    /// Output size in bytes
    pub obfuscated_size: usize,
    /// Size change as percentage
    pub size_delta_percentage: f64,
    /// Number of modules merged into the entry
    pub modules_merged: usize,
    /// Number of methods extracted to top level
    pub methods_extracted: usize,
    /// Number of dispatch cases in the unified table
    pub dispatch_cases: usize,
    /// Metadata about the obfuscation process
    pub metadata: ObfuscationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationMetadata {
    /// Names of the features that were applied
    pub features_applied: Vec<String>,
    /// Hash of the seed used, for reproduction
    pub seed_hash: String,
    /// Structural violations found by the health check (non-strict runs)
    pub structural_violations: usize,
}

/// Obfuscate a project: `sources` maps module paths to source text, `entry`
/// names the main module.
pub fn obfuscate(
    entry: &str,
    sources: &HashMap<String, String>,
    config: ObfuscationConfig,
) -> Result<ObfuscationResult> {
    let features = &config.features;
    debug!("Starting obfuscation pipeline: features={:?}", features.names());

    let mut rng = config.seed.create_deterministic_rng();
    let original_size: usize = sources.values().map(String::len).sum();
    let module_count = sources.len();

    // Preprocess and parse every module.
    let modules = stage("parse", || {
        Ok(veil_core::process_modules(sources, &config.preprocessor_variables)?)
    })?;

    // Merge dependencies into the entry module.
    let merged = stage("merge", || {
        let mut names = NameAllocator::new(&mut rng, 3);
        Ok(merge::merge(entry, modules, &mut names)?)
    })?;
    let merge::Module { mut arena, mut root } = merged;

    if features.has(Feature::DeadCode) {
        stage("dead_code", || {
            root = DeadCode::insert(&mut arena, root, 1.0, &mut rng);
            Ok(())
        })?;
    }

    stage("simplify", || {
        let names = NameAllocator::new(&mut rng, 3);
        let mut normalizer = Normalizer::new(names);
        root = normalizer.simplify(&mut arena, root)?;
        Ok(())
    })?;

    if features.has(Feature::Identifiers) {
        stage("identifiers", || {
            root = Identifiers::compute_properties(&mut arena, root);
            root = Identifiers::arrayize_objects(&mut arena, root);
            root = Identifiers::move_literals(&mut arena, root);
            Ok(())
        })?;
    }

    if features.has(Feature::Literals) {
        stage("literals", || {
            root = Literals::generate_strings(&mut arena, root, &mut rng);
            Ok(())
        })?;
    }

    let mut methods_extracted = 0;
    let mut dispatch_cases = 0;

    if features.has(Feature::Scope) {
        let mut ids = IdAllocator::new(&mut rng, STATE_ID_SPACE);

        stage("obfuscate_identifiers", || {
            Variables::remove_function_expression_ids(&mut arena, root);
            let graph = resolver::analyze(&arena, root);
            Variables::function_declaration_to_expression(&mut arena, &graph);
            let mut names = NameAllocator::new(&mut rng, 3);
            let graph = resolver::analyze(&arena, root);
            Variables::obfuscate_identifiers(&mut arena, &graph, &mut names)?;
            let mut names = NameAllocator::new(&mut rng, 3);
            let graph = resolver::analyze(&arena, root);
            Variables::redefine_parameters(&mut arena, &graph, &mut names)?;
            Ok(())
        })?;

        stage("create_scope_objects", || {
            let mut names = NameAllocator::new(&mut rng, 3);
            let graph = resolver::analyze(&arena, root);
            Scopes::create_scope_objects(&mut arena, &graph, &mut names)?;
            Ok(())
        })?;

        let table = stage("list_methods", || {
            let mut names = NameAllocator::new(&mut rng, 3);
            Methods::list_methods(&arena, root, &mut ids, &mut names)
        })?;

        let functions = stage("extract_methods", || {
            let functions = Methods::extract_methods(&mut arena, root, &table);
            for &method in &functions {
                let refers = Methods::method_refers_to_arguments(&arena, method);
                let frame_params = count_frame_params(&arena, method);
                Methods::remove_first_arguments(
                    &mut arena,
                    method,
                    if refers { frame_params } else { 0 },
                );
                Methods::replace_argument_references(&mut arena, method);
            }
            if features.has(Feature::ControlFlow) {
                let entries: HashMap<String, u32> = table
                    .values()
                    .map(|MethodInfo { name, entry }| (name.clone(), *entry))
                    .collect();
                Methods::replace_function_calls(&mut arena, root, &entries);
                for &method in &functions {
                    if let Some(body) = function_body(&arena, method) {
                        Methods::replace_function_calls(&mut arena, body, &entries);
                    }
                }
            }
            Ok(functions)
        })?;
        methods_extracted = functions.len();

        if features.has(Feature::ControlFlow) {
            stage("control_flow", || {
                let entry = ids.next()?;
                let exit = ids.next()?;
                let mut flattener = Flattener::new(ids);
                flattener.add_method(&mut arena, root, entry, exit)?;
                for &method in &functions {
                    Methods::bump_arguments_indices(&mut arena, method, 1.0);
                    let Some(body) = function_body(&arena, method) else {
                        continue;
                    };
                    let Some(info) = table.get(&method) else {
                        continue;
                    };
                    flattener.add_method(&mut arena, body, info.entry, exit)?;
                }
                dispatch_cases = flattener.case_count() + 1;
                root = flattener.into_program(&mut arena, entry, exit, &mut rng)?;
                Unifier::unify(&mut arena, root)?;
                Ok(())
            })?;
        } else {
            stage("assemble", || {
                Methods::inject_helpers(&mut arena, root)?;
                let body = arena.take_body(root);
                let block = arena.alloc(NodeKind::Block { body });
                let mut program = functions.clone();
                program.push(block);
                root = arena.alloc(NodeKind::Program { body: program });
                Ok(())
            })?;
        }
    }

    stage("postprocessing", || {
        root = Postprocess::run(&mut arena, root);
        Ok(())
    })?;

    let violations = stage("health", || {
        let report = check::check_tree(&arena, root, config.strict)?;
        Ok(report.violations.len())
    })?;

    if features.has(Feature::Mangle) {
        stage("mangle", || {
            root = Mangle::mangle(&mut arena, root)?;
            Ok(())
        })?;
    }

    let emit_options = config.emit.clone().unwrap_or_else(|| {
        if features.has(Feature::Compress) {
            EmitOptions::compressed()
        } else {
            EmitOptions::default()
        }
    });
    let code = stage("emit", || Ok(encoder::emit(&arena, root, &emit_options)))?;

    let obfuscated_size = code.len();
    let size_delta_percentage = if original_size > 0 {
        ((obfuscated_size as f64 - original_size as f64) / original_size as f64) * 100.0
    } else {
        0.0
    };
    info!(
        "Obfuscation complete: {} -> {} bytes ({:+.1}%), {} methods, {} dispatch cases",
        original_size, obfuscated_size, size_delta_percentage, methods_extracted, dispatch_cases
    );

    Ok(ObfuscationResult {
        code,
        original_size,
        obfuscated_size,
        size_delta_percentage,
        modules_merged: module_count.saturating_sub(1),
        methods_extracted,
        dispatch_cases,
        metadata: ObfuscationMetadata {
            features_applied: features.names().iter().map(|s| s.to_string()).collect(),
            seed_hash: config.seed.hash_hex(),
            structural_violations: violations,
        },
    })
}

fn function_body(arena: &Arena, method: NodeId) -> Option<NodeId> {
    match arena.kind(method) {
        NodeKind::FunctionDecl { body, .. } | NodeKind::FunctionExpr { body, .. } => Some(*body),
        _ => None,
    }
}

fn count_frame_params(arena: &Arena, method: NodeId) -> usize {
    let params = match arena.kind(method) {
        NodeKind::FunctionDecl { params, .. } | NodeKind::FunctionExpr { params, .. } => params,
        _ => return 0,
    };
    params
        .iter()
        .filter(|param| {
            matches!(arena.kind(**param), NodeKind::Ident { name } if name.starts_with("$$scope"))
        })
        .count()
}

/// Convenience wrapper for the single-source case.
pub fn obfuscate_source(source: &str, config: ObfuscationConfig) -> Result<ObfuscationResult> {
    let mut sources = HashMap::new();
    sources.insert("app".to_string(), source.to_string());
    obfuscate("app", &sources, config)
}
