pub mod deadcode;
pub mod flattener;
pub mod identifiers;
pub mod literals;
pub mod mangle;
pub mod methods;
pub mod normalizer;
pub mod obfuscator;
pub mod postprocess;
pub mod scopes;
pub mod unifier;
pub mod variables;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transform error type encompassing all transform module errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Core operation failed.
    #[error(transparent)]
    Core(#[from] veil_core::Error),

    /// A break or continue has no enclosing target to resolve against.
    #[error("no {kind} target{label}")]
    UnresolvedJumpTarget {
        /// "break" or "continue".
        kind: &'static str,
        /// Formatted label suffix, empty for unlabeled jumps.
        label: String,
    },

    /// The flattener received a construct the normalizer should have removed.
    #[error("statement not normalized: {0}")]
    NotNormalized(&'static str),

    /// A catch handler is missing its materialized scope-binding prologue.
    #[error("catch handler missing scope-binding prologue: {0}")]
    MissingCatchPrologue(String),

    /// A pipeline stage failed; the label names the stage.
    #[error("[{stage}] {source}")]
    Stage {
        /// Stage label.
        stage: &'static str,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

/// Transform result type
pub type Result<T> = std::result::Result<T, Error>;

/// Attach a stage label to any error produced by `task`, per the pipeline's
/// `[stage-label] original error` reporting contract.
pub fn stage<T>(label: &'static str, task: impl FnOnce() -> Result<T>) -> Result<T> {
    task().map_err(|source| Error::Stage { stage: label, source: Box::new(source) })
}

/// One obfuscation feature. Enabling a feature enables everything it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    DeadCode,
    Scope,
    ControlFlow,
    Identifiers,
    Literals,
    Mangle,
    Compress,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::DeadCode,
        Feature::Scope,
        Feature::ControlFlow,
        Feature::Identifiers,
        Feature::Literals,
        Feature::Mangle,
        Feature::Compress,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::DeadCode => "dead_code",
            Feature::Scope => "scope",
            Feature::ControlFlow => "control_flow",
            Feature::Identifiers => "identifiers",
            Feature::Literals => "literals",
            Feature::Mangle => "mangle",
            Feature::Compress => "compress",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.iter().copied().find(|feature| feature.name() == name)
    }

    /// Features this one depends on.
    pub fn implies(self) -> &'static [Feature] {
        match self {
            Feature::DeadCode => &[Feature::ControlFlow],
            Feature::Scope => &[Feature::Mangle],
            Feature::ControlFlow => &[Feature::Scope, Feature::Mangle],
            Feature::Identifiers => &[Feature::Mangle],
            Feature::Literals => &[Feature::Scope, Feature::Mangle],
            Feature::Compress => &[Feature::Mangle],
            Feature::Mangle => &[],
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Feature::DeadCode => "Insert dead code",
            Feature::Scope => "Flatten the scope (method) structure to obscure application structure",
            Feature::ControlFlow => "Flatten control flow (if, while, for, ...) to obscure control flow",
            Feature::Identifiers => "Obscure identifiers (variable, object and property names)",
            Feature::Literals => "Obscure literals (numbers, strings)",
            Feature::Mangle => "Shorten identifiers (variable names, function names)",
            Feature::Compress => "Remove unneeded whitespace",
        }
    }
}

/// Enabled feature set with implication closure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    enabled: Vec<Feature>,
}

impl FeatureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Everything on; the default configuration.
    pub fn all() -> Self {
        let mut set = Self::default();
        for feature in Feature::ALL {
            set.enable(feature);
        }
        set
    }

    /// Enable `feature` and transitively everything it implies.
    pub fn enable(&mut self, feature: Feature) {
        if self.has(feature) {
            return;
        }
        self.enabled.push(feature);
        for &implied in feature.implies() {
            self.enable(implied);
        }
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    /// Parse a comma-separated feature list (`scope,control_flow,compress`).
    pub fn parse(list: &str) -> std::result::Result<Self, String> {
        let mut set = Self::default();
        for raw in list.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            match Feature::from_name(raw) {
                Some(feature) => set.enable(feature),
                None => return Err(format!("unknown feature '{raw}'")),
            }
        }
        Ok(set)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.enabled.iter().map(|feature| feature.name()).collect();
        names.sort_unstable();
        names
    }
}
