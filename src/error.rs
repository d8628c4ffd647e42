//! Error types with fix suggestions (v0.1)
//!
//! Coded variants are stable identifiers for scripting against CLI output:
//! - STRAT-01x: registration errors (ids, duplicates, empty final set)
//! - STRAT-02x: graph validation errors (producers, cycles, cardinality)
//! - STRAT-03x: execution errors (step failure, timeout, cancellation)
//! - STRAT-04x: step context misuse (undeclared reads/writes, sealed types)

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum StratumError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Free-form failure raised inside a step body
    #[error("Execution error: {0}")]
    Execution(String),

    // ─────────────────────────────────────────────────────────────
    // Registration errors (STRAT-010 to STRAT-013)
    // ─────────────────────────────────────────────────────────────
    #[error("STRAT-010: invalid step id '{id}' (expected [a-z][a-z0-9_-]*, max 64 chars)")]
    InvalidStepId { id: String },

    #[error("STRAT-011: invalid artifact type '{id}' (expected [a-z][a-z0-9_-]*, max 64 chars)")]
    InvalidArtifactType { id: String },

    #[error("STRAT-012: duplicate step id '{id}'")]
    DuplicateStepId { id: String },

    #[error("STRAT-013: no final artifact types requested")]
    NoFinalArtifacts,

    // ─────────────────────────────────────────────────────────────
    // Graph validation errors (STRAT-020 to STRAT-024)
    // ─────────────────────────────────────────────────────────────
    #[error("STRAT-020: step '{step_id}' requires artifact type '{artifact_type}' but no active step produces it")]
    MissingProducer {
        step_id: String,
        artifact_type: String,
    },

    #[error("STRAT-021: single-valued artifact type '{artifact_type}' has multiple producers: '{first}' and '{second}'")]
    DuplicateProducer {
        artifact_type: String,
        first: String,
        second: String,
    },

    #[error("STRAT-022: dependency cycle detected: {cycle_path}")]
    CycleDetected { cycle_path: String },

    #[error("STRAT-023: artifact type '{artifact_type}' declared with conflicting cardinalities by '{first}' and '{second}'")]
    CardinalityConflict {
        artifact_type: String,
        first: String,
        second: String,
    },

    #[error("STRAT-024: final artifact type '{artifact_type}' has no active producer")]
    MissingFinalProducer { artifact_type: String },

    // ─────────────────────────────────────────────────────────────
    // Execution errors (STRAT-030 to STRAT-033)
    // ─────────────────────────────────────────────────────────────
    #[error("STRAT-030: step '{step_id}' failed: {cause}")]
    StepFailed {
        step_id: String,
        cause: String,
        /// Dependent steps that will not run because of this failure
        skipped: Vec<String>,
    },

    #[error("STRAT-031: step '{step_id}' timed out after {timeout_secs}s")]
    StepTimeout { step_id: String, timeout_secs: u64 },

    #[error("STRAT-032: build cancelled after {completed_layers} layer(s)")]
    Cancelled { completed_layers: usize },

    #[error("STRAT-033: build exceeded maximum duration of {max_secs}s")]
    BuildTimeout { max_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Step context misuse (STRAT-040 to STRAT-044)
    // ─────────────────────────────────────────────────────────────
    #[error("STRAT-040: step '{step_id}' read artifact type '{artifact_type}' without declaring it as consumed")]
    UndeclaredConsume {
        step_id: String,
        artifact_type: String,
    },

    #[error("STRAT-041: step '{step_id}' produced artifact type '{artifact_type}' without declaring it")]
    UndeclaredProduce {
        step_id: String,
        artifact_type: String,
    },

    #[error("STRAT-042: step '{step_id}' produced single-valued artifact type '{artifact_type}' more than once")]
    DuplicateSingleProduce {
        step_id: String,
        artifact_type: String,
    },

    #[error("STRAT-043: artifact type '{artifact_type}' is sealed (its producer layers already completed)")]
    SealedArtifact { artifact_type: String },

    #[error("STRAT-044: required artifact type '{artifact_type}' was not produced for step '{step_id}'")]
    ArtifactUnavailable {
        step_id: String,
        artifact_type: String,
    },

    #[error("STRAT-045: step '{step_id}' used a single-valued read on multi-valued artifact type '{artifact_type}'")]
    SingleReadOfMultiType {
        step_id: String,
        artifact_type: String,
    },
}

impl StratumError {
    /// Shorthand for failing a step with a free-form message
    pub fn step(message: impl Into<String>) -> Self {
        StratumError::Execution(message.into())
    }
}

impl FixSuggestion for StratumError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            StratumError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            StratumError::Io(_) => Some("Check file path and permissions"),
            StratumError::Execution(_) => None,

            StratumError::InvalidStepId { .. } | StratumError::InvalidArtifactType { .. } => {
                Some("Use lowercase tokens like 'scan-classes' or 'class_index'")
            }
            StratumError::DuplicateStepId { .. } => Some("Give every step a unique id"),
            StratumError::NoFinalArtifacts => {
                Some("Request at least one final artifact type (builder: final_artifact, manifest: final:)")
            }

            StratumError::MissingProducer { .. } => {
                Some("Register a step producing the type, or mark the consumption optional")
            }
            StratumError::DuplicateProducer { .. } => {
                Some("Declare the type multi-valued, or remove one of the producers")
            }
            StratumError::CycleDetected { .. } => {
                Some("Break the cycle: some step both feeds and depends on the listed chain")
            }
            StratumError::CardinalityConflict { .. } => {
                Some("All producers of a type must agree on single vs multi cardinality")
            }
            StratumError::MissingFinalProducer { .. } => {
                Some("Register a step producing the final type, or drop it from the final set")
            }

            StratumError::StepFailed { .. } => {
                Some("Inspect the failing step; builds are fail-fast and never retried")
            }
            StratumError::StepTimeout { .. } => {
                Some("Raise ExecLimits::step_timeout or split the step into smaller units")
            }
            StratumError::Cancelled { .. } => None,
            StratumError::BuildTimeout { .. } => Some("Raise ExecLimits::max_build_duration"),

            StratumError::UndeclaredConsume { .. } => {
                Some("Add the type to the step's consumes declaration")
            }
            StratumError::UndeclaredProduce { .. } => {
                Some("Add the type to the step's produces declaration")
            }
            StratumError::DuplicateSingleProduce { .. } => {
                Some("Declare the type multi-valued if a step must contribute several instances")
            }
            StratumError::SealedArtifact { .. } => {
                Some("Artifacts are append-only; producers must be scheduled before consumers")
            }
            StratumError::ArtifactUnavailable { .. } => {
                Some("Use fetch() instead of require() for optional consumption")
            }
            StratumError::SingleReadOfMultiType { .. } => {
                Some("Use fetch_multi() or fetch_multi_ordered() for multi-valued types")
            }
        }
    }
}
