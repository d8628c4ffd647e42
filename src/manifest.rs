//! Declarative pipeline manifests (v0.1)
//!
//! YAML description of a pipeline's topology: step declarations, flags and
//! the final artifact set. Manifests carry no step bodies, so they cannot
//! be executed directly; they exist so a pipeline's wiring can be linted
//! and planned (`stratum validate`, `stratum plan`) without compiling the
//! steps themselves.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::artifact::{Cardinality, Consume, ConsumeMode, Produce};
use crate::error::StratumError;
use crate::graph::ExecutionPlan;
use crate::step::StepSpec;
use crate::types::{ArtifactTypeId, StepId};

// ============================================================================
// RAW DESERIALIZATION SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ManifestRaw {
    pipeline: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(rename = "final")]
    finals: Vec<String>,
    steps: Vec<StepEntry>,
}

#[derive(Debug, Deserialize)]
struct StepEntry {
    id: String,
    #[serde(default)]
    consumes: Vec<ConsumeEntry>,
    #[serde(default)]
    produces: Vec<ProduceEntry>,
    #[serde(default)]
    always_run: bool,
    #[serde(default)]
    only_if: Vec<String>,
    #[serde(default)]
    only_if_not: Vec<String>,
}

/// A consume is either a bare type name or a full `{type, mode}` mapping
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConsumeEntry {
    Shorthand(String),
    Full {
        #[serde(rename = "type")]
        artifact_type: String,
        #[serde(default)]
        mode: ConsumeMode,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProduceEntry {
    Shorthand(String),
    Full {
        #[serde(rename = "type")]
        artifact_type: String,
        #[serde(default)]
        cardinality: Cardinality,
    },
}

// ============================================================================
// VALIDATED MANIFEST
// ============================================================================

/// A parsed and id-validated pipeline description
#[derive(Debug, Clone)]
pub struct Manifest {
    pub name: String,
    pub flags: HashSet<String>,
    pub finals: Vec<ArtifactTypeId>,
    pub specs: Vec<StepSpec>,
}

impl Manifest {
    /// Parse a manifest from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self, StratumError> {
        let raw: ManifestRaw = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    /// Parse a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StratumError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    fn from_raw(raw: ManifestRaw) -> Result<Self, StratumError> {
        if raw.finals.is_empty() {
            return Err(StratumError::NoFinalArtifacts);
        }

        let finals = raw
            .finals
            .iter()
            .map(|f| ArtifactTypeId::new(f))
            .collect::<Result<Vec<_>, _>>()?;

        let mut specs = Vec::with_capacity(raw.steps.len());
        for entry in raw.steps {
            let mut spec = StepSpec::new(StepId::new(&entry.id)?);
            for consume in entry.consumes {
                spec.consumes.push(consume.into_consume()?);
            }
            for produce in entry.produces {
                spec.produces.push(produce.into_produce()?);
            }
            spec.always_run = entry.always_run;
            spec.only_if = entry.only_if;
            spec.only_if_not = entry.only_if_not;
            specs.push(spec);
        }

        Ok(Self {
            name: raw.pipeline,
            flags: raw.flags.into_iter().collect(),
            finals,
            specs,
        })
    }

    /// Validate and layer the declared topology
    pub fn plan(&self) -> Result<ExecutionPlan, StratumError> {
        ExecutionPlan::build(&self.specs, &self.finals, &self.flags)
    }
}

impl ConsumeEntry {
    fn into_consume(self) -> Result<Consume, StratumError> {
        let (ty, mode) = match self {
            Self::Shorthand(ty) => (ty, ConsumeMode::Required),
            Self::Full { artifact_type, mode } => (artifact_type, mode),
        };
        Ok(Consume {
            artifact_type: ArtifactTypeId::new(&ty)?,
            mode,
        })
    }
}

impl ProduceEntry {
    fn into_produce(self) -> Result<Produce, StratumError> {
        let (ty, cardinality) = match self {
            Self::Shorthand(ty) => (ty, Cardinality::Single),
            Self::Full {
                artifact_type,
                cardinality,
            } => (artifact_type, cardinality),
        };
        Ok(Produce {
            artifact_type: ArtifactTypeId::new(&ty)?,
            cardinality,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
pipeline: sample-build
flags:
  - native
final:
  - app-image
steps:
  - id: scan
    produces:
      - class-index
  - id: gen
    consumes:
      - class-index
      - type: config
        mode: optional
    produces:
      - type: bytecode
        cardinality: multi
  - id: assemble
    consumes:
      - bytecode
    produces:
      - app-image
  - id: lint
    consumes:
      - class-index
    always_run: true
    only_if_not:
      - fast
"#;

    #[test]
    fn parses_full_manifest() {
        let manifest = Manifest::from_yaml(FULL).unwrap();
        assert_eq!(manifest.name, "sample-build");
        assert!(manifest.flags.contains("native"));
        assert_eq!(manifest.finals.len(), 1);
        assert_eq!(manifest.specs.len(), 4);

        let gen = &manifest.specs[1];
        assert_eq!(gen.consumes[0].mode, ConsumeMode::Required);
        assert_eq!(gen.consumes[1].mode, ConsumeMode::Optional);
        assert_eq!(gen.produces[0].cardinality, Cardinality::Multi);

        let lint = &manifest.specs[3];
        assert!(lint.always_run);
        assert_eq!(lint.only_if_not, vec!["fast".to_string()]);
    }

    #[test]
    fn manifest_plans_like_a_pipeline() {
        let manifest = Manifest::from_yaml(FULL).unwrap();
        let plan = manifest.plan().unwrap();
        // scan -> gen -> assemble, lint rides on layer 1 via class-index
        assert_eq!(plan.layers().len(), 3);
        assert_eq!(plan.layers()[0], vec![StepId::new("scan").unwrap()]);
    }

    #[test]
    fn empty_final_set_rejected() {
        let yaml = r#"
pipeline: broken
final: []
steps:
  - id: scan
    produces: [class-index]
"#;
        let err = Manifest::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, StratumError::NoFinalArtifacts));
    }

    #[test]
    fn invalid_step_id_rejected() {
        let yaml = r#"
pipeline: broken
final: [x]
steps:
  - id: "Bad Id"
    produces: [x]
"#;
        assert!(Manifest::from_yaml(yaml).is_err());
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = Manifest::from_yaml("pipeline: [unclosed").unwrap_err();
        assert!(matches!(err, StratumError::YamlParse(_)));
    }
}
