//! Artifact declarations and produced instances (v0.1)
//!
//! - Consume/Produce: what a step declares at registration time
//! - Artifact: a produced value, tagged with its producer for diagnostics

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ArtifactTypeId, StepId};

/// How many steps may produce a given artifact type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// At most one producer; consumers see one value or none
    Single,
    /// Any number of producers; consumers see the collected list
    Multi,
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::Single
    }
}

/// Whether a consumed type must have a producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumeMode {
    /// A producer must exist or the graph is invalid
    Required,
    /// No producer needed; if one exists it still orders this step after it
    Optional,
}

impl Default for ConsumeMode {
    fn default() -> Self {
        ConsumeMode::Required
    }
}

/// A declared consumption edge endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consume {
    pub artifact_type: ArtifactTypeId,
    pub mode: ConsumeMode,
}

/// A declared production edge endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Produce {
    pub artifact_type: ArtifactTypeId,
    pub cardinality: Cardinality,
}

/// A produced artifact instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_type: ArtifactTypeId,
    /// Step that produced this instance (diagnostics)
    pub producer: StepId,
    pub payload: Value,
    /// Optional ordering hint for multi-valued consumers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<i64>,
}

impl Artifact {
    pub fn new(artifact_type: ArtifactTypeId, producer: StepId, payload: Value) -> Self {
        Self {
            artifact_type,
            producer,
            payload,
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, key: i64) -> Self {
        self.sort_key = Some(key);
        self
    }
}
