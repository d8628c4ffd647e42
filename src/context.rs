//! Per-step run context (v0.1)
//!
//! The context is the only channel between a step and the rest of the build:
//! reads are limited to the step's declared consumed types, writes go into a
//! private outbox that the executor commits at the layer barrier. Two steps
//! in the same layer therefore never observe each other's outputs.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::artifact::{Artifact, Cardinality, ConsumeMode};
use crate::error::StratumError;
use crate::step::StepSpec;
use crate::store::ArtifactStore;
use crate::types::ArtifactTypeId;

/// Read/write scope handed to `Step::run`
pub struct StepContext {
    spec: StepSpec,
    store: ArtifactStore,
    outbox: Mutex<Vec<Artifact>>,
    flags: Arc<std::collections::HashSet<String>>,
}

impl StepContext {
    pub(crate) fn new(
        spec: StepSpec,
        store: ArtifactStore,
        flags: Arc<std::collections::HashSet<String>>,
    ) -> Self {
        Self {
            spec,
            store,
            outbox: Mutex::new(Vec::new()),
            flags,
        }
    }

    /// Spec of the running step
    pub fn spec(&self) -> &StepSpec {
        &self.spec
    }

    /// Whether a pipeline flag is set (same flags used for only_if gating)
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    fn declared_consume(&self, ty: &str) -> Result<(ArtifactTypeId, ConsumeMode), StratumError> {
        self.spec
            .consumes
            .iter()
            .find(|c| c.artifact_type.as_str() == ty)
            .map(|c| (c.artifact_type.clone(), c.mode))
            .ok_or_else(|| StratumError::UndeclaredConsume {
                step_id: self.spec.id.to_string(),
                artifact_type: ty.to_string(),
            })
    }

    fn guard_single_read(&self, ty: &ArtifactTypeId) -> Result<(), StratumError> {
        if self.store.cardinality(ty) == Some(Cardinality::Multi) {
            return Err(StratumError::SingleReadOfMultiType {
                step_id: self.spec.id.to_string(),
                artifact_type: ty.to_string(),
            });
        }
        Ok(())
    }

    /// Single-valued read: the one instance, or None if optional and unproduced
    pub fn fetch(&self, ty: &str) -> Result<Option<Artifact>, StratumError> {
        let (ty, _) = self.declared_consume(ty)?;
        self.guard_single_read(&ty)?;
        Ok(self.store.get_single(&ty))
    }

    /// Single-valued read that must succeed
    pub fn require(&self, ty: &str) -> Result<Artifact, StratumError> {
        let (ty, _) = self.declared_consume(ty)?;
        self.guard_single_read(&ty)?;
        self.store
            .get_single(&ty)
            .ok_or_else(|| StratumError::ArtifactUnavailable {
                step_id: self.spec.id.to_string(),
                artifact_type: ty.to_string(),
            })
    }

    /// Multi-valued read, in completion order
    pub fn fetch_multi(&self, ty: &str) -> Result<Vec<Artifact>, StratumError> {
        let (ty, _) = self.declared_consume(ty)?;
        Ok(self.store.get_multi(&ty))
    }

    /// Multi-valued read, stable-sorted by the artifacts' sort keys
    pub fn fetch_multi_ordered(&self, ty: &str) -> Result<Vec<Artifact>, StratumError> {
        let (ty, _) = self.declared_consume(ty)?;
        Ok(self.store.get_multi_ordered(&ty))
    }

    fn push(&self, ty: &str, payload: Value, sort_key: Option<i64>) -> Result<(), StratumError> {
        let declared = self
            .spec
            .produces
            .iter()
            .find(|p| p.artifact_type.as_str() == ty)
            .cloned()
            .ok_or_else(|| StratumError::UndeclaredProduce {
                step_id: self.spec.id.to_string(),
                artifact_type: ty.to_string(),
            })?;

        let mut outbox = self.outbox.lock();
        if declared.cardinality == Cardinality::Single
            && outbox.iter().any(|a| a.artifact_type == declared.artifact_type)
        {
            return Err(StratumError::DuplicateSingleProduce {
                step_id: self.spec.id.to_string(),
                artifact_type: ty.to_string(),
            });
        }

        let mut art = Artifact::new(declared.artifact_type, self.spec.id.clone(), payload);
        art.sort_key = sort_key;
        outbox.push(art);
        Ok(())
    }

    /// Produce an artifact of a declared type
    pub fn produce(&self, ty: &str, payload: Value) -> Result<(), StratumError> {
        self.push(ty, payload, None)
    }

    /// Produce an artifact carrying an ordering hint for multi-valued consumers
    pub fn produce_with_key(&self, ty: &str, payload: Value, key: i64) -> Result<(), StratumError> {
        self.push(ty, payload, Some(key))
    }

    /// Drain the outbox (executor-side, at step completion)
    pub(crate) fn take_outbox(&self) -> Vec<Artifact> {
        std::mem::take(&mut *self.outbox.lock())
    }
}
