//! Builder patterns for ergonomic pipeline construction (v0.1)
//!
//! Provides fluent APIs for declaring steps and assembling pipelines
//! programmatically. Registration is fully static: no discovery, no
//! reflection, every consume/produce stated up front.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::artifact::{Cardinality, Consume, ConsumeMode, Produce};
use crate::error::StratumError;
use crate::graph::ExecutionPlan;
use crate::limits::ExecLimits;
use crate::context::StepContext;
use crate::step::{FnStep, Step, StepSpec};
use crate::types::{ArtifactTypeId, StepId};

// ============================================================================
// STEP SPEC BUILDER
// ============================================================================

/// Fluent builder for a step declaration
pub struct StepSpecBuilder {
    spec: StepSpec,
}

impl StepSpecBuilder {
    /// Start a spec for the given step id
    pub fn new(id: &str) -> Result<Self, StratumError> {
        Ok(Self {
            spec: StepSpec::new(StepId::new(id)?),
        })
    }

    /// Declare a required consumed type
    pub fn consumes(mut self, ty: &str) -> Result<Self, StratumError> {
        self.spec.consumes.push(Consume {
            artifact_type: ArtifactTypeId::new(ty)?,
            mode: ConsumeMode::Required,
        });
        Ok(self)
    }

    /// Declare an optional consumed type (no producer needed)
    pub fn consumes_optional(mut self, ty: &str) -> Result<Self, StratumError> {
        self.spec.consumes.push(Consume {
            artifact_type: ArtifactTypeId::new(ty)?,
            mode: ConsumeMode::Optional,
        });
        Ok(self)
    }

    /// Declare a single-valued produced type
    pub fn produces(mut self, ty: &str) -> Result<Self, StratumError> {
        self.spec.produces.push(Produce {
            artifact_type: ArtifactTypeId::new(ty)?,
            cardinality: Cardinality::Single,
        });
        Ok(self)
    }

    /// Declare a multi-valued produced type
    pub fn produces_multi(mut self, ty: &str) -> Result<Self, StratumError> {
        self.spec.produces.push(Produce {
            artifact_type: ArtifactTypeId::new(ty)?,
            cardinality: Cardinality::Multi,
        });
        Ok(self)
    }

    /// Run even when no output is reachable from the final set
    /// (side-effect steps like validators)
    pub fn always_run(mut self) -> Self {
        self.spec.always_run = true;
        self
    }

    /// Activate only when the flag is set on the pipeline
    pub fn only_if(mut self, flag: impl Into<String>) -> Self {
        self.spec.only_if.push(flag.into());
        self
    }

    /// Activate only when the flag is NOT set on the pipeline
    pub fn only_if_not(mut self, flag: impl Into<String>) -> Self {
        self.spec.only_if_not.push(flag.into());
        self
    }

    pub fn build(self) -> StepSpec {
        self.spec
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// A complete step registry plus the build request (finals, flags, limits)
pub struct Pipeline {
    steps: Vec<Arc<dyn Step>>,
    finals: Vec<ArtifactTypeId>,
    flags: Arc<HashSet<String>>,
    limits: ExecLimits,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("steps", &self.steps.iter().map(|s| &s.spec().id).collect::<Vec<_>>())
            .field("finals", &self.finals)
            .field("flags", &self.flags)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn steps(&self) -> &[Arc<dyn Step>] {
        &self.steps
    }

    /// Cloned specs of every registered step
    pub fn specs(&self) -> Vec<StepSpec> {
        self.steps.iter().map(|s| s.spec().clone()).collect()
    }

    /// Lookup table from step id to step
    pub fn step_index(&self) -> HashMap<StepId, Arc<dyn Step>> {
        self.steps
            .iter()
            .map(|s| (s.spec().id.clone(), Arc::clone(s)))
            .collect()
    }

    pub fn finals(&self) -> &[ArtifactTypeId] {
        &self.finals
    }

    pub fn flags(&self) -> &Arc<HashSet<String>> {
        &self.flags
    }

    pub fn limits(&self) -> &ExecLimits {
        &self.limits
    }

    /// Validate and layer the pipeline without executing it
    pub fn plan(&self) -> Result<ExecutionPlan, StratumError> {
        ExecutionPlan::build(&self.specs(), &self.finals, &self.flags)
    }
}

/// Fluent builder for pipelines
pub struct PipelineBuilder {
    steps: Vec<Arc<dyn Step>>,
    seen: HashSet<StepId>,
    finals: Vec<ArtifactTypeId>,
    flags: HashSet<String>,
    limits: ExecLimits,
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("steps", &self.steps.iter().map(|s| &s.spec().id).collect::<Vec<_>>())
            .field("seen", &self.seen)
            .field("finals", &self.finals)
            .field("flags", &self.flags)
            .field("limits", &self.limits)
            .finish()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            seen: HashSet::new(),
            finals: Vec::new(),
            flags: HashSet::new(),
            limits: ExecLimits::default(),
        }
    }

    /// Register a step; duplicate ids are rejected immediately
    pub fn step(self, step: impl Step + 'static) -> Result<Self, StratumError> {
        self.step_arc(Arc::new(step))
    }

    /// Register a step declared through a StepSpecBuilder closure, with a
    /// synchronous body
    pub fn with_step<C, F>(self, id: &str, configure: C, run: F) -> Result<Self, StratumError>
    where
        C: FnOnce(StepSpecBuilder) -> Result<StepSpecBuilder, StratumError>,
        F: Fn(&StepContext) -> Result<(), StratumError> + Send + Sync + 'static,
    {
        let builder = configure(StepSpecBuilder::new(id)?)?;
        self.step(FnStep::sync(builder.build(), run))
    }

    /// Register an already-shared step
    pub fn step_arc(mut self, step: Arc<dyn Step>) -> Result<Self, StratumError> {
        let id = step.spec().id.clone();
        if !self.seen.insert(id.clone()) {
            return Err(StratumError::DuplicateStepId { id: id.to_string() });
        }
        self.steps.push(step);
        Ok(self)
    }

    /// Request an artifact type as part of the build's final output set
    pub fn final_artifact(mut self, ty: &str) -> Result<Self, StratumError> {
        self.finals.push(ArtifactTypeId::new(ty)?);
        Ok(self)
    }

    /// Set a pipeline flag (evaluated by only_if / only_if_not gates)
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into());
        self
    }

    pub fn limits(mut self, limits: ExecLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<Pipeline, StratumError> {
        if self.finals.is_empty() {
            return Err(StratumError::NoFinalArtifacts);
        }
        Ok(Pipeline {
            steps: self.steps,
            finals: self.finals,
            flags: Arc::new(self.flags),
            limits: self.limits,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::FnStep;

    fn noop(spec: StepSpec) -> FnStep {
        FnStep::sync(spec, |_| Ok(()))
    }

    #[test]
    fn spec_builder_full_shape() {
        let spec = StepSpecBuilder::new("gen")
            .unwrap()
            .consumes("class-index")
            .unwrap()
            .consumes_optional("config")
            .unwrap()
            .produces_multi("bundle")
            .unwrap()
            .always_run()
            .only_if("native")
            .build();

        assert_eq!(spec.id.as_str(), "gen");
        assert_eq!(spec.consumes.len(), 2);
        assert_eq!(spec.consumes[1].mode, ConsumeMode::Optional);
        assert_eq!(spec.produces[0].cardinality, Cardinality::Multi);
        assert!(spec.always_run);
        assert_eq!(spec.only_if, vec!["native".to_string()]);
    }

    #[test]
    fn spec_builder_rejects_bad_ids() {
        assert!(StepSpecBuilder::new("Bad Id").is_err());
        assert!(StepSpecBuilder::new("ok")
            .unwrap()
            .consumes("ALSO BAD")
            .is_err());
    }

    #[test]
    fn duplicate_step_rejected_at_registration() {
        let a = noop(StepSpecBuilder::new("scan").unwrap().produces("x").unwrap().build());
        let b = noop(StepSpecBuilder::new("scan").unwrap().produces("y").unwrap().build());

        let err = Pipeline::builder()
            .step(a)
            .unwrap()
            .step(b)
            .unwrap_err();
        assert!(matches!(err, StratumError::DuplicateStepId { .. }));
    }

    #[test]
    fn build_requires_finals() {
        let a = noop(StepSpecBuilder::new("scan").unwrap().produces("x").unwrap().build());
        let err = Pipeline::builder().step(a).unwrap().build().unwrap_err();
        assert!(matches!(err, StratumError::NoFinalArtifacts));
    }

    #[test]
    fn with_step_registers_through_a_closure() {
        let pipeline = Pipeline::builder()
            .with_step("scan", |b| b.produces("class-index"), |_| Ok(()))
            .unwrap()
            .with_step(
                "gen",
                |b| b.consumes("class-index")?.produces_multi("bytecode"),
                |_| Ok(()),
            )
            .unwrap()
            .final_artifact("bytecode")
            .unwrap()
            .build()
            .unwrap();

        let plan = pipeline.plan().unwrap();
        assert_eq!(plan.layers().len(), 2);
        assert_eq!(plan.layers()[1][0].as_str(), "gen");
    }

    #[test]
    fn with_step_propagates_builder_errors() {
        assert!(Pipeline::builder()
            .with_step("Bad Id", Ok, |_| Ok(()))
            .is_err());
        assert!(Pipeline::builder()
            .with_step("ok", |b| b.consumes("NOT OK"), |_| Ok(()))
            .is_err());
    }

    #[test]
    fn with_step_rejects_duplicate_ids() {
        let err = Pipeline::builder()
            .with_step("scan", |b| b.produces("x"), |_| Ok(()))
            .unwrap()
            .with_step("scan", |b| b.produces("y"), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, StratumError::DuplicateStepId { .. }));
    }

    #[test]
    fn pipeline_plan_convenience() {
        let a = noop(StepSpecBuilder::new("scan").unwrap().produces("x").unwrap().build());
        let pipeline = Pipeline::builder()
            .step(a)
            .unwrap()
            .final_artifact("x")
            .unwrap()
            .build()
            .unwrap();

        let plan = pipeline.plan().unwrap();
        assert_eq!(plan.layers().len(), 1);
    }
}
