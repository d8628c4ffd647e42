//! Step declarations and the Step trait (v0.1)
//!
//! A step is a named unit of work with statically declared inputs/outputs.
//! There is no discovery mechanism: everything a step consumes or produces
//! is stated up front in its StepSpec, and the graph builder only ever looks
//! at specs, never at step bodies.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::artifact::{Cardinality, Consume, ConsumeMode, Produce};
use crate::context::StepContext;
use crate::error::StratumError;
use crate::types::{ArtifactTypeId, StepId};

/// Declared shape of a step: what it consumes, produces, and when it is active
#[derive(Debug, Clone)]
pub struct StepSpec {
    pub id: StepId,
    pub consumes: Vec<Consume>,
    pub produces: Vec<Produce>,
    /// Run even when no declared output is reachable from the final set
    pub always_run: bool,
    /// Active only when every listed flag is set on the pipeline
    pub only_if: Vec<String>,
    /// Active only when none of the listed flags is set
    pub only_if_not: Vec<String>,
}

impl StepSpec {
    pub fn new(id: StepId) -> Self {
        Self {
            id,
            consumes: Vec::new(),
            produces: Vec::new(),
            always_run: false,
            only_if: Vec::new(),
            only_if_not: Vec::new(),
        }
    }

    /// Mode under which this step consumes `ty`, if declared
    pub fn consume_mode(&self, ty: &ArtifactTypeId) -> Option<ConsumeMode> {
        self.consumes
            .iter()
            .find(|c| &c.artifact_type == ty)
            .map(|c| c.mode)
    }

    /// Cardinality under which this step produces `ty`, if declared
    pub fn produce_cardinality(&self, ty: &ArtifactTypeId) -> Option<Cardinality> {
        self.produces
            .iter()
            .find(|p| &p.artifact_type == ty)
            .map(|p| p.cardinality)
    }

    /// Flag-gated activation, evaluated before the graph is built
    pub fn is_active(&self, flags: &HashSet<String>) -> bool {
        self.only_if.iter().all(|f| flags.contains(f))
            && !self.only_if_not.iter().any(|f| flags.contains(f))
    }
}

/// A unit of build work. Implementations must be stateless across runs:
/// all inputs come from the context, all outputs go through it.
#[async_trait]
pub trait Step: Send + Sync {
    fn spec(&self) -> &StepSpec;

    async fn run(&self, ctx: &StepContext) -> Result<(), StratumError>;
}

type StepFn =
    Box<dyn for<'a> Fn(&'a StepContext) -> BoxFuture<'a, Result<(), StratumError>> + Send + Sync>;

/// Closure-backed step, for programmatic pipelines and tests
pub struct FnStep {
    spec: StepSpec,
    f: StepFn,
}

impl FnStep {
    /// Wrap an async closure (callers return `Box::pin(async move { .. })`)
    pub fn new<F>(spec: StepSpec, f: F) -> Self
    where
        F: for<'a> Fn(&'a StepContext) -> BoxFuture<'a, Result<(), StratumError>>
            + Send
            + Sync
            + 'static,
    {
        Self { spec, f: Box::new(f) }
    }

    /// Wrap a synchronous closure
    pub fn sync<F>(spec: StepSpec, f: F) -> Self
    where
        F: Fn(&StepContext) -> Result<(), StratumError> + Send + Sync + 'static,
    {
        Self::new(spec, move |ctx| {
            let res = f(ctx);
            Box::pin(async move { res })
        })
    }
}

#[async_trait]
impl Step for FnStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn run(&self, ctx: &StepContext) -> Result<(), StratumError> {
        (self.f)(ctx).await
    }
}

impl std::fmt::Debug for FnStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("spec", &self.spec).finish()
    }
}
