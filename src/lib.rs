//! Stratum - typed artifact pipeline scheduler

pub mod artifact;
pub mod builders;
pub mod context;
pub mod error;
pub mod event_log;
pub mod executor;
pub mod graph;
pub mod limits;
pub mod manifest;
pub mod step;
pub mod store;
pub mod types;

pub use artifact::{Artifact, Cardinality, Consume, ConsumeMode, Produce};
pub use builders::{Pipeline, PipelineBuilder, StepSpecBuilder};
pub use context::StepContext;
pub use error::{FixSuggestion, StratumError};
pub use event_log::{Event, EventKind, EventLog};
pub use executor::{BuildReport, CancelToken, Executor, StepOutcome};
pub use graph::ExecutionPlan;
pub use limits::ExecLimits;
pub use manifest::Manifest;
pub use step::{FnStep, Step, StepSpec};
pub use store::ArtifactStore;
pub use types::{ArtifactTypeId, StepId};
