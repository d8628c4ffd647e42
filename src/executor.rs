//! Layer-by-layer build executor (v0.1)
//!
//! Runs a validated plan: every step of a layer is spawned on the tokio
//! runtime (bounded by the concurrency limit), the layer is joined as a
//! barrier, outboxes are committed and finalized types sealed, then the
//! next layer starts. Failures are fail-fast: the failing layer finishes,
//! nothing after it runs, and the report names the failing step, its cause
//! and every dependent step that was skipped. No retries, ever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::artifact::Artifact;
use crate::builders::Pipeline;
use crate::context::StepContext;
use crate::error::StratumError;
use crate::event_log::{EventKind, EventLog};
use crate::limits::ExecLimits;
use crate::store::ArtifactStore;
use crate::types::{ArtifactTypeId, StepId};

/// Cooperative cancellation flag, checked at layer boundaries only.
/// Mid-layer cancellation is unsupported: steps are expected to be short.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution result for one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step_id: StepId,
    pub duration_ms: u64,
    pub produced: Vec<ArtifactTypeId>,
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of a successful build
#[derive(Debug)]
pub struct BuildReport {
    /// Requested final artifacts, keyed by type
    pub finals: HashMap<ArtifactTypeId, Vec<Artifact>>,
    /// Per-step results in completion-processing order
    pub outcomes: Vec<StepOutcome>,
    /// Steps the plan removed as unreachable from the final set
    pub pruned: Vec<StepId>,
    /// Full audit trail of the run
    pub events: EventLog,
    pub total_duration_ms: u64,
}

impl BuildReport {
    /// The one instance of a single-valued final type
    pub fn final_single(&self, ty: &str) -> Option<&Artifact> {
        let ty = ArtifactTypeId::new(ty).ok()?;
        self.finals.get(&ty).and_then(|v| v.first())
    }

    /// All instances of a multi-valued final type, in completion order
    pub fn final_multi(&self, ty: &str) -> &[Artifact] {
        static EMPTY: &[Artifact] = &[];
        ArtifactTypeId::new(ty)
            .ok()
            .and_then(|ty| self.finals.get(&ty))
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }
}

type LayerResult = (StepId, Result<(), StratumError>, Vec<Artifact>, u64);

/// Runs pipelines to completion
pub struct Executor {
    limits: Option<ExecLimits>,
    cancel: CancelToken,
}

impl Executor {
    /// Executor without limits of its own: each run uses its pipeline's
    pub fn new() -> Self {
        Self {
            limits: None,
            cancel: CancelToken::new(),
        }
    }

    /// Executor with fixed limits, overriding every pipeline's
    pub fn with_limits(limits: ExecLimits) -> Self {
        Self {
            limits: Some(limits),
            cancel: CancelToken::new(),
        }
    }

    /// Handle for cancelling this executor's builds between layers
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Execute the pipeline and collect its final artifacts.
    ///
    /// Plans first (all configuration errors surface before any step runs),
    /// then executes layer by layer. Limits come from `with_limits` when
    /// given, otherwise from the pipeline.
    #[instrument(skip_all, fields(finals = pipeline.finals().len()))]
    pub async fn run(&self, pipeline: &Pipeline) -> Result<BuildReport, StratumError> {
        let started = Instant::now();
        let limits = self.limits.as_ref().unwrap_or_else(|| pipeline.limits());
        let plan = pipeline.plan()?;
        let log = EventLog::new();

        let store = ArtifactStore::new();
        for (ty, cardinality) in plan.cardinalities() {
            store.register(ty.clone(), *cardinality);
        }

        log.emit(EventKind::BuildStarted {
            step_count: plan.scheduled_count(),
            layer_count: plan.layers().len(),
        });
        if !plan.pruned().is_empty() {
            debug!(pruned = plan.pruned().len(), "pruned unreachable steps");
            log.emit(EventKind::StepsPruned {
                step_ids: plan.pruned().to_vec(),
            });
        }

        let index = pipeline.step_index();
        let seal_schedule = plan.seal_schedule();
        let semaphore = Arc::new(Semaphore::new(limits.concurrency()));
        let mut outcomes: Vec<StepOutcome> = Vec::new();

        for (layer_idx, layer) in plan.layers().iter().enumerate() {
            if self.cancel.is_cancelled() {
                log.emit(EventKind::BuildCancelled {
                    completed_layers: layer_idx,
                });
                return Err(StratumError::Cancelled {
                    completed_layers: layer_idx,
                });
            }
            if started.elapsed() > limits.max_build_duration {
                return Err(StratumError::BuildTimeout {
                    max_secs: limits.max_build_duration.as_secs(),
                });
            }

            let layer_started = Instant::now();
            log.emit(EventKind::LayerStarted {
                index: layer_idx,
                step_ids: layer.clone(),
            });
            debug!(layer = layer_idx, steps = layer.len(), "dispatching layer");

            // Spawn the whole layer, then join it as a barrier. Handles are
            // awaited in spawn order so result processing is deterministic.
            let mut handles: Vec<(StepId, JoinHandle<(Result<(), StratumError>, Vec<Artifact>, u64)>)> =
                Vec::with_capacity(layer.len());
            for step_id in layer {
                let step = match index.get(step_id) {
                    Some(s) => Arc::clone(s),
                    None => {
                        return Err(StratumError::Execution(format!(
                            "step '{step_id}' missing from registry"
                        )))
                    }
                };
                let ctx = StepContext::new(
                    step.spec().clone(),
                    store.clone(),
                    Arc::clone(pipeline.flags()),
                );
                let sem = Arc::clone(&semaphore);
                let task_log = log.clone();
                let id = step_id.clone();
                let step_timeout = limits.step_timeout;
                let span = tracing::info_span!("step", id = %id);

                let handle = tokio::spawn(
                    async move {
                        let _permit = sem.acquire_owned().await.ok();
                        task_log.emit(EventKind::StepStarted { step_id: id.clone() });
                        let step_started = Instant::now();
                        let res = match step_timeout {
                            Some(t) => match tokio::time::timeout(t, step.run(&ctx)).await {
                                Ok(r) => r,
                                Err(_) => Err(StratumError::StepTimeout {
                                    step_id: id.to_string(),
                                    timeout_secs: t.as_secs(),
                                }),
                            },
                            None => step.run(&ctx).await,
                        };
                        let duration_ms = step_started.elapsed().as_millis() as u64;
                        (res, ctx.take_outbox(), duration_ms)
                    }
                    .instrument(span),
                );
                handles.push((step_id.clone(), handle));
            }

            let mut layer_results: Vec<LayerResult> = Vec::with_capacity(handles.len());
            for (id, handle) in handles {
                match handle.await {
                    Ok((res, outbox, duration_ms)) => {
                        layer_results.push((id, res, outbox, duration_ms));
                    }
                    Err(join_err) => {
                        // A panicking step fails the build like any other error
                        layer_results.push((
                            id,
                            Err(StratumError::Execution(format!("step panicked: {join_err}"))),
                            Vec::new(),
                            0,
                        ));
                    }
                }
            }

            let mut first_failure: Option<(StepId, StratumError)> = None;
            for (id, res, outbox, duration_ms) in layer_results {
                match res {
                    Ok(()) => {
                        let produced: Vec<ArtifactTypeId> =
                            outbox.iter().map(|a| a.artifact_type.clone()).collect();
                        store.commit(outbox)?;
                        log.emit(EventKind::StepCompleted {
                            step_id: id.clone(),
                            produced: produced.clone(),
                            duration_ms,
                        });
                        outcomes.push(StepOutcome {
                            step_id: id,
                            duration_ms,
                            produced,
                            error: None,
                        });
                    }
                    Err(err) => {
                        log.emit(EventKind::StepFailed {
                            step_id: id.clone(),
                            error: err.to_string(),
                            duration_ms,
                        });
                        outcomes.push(StepOutcome {
                            step_id: id.clone(),
                            duration_ms,
                            produced: Vec::new(),
                            error: Some(err.to_string()),
                        });
                        if first_failure.is_none() {
                            first_failure = Some((id, err));
                        }
                    }
                }
            }

            log.emit(EventKind::LayerCompleted {
                index: layer_idx,
                duration_ms: layer_started.elapsed().as_millis() as u64,
            });

            if let Some((id, cause)) = first_failure {
                let skipped = plan.dependents_of(&id);
                warn!(step = %id, skipped = skipped.len(), "build failed");
                log.emit(EventKind::BuildFailed {
                    failed_step: id.clone(),
                    error: cause.to_string(),
                    skipped: skipped.clone(),
                });
                return Err(StratumError::StepFailed {
                    step_id: id.to_string(),
                    cause: cause.to_string(),
                    skipped: skipped.iter().map(|s| s.to_string()).collect(),
                });
            }

            for ty in &seal_schedule[layer_idx] {
                store.seal(ty);
            }
        }

        let mut finals: HashMap<ArtifactTypeId, Vec<Artifact>> = HashMap::new();
        for ty in plan.finals() {
            finals.insert(ty.clone(), store.get_multi(ty));
        }

        let total_duration_ms = started.elapsed().as_millis() as u64;
        log.emit(EventKind::BuildCompleted { total_duration_ms });
        info!(steps = outcomes.len(), total_ms = total_duration_ms, "build completed");

        Ok(BuildReport {
            finals,
            outcomes,
            pruned: plan.pruned().to_vec(),
            events: log,
            total_duration_ms,
        })
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
