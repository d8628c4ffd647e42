//! Event sourcing for build execution (v0.1)
//!
//! Full audit trail of one build run.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: build / layer / step levels
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::{ArtifactTypeId, StepId};

/// Single event in the build execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since build start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    pub kind: EventKind,
}

/// All possible event types (3 levels)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // BUILD LEVEL
    // ═══════════════════════════════════════════
    BuildStarted {
        step_count: usize,
        layer_count: usize,
    },
    StepsPruned {
        step_ids: Vec<StepId>,
    },
    BuildCompleted {
        total_duration_ms: u64,
    },
    BuildFailed {
        failed_step: StepId,
        error: String,
        /// Dependent steps that never ran
        skipped: Vec<StepId>,
    },
    BuildCancelled {
        completed_layers: usize,
    },

    // ═══════════════════════════════════════════
    // LAYER LEVEL
    // ═══════════════════════════════════════════
    LayerStarted {
        index: usize,
        step_ids: Vec<StepId>,
    },
    LayerCompleted {
        index: usize,
        duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStarted {
        step_id: StepId,
    },
    StepCompleted {
        step_id: StepId,
        produced: Vec<ArtifactTypeId>,
        duration_ms: u64,
    },
    StepFailed {
        step_id: StepId,
        error: String,
        duration_ms: u64,
    },
}

impl EventKind {
    /// Extract step_id if event is step-related
    pub fn step_id(&self) -> Option<&StepId> {
        match self {
            Self::StepStarted { step_id }
            | Self::StepCompleted { step_id, .. }
            | Self::StepFailed { step_id, .. } => Some(step_id),
            Self::BuildFailed { failed_step, .. } => Some(failed_step),
            _ => None,
        }
    }

    /// Check if this is a build-level event
    pub fn is_build_event(&self) -> bool {
        matches!(
            self,
            Self::BuildStarted { .. }
                | Self::StepsPruned { .. }
                | Self::BuildCompleted { .. }
                | Self::BuildFailed { .. }
                | Self::BuildCancelled { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone, Debug)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at build start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };
        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Filter events by step ID
    pub fn filter_step(&self, step_id: &StepId) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.step_id() == Some(step_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> StepId {
        StepId::new(s).unwrap()
    }

    #[test]
    fn ids_are_monotonic() {
        let log = EventLog::new();
        let a = log.emit(EventKind::BuildStarted { step_count: 2, layer_count: 1 });
        let b = log.emit(EventKind::StepStarted { step_id: sid("scan") });
        assert!(b > a);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn filter_by_step() {
        let log = EventLog::new();
        log.emit(EventKind::BuildStarted { step_count: 1, layer_count: 1 });
        log.emit(EventKind::StepStarted { step_id: sid("scan") });
        log.emit(EventKind::StepCompleted {
            step_id: sid("scan"),
            produced: vec![],
            duration_ms: 3,
        });
        log.emit(EventKind::StepStarted { step_id: sid("other") });

        let events = log.filter_step(&sid("scan"));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn serde_tagging() {
        let kind = EventKind::StepFailed {
            step_id: sid("gen"),
            error: "boom".into(),
            duration_ms: 1,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "step_failed");
        assert_eq!(json["step_id"], "gen");
    }

    #[test]
    fn build_level_classification() {
        assert!(EventKind::BuildCancelled { completed_layers: 0 }.is_build_event());
        assert!(!EventKind::StepStarted { step_id: sid("x") }.is_build_event());
    }
}
