//! Artifact store with DashMap (v0.1)
//!
//! Append-only accumulation of produced artifacts during one build run.
//! Slots are created up front from the plan's type table, filled by the
//! executor at layer barriers, and sealed once every producing layer has
//! completed. A later layer therefore always observes a finalized view of
//! every type it depends on.

use std::sync::Arc;

use dashmap::DashMap;

use crate::artifact::{Artifact, Cardinality};
use crate::error::StratumError;
use crate::types::ArtifactTypeId;

#[derive(Debug)]
struct Slot {
    cardinality: Cardinality,
    sealed: bool,
    items: Vec<Artifact>,
}

/// Thread-safe, append-only storage for one build execution
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    slots: Arc<DashMap<ArtifactTypeId, Slot>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for an artifact type. Called once per type before
    /// execution starts; commits to unregistered types register on the fly
    /// (covers always-run steps whose outputs nothing consumes).
    pub fn register(&self, ty: ArtifactTypeId, cardinality: Cardinality) {
        self.slots.entry(ty).or_insert(Slot {
            cardinality,
            sealed: false,
            items: Vec::new(),
        });
    }

    /// Append produced artifacts. Rejects writes to sealed types and second
    /// instances of single-valued types; both are guarded earlier (graph
    /// validation, per-step outbox checks) so hitting them here is a bug in
    /// the producing step, not in the pipeline definition.
    pub fn commit(&self, artifacts: Vec<Artifact>) -> Result<(), StratumError> {
        for art in artifacts {
            let mut slot = self.slots.entry(art.artifact_type.clone()).or_insert(Slot {
                cardinality: Cardinality::Multi,
                sealed: false,
                items: Vec::new(),
            });
            if slot.sealed {
                return Err(StratumError::SealedArtifact {
                    artifact_type: art.artifact_type.to_string(),
                });
            }
            if slot.cardinality == Cardinality::Single && !slot.items.is_empty() {
                return Err(StratumError::DuplicateSingleProduce {
                    step_id: art.producer.to_string(),
                    artifact_type: art.artifact_type.to_string(),
                });
            }
            slot.items.push(art);
        }
        Ok(())
    }

    /// Seal a type: no further writes are accepted
    pub fn seal(&self, ty: &ArtifactTypeId) {
        if let Some(mut slot) = self.slots.get_mut(ty) {
            slot.sealed = true;
        }
    }

    pub fn is_sealed(&self, ty: &ArtifactTypeId) -> bool {
        self.slots.get(ty).map(|s| s.sealed).unwrap_or(false)
    }

    /// Declared cardinality of a registered type, None if no slot exists
    pub fn cardinality(&self, ty: &ArtifactTypeId) -> Option<Cardinality> {
        self.slots.get(ty).map(|s| s.cardinality)
    }

    /// The one instance of a single-valued type, or None if unproduced
    pub fn get_single(&self, ty: &ArtifactTypeId) -> Option<Artifact> {
        self.slots.get(ty).and_then(|s| s.items.first().cloned())
    }

    /// All instances contributed so far, in completion order
    /// (layer order, then commit order within a layer)
    pub fn get_multi(&self, ty: &ArtifactTypeId) -> Vec<Artifact> {
        self.slots
            .get(ty)
            .map(|s| s.items.clone())
            .unwrap_or_default()
    }

    /// Like `get_multi`, but stable-sorted by the artifacts' sort keys;
    /// unkeyed artifacts keep completion order after all keyed ones
    pub fn get_multi_ordered(&self, ty: &ArtifactTypeId) -> Vec<Artifact> {
        let mut items = self.get_multi(ty);
        items.sort_by_key(|a| a.sort_key.unwrap_or(i64::MAX));
        items
    }

    pub fn count(&self, ty: &ArtifactTypeId) -> usize {
        self.slots.get(ty).map(|s| s.items.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepId;
    use serde_json::json;

    fn ty(s: &str) -> ArtifactTypeId {
        ArtifactTypeId::new(s).unwrap()
    }

    fn art(t: &str, producer: &str, payload: serde_json::Value) -> Artifact {
        Artifact::new(ty(t), StepId::new(producer).unwrap(), payload)
    }

    #[test]
    fn single_get_after_commit() {
        let store = ArtifactStore::new();
        store.register(ty("config"), Cardinality::Single);
        store.commit(vec![art("config", "load", json!({"k": 1}))]).unwrap();

        let got = store.get_single(&ty("config")).unwrap();
        assert_eq!(got.payload["k"], 1);
        assert!(store.get_single(&ty("missing")).is_none());
    }

    #[test]
    fn duplicate_single_rejected() {
        let store = ArtifactStore::new();
        store.register(ty("config"), Cardinality::Single);
        store.commit(vec![art("config", "a", json!(1))]).unwrap();

        let err = store.commit(vec![art("config", "b", json!(2))]).unwrap_err();
        assert!(matches!(err, StratumError::DuplicateSingleProduce { .. }));
    }

    #[test]
    fn sealed_slot_rejects_writes() {
        let store = ArtifactStore::new();
        store.register(ty("entry"), Cardinality::Multi);
        store.commit(vec![art("entry", "a", json!(1))]).unwrap();
        store.seal(&ty("entry"));

        let err = store.commit(vec![art("entry", "b", json!(2))]).unwrap_err();
        assert!(matches!(err, StratumError::SealedArtifact { .. }));
        // the earlier write survives
        assert_eq!(store.count(&ty("entry")), 1);
    }

    #[test]
    fn multi_preserves_commit_order() {
        let store = ArtifactStore::new();
        store.register(ty("entry"), Cardinality::Multi);
        store.commit(vec![art("entry", "a", json!("first"))]).unwrap();
        store.commit(vec![art("entry", "b", json!("second"))]).unwrap();

        let items = store.get_multi(&ty("entry"));
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].payload, "first");
        assert_eq!(items[1].payload, "second");
    }

    #[test]
    fn ordered_get_sorts_by_key_unkeyed_last() {
        let store = ArtifactStore::new();
        store.register(ty("entry"), Cardinality::Multi);
        store
            .commit(vec![
                art("entry", "a", json!("unkeyed")),
                art("entry", "b", json!("late")).with_sort_key(10),
                art("entry", "c", json!("early")).with_sort_key(-1),
            ])
            .unwrap();

        let items = store.get_multi_ordered(&ty("entry"));
        assert_eq!(items[0].payload, "early");
        assert_eq!(items[1].payload, "late");
        assert_eq!(items[2].payload, "unkeyed");
    }
}
