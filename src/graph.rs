//! Execution graph builder (v0.1)
//!
//! Turns a set of step specs into a validated, topologically-partitioned
//! plan:
//! - flag pre-filtering (only_if / only_if_not) before anything else
//! - producer indexing with duplicate/cardinality checks
//! - required-consumption and final-set checks
//! - DFS cycle detection reporting the full cycle path
//! - backward mark-and-sweep pruning from the final artifact set
//! - Kahn wave layering: steps in one layer are mutually independent
//!
//! The plan is deterministic: layer membership depends only on the specs,
//! and every list is sorted lexicographically by step id.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::artifact::{Cardinality, ConsumeMode};
use crate::error::StratumError;
use crate::step::StepSpec;
use crate::types::{ArtifactTypeId, StepId};

/// Validated, layered execution plan
#[derive(Debug)]
pub struct ExecutionPlan {
    layers: Vec<Vec<StepId>>,
    pruned: Vec<StepId>,
    inactive: Vec<StepId>,
    successors: HashMap<StepId, BTreeSet<StepId>>,
    cardinalities: HashMap<ArtifactTypeId, Cardinality>,
    producers: HashMap<ArtifactTypeId, Vec<StepId>>,
    layer_of: HashMap<StepId, usize>,
    finals: Vec<ArtifactTypeId>,
}

impl ExecutionPlan {
    /// Build and validate the plan. Fatal on any configuration error; no
    /// step ever runs when this returns Err.
    pub fn build(
        specs: &[StepSpec],
        finals: &[ArtifactTypeId],
        flags: &HashSet<String>,
    ) -> Result<Self, StratumError> {
        if finals.is_empty() {
            return Err(StratumError::NoFinalArtifacts);
        }

        let mut seen: HashSet<&StepId> = HashSet::new();
        for spec in specs {
            if !seen.insert(&spec.id) {
                return Err(StratumError::DuplicateStepId {
                    id: spec.id.to_string(),
                });
            }
        }

        // Pre-filtering pass: inactive steps are invisible to validation,
        // layering and pruning alike.
        let mut active: Vec<&StepSpec> = specs.iter().filter(|s| s.is_active(flags)).collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        let mut inactive: Vec<StepId> = specs
            .iter()
            .filter(|s| !s.is_active(flags))
            .map(|s| s.id.clone())
            .collect();
        inactive.sort();

        // Producer index + cardinality table
        let mut producers: HashMap<ArtifactTypeId, Vec<StepId>> = HashMap::new();
        let mut cardinalities: HashMap<ArtifactTypeId, Cardinality> = HashMap::new();
        let mut declared_by: HashMap<ArtifactTypeId, StepId> = HashMap::new();
        for spec in &active {
            for produce in &spec.produces {
                let ty = &produce.artifact_type;
                match cardinalities.get(ty) {
                    None => {
                        cardinalities.insert(ty.clone(), produce.cardinality);
                        declared_by.insert(ty.clone(), spec.id.clone());
                    }
                    Some(existing) if *existing != produce.cardinality => {
                        return Err(StratumError::CardinalityConflict {
                            artifact_type: ty.to_string(),
                            first: declared_by[ty].to_string(),
                            second: spec.id.to_string(),
                        });
                    }
                    Some(_) => {}
                }

                let entry = producers.entry(ty.clone()).or_default();
                if produce.cardinality == Cardinality::Single && !entry.is_empty() {
                    return Err(StratumError::DuplicateProducer {
                        artifact_type: ty.to_string(),
                        first: entry[0].to_string(),
                        second: spec.id.to_string(),
                    });
                }
                entry.push(spec.id.clone());
            }
        }

        // Dangling required consumption
        for spec in &active {
            for consume in &spec.consumes {
                if consume.mode == ConsumeMode::Required
                    && !producers.contains_key(&consume.artifact_type)
                {
                    return Err(StratumError::MissingProducer {
                        step_id: spec.id.to_string(),
                        artifact_type: consume.artifact_type.to_string(),
                    });
                }
            }
        }

        // Every requested final type must be producible
        let finals: Vec<ArtifactTypeId> = finals.to_vec();
        for ty in &finals {
            if !producers.contains_key(ty) {
                return Err(StratumError::MissingFinalProducer {
                    artifact_type: ty.to_string(),
                });
            }
        }

        // Edge set: producer → consumer per shared type. Optional
        // consumption adds the same ordering edge whenever a producer
        // exists; it only skips the dangling-producer check above.
        let mut successors: HashMap<StepId, BTreeSet<StepId>> = HashMap::new();
        let mut predecessors: HashMap<StepId, BTreeSet<StepId>> = HashMap::new();
        for spec in &active {
            successors.entry(spec.id.clone()).or_default();
            predecessors.entry(spec.id.clone()).or_default();
        }
        for spec in &active {
            for consume in &spec.consumes {
                if let Some(prods) = producers.get(&consume.artifact_type) {
                    for producer in prods {
                        successors
                            .entry(producer.clone())
                            .or_default()
                            .insert(spec.id.clone());
                        predecessors
                            .entry(spec.id.clone())
                            .or_default()
                            .insert(producer.clone());
                    }
                }
            }
        }

        if let Some(cycle_path) = detect_cycle(&active, &successors) {
            return Err(StratumError::CycleDetected { cycle_path });
        }

        // Mark-and-sweep backward from final producers and always-run steps
        let mut marked: HashSet<StepId> = HashSet::new();
        let mut queue: VecDeque<StepId> = VecDeque::new();
        for spec in &active {
            if spec.always_run {
                queue.push_back(spec.id.clone());
            }
        }
        for ty in &finals {
            if let Some(prods) = producers.get(ty) {
                for p in prods {
                    queue.push_back(p.clone());
                }
            }
        }
        while let Some(id) = queue.pop_front() {
            if !marked.insert(id.clone()) {
                continue;
            }
            if let Some(preds) = predecessors.get(&id) {
                for p in preds {
                    if !marked.contains(p) {
                        queue.push_back(p.clone());
                    }
                }
            }
        }

        let mut pruned: Vec<StepId> = active
            .iter()
            .filter(|s| !marked.contains(&s.id))
            .map(|s| s.id.clone())
            .collect();
        pruned.sort();

        // Kahn wave layering over the surviving steps
        let mut in_degree: HashMap<&StepId, usize> = HashMap::new();
        for spec in &active {
            if !marked.contains(&spec.id) {
                continue;
            }
            let deg = predecessors
                .get(&spec.id)
                .map(|p| p.iter().filter(|x| marked.contains(*x)).count())
                .unwrap_or(0);
            in_degree.insert(&spec.id, deg);
        }

        let mut ready: Vec<StepId> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| id.clone())
            .collect();
        ready.sort();

        let mut layers: Vec<Vec<StepId>> = Vec::new();
        let mut layer_of: HashMap<StepId, usize> = HashMap::new();
        while !ready.is_empty() {
            let index = layers.len();
            let mut next: Vec<StepId> = Vec::new();
            for id in &ready {
                layer_of.insert(id.clone(), index);
                if let Some(succ) = successors.get(id) {
                    for s in succ {
                        if let Some(deg) = in_degree.get_mut(s) {
                            *deg -= 1;
                            if *deg == 0 {
                                next.push(s.clone());
                            }
                        }
                    }
                }
            }
            next.sort();
            layers.push(std::mem::take(&mut ready));
            ready = next;
        }

        Ok(Self {
            layers,
            pruned,
            inactive,
            successors,
            cardinalities,
            producers,
            layer_of,
            finals,
        })
    }

    /// Layers of mutually independent steps, in execution order
    pub fn layers(&self) -> &[Vec<StepId>] {
        &self.layers
    }

    /// Active steps removed because nothing reachable from the final set
    /// consumes their outputs
    pub fn pruned(&self) -> &[StepId] {
        &self.pruned
    }

    /// Steps removed by flag gating before validation
    pub fn inactive(&self) -> &[StepId] {
        &self.inactive
    }

    pub fn finals(&self) -> &[ArtifactTypeId] {
        &self.finals
    }

    /// Number of steps that will actually run
    pub fn scheduled_count(&self) -> usize {
        self.layers.iter().map(|l| l.len()).sum()
    }

    pub fn is_scheduled(&self, id: &StepId) -> bool {
        self.layer_of.contains_key(id)
    }

    pub fn layer_of(&self, id: &StepId) -> Option<usize> {
        self.layer_of.get(id).copied()
    }

    /// Declared cardinality per artifact type (active producers only)
    pub fn cardinalities(&self) -> &HashMap<ArtifactTypeId, Cardinality> {
        &self.cardinalities
    }

    /// Transitive scheduled dependents of a step, sorted
    pub fn dependents_of(&self, id: &StepId) -> Vec<StepId> {
        let mut out: BTreeSet<StepId> = BTreeSet::new();
        let mut queue: VecDeque<&StepId> = VecDeque::new();
        queue.push_back(id);
        while let Some(current) = queue.pop_front() {
            if let Some(succ) = self.successors.get(current) {
                for s in succ {
                    if self.is_scheduled(s) && out.insert(s.clone()) {
                        queue.push_back(s);
                    }
                }
            }
        }
        out.into_iter().collect()
    }

    /// Artifact types finalized per layer: entry `i` lists the types whose
    /// last scheduled producer sits in layer `i`. The executor seals these
    /// at the layer barrier.
    pub fn seal_schedule(&self) -> Vec<Vec<ArtifactTypeId>> {
        let mut schedule: Vec<Vec<ArtifactTypeId>> = vec![Vec::new(); self.layers.len()];
        for (ty, prods) in &self.producers {
            let last = prods
                .iter()
                .filter_map(|p| self.layer_of(p))
                .max();
            if let Some(idx) = last {
                schedule[idx].push(ty.clone());
            }
        }
        for tys in &mut schedule {
            tys.sort();
        }
        schedule
    }
}

/// DFS cycle detection returning the full cycle path (`a → b → a`)
fn detect_cycle(
    active: &[&StepSpec],
    successors: &HashMap<StepId, BTreeSet<StepId>>,
) -> Option<String> {
    fn visit<'a>(
        node: &'a StepId,
        successors: &'a HashMap<StepId, BTreeSet<StepId>>,
        visited: &mut HashSet<&'a StepId>,
        rec_stack: &mut HashSet<&'a StepId>,
        path: &mut Vec<&'a StepId>,
    ) -> Option<String> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        if let Some(succ) = successors.get(node) {
            for next in succ {
                if !visited.contains(next) {
                    if let Some(cycle) = visit(next, successors, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(next) {
                    let start = path.iter().position(|n| *n == next).unwrap();
                    let names: Vec<&str> = path[start..].iter().map(|n| n.as_str()).collect();
                    return Some(format!("{} → {}", names.join(" → "), next));
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }

    let mut visited: HashSet<&StepId> = HashSet::new();
    let mut rec_stack: HashSet<&StepId> = HashSet::new();
    let mut path: Vec<&StepId> = Vec::new();
    for spec in active {
        if !visited.contains(&spec.id) {
            if let Some(cycle) = visit(&spec.id, successors, &mut visited, &mut rec_stack, &mut path)
            {
                return Some(cycle);
            }
        }
    }
    None
}
