//! Integration tests for planning: building pipelines through the public
//! builder API and checking the resulting layers, pruning and diagnostics.

use std::collections::HashSet;

use stratum::{
    ExecutionPlan, FnStep, Pipeline, StepId, StepSpec, StepSpecBuilder, StratumError,
};

fn noop(spec: StepSpec) -> FnStep {
    FnStep::sync(spec, |_| Ok(()))
}

fn sid(s: &str) -> StepId {
    StepId::new(s).unwrap()
}

fn ids(layer: &[StepId]) -> Vec<&str> {
    layer.iter().map(|s| s.as_str()).collect()
}

/// A small JVM-flavored build: scan feeds codegen and linting, codegen
/// fans into assembly, and a native step hangs off a flag.
fn sample_pipeline(flags: &[&str]) -> Pipeline {
    let mut builder = Pipeline::builder()
        .step(noop(
            StepSpecBuilder::new("scan").unwrap().produces("class-index").unwrap().build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("gen-proxies")
                .unwrap()
                .consumes("class-index")
                .unwrap()
                .produces_multi("bytecode")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("gen-config")
                .unwrap()
                .consumes("class-index")
                .unwrap()
                .produces_multi("bytecode")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("assemble")
                .unwrap()
                .consumes("bytecode")
                .unwrap()
                .produces("app-image")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("native-compile")
                .unwrap()
                .consumes("app-image")
                .unwrap()
                .produces("native-binary")
                .unwrap()
                .only_if("native")
                .build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("lint")
                .unwrap()
                .consumes("class-index")
                .unwrap()
                .always_run()
                .build(),
        ))
        .unwrap()
        .final_artifact("app-image")
        .unwrap();

    for flag in flags {
        builder = builder.flag(*flag);
    }
    builder.build().unwrap()
}

#[test]
fn sample_pipeline_layers() {
    let plan = sample_pipeline(&[]).plan().unwrap();

    assert_eq!(plan.layers().len(), 3);
    assert_eq!(ids(&plan.layers()[0]), ["scan"]);
    assert_eq!(ids(&plan.layers()[1]), ["gen-config", "gen-proxies", "lint"]);
    assert_eq!(ids(&plan.layers()[2]), ["assemble"]);

    // native-compile is flag-gated off, lint survives via always_run
    assert_eq!(ids(plan.inactive()), ["native-compile"]);
    assert!(plan.pruned().is_empty());
}

#[test]
fn native_flag_extends_the_graph() {
    let pipeline = sample_pipeline(&["native"]);
    let plan = pipeline.plan().unwrap();

    assert!(plan.inactive().is_empty());
    // native-binary is not in the final set, so the native step is pruned
    assert_eq!(ids(plan.pruned()), ["native-compile"]);
}

#[test]
fn requesting_the_native_binary_schedules_the_whole_chain() {
    let specs: Vec<StepSpec> = sample_pipeline(&["native"]).specs();
    let mut flags = HashSet::new();
    flags.insert("native".to_string());
    let finals = vec![stratum::ArtifactTypeId::new("native-binary").unwrap()];

    let plan = ExecutionPlan::build(&specs, &finals, &flags).unwrap();
    assert_eq!(plan.layer_of(&sid("native-compile")), Some(3));
    assert!(plan.pruned().is_empty());
}

#[test]
fn failure_report_names_transitive_dependents() {
    let plan = sample_pipeline(&["native"]).plan().unwrap();
    let deps = plan.dependents_of(&sid("scan"));
    // native-compile was pruned, so it is not a scheduled dependent
    assert_eq!(ids(&deps), ["assemble", "gen-config", "gen-proxies", "lint"]);
}

#[test]
fn cycle_error_is_fatal_and_names_the_path() {
    let result = Pipeline::builder()
        .step(noop(
            StepSpecBuilder::new("a")
                .unwrap()
                .consumes("z")
                .unwrap()
                .produces("x")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .step(noop(
            StepSpecBuilder::new("b")
                .unwrap()
                .consumes("x")
                .unwrap()
                .produces("z")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .final_artifact("z")
        .unwrap()
        .build()
        .unwrap()
        .plan();

    match result {
        Err(StratumError::CycleDetected { cycle_path }) => {
            assert!(cycle_path.contains(" → "), "path: {}", cycle_path);
        }
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

#[test]
fn diagnostics_carry_fix_suggestions() {
    use stratum::FixSuggestion;

    let err = Pipeline::builder()
        .step(noop(
            StepSpecBuilder::new("a")
                .unwrap()
                .consumes("ghost")
                .unwrap()
                .produces("x")
                .unwrap()
                .build(),
        ))
        .unwrap()
        .final_artifact("x")
        .unwrap()
        .build()
        .unwrap()
        .plan()
        .unwrap_err();

    assert!(err.to_string().contains("STRAT-020"));
    assert!(err.fix_suggestion().is_some());
}
