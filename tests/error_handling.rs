mod common;

use std::collections::BTreeMap;

use indexmap::{IndexMap, IndexSet};

use condsched::dag::{GraphSource, PrunedGraph, Scheduler};
use condsched::engine::{ExecutionContextId, RunOptions};
use condsched::errors::Result as SchedResult;
use condsched::{Condition, SchedError, TimeScale};

use common::builders::{chain, graph, s};
use common::init_tracing;

/// Graph source whose "pruned" output still contains a cycle.
struct BrokenSource;

impl GraphSource<String> for BrokenSource {
    fn prune_feedback_edges(&self) -> SchedResult<PrunedGraph<String>> {
        let mut structural_dependencies = IndexMap::new();
        structural_dependencies.insert(s("A"), IndexSet::from([s("B")]));
        structural_dependencies.insert(s("B"), IndexSet::from([s("A")]));
        Ok(PrunedGraph {
            nodes: vec![s("A"), s("B")],
            structural_dependencies,
            removed_dependencies: IndexMap::new(),
        })
    }
}

#[test]
fn residual_cycle_is_a_graph_error() {
    init_tracing();
    let err = Scheduler::<String>::new(&BrokenSource).unwrap_err();
    assert!(matches!(err, SchedError::GraphError(_)), "got {err:?}");
}

#[test]
fn queue_naming_unknown_node_is_a_graph_error() {
    init_tracing();
    let err = Scheduler::with_consideration_queue(&chain(&["A"]), [vec![s("Z")]]).unwrap_err();
    assert!(matches!(err, SchedError::GraphError(_)));
}

#[test]
fn malformed_queue_fails_at_run() {
    init_tracing();
    let g = graph(&[("A", &[]), ("B", &[])]);

    let mut missing = Scheduler::with_consideration_queue(&g, [vec![s("A")]]).unwrap();
    let err = missing.run("default", RunOptions::default()).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));

    let mut duplicated =
        Scheduler::with_consideration_queue(&g, [vec![s("A"), s("B")], vec![s("B")]]).unwrap();
    let err = duplicated.run("default", RunOptions::default()).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));

    let mut empty_set =
        Scheduler::with_consideration_queue(&g, [vec![s("A"), s("B")], vec![]]).unwrap();
    let err = empty_set.run("default", RunOptions::default()).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));
}

#[test]
fn subtractive_condition_for_unknown_owner_is_rejected() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();
    let err = scheduler.add_condition(s("Z"), Condition::Always).unwrap_err();
    assert!(matches!(err, SchedError::ConditionSetError(_)));
    assert!(scheduler.rule_based_nodes().is_empty());
}

#[test]
fn condition_referencing_unknown_node_is_rejected() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();
    let err = scheduler
        .add_condition(s("A"), Condition::every_n_calls(s("ghost"), 1))
        .unwrap_err();
    assert!(matches!(err, SchedError::ConditionSetError(_)));
}

#[test]
fn mixed_condition_set_is_rejected_atomically() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"])).unwrap();
    let err = scheduler
        .add_condition_set([(s("A"), Condition::Always), (s("M"), Condition::AfterEveryPass)])
        .unwrap_err();

    assert!(matches!(err, SchedError::ConditionSetError(_)));
    assert!(!scheduler.contains(&s("A")));
    assert!(scheduler.rule_based_nodes().is_empty());
}

#[test]
fn mixed_composite_is_rejected() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();
    let err = scheduler
        .add_condition(s("A"), Condition::all([Condition::Always, Condition::AfterEveryPass]))
        .unwrap_err();
    assert!(matches!(err, SchedError::ConditionSetError(_)));
}

#[test]
fn termination_for_fine_scale_is_rejected() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();
    let options = RunOptions::default().with_termination(TimeScale::Pass, Condition::Always);
    let err = scheduler.run("default", options).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));
}

#[test]
fn owner_relative_or_additive_termination_is_rejected() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();

    let options = RunOptions::default()
        .with_termination(TimeScale::Trial, Condition::every_n_calls(s("A"), 1));
    let err = scheduler.run("default", options).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));

    let err = scheduler
        .set_termination_conditions(Some(BTreeMap::from([(
            TimeScale::Run,
            Condition::AfterEveryTrial,
        )])))
        .unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));

    // A rejected setter call leaves the defaults in place.
    let termination = scheduler.termination_conditions().unwrap();
    assert_eq!(termination.run, Condition::Never);
}

#[test]
fn unknown_contexts_are_scheduler_errors() {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"])).unwrap();
    let ghost = ExecutionContextId::from("ghost");

    assert!(matches!(scheduler.get_clock(&ghost), Err(SchedError::SchedulerError(_))));
    assert!(matches!(scheduler.execution_trace(&ghost), Err(SchedError::SchedulerError(_))));
    assert!(matches!(scheduler.end_run(&ghost), Err(SchedError::SchedulerError(_))));
    assert!(matches!(
        scheduler.fork_context(&ghost, "copy"),
        Err(SchedError::SchedulerError(_))
    ));

    let options = RunOptions::default().with_base_context("ghost");
    let err = scheduler.run("new", options).unwrap_err();
    assert!(matches!(err, SchedError::SchedulerError(_)));
}
