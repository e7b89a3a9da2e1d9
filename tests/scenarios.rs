mod common;

use std::collections::BTreeMap;

use condsched::dag::{self, Scheduler};
use condsched::engine::{ExecutionContextId, RunOptions};
use condsched::{Condition, TimeScale};

use common::builders::{chain, graph, s};
use common::{collect_steps, init_tracing, steps, TestResult};

#[test]
fn linear_chain_with_defaults_runs_each_node_once() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B", "C"]))?;

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["A"], &["B"], &["C"]]));
    Ok(())
}

#[test]
fn threshold_crossed_mid_set_shares_time_step() -> TestResult {
    init_tracing();
    let g = graph(&[("A", &[]), ("B", &[]), ("C", &["A", "B"])]);
    let mut scheduler = Scheduler::new(&g)?;
    scheduler.add_condition(s("B"), Condition::every_n_calls(s("A"), 2))?;
    scheduler.add_condition(s("C"), Condition::every_n_calls(s("B"), 1))?;

    let options = RunOptions::default()
        .with_termination(TimeScale::Trial, Condition::after_n_calls(s("C"), 1, TimeScale::Trial));
    let run = scheduler.run("default", options)?;

    assert_eq!(collect_steps(run), steps(&[&["A"], &["A", "B"], &["C"]]));
    Ok(())
}

#[test]
fn never_node_stalls_one_empty_time_step_per_pass() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition(s("A"), Condition::Never)?;

    let options = RunOptions::default().with_termination(TimeScale::Run, Condition::after_n_passes(3));
    let run = scheduler.run("default", options)?;

    let trace = collect_steps(run);
    assert_eq!(trace.len(), 3);
    assert!(trace.iter().all(Vec::is_empty));

    let clock = scheduler.get_clock(&ExecutionContextId::default())?;
    assert_eq!(clock.time().trial, 1);
    Ok(())
}

#[test]
fn pass_threshold_at_u64_max_is_never_reached() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition(s("A"), Condition::after_n_passes(u64::MAX))?;

    let options = RunOptions::default().with_termination(TimeScale::Trial, Condition::after_n_passes(3));
    let run = scheduler.run("default", options)?;

    assert_eq!(collect_steps(run), steps(&[&[], &[], &[]]));
    Ok(())
}

#[test]
fn diamond_defaults_wait_for_every_parent() -> TestResult {
    init_tracing();
    let g = graph(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B", "C"])]);
    let mut scheduler = Scheduler::new(&g)?;

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["A"], &["B", "C"], &["D"]]));

    let conditions = scheduler.conditions_of(&s("D"))?;
    assert_eq!(
        conditions.values().next(),
        Some(&Condition::all([
            Condition::every_n_calls(s("B"), 1),
            Condition::every_n_calls(s("C"), 1),
        ]))
    );
    Ok(())
}

#[test]
fn feedback_edge_is_pruned_and_reported() -> TestResult {
    init_tracing();
    // A -> B -> C -> A
    let g = graph(&[("A", &["C"]), ("B", &["A"]), ("C", &["B"])]);
    let built = dag::build(&g)?;

    assert!(built.removed_dependencies[&s("A")].contains(&s("C")));
    assert!(built.structural_dependencies[&s("A")].is_empty());
    assert_eq!(built.consideration_queue.len(), 3);

    let mut scheduler = Scheduler::new(&g)?;
    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["A"], &["B"], &["C"]]));
    assert_eq!(scheduler.removed_dependencies(), built.removed_dependencies);
    Ok(())
}

#[test]
fn every_n_passes_alternates_with_empty_steps() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition(s("A"), Condition::every_n_passes(2))?;

    let options = RunOptions::default().with_termination(TimeScale::Trial, Condition::after_n_passes(5));
    let run = scheduler.run("default", options)?;

    assert_eq!(collect_steps(run), steps(&[&["A"], &[], &["A"], &[], &["A"]]));
    Ok(())
}

#[test]
fn run_termination_stops_later_trials() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"]))?;
    scheduler.set_termination_conditions(Some(BTreeMap::from([(
        TimeScale::Run,
        Condition::after_n_trials(2),
    )])))?;
    let ctx = ExecutionContextId::from("runs");

    for _ in 0..2 {
        let run = scheduler.run(ctx.clone(), RunOptions::default())?;
        assert_eq!(collect_steps(run), steps(&[&["A"], &["B"]]));
    }
    assert!(scheduler.last_run_end(&ctx)?.is_some());

    let run = scheduler.run(ctx.clone(), RunOptions::default())?;
    assert!(collect_steps(run).is_empty());

    scheduler.end_run(&ctx)?;
    let clock = scheduler.get_clock(&ctx)?;
    assert_eq!(clock.runs(), 1);
    assert_eq!(clock.time().trial, 0);

    let run = scheduler.run(ctx.clone(), RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["A"], &["B"]]));
    Ok(())
}

#[test]
fn caller_supplied_queue_is_followed() -> TestResult {
    init_tracing();
    let g = graph(&[("A", &[]), ("B", &[])]);
    let mut scheduler = Scheduler::with_consideration_queue(&g, [vec![s("B")], vec![s("A")]])?;

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["B"], &["A"]]));
    Ok(())
}

#[test]
fn at_pass_and_combined_calls() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"]))?;
    scheduler.add_condition(s("B"), Condition::at_pass(1))?;

    let options = RunOptions::default().with_termination(
        TimeScale::Trial,
        Condition::after_n_calls_combined([s("A"), s("B")], 3, TimeScale::Trial),
    );
    let run = scheduler.run("default", options)?;

    assert_eq!(collect_steps(run), steps(&[&["A"], &["A"], &["B"]]));
    Ok(())
}
