mod common;

use condsched::dag::Scheduler;
use condsched::engine::RunOptions;
use condsched::{Condition, ConditionType, TimeScale};

use common::builders::{chain, s};
use common::{collect_steps, init_tracing, steps, TestResult};

#[test]
fn after_every_pass_rule_holds_trial_open_until_it_runs() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"]))?;
    scheduler.add_condition(s("M"), Condition::AfterEveryPass)?;

    assert_eq!(scheduler.rule_based_nodes().into_iter().collect::<Vec<_>>(), vec![s("M")]);
    assert_eq!(scheduler.consideration_queue().len(), 3);
    assert_eq!(scheduler.base_consideration_queue().len(), 2);

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["A"], &["B"], &["M"]]));
    Ok(())
}

#[test]
fn before_every_pass_runs_once_at_the_front_of_each_pass() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"]))?;
    scheduler.add_condition(s("P"), Condition::BeforeEveryPass)?;

    let options = RunOptions::default().with_termination(TimeScale::Trial, Condition::after_n_passes(2));
    let run = scheduler.run("default", options)?;

    assert_eq!(
        collect_steps(run),
        steps(&[&["P"], &["A"], &["B"], &["P"], &["A"], &["B"]])
    );
    Ok(())
}

#[test]
fn before_every_time_step_precedes_each_base_set() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B", "C"]))?;
    scheduler.add_condition(s("L"), Condition::BeforeEveryTimeStep)?;

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(
        collect_steps(run),
        steps(&[&["L"], &["A", "L"], &["B", "L"], &["C"]])
    );
    Ok(())
}

#[test]
fn after_every_trial_runs_in_the_closing_pass_only() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition(s("T"), Condition::AfterEveryTrial)?;

    let options = RunOptions::default().with_termination(TimeScale::Trial, Condition::after_n_passes(2));
    let run = scheduler.run("default", options)?;

    assert_eq!(collect_steps(run), steps(&[&["A"], &["A"], &["T"]]));
    Ok(())
}

#[test]
fn after_every_run_fires_on_the_last_declared_trial() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition(s("R"), Condition::AfterEveryRun)?;
    scheduler.set_num_trials(Some(2));

    let first = collect_steps(scheduler.run("default", RunOptions::default())?);
    assert_eq!(first, steps(&[&["A"]]));

    let second = collect_steps(scheduler.run("default", RunOptions::default())?);
    assert_eq!(second, steps(&[&["A"], &["R"]]));
    Ok(())
}

#[test]
fn structural_node_keeps_both_condition_types() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A", "B"]))?;
    scheduler.add_condition(s("B"), Condition::Always)?;
    scheduler.add_condition(s("B"), Condition::BeforeEveryTrial)?;

    let conditions = scheduler.conditions_of(&s("B"))?;
    assert_eq!(conditions.get(&ConditionType::Subtractive), Some(&Condition::Always));
    assert_eq!(conditions.get(&ConditionType::Additive), Some(&Condition::BeforeEveryTrial));
    assert!(scheduler.rule_based_nodes().is_empty());

    // B runs once per trial, at the leading slot.
    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["B"], &["A"]]));
    Ok(())
}

#[test]
fn additive_batch_registers_every_rule_node() -> TestResult {
    init_tracing();
    let mut scheduler = Scheduler::new(&chain(&["A"]))?;
    scheduler.add_condition_set([
        (s("pre"), Condition::BeforeEveryTrial),
        (s("post"), Condition::AfterEveryPass),
    ])?;

    let rules: Vec<String> = scheduler.rule_based_nodes().into_iter().collect();
    assert_eq!(rules, vec![s("pre"), s("post")]);

    let run = scheduler.run("default", RunOptions::default())?;
    assert_eq!(collect_steps(run), steps(&[&["pre"], &["A"], &["post"]]));
    Ok(())
}
