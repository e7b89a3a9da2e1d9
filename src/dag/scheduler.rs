// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::condition::additive::get_additive_modifications;
use crate::condition::{Condition, ConditionSet};
use crate::config::model::ScheduleFile;
use crate::dag::graph::{DependencyGraph, GraphSource};
use crate::dag::queue::{ConsiderationQueue, InsertionPoint};
use crate::dag::registry::{Node, NodeId, NodeRegistry};
use crate::dag::summary::{ConditionsSummary, ScheduleSummary};
use crate::engine::context::ContextState;
use crate::engine::core::RunPlan;
use crate::engine::termination::{adjusted_for_additive, trial_bound, TerminationConditions};
use crate::engine::{ExecutionContextId, Run, RunOptions, RunPhase};
use crate::errors::{Result, SchedError};
use crate::types::{ConditionType, TimeScale};

/// Condition-driven scheduler over a fixed dependency graph.
///
/// It holds:
/// - the structural view of the graph (pruned dependencies and the base
///   consideration queue)
/// - the per-node condition set and the runtime queue derived from it
/// - scheduler-wide termination conditions
/// - one [`ContextState`] per execution context
///
/// Graph and conditions are shared by every context; counters, clock and
/// trace are not.
#[derive(Debug)]
pub struct Scheduler<N> {
    registry: NodeRegistry<N>,
    structural_nodes: Vec<NodeId>,
    structural_dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
    removed_dependencies: BTreeMap<NodeId, BTreeSet<NodeId>>,
    base_queue: ConsiderationQueue,
    /// Base queue plus additive insertions; rebuilt whenever an additive
    /// condition changes.
    runtime_queue: ConsiderationQueue,
    conditions: ConditionSet,
    termination: TerminationConditions<NodeId>,
    num_trials: Option<u64>,
    contexts: HashMap<ExecutionContextId, ContextState>,
    created_at: DateTime<Utc>,
}

impl<N: Node> Scheduler<N> {
    /// Build a scheduler whose base queue is the layered topological order
    /// of `source` after feedback edges are pruned.
    pub fn new(source: &impl GraphSource<N>) -> Result<Self> {
        let mut scheduler = Self::structural_only(source)?;
        scheduler.base_queue = ConsiderationQueue::from_dependencies(&scheduler.structural_dependencies)?;
        scheduler.runtime_queue = scheduler.base_queue.clone();

        info!(
            nodes = scheduler.structural_nodes.len(),
            consideration_sets = scheduler.base_queue.len(),
            feedback_edges = scheduler.removed_dependencies.values().map(BTreeSet::len).sum::<usize>(),
            "scheduler constructed"
        );
        Ok(scheduler)
    }

    /// Build a scheduler around a caller-supplied base queue instead of the
    /// computed one. The queue is checked to partition the structural nodes
    /// when a run starts.
    pub fn with_consideration_queue(
        source: &impl GraphSource<N>,
        queue: impl IntoIterator<Item = impl IntoIterator<Item = N>>,
    ) -> Result<Self> {
        let mut scheduler = Self::structural_only(source)?;
        let mut sets = Vec::new();
        for set in queue {
            let ids = set
                .into_iter()
                .map(|node| {
                    scheduler.registry.id_of(&node).ok_or_else(|| {
                        SchedError::GraphError(format!(
                            "consideration queue names {node:?}, which is not in the graph"
                        ))
                    })
                })
                .collect::<Result<BTreeSet<_>>>()?;
            sets.push(ids);
        }
        scheduler.base_queue = ConsiderationQueue::from_sets(sets);
        scheduler.runtime_queue = scheduler.base_queue.clone();
        Ok(scheduler)
    }

    fn structural_only(source: &impl GraphSource<N>) -> Result<Self> {
        let pruned = source.prune_feedback_edges()?;

        let mut registry = NodeRegistry::new();
        let structural_nodes: Vec<NodeId> = pruned
            .nodes
            .iter()
            .map(|n| registry.register(n.clone()))
            .collect();

        let mut to_ids = |deps: &IndexMap<N, IndexSet<N>>| -> BTreeMap<NodeId, BTreeSet<NodeId>> {
            deps.iter()
                .map(|(child, parents)| {
                    let child = registry.register(child.clone());
                    let parents = parents.iter().map(|p| registry.register(p.clone())).collect();
                    (child, parents)
                })
                .collect()
        };
        let mut structural_dependencies = to_ids(&pruned.structural_dependencies);
        let removed_dependencies = to_ids(&pruned.removed_dependencies);
        for id in &structural_nodes {
            structural_dependencies.entry(*id).or_default();
        }

        Ok(Self {
            structural_nodes,
            structural_dependencies,
            removed_dependencies,
            base_queue: ConsiderationQueue::default(),
            runtime_queue: ConsiderationQueue::default(),
            conditions: ConditionSet::new(),
            termination: TerminationConditions::default(),
            num_trials: None,
            contexts: HashMap::new(),
            created_at: Utc::now(),
            registry,
        })
    }

    // ----- conditions -------------------------------------------------------

    /// Assign `condition` to `node`, replacing any earlier condition of the
    /// same type.
    ///
    /// Additive conditions may name a node outside the graph; it becomes a
    /// rule-based node. Every other node reference must already be known.
    pub fn add_condition(&mut self, node: N, condition: Condition<N>) -> Result<()> {
        let ty = condition.condition_type()?;
        let resolved = self.resolve_condition(&node, &condition)?;
        let owner = self.resolve_owner(node, ty)?;

        debug!(owner = %owner, condition = %resolved, %ty, "adding condition");
        self.conditions.add_condition(owner, resolved)?;
        if ty == ConditionType::Additive {
            self.refresh_runtime_queue()?;
        }
        Ok(())
    }

    /// Assign a batch of conditions that all share one type.
    ///
    /// A batch mixing additive and subtractive conditions is a
    /// `ConditionSetError`, and nothing from it is applied.
    pub fn add_condition_set(
        &mut self,
        conditions: impl IntoIterator<Item = (N, Condition<N>)>,
    ) -> Result<()> {
        let batch: Vec<(N, Condition<N>)> = conditions.into_iter().collect();

        let mut batch_type: Option<ConditionType> = None;
        let mut resolved = Vec::with_capacity(batch.len());
        for (node, condition) in &batch {
            let ty = condition.condition_type()?;
            if batch_type.is_some_and(|prev| prev != ty) {
                return Err(SchedError::ConditionSetError(format!(
                    "condition set mixes additive and subtractive conditions (at {node:?})"
                )));
            }
            batch_type = Some(ty);
            if ty == ConditionType::Subtractive && self.registry.id_of(node).is_none() {
                return Err(unknown_owner(node));
            }
            resolved.push(self.resolve_condition(node, condition)?);
        }

        let mut owned = Vec::with_capacity(batch.len());
        for ((node, _), condition) in batch.into_iter().zip(resolved) {
            let owner = self.registry.register(node);
            owned.push((owner, condition));
        }
        self.conditions.add_condition_set(owned)?;

        if batch_type == Some(ConditionType::Additive) {
            self.refresh_runtime_queue()?;
        }
        Ok(())
    }

    fn resolve_owner(&mut self, node: N, ty: ConditionType) -> Result<NodeId> {
        match (self.registry.id_of(&node), ty) {
            (Some(id), _) => Ok(id),
            (None, ConditionType::Additive) => {
                let id = self.registry.register(node);
                debug!(node = %id, "registered rule-based node");
                Ok(id)
            }
            (None, ConditionType::Subtractive) => Err(unknown_owner(&node)),
        }
    }

    fn resolve_condition(&self, owner: &N, condition: &Condition<N>) -> Result<Condition<NodeId>> {
        condition.try_map_nodes(&mut |dep: &N| {
            self.registry.id_of(dep).ok_or_else(|| {
                SchedError::ConditionSetError(format!(
                    "condition {} for {owner:?} references unknown node {dep:?}",
                    condition.name()
                ))
            })
        })
    }

    fn resolve_termination(
        &self,
        overrides: &BTreeMap<TimeScale, Condition<N>>,
    ) -> Result<BTreeMap<TimeScale, Condition<NodeId>>> {
        overrides
            .iter()
            .map(|(scale, condition)| {
                let resolved = condition.try_map_nodes(&mut |dep: &N| {
                    self.registry.id_of(dep).ok_or_else(|| {
                        SchedError::SchedulerError(format!(
                            "{scale} termination condition references unknown node {dep:?}"
                        ))
                    })
                })?;
                Ok((*scale, resolved))
            })
            .collect()
    }

    fn to_public(&self, condition: &Condition<NodeId>) -> Result<Condition<N>> {
        condition.try_map_nodes(&mut |id: &NodeId| {
            self.registry
                .node(*id)
                .cloned()
                .ok_or_else(|| SchedError::SchedulerError(format!("unknown node id {id}")))
        })
    }

    fn refresh_runtime_queue(&mut self) -> Result<()> {
        let mut insertions: BTreeMap<InsertionPoint, BTreeSet<NodeId>> = BTreeMap::new();
        for (owner, condition) in self.conditions.additive() {
            // Placement does not depend on the trial bound.
            let modification =
                get_additive_modifications(&self.base_queue, *owner, condition, &Condition::Never)?;
            for point in modification.insertion_points {
                insertions.entry(point).or_default().insert(*owner);
            }
        }
        self.runtime_queue = self.base_queue.with_insertions(&insertions);
        debug!(
            consideration_sets = self.runtime_queue.len(),
            "runtime consideration queue rebuilt"
        );
        Ok(())
    }

    /// Condition a structural node gets when none was assigned: `Always`
    /// without parents, otherwise one `EveryNCalls(parent, 1)` per parent.
    fn default_condition(&self, node: NodeId) -> Condition<NodeId> {
        let parents: Vec<NodeId> = self
            .structural_dependencies
            .get(&node)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        match parents.as_slice() {
            [] => Condition::Always,
            [parent] => Condition::every_n_calls(*parent, 1),
            _ => Condition::all(parents.iter().map(|p| Condition::every_n_calls(*p, 1))),
        }
    }

    /// Persist default conditions for structural nodes that have none.
    fn assign_default_conditions(&mut self) -> Result<()> {
        let missing: Vec<NodeId> = self
            .structural_nodes
            .iter()
            .copied()
            .filter(|id| !self.conditions.contains(*id))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut assigned = Vec::with_capacity(missing.len());
        for id in missing {
            let condition = self.default_condition(id);
            assigned.push(format!("{:?}: {}", self.node_of(id)?, self.to_public(&condition)?));
            self.conditions.add_condition(id, condition)?;
        }
        info!(
            defaults = %assigned.join("; "),
            "nodes without conditions will be scheduled with defaults"
        );
        Ok(())
    }

    fn node_of(&self, id: NodeId) -> Result<&N> {
        self.registry
            .node(id)
            .ok_or_else(|| SchedError::SchedulerError(format!("unknown node id {id}")))
    }

    /// Effective condition per node for a run ending under `bound`.
    fn runtime_conditions(&self, bound: &Condition<NodeId>) -> Result<Vec<Option<Condition<NodeId>>>> {
        let structural: BTreeSet<NodeId> = self.structural_nodes.iter().copied().collect();
        let mut out = vec![None; self.registry.len()];

        for (id, _) in self.registry.iter() {
            let subtractive = match self.conditions.subtractive_of(id) {
                Some(c) => Some(c.clone()),
                None if !self.conditions.contains(id) && structural.contains(&id) => {
                    Some(self.default_condition(id))
                }
                None => None,
            };
            let synthesized = self
                .conditions
                .additive_of(id)
                .map(|c| get_additive_modifications(&self.base_queue, id, c, bound).map(|m| m.condition))
                .transpose()?;

            out[id.index()] = match (subtractive, synthesized) {
                (Some(s), Some(a)) => Some(Condition::all([s, a])),
                (s, a) => s.or(a),
            };
        }
        Ok(out)
    }

    fn build_plan(
        &self,
        termination: &TerminationConditions<NodeId>,
        skip_trial_time_increment: bool,
    ) -> Result<RunPlan> {
        let additive = self.conditions.additive();
        let bound = trial_bound(termination, additive, &self.runtime_queue);
        let conditions = self.runtime_conditions(&bound)?;

        for node in self.runtime_queue.nodes() {
            if conditions.get(node.index()).is_none_or(Option::is_none) {
                return Err(SchedError::SchedulerError(format!(
                    "node {:?} in the consideration queue has no condition",
                    self.node_of(node)?
                )));
            }
        }

        Ok(RunPlan {
            queue: self.runtime_queue.clone(),
            conditions,
            termination: adjusted_for_additive(termination, additive, &self.runtime_queue),
            structural_nodes: self.structural_nodes.clone(),
            num_trials: self.num_trials,
            skip_trial_time_increment,
        })
    }

    // ----- termination ------------------------------------------------------

    /// Merge `overrides` into the scheduler-wide termination conditions.
    /// `None` restores the defaults.
    pub fn set_termination_conditions(
        &mut self,
        overrides: Option<BTreeMap<TimeScale, Condition<N>>>,
    ) -> Result<()> {
        let updated = match overrides {
            None => TerminationConditions::default(),
            Some(map) => self.termination.merged(&self.resolve_termination(&map)?)?,
        };
        updated.validate()?;
        self.termination = updated;
        Ok(())
    }

    /// Scheduler-wide termination conditions, as set by the caller.
    pub fn termination_conditions(&self) -> Result<TerminationConditions<N>> {
        Ok(TerminationConditions {
            trial: self.to_public(&self.termination.trial)?,
            run: self.to_public(&self.termination.run)?,
        })
    }

    /// Declare how many trials the caller intends to run. Consulted by
    /// `AtLastTrialOfRun` and the after-every-run rule.
    pub fn set_num_trials(&mut self, num_trials: Option<u64>) {
        self.num_trials = num_trials;
    }

    pub fn num_trials(&self) -> Option<u64> {
        self.num_trials
    }

    // ----- running ----------------------------------------------------------

    /// Start (or resume) a trial in `context`.
    ///
    /// Validates the base queue, fills in default conditions, creates the
    /// context on first use (forking from `options.base_context` if given)
    /// and returns an iterator over the trial's time steps.
    pub fn run(
        &mut self,
        context: impl Into<ExecutionContextId>,
        options: RunOptions<N>,
    ) -> Result<Run<'_, N>> {
        let context = context.into();

        let structural: BTreeSet<NodeId> = self.structural_nodes.iter().copied().collect();
        self.base_queue.validate_partition(&structural)?;
        self.assign_default_conditions()?;

        let termination = match &options.termination {
            Some(overrides) => {
                let merged = self.termination.merged(&self.resolve_termination(overrides)?)?;
                merged.validate()?;
                merged
            }
            None => self.termination.clone(),
        };
        let plan = self.build_plan(&termination, options.skip_trial_time_increment)?;

        if self.contexts.contains_key(&context) {
            if let Some(base) = &options.base_context {
                warn!(%context, %base, "context already exists; ignoring base context");
            }
        } else {
            let state = match &options.base_context {
                Some(base) => self.contexts.get(base).map(ContextState::fork).ok_or_else(|| {
                    SchedError::SchedulerError(format!("unknown base execution context '{base}'"))
                })?,
                None => ContextState::new(self.registry.len()),
            };
            debug!(%context, "created execution context");
            self.contexts.insert(context.clone(), state);
        }

        let node_count = self.registry.len();
        let state = self
            .contexts
            .get_mut(&context)
            .ok_or_else(|| unknown_context(&context))?;
        state.ensure_nodes(node_count);

        debug!(%context, phase = ?state.phase, "run started");
        Ok(Run::new(plan, state, &self.registry, context))
    }

    /// Derive `new` from the current state of `base`.
    pub fn fork_context(
        &mut self,
        base: &ExecutionContextId,
        new: impl Into<ExecutionContextId>,
    ) -> Result<()> {
        let new = new.into();
        let forked = self
            .contexts
            .get(base)
            .map(ContextState::fork)
            .ok_or_else(|| unknown_context(base))?;
        debug!(%base, %new, "forked execution context");
        self.contexts.insert(new, forked);
        Ok(())
    }

    /// Close the current run of `context`: the RUN clock advances,
    /// RUN-scoped counters reset and the next run call starts a new trial.
    pub fn end_run(&mut self, context: &ExecutionContextId) -> Result<()> {
        let state = self
            .contexts
            .get_mut(context)
            .ok_or_else(|| unknown_context(context))?;
        state.clock.increment(TimeScale::Run);
        state.counts.reset_total(TimeScale::Run);
        state.phase = RunPhase::NotStarted;
        debug!(%context, runs = state.clock.runs(), "run ended");
        Ok(())
    }

    // ----- per-context views ------------------------------------------------

    fn context(&self, context: &ExecutionContextId) -> Result<&ContextState> {
        self.contexts.get(context).ok_or_else(|| unknown_context(context))
    }

    pub fn get_clock(&self, context: &ExecutionContextId) -> Result<&Clock> {
        Ok(&self.context(context)?.clock)
    }

    /// Every time step emitted in `context`, oldest first.
    pub fn execution_trace(&self, context: &ExecutionContextId) -> Result<Vec<IndexSet<N>>> {
        Ok(self
            .context(context)?
            .trace
            .iter()
            .map(|set| self.registry.resolve_all(set))
            .collect())
    }

    /// When `context` last finished a trial with its RUN condition met.
    pub fn last_run_end(&self, context: &ExecutionContextId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.context(context)?.last_run_end)
    }

    pub fn context_phase(&self, context: &ExecutionContextId) -> Result<RunPhase> {
        Ok(self.context(context)?.phase)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &ExecutionContextId> {
        self.contexts.keys()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // ----- structural views -------------------------------------------------

    /// Every node in the runtime queue, first appearance order.
    pub fn nodes(&self) -> IndexSet<N> {
        let ids: Vec<NodeId> = self.runtime_queue.nodes().collect();
        self.registry.resolve_all(&ids)
    }

    pub fn structural_nodes(&self) -> IndexSet<N> {
        self.registry.resolve_all(&self.structural_nodes)
    }

    /// Nodes that only take part through additive conditions.
    pub fn rule_based_nodes(&self) -> IndexSet<N> {
        let structural: BTreeSet<NodeId> = self.structural_nodes.iter().copied().collect();
        let ids: Vec<NodeId> = self
            .registry
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !structural.contains(id))
            .collect();
        self.registry.resolve_all(&ids)
    }

    pub fn base_consideration_queue(&self) -> Vec<IndexSet<N>> {
        self.resolve_queue(&self.base_queue)
    }

    /// Base queue with additive insertions applied.
    pub fn consideration_queue(&self) -> Vec<IndexSet<N>> {
        self.resolve_queue(&self.runtime_queue)
    }

    fn resolve_queue(&self, queue: &ConsiderationQueue) -> Vec<IndexSet<N>> {
        queue
            .sets()
            .iter()
            .map(|set| self.registry.resolve_all(set))
            .collect()
    }

    pub fn structural_dependencies(&self) -> IndexMap<N, IndexSet<N>> {
        self.resolve_dependencies(&self.structural_dependencies)
    }

    /// Feedback edges pruned from the graph, keyed by child.
    pub fn removed_dependencies(&self) -> IndexMap<N, IndexSet<N>> {
        self.resolve_dependencies(&self.removed_dependencies)
    }

    fn resolve_dependencies(&self, deps: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> IndexMap<N, IndexSet<N>> {
        deps.iter()
            .filter_map(|(child, parents)| {
                let child = self.registry.node(*child)?.clone();
                Some((child, self.registry.resolve_all(parents)))
            })
            .collect()
    }

    /// Whether `node` has a condition of either type.
    pub fn contains(&self, node: &N) -> bool {
        self.registry
            .id_of(node)
            .is_some_and(|id| self.conditions.contains(id))
    }

    /// Conditions assigned to `node` so far, keyed by type.
    pub fn conditions_of(&self, node: &N) -> Result<BTreeMap<ConditionType, Condition<N>>> {
        let Some(id) = self.registry.id_of(node) else {
            return Ok(BTreeMap::new());
        };
        let mut out = BTreeMap::new();
        if let Some(c) = self.conditions.additive_of(id) {
            out.insert(ConditionType::Additive, self.to_public(c)?);
        }
        if let Some(c) = self.conditions.subtractive_of(id) {
            out.insert(ConditionType::Subtractive, self.to_public(c)?);
        }
        Ok(out)
    }

    /// Effective conditions as a run started now would use them: runtime
    /// termination and per-node conditions, defaults included.
    pub fn summary(&self) -> Result<ScheduleSummary<N>> {
        let plan = self.build_plan(&self.termination, false)?;

        let termination = plan
            .termination()
            .iter()
            .map(|(scale, c)| Ok((scale.to_string(), self.to_public(c)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        let mut node = IndexMap::new();
        for (id, n) in self.registry.iter() {
            if let Some(c) = plan.condition_of(id) {
                node.insert(n.clone(), self.to_public(c)?);
            }
        }

        Ok(ScheduleSummary {
            conditions: ConditionsSummary { termination, node },
        })
    }
}

impl Scheduler<String> {
    /// Build a scheduler from a validated [`ScheduleFile`]: graph from the
    /// node sections, explicit node conditions, rule conditions,
    /// termination overrides and the trial bound.
    pub fn from_schedule(cfg: &ScheduleFile) -> Result<Self> {
        let graph = DependencyGraph::from_schedule(cfg);
        let mut scheduler = Scheduler::new(&graph)?;

        for (name, node) in cfg.node.iter() {
            if let Some(condition) = &node.condition {
                scheduler.add_condition(name.clone(), condition.clone())?;
            }
        }
        if !cfg.rule.is_empty() {
            scheduler.add_condition_set(
                cfg.rule
                    .iter()
                    .map(|(name, rule)| (name.clone(), rule.condition.clone())),
            )?;
        }

        if !cfg.termination.is_empty() {
            let overrides = cfg
                .termination
                .iter()
                .map(|(key, condition)| {
                    let scale = TimeScale::from_str(key).map_err(SchedError::ConfigError)?;
                    Ok((scale, condition.clone()))
                })
                .collect::<Result<BTreeMap<_, _>>>()?;
            scheduler.set_termination_conditions(Some(overrides))?;
        }
        scheduler.set_num_trials(Some(cfg.config.trials));

        Ok(scheduler)
    }
}

fn unknown_owner<N: Node>(node: &N) -> SchedError {
    SchedError::ConditionSetError(format!(
        "{node:?} is not in the graph; only additive conditions can introduce new nodes"
    ))
}

fn unknown_context(context: &ExecutionContextId) -> SchedError {
    SchedError::SchedulerError(format!("unknown execution context '{context}'"))
}
