#![allow(dead_code)]

use condsched::config::{ConfigSection, NodeConfig, RawScheduleFile, RuleConfig, ScheduleFile};
use condsched::{Condition, DependencyGraph};

/// Builder for `ScheduleFile` to simplify test setup.
pub struct ScheduleFileBuilder {
    schedule: RawScheduleFile,
}

impl ScheduleFileBuilder {
    pub fn new() -> Self {
        Self {
            schedule: RawScheduleFile {
                config: ConfigSection::default(),
                ..RawScheduleFile::default()
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: NodeConfig) -> Self {
        self.schedule.node.insert(name.to_string(), node);
        self
    }

    pub fn with_rule(mut self, name: &str, condition: Condition<String>) -> Self {
        self.schedule
            .rule
            .insert(name.to_string(), RuleConfig { condition });
        self
    }

    pub fn with_termination(mut self, scale: &str, condition: Condition<String>) -> Self {
        self.schedule.termination.insert(scale.to_string(), condition);
        self
    }

    pub fn with_trials(mut self, trials: u64) -> Self {
        self.schedule.config.trials = trials;
        self
    }

    pub fn raw(self) -> RawScheduleFile {
        self.schedule
    }

    pub fn build(self) -> ScheduleFile {
        ScheduleFile::try_from(self.schedule).expect("Failed to build valid schedule from builder")
    }
}

impl Default for ScheduleFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self {
            node: NodeConfig::default(),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.node.after.push(dep.to_string());
        self
    }

    pub fn condition(mut self, condition: Condition<String>) -> Self {
        self.node.condition = Some(condition);
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph from `(child, parents)` pairs over string names.
pub fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph<String> {
    edges
        .iter()
        .map(|(child, parents)| {
            (
                child.to_string(),
                parents.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            )
        })
        .collect()
}

/// Linear chain `names[0] -> names[1] -> ...`.
pub fn chain(names: &[&str]) -> DependencyGraph<String> {
    let mut graph = DependencyGraph::new();
    for (i, name) in names.iter().enumerate() {
        graph.add_node(name.to_string());
        if i > 0 {
            graph.add_dependency(name.to_string(), names[i - 1].to_string());
        }
    }
    graph
}

pub fn s(name: &str) -> String {
    name.to_string()
}
