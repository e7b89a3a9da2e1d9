// src/engine/counts.rs

//! Execution counters for one context.

use crate::dag::NodeId;
use crate::types::TimeScale;

/// Two families of counters:
///
/// - `total[scale][node]`: executions of `node` within the current instance
///   of `scale`.
/// - `useable[producer][consumer]`: executions of `producer` since
///   `consumer` last executed. Read by `EveryNCalls`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionCounts {
    total: [Vec<u64>; 4],
    useable: Vec<Vec<u64>>,
}

impl ExecutionCounts {
    pub fn new(node_count: usize) -> Self {
        let mut counts = Self::default();
        counts.ensure_len(node_count);
        counts
    }

    /// Grow storage so that ids below `node_count` are addressable.
    /// Existing counters keep their values.
    pub fn ensure_len(&mut self, node_count: usize) {
        if self.useable.len() >= node_count {
            return;
        }
        for per_scale in self.total.iter_mut() {
            per_scale.resize(node_count, 0);
        }
        for row in self.useable.iter_mut() {
            row.resize(node_count, 0);
        }
        self.useable.resize_with(node_count, || vec![0; node_count]);
    }

    pub fn len(&self) -> usize {
        self.useable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.useable.is_empty()
    }

    pub fn total(&self, scale: TimeScale, node: NodeId) -> u64 {
        self.total[scale.index()]
            .get(node.index())
            .copied()
            .unwrap_or(0)
    }

    pub fn useable(&self, producer: NodeId, consumer: NodeId) -> u64 {
        self.useable
            .get(producer.index())
            .and_then(|row| row.get(consumer.index()))
            .copied()
            .unwrap_or(0)
    }

    /// Account for one execution of `node`.
    ///
    /// The node consumes everything it was waiting on (its column is
    /// cleared) before its own execution becomes visible to every consumer,
    /// itself included.
    pub fn record_execution(&mut self, node: NodeId) {
        self.ensure_len(node.index() + 1);
        let idx = node.index();

        for per_scale in self.total.iter_mut() {
            per_scale[idx] += 1;
        }
        for row in self.useable.iter_mut() {
            row[idx] = 0;
        }
        for count in self.useable[idx].iter_mut() {
            *count += 1;
        }
    }

    /// Zero the totals for `scale` and every finer scale.
    pub fn reset_total(&mut self, scale: TimeScale) {
        for ts in scale.and_finer() {
            self.total[ts.index()].iter_mut().for_each(|c| *c = 0);
        }
    }

    pub fn reset_useable(&mut self) {
        for row in self.useable.iter_mut() {
            row.iter_mut().for_each(|c| *c = 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_consumes_incoming_and_feeds_outgoing() {
        let (a, b) = (NodeId(0), NodeId(1));
        let mut counts = ExecutionCounts::new(2);

        counts.record_execution(a);
        counts.record_execution(a);
        assert_eq!(counts.useable(a, b), 2);
        assert_eq!(counts.useable(a, a), 1);

        counts.record_execution(b);
        assert_eq!(counts.useable(a, b), 0);
        assert_eq!(counts.useable(b, a), 1);
        assert_eq!(counts.total(TimeScale::Trial, a), 2);
    }

    #[test]
    fn reset_total_clears_scale_and_finer() {
        let a = NodeId(0);
        let mut counts = ExecutionCounts::new(1);
        counts.record_execution(a);

        counts.reset_total(TimeScale::Pass);
        assert_eq!(counts.total(TimeScale::TimeStep, a), 0);
        assert_eq!(counts.total(TimeScale::Pass, a), 0);
        assert_eq!(counts.total(TimeScale::Trial, a), 1);
        assert_eq!(counts.total(TimeScale::Run, a), 1);
    }

    #[test]
    fn grows_without_losing_counts() {
        let a = NodeId(0);
        let mut counts = ExecutionCounts::new(1);
        counts.record_execution(a);

        counts.record_execution(NodeId(3));
        assert_eq!(counts.len(), 4);
        assert_eq!(counts.total(TimeScale::Run, a), 1);
        assert_eq!(counts.useable(NodeId(3), a), 1);
    }
}
