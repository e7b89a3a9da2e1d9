// src/condition/set.rs

use std::collections::BTreeMap;

use crate::condition::Condition;
use crate::dag::NodeId;
use crate::errors::{Result, SchedError};
use crate::types::ConditionType;

/// Per-node condition assignment, split by [`ConditionType`].
///
/// A node holds at most one condition of each type; adding another of the
/// same type replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionSet {
    additive: BTreeMap<NodeId, Condition<NodeId>>,
    subtractive: BTreeMap<NodeId, Condition<NodeId>>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `condition` for `owner` under its resolved type.
    pub fn add_condition(&mut self, owner: NodeId, condition: Condition<NodeId>) -> Result<ConditionType> {
        let ty = condition.condition_type()?;
        match ty {
            ConditionType::Additive => self.additive.insert(owner, condition),
            ConditionType::Subtractive => self.subtractive.insert(owner, condition),
        };
        Ok(ty)
    }

    /// Add a batch of conditions that all share one type.
    ///
    /// Nothing is stored if the batch mixes types or any condition fails to
    /// resolve.
    pub fn add_condition_set(
        &mut self,
        conditions: impl IntoIterator<Item = (NodeId, Condition<NodeId>)>,
    ) -> Result<Option<ConditionType>> {
        let batch: Vec<_> = conditions.into_iter().collect();

        let mut resolved: Option<ConditionType> = None;
        for (owner, condition) in &batch {
            let ty = condition.condition_type()?;
            if resolved.is_some_and(|prev| prev != ty) {
                return Err(SchedError::ConditionSetError(format!(
                    "condition set mixes additive and subtractive conditions (at node {owner})"
                )));
            }
            resolved = Some(ty);
        }

        for (owner, condition) in batch {
            self.add_condition(owner, condition)?;
        }
        Ok(resolved)
    }

    pub fn additive(&self) -> &BTreeMap<NodeId, Condition<NodeId>> {
        &self.additive
    }

    pub fn subtractive(&self) -> &BTreeMap<NodeId, Condition<NodeId>> {
        &self.subtractive
    }

    pub fn additive_of(&self, owner: NodeId) -> Option<&Condition<NodeId>> {
        self.additive.get(&owner)
    }

    pub fn subtractive_of(&self, owner: NodeId) -> Option<&Condition<NodeId>> {
        self.subtractive.get(&owner)
    }

    /// Whether `owner` has a condition of either type.
    pub fn contains(&self, owner: NodeId) -> bool {
        self.additive.contains_key(&owner) || self.subtractive.contains_key(&owner)
    }

    pub fn is_empty(&self) -> bool {
        self.additive.is_empty() && self.subtractive.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_condition_type() {
        let mut set = ConditionSet::new();
        let a = NodeId(0);

        assert_eq!(set.add_condition(a, Condition::Always).unwrap(), ConditionType::Subtractive);
        assert_eq!(
            set.add_condition(a, Condition::BeforeEveryPass).unwrap(),
            ConditionType::Additive
        );

        assert_eq!(set.subtractive_of(a), Some(&Condition::Always));
        assert_eq!(set.additive_of(a), Some(&Condition::BeforeEveryPass));
    }

    #[test]
    fn mixed_batch_is_rejected_without_side_effects() {
        let mut set = ConditionSet::new();
        let err = set
            .add_condition_set([
                (NodeId(0), Condition::Always),
                (NodeId(1), Condition::AfterEveryTrial),
            ])
            .unwrap_err();

        assert!(matches!(err, SchedError::ConditionSetError(_)));
        assert!(set.is_empty());
    }

    #[test]
    fn negated_additive_condition_is_rejected() {
        let mut set = ConditionSet::new();
        let err = set.add_condition(NodeId(0), !Condition::BeforeEveryRun).unwrap_err();
        assert!(matches!(err, SchedError::ConditionSetError(_)));
    }
}
